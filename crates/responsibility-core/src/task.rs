use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use ulid::Ulid;

use crate::store::{Categorized, Record};

pub type RoleKey = String;

/// Id prefix reserved for team tasks derived from contract assignments.
pub const DERIVED_ID_PREFIX: &str = "team-from-";

/// Three-way role assignment of the team matrix.
///
/// The wire form is the matrix cell text: `""`, `"X"` or `"Support"`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AssignmentState {
    #[default]
    None,
    Primary,
    Support,
}

impl AssignmentState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Primary => "X",
            Self::Support => "Support",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Primary => "Primary",
            Self::Support => "Support",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Some(Self::None);
        }
        if value.eq_ignore_ascii_case("x") || value.eq_ignore_ascii_case("primary") {
            return Some(Self::Primary);
        }
        if value.eq_ignore_ascii_case("support") {
            return Some(Self::Support);
        }
        None
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

impl Serialize for AssignmentState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssignmentState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None => Ok(Self::None),
            Some(value) => Self::parse(value).ok_or_else(|| {
                de::Error::unknown_variant(value, &["", "X", "Primary", "Support"])
            }),
        }
    }
}

/// The two contract-side views whose assignments feed the team matrix.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractView {
    Prime,
    Sub,
}

impl ContractView {
    pub const ALL: [Self; 2] = [Self::Prime, Self::Sub];

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Prime => "prime",
            Self::Sub => "sub",
        }
    }

    /// Team-matrix category given to tasks derived from this view.
    #[must_use]
    pub fn category_label(self) -> &'static str {
        match self {
            Self::Prime => "Contractor",
            Self::Sub => "Subcontractor",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prime" => Some(Self::Prime),
            "sub" => Some(Self::Sub),
            _ => None,
        }
    }
}

impl Display for ContractView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Where a team task came from, recovered from its id.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TaskOrigin {
    Manual,
    Derived {
        view: ContractView,
        source_id: String,
    },
}

impl TaskOrigin {
    #[must_use]
    pub fn of(id: &str) -> Self {
        let Some(rest) = id.strip_prefix(DERIVED_ID_PREFIX) else {
            return Self::Manual;
        };
        for view in ContractView::ALL {
            let source = rest
                .strip_prefix(view.tag())
                .and_then(|tail| tail.strip_prefix('-'));
            if let Some(source_id) = source.filter(|source_id| !source_id.is_empty()) {
                return Self::Derived {
                    view,
                    source_id: source_id.to_string(),
                };
            }
        }
        Self::Manual
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived { .. })
    }
}

/// One row of the team responsibility matrix.
///
/// Serialized in the legacy flat shape where every role key is a top-level field holding the
/// cell text. A role absent from `assignments` reads as [`AssignmentState::None`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TeamTask {
    pub id: String,
    pub task: String,
    #[serde(default)]
    pub category: String,
    #[serde(flatten)]
    pub assignments: BTreeMap<RoleKey, AssignmentState>,
}

impl TeamTask {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        task: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            category: category.into(),
            assignments: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_assignment(mut self, role: impl Into<RoleKey>, state: AssignmentState) -> Self {
        self.assignments.insert(role.into(), state);
        self
    }

    #[must_use]
    pub fn assignment(&self, role: &str) -> AssignmentState {
        self.assignments.get(role).copied().unwrap_or_default()
    }

    pub fn set_assignment(&mut self, role: impl Into<RoleKey>, state: AssignmentState) {
        self.assignments.insert(role.into(), state);
    }

    /// Role keys holding a non-`None` state, in key order.
    pub fn assigned_roles(&self) -> impl Iterator<Item = (&str, AssignmentState)> {
        self.assignments
            .iter()
            .filter(|(_, state)| !state.is_none())
            .map(|(role, state)| (role.as_str(), *state))
    }

    #[must_use]
    pub fn origin(&self) -> TaskOrigin {
        TaskOrigin::of(&self.id)
    }
}

impl Record for TeamTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.task
    }
}

impl Categorized for TeamTask {
    fn category(&self) -> &str {
        &self.category
    }
}

/// One row of the prime-contract or subcontract view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ContractTask {
    pub id: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub article: String,
    pub task: String,
    #[serde(default, with = "blank_as_none")]
    pub responsible: Option<RoleKey>,
}

impl ContractTask {
    #[must_use]
    pub fn new(id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reference(mut self, page: impl Into<String>, article: impl Into<String>) -> Self {
        self.page = page.into();
        self.article = article.into();
        self
    }

    #[must_use]
    pub fn with_responsible(mut self, role: impl Into<RoleKey>) -> Self {
        let role = role.into();
        self.responsible = Some(role).filter(|role| !role.trim().is_empty());
        self
    }
}

impl Record for ContractTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.task
    }
}

/// Fresh id for a record created from the create dialog, e.g. `team-01HV...`.
#[must_use]
pub fn generate_task_id(prefix: &str) -> String {
    format!("{prefix}-{}", Ulid::new())
}

mod blank_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        let trimmed = raw.map(|value| value.trim().to_string());
        Ok(trimmed.filter(|value| !value.is_empty()))
    }
}
