use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::role::RoleRegistry;
use crate::store::Categorized;
use crate::task::{AssignmentState, ContractTask, RoleKey, TeamTask};

/// Desired per-role value keyed by role. Entries holding an unset value are ignored.
pub type RoleFilter<D> = BTreeMap<RoleKey, D>;

/// How a record answers a per-role filter entry.
pub trait RoleMatch {
    type Desired: Copy + PartialEq;

    fn is_unset(desired: Self::Desired) -> bool;
    fn matches_role(&self, role: &str, desired: Self::Desired) -> bool;
}

impl RoleMatch for TeamTask {
    type Desired = AssignmentState;

    fn is_unset(desired: AssignmentState) -> bool {
        desired.is_none()
    }

    fn matches_role(&self, role: &str, desired: AssignmentState) -> bool {
        self.assignment(role) == desired
    }
}

/// Contract views filter on "this role is the sole responsible party".
impl RoleMatch for ContractTask {
    type Desired = bool;

    fn is_unset(desired: bool) -> bool {
        !desired
    }

    fn matches_role(&self, role: &str, desired: bool) -> bool {
        (self.responsible.as_deref() == Some(role)) == desired
    }
}

fn passes<T: RoleMatch>(task: &T, filter: &RoleFilter<T::Desired>) -> bool {
    filter
        .iter()
        .filter(|(_, desired)| !T::is_unset(**desired))
        .all(|(role, desired)| task.matches_role(role, *desired))
}

#[must_use]
pub fn filter_by_role<'a, T: RoleMatch>(
    tasks: &'a [T],
    filter: &RoleFilter<T::Desired>,
) -> Vec<&'a T> {
    tasks.iter().filter(|task| passes(*task, filter)).collect()
}

/// A row of a grouped table: a synthetic category header or a stored task.
#[derive(Debug, PartialEq, Eq)]
pub enum DisplayRow<'a, T> {
    Header { category: &'a str },
    Task(&'a T),
}

impl<T> Clone for DisplayRow<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DisplayRow<'_, T> {}

impl<'a, T> DisplayRow<'a, T> {
    #[must_use]
    pub fn is_header(&self) -> bool {
        matches!(self, Self::Header { .. })
    }

    #[must_use]
    pub fn task(&self) -> Option<&'a T> {
        match *self {
            Self::Header { .. } => None,
            Self::Task(task) => Some(task),
        }
    }
}

/// Insert one header per distinct category, in first-appearance order, each followed by that
/// category's tasks in their original order.
#[must_use]
pub fn group_for_display<T: Categorized>(tasks: &[T]) -> Vec<DisplayRow<'_, T>> {
    let mut groups: Vec<(&str, Vec<&T>)> = Vec::new();
    let mut index_by_category: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        let index = match index_by_category.get(task.category()) {
            Some(index) => *index,
            None => {
                groups.push((task.category(), Vec::new()));
                index_by_category.insert(task.category(), groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[index].1.push(task);
    }

    let mut rows = Vec::with_capacity(tasks.len() + groups.len());
    for (category, members) in groups {
        rows.push(DisplayRow::Header { category });
        rows.extend(members.into_iter().map(DisplayRow::Task));
    }
    rows
}

/// Rows for the ungrouped contract views.
#[must_use]
pub fn plain_rows<T>(tasks: &[T]) -> Vec<DisplayRow<'_, T>> {
    tasks.iter().map(DisplayRow::Task).collect()
}

/// Apply `filter` to display rows. Headers always pass.
#[must_use]
pub fn filter_rows<'a, T: RoleMatch>(
    rows: &[DisplayRow<'a, T>],
    filter: &RoleFilter<T::Desired>,
) -> Vec<DisplayRow<'a, T>> {
    rows.iter()
        .copied()
        .filter(|row| match row {
            DisplayRow::Header { .. } => true,
            DisplayRow::Task(task) => passes(*task, filter),
        })
        .collect()
}

/// Per-role workload on the team matrix.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RoleSummary {
    pub key: String,
    pub label: String,
    pub primary: usize,
    pub support: usize,
}

#[must_use]
pub fn summarize_roles(
    tasks: &[TeamTask],
    registry: &RoleRegistry,
    active_only: bool,
) -> Vec<RoleSummary> {
    registry
        .list_project_roles(active_only)
        .into_iter()
        .map(|role| {
            let count = |state: AssignmentState| {
                tasks
                    .iter()
                    .filter(|task| task.assignment(&role.key) == state)
                    .count()
            };
            RoleSummary {
                key: role.key.clone(),
                label: role.label.clone(),
                primary: count(AssignmentState::Primary),
                support: count(AssignmentState::Support),
            }
        })
        .collect()
}
