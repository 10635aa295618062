//! Cross-propagation from the contract views into the team matrix.
//!
//! Assigning a responsible role on a prime-contract or subcontract task produces a derived team
//! task with a provenance id (`team-from-<view>-<source id>`). The derived task is owned here:
//! it is always rebuilt from scratch, so a later assignment under another role leaves no residue
//! of the earlier one. Manual team tasks live outside the reserved id namespace and are never
//! touched.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::role::RoleRegistry;
use crate::store::RecordStore;
use crate::task::{AssignmentState, ContractTask, ContractView, TeamTask, DERIVED_ID_PREFIX};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PropagationPolicy {
    /// Retract the derived team task when the responsible role is cleared.
    pub retract_on_clear: bool,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            retract_on_clear: true,
        }
    }
}

/// What a contract-side change means for the team matrix.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Propagation {
    Upsert(TeamTask),
    Retract(String),
    Unchanged,
}

impl Propagation {
    /// Id of the team task this outcome touches, if any.
    #[must_use]
    pub fn team_task_id(&self) -> Option<&str> {
        match self {
            Self::Upsert(task) => Some(&task.id),
            Self::Retract(id) => Some(id),
            Self::Unchanged => None,
        }
    }
}

#[must_use]
pub fn derived_task_id(view: ContractView, source_id: &str) -> String {
    format!("{DERIVED_ID_PREFIX}{}-{source_id}", view.tag())
}

/// Build the team task mirroring `source` assigned to `role`.
///
/// Every key in `known_project_roles` other than `role` is written as an explicit
/// [`AssignmentState::None`].
#[must_use]
pub fn derive_team_task<'a, I>(
    view: ContractView,
    source: &ContractTask,
    role: &str,
    known_project_roles: I,
) -> TeamTask
where
    I: IntoIterator<Item = &'a str>,
{
    let mut task = TeamTask::new(
        derived_task_id(view, &source.id),
        source.task.clone(),
        view.category_label(),
    );
    for key in known_project_roles {
        task.set_assignment(key, AssignmentState::None);
    }
    task.set_assignment(role, AssignmentState::Primary);
    task
}

/// Decide the team-matrix effect of `source` as it now stands in `view`.
#[must_use]
pub fn propagate(
    view: ContractView,
    source: &ContractTask,
    registry: &RoleRegistry,
    policy: PropagationPolicy,
) -> Propagation {
    let responsible = source
        .responsible
        .as_deref()
        .map(str::trim)
        .filter(|role| !role.is_empty());
    match responsible {
        Some(role) => {
            let keys = registry.project_role_keys();
            Propagation::Upsert(derive_team_task(view, source, role, keys))
        }
        None if policy.retract_on_clear => Propagation::Retract(derived_task_id(view, &source.id)),
        None => Propagation::Unchanged,
    }
}

/// The team-matrix effect of deleting the contract task `source_id`.
#[must_use]
pub fn retraction_for_deleted(view: ContractView, source_id: &str) -> Propagation {
    Propagation::Retract(derived_task_id(view, source_id))
}

/// Apply `propagation` to the team store. Returns whether the store changed.
///
/// # Errors
/// Returns [`CoreError::Validation`] when the derived task has a blank description, which happens
/// only when the source task itself was never validated.
pub fn apply(
    store: &mut RecordStore<TeamTask>,
    propagation: &Propagation,
) -> Result<bool, CoreError> {
    match propagation {
        Propagation::Upsert(task) => {
            if store.get(&task.id) == Some(task) {
                return Ok(false);
            }
            store.upsert(task.clone())?;
            Ok(true)
        }
        Propagation::Retract(id) => Ok(store.take(id).is_some()),
        Propagation::Unchanged => Ok(false),
    }
}
