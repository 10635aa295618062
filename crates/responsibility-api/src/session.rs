//! One user's working session over the three responsibility views.
//!
//! Every mutation follows the same order: validate, mutate the in-memory store (including any
//! cross-propagation), queue the writes the data source must see, then flush the queue. Each
//! acknowledged write replaces the touched collection with the authoritative one the data source
//! returns, with the still-queued writes laid back on top.
//!
//! A rejected write stays queued and the caller gets a [`SessionError::Persistence`]. The queue
//! is flushed again by the next mutation or by [`ResponsibilitySession::sync`], so a retry never
//! depends on whether the in-memory state already looks done.

use std::collections::BTreeSet;

use responsibility_core::{
    apply, contract_columns, export_csv, export_file_name, filter_rows, generate_task_id,
    group_for_display, plain_rows, propagate, retraction_for_deleted, summarize_roles, team_columns,
    AssignmentState, ContractTask, ContractView, DisplayRow, Propagation, PropagationPolicy,
    RecordStore, RoleFilter, RoleRegistry, RoleSummary, TeamTask, DERIVED_ID_PREFIX,
};
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{debug, info, warn};

use crate::config::MatrixConfig;
use crate::error::SessionError;
use crate::gateway::{GatewayError, ResponsibilityGateway};

/// A rendered CSV ready for the platform download primitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub contents: String,
}

/// A write the data source has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingWrite {
    TeamUpsert(TeamTask),
    TeamDelete(String),
    ContractSave(ContractView, ContractTask),
    ContractDelete(ContractView, String),
}

impl PendingWrite {
    /// The collection (`None` for the team matrix) and record id this write targets.
    fn target(&self) -> (Option<ContractView>, &str) {
        match self {
            Self::TeamUpsert(task) => (None, &task.id),
            Self::TeamDelete(id) => (None, id),
            Self::ContractSave(view, task) => (Some(*view), &task.id),
            Self::ContractDelete(view, id) => (Some(*view), id),
        }
    }

    fn same_target(&self, other: &PendingWrite) -> bool {
        self.target() == other.target()
    }
}

/// The authoritative collection returned for an acknowledged write.
enum Acknowledged {
    Team(Vec<TeamTask>),
    Contract(ContractView, Vec<ContractTask>),
}

pub struct ResponsibilitySession<G> {
    gateway: G,
    registry: RoleRegistry,
    team: RecordStore<TeamTask>,
    prime: RecordStore<ContractTask>,
    sub: RecordStore<ContractTask>,
    policy: PropagationPolicy,
    /// Team ids present in the last collection the data source returned.
    persisted_team: BTreeSet<String>,
    pending: Vec<PendingWrite>,
}

fn record_ids(records: &[TeamTask]) -> BTreeSet<String> {
    records.iter().map(|task| task.id.clone()).collect()
}

impl<G: ResponsibilityGateway> ResponsibilitySession<G> {
    /// Fetch the bundle and build the session stores.
    ///
    /// # Errors
    /// Returns [`SessionError::Persistence`] when the bundle cannot be fetched.
    pub async fn load(gateway: G, config: &MatrixConfig) -> Result<Self, SessionError> {
        let bundle = match gateway.fetch_bundle().await {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!("Failed to load responsibility data: {}", err);
                return Err(err.into());
            }
        };

        let mut registry = RoleRegistry::new(bundle.project_roles, bundle.contract_roles);
        if let Some(active) = &config.roles.active {
            registry = registry.with_active_keys(active);
        }

        info!(
            team = bundle.responsibilities.len(),
            prime = bundle.prime_contract_tasks.len(),
            sub = bundle.subcontract_tasks.len(),
            "Responsibility session loaded"
        );

        Ok(Self {
            gateway,
            registry,
            persisted_team: record_ids(&bundle.responsibilities),
            team: RecordStore::from_records(bundle.responsibilities),
            prime: RecordStore::from_records(bundle.prime_contract_tasks),
            sub: RecordStore::from_records(bundle.subcontract_tasks),
            policy: config.propagation,
            pending: Vec::new(),
        })
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn policy(&self) -> PropagationPolicy {
        self.policy
    }

    pub fn set_role_active(&mut self, key: &str, enabled: bool) -> bool {
        let known = self.registry.set_role_active(key, enabled);
        if known {
            debug!(role = key, enabled, "Role visibility toggled");
        }
        known
    }

    pub fn team_tasks(&self) -> &[TeamTask] {
        self.team.records()
    }

    pub fn contract_tasks(&self, view: ContractView) -> &[ContractTask] {
        self.contract_store(view).records()
    }

    pub fn categories(&self) -> Vec<String> {
        self.team.categories()
    }

    /// Number of writes still waiting for the data source.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// A blank team task with a fresh id, as the create dialog starts with.
    pub fn new_team_task(&self, task: &str, category: &str) -> TeamTask {
        TeamTask::new(generate_task_id("team"), task, category)
    }

    fn contract_store(&self, view: ContractView) -> &RecordStore<ContractTask> {
        match view {
            ContractView::Prime => &self.prime,
            ContractView::Sub => &self.sub,
        }
    }

    fn contract_store_mut(&mut self, view: ContractView) -> &mut RecordStore<ContractTask> {
        match view {
            ContractView::Prime => &mut self.prime,
            ContractView::Sub => &mut self.sub,
        }
    }

    fn check_role(&self, role: &str) -> Result<(), SessionError> {
        if self.registry.is_known(role) {
            Ok(())
        } else {
            Err(SessionError::UnknownRole(role.to_string()))
        }
    }

    /// Create or update a manually entered team task.
    ///
    /// # Errors
    /// Validation errors abort without mutation: blank id or description, an id inside the
    /// derived-task namespace, or an assignment to an unknown role. A data-source failure returns
    /// [`SessionError::Persistence`] with the in-memory change kept and the write queued.
    pub async fn save_team_task(&mut self, task: TeamTask) -> Result<&[TeamTask], SessionError> {
        if task.id.starts_with(DERIVED_ID_PREFIX) {
            return Err(SessionError::ReservedId(task.id));
        }
        for (role, _) in task.assigned_roles() {
            self.check_role(role)?;
        }

        self.team.upsert(task.clone())?;
        debug!(id = %task.id, "Team task saved in memory");
        self.enqueue(PendingWrite::TeamUpsert(task));
        self.flush().await?;
        Ok(self.team.records())
    }

    /// Delete one team task. Deleting an unknown id is a successful no-op.
    ///
    /// # Errors
    /// Returns [`SessionError::Persistence`] when the data source rejects the delete.
    pub async fn delete_team_task(&mut self, id: &str) -> Result<&[TeamTask], SessionError> {
        if self.team.take(id).is_some() {
            debug!(id, "Team task removed in memory");
            self.enqueue_team_delete(id);
        }
        self.flush().await?;
        Ok(self.team.records())
    }

    /// Delete every team task in `category` and return how many this call removed from the
    /// view. Contract tasks that produced derived entries in the category are left alone.
    ///
    /// # Errors
    /// Returns [`SessionError::Persistence`] on the first rejected delete. Every matching task
    /// has already left the in-memory store by then, and the unsent deletes stay queued.
    pub async fn delete_category(&mut self, category: &str) -> Result<usize, SessionError> {
        let removed = self.team.remove_category(category);
        info!(category, removed = removed.len(), "Team category deleted");
        for task in &removed {
            self.enqueue_team_delete(&task.id);
        }
        self.flush().await?;
        Ok(removed.len())
    }

    /// Set or clear the responsible role of an existing contract task and propagate it.
    ///
    /// # Errors
    /// [`SessionError::UnknownTask`] when `task_id` is not in `view`, plus everything
    /// [`Self::save_contract_task`] returns.
    pub async fn assign_responsible(
        &mut self,
        view: ContractView,
        task_id: &str,
        role: Option<&str>,
    ) -> Result<Propagation, SessionError> {
        let Some(current) = self.contract_store(view).get(task_id) else {
            return Err(SessionError::UnknownTask {
                view,
                id: task_id.to_string(),
            });
        };
        let mut updated = current.clone();
        updated.responsible = role
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string);
        self.save_contract_task(view, updated).await
    }

    /// Create or update a contract task, then bring the team matrix in line with it.
    ///
    /// # Errors
    /// Validation errors abort without mutation. A data-source failure returns
    /// [`SessionError::Persistence`] with both the contract change and its propagation kept
    /// and queued.
    pub async fn save_contract_task(
        &mut self,
        view: ContractView,
        task: ContractTask,
    ) -> Result<Propagation, SessionError> {
        if let Some(role) = task.responsible.as_deref() {
            self.check_role(role)?;
        }
        self.contract_store_mut(view).upsert(task.clone())?;

        let propagation = propagate(view, &task, &self.registry, self.policy);
        let changed = apply(&mut self.team, &propagation)?;
        info!(
            view = %view,
            id = %task.id,
            responsible = task.responsible.as_deref().unwrap_or(""),
            changed,
            "Contract task saved"
        );

        self.enqueue(PendingWrite::ContractSave(view, task));
        if changed {
            self.enqueue_propagation(&propagation);
        }
        self.flush().await?;
        Ok(propagation)
    }

    /// Delete a contract task and retract the team task derived from it.
    ///
    /// # Errors
    /// Returns [`SessionError::Persistence`] when the data source rejects either delete.
    pub async fn delete_contract_task(
        &mut self,
        view: ContractView,
        id: &str,
    ) -> Result<&[ContractTask], SessionError> {
        if self.contract_store_mut(view).take(id).is_some() {
            let retraction = retraction_for_deleted(view, id);
            let retracted = apply(&mut self.team, &retraction)?;
            info!(view = %view, id, retracted, "Contract task deleted");

            self.enqueue(PendingWrite::ContractDelete(view, id.to_string()));
            if retracted {
                self.enqueue_propagation(&retraction);
            }
        }
        self.flush().await?;
        Ok(self.contract_store(view).records())
    }

    /// Re-send every write the data source has not acknowledged.
    ///
    /// # Errors
    /// Returns [`SessionError::Persistence`] when the data source rejects a write again.
    pub async fn sync(&mut self) -> Result<(), SessionError> {
        self.flush().await
    }

    /// Queue `write`, replacing any queued write to the same record.
    fn enqueue(&mut self, write: PendingWrite) {
        self.pending.retain(|queued| !queued.same_target(&write));
        self.pending.push(write);
    }

    fn enqueue_team_delete(&mut self, id: &str) {
        if self.persisted_team.contains(id) {
            self.enqueue(PendingWrite::TeamDelete(id.to_string()));
        } else {
            // The data source never saw it; dropping the queued create is enough.
            self.pending.retain(|queued| queued.target() != (None, id));
        }
    }

    fn enqueue_propagation(&mut self, propagation: &Propagation) {
        match propagation {
            Propagation::Upsert(task) => self.enqueue(PendingWrite::TeamUpsert(task.clone())),
            Propagation::Retract(id) => self.enqueue_team_delete(id),
            Propagation::Unchanged => {}
        }
    }

    /// Send queued writes in order. Stops at the first rejection, which stays queued together
    /// with everything after it.
    async fn flush(&mut self) -> Result<(), SessionError> {
        while let Some(write) = self.pending.first().cloned() {
            let acknowledged = match self.send(&write).await {
                Ok(acknowledged) => acknowledged,
                Err(err) => {
                    warn!(
                        pending = self.pending.len(),
                        "Data source rejected a write, keeping in-memory state: {}",
                        err
                    );
                    return Err(err.into());
                }
            };
            self.pending.remove(0);
            match acknowledged {
                Acknowledged::Team(records) => self.refresh_team(records),
                Acknowledged::Contract(view, records) => self.refresh_contract(view, records),
            }
        }
        Ok(())
    }

    /// Create versus update follows what the data source last reported, not the in-memory
    /// store, which already holds the optimistic change.
    async fn send(&self, write: &PendingWrite) -> Result<Acknowledged, GatewayError> {
        let gateway = &self.gateway;
        let acknowledged = match write {
            PendingWrite::TeamUpsert(task) if self.persisted_team.contains(&task.id) => {
                Acknowledged::Team(gateway.update_responsibility(task).await?)
            }
            PendingWrite::TeamUpsert(task) => {
                Acknowledged::Team(gateway.create_responsibility(task).await?)
            }
            PendingWrite::TeamDelete(id) => {
                Acknowledged::Team(gateway.delete_responsibility(id).await?)
            }
            PendingWrite::ContractSave(view, task) => {
                Acknowledged::Contract(*view, gateway.save_contract_task(*view, task).await?)
            }
            PendingWrite::ContractDelete(view, id) => {
                Acknowledged::Contract(*view, gateway.delete_contract_task(*view, id).await?)
            }
        };
        Ok(acknowledged)
    }

    /// Adopt the authoritative team collection, then lay the still-queued team writes on top.
    fn refresh_team(&mut self, records: Vec<TeamTask>) {
        self.persisted_team = record_ids(&records);
        self.team.replace_all(records);
        for write in &self.pending {
            match write {
                PendingWrite::TeamUpsert(task) => {
                    if let Err(err) = self.team.upsert(task.clone()) {
                        warn!("Queued team task {} no longer validates: {}", task.id, err);
                    }
                }
                PendingWrite::TeamDelete(id) => {
                    self.team.take(id);
                }
                PendingWrite::ContractSave(..) | PendingWrite::ContractDelete(..) => {}
            }
        }
    }

    fn refresh_contract(&mut self, view: ContractView, records: Vec<ContractTask>) {
        let store = match view {
            ContractView::Prime => &mut self.prime,
            ContractView::Sub => &mut self.sub,
        };
        store.replace_all(records);
        for write in &self.pending {
            match write {
                PendingWrite::ContractSave(queued, task) if *queued == view => {
                    if let Err(err) = store.upsert(task.clone()) {
                        warn!(
                            "Queued {} task {} no longer validates: {}",
                            view, task.id, err
                        );
                    }
                }
                PendingWrite::ContractDelete(queued, id) if *queued == view => {
                    store.take(id);
                }
                _ => {}
            }
        }
    }

    /// Grouped team rows with `filter` applied. Category headers are always kept.
    pub fn team_rows(
        &self,
        filter: &RoleFilter<AssignmentState>,
    ) -> Vec<DisplayRow<'_, TeamTask>> {
        filter_rows(&group_for_display(self.team.records()), filter)
    }

    pub fn contract_rows(
        &self,
        view: ContractView,
        filter: &RoleFilter<bool>,
    ) -> Vec<DisplayRow<'_, ContractTask>> {
        filter_rows(&plain_rows(self.contract_store(view).records()), filter)
    }

    pub fn role_summary(&self, active_only: bool) -> Vec<RoleSummary> {
        summarize_roles(self.team.records(), &self.registry, active_only)
    }

    /// CSV of the visible team rows. `active_only` limits role columns to the active roles.
    pub fn export_team_csv(
        &self,
        filter: &RoleFilter<AssignmentState>,
        active_only: bool,
        date: Date,
    ) -> CsvExport {
        let columns = team_columns(&self.registry, active_only);
        CsvExport {
            file_name: export_file_name("team", date),
            contents: export_csv(&self.team_rows(filter), &columns),
        }
    }

    pub fn export_contract_csv(
        &self,
        view: ContractView,
        filter: &RoleFilter<bool>,
        date: Date,
    ) -> CsvExport {
        CsvExport {
            file_name: export_file_name(view.tag(), date),
            contents: export_csv(&self.contract_rows(view, filter), &contract_columns()),
        }
    }
}
