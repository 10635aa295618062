//! Boundary to the data source that owns the authoritative collections.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use responsibility_core::{ContractTask, ContractView, Record, Role, TeamTask};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Everything the responsibility views load at mount.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponsibilityBundle {
    #[serde(default)]
    pub project_roles: Vec<Role>,
    #[serde(default)]
    pub contract_roles: Vec<Role>,
    #[serde(default)]
    pub responsibilities: Vec<TeamTask>,
    #[serde(default)]
    pub prime_contract_tasks: Vec<ContractTask>,
    #[serde(default)]
    pub subcontract_tasks: Vec<ContractTask>,
}

impl ResponsibilityBundle {
    /// Parse the data-source payload.
    ///
    /// # Errors
    /// Returns an error when `raw` is not a valid bundle document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    #[must_use]
    pub fn contract_tasks(&self, view: ContractView) -> &[ContractTask] {
        match view {
            ContractView::Prime => &self.prime_contract_tasks,
            ContractView::Sub => &self.subcontract_tasks,
        }
    }

    fn contract_tasks_mut(&mut self, view: ContractView) -> &mut Vec<ContractTask> {
        match view {
            ContractView::Prime => &mut self.prime_contract_tasks,
            ContractView::Sub => &mut self.subcontract_tasks,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
#[error("{operation} failed: {message}")]
pub struct GatewayError {
    pub operation: String,
    pub message: String,
}

impl GatewayError {
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Asynchronous read/write calls against the data source.
///
/// Every write answers with the full, authoritative collection it touched. Updates and deletes
/// of an absent id succeed without changing anything.
#[async_trait]
pub trait ResponsibilityGateway: Send + Sync {
    async fn fetch_bundle(&self) -> Result<ResponsibilityBundle, GatewayError>;

    async fn create_responsibility(&self, task: &TeamTask) -> Result<Vec<TeamTask>, GatewayError>;

    async fn update_responsibility(&self, task: &TeamTask) -> Result<Vec<TeamTask>, GatewayError>;

    async fn delete_responsibility(&self, id: &str) -> Result<Vec<TeamTask>, GatewayError>;

    async fn save_contract_task(
        &self,
        view: ContractView,
        task: &ContractTask,
    ) -> Result<Vec<ContractTask>, GatewayError>;

    async fn delete_contract_task(
        &self,
        view: ContractView,
        id: &str,
    ) -> Result<Vec<ContractTask>, GatewayError>;
}

/// Gateway over an in-process bundle. Used by tests and by embedders that keep the data in
/// memory; it can be primed to reject the next N calls.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<ResponsibilityBundle>,
    calls: Mutex<Vec<String>>,
    failures_remaining: AtomicUsize,
}

impl InMemoryGateway {
    #[must_use]
    pub fn new(bundle: ResponsibilityBundle) -> Self {
        Self {
            state: Mutex::new(bundle),
            ..Self::default()
        }
    }

    /// Reject the next `count` calls with a [`GatewayError`].
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> ResponsibilityBundle {
        self.state.lock().await.clone()
    }

    /// Operation names of every call received so far, rejected ones included.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn check(&self, operation: &str) -> Result<(), GatewayError> {
        self.calls.lock().await.push(operation.to_string());
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if failed {
            return Err(GatewayError::new(operation, "data source unavailable"));
        }
        Ok(())
    }
}

fn upsert_by_id<T: Record>(records: &mut Vec<T>, record: &T) {
    let position = records
        .iter()
        .position(|existing| existing.id() == record.id());
    match position {
        Some(index) => records[index] = record.clone(),
        None => records.push(record.clone()),
    }
}

#[async_trait]
impl ResponsibilityGateway for InMemoryGateway {
    async fn fetch_bundle(&self) -> Result<ResponsibilityBundle, GatewayError> {
        self.check("fetch_bundle").await?;
        Ok(self.state.lock().await.clone())
    }

    async fn create_responsibility(&self, task: &TeamTask) -> Result<Vec<TeamTask>, GatewayError> {
        self.check("create_responsibility").await?;
        let mut state = self.state.lock().await;
        upsert_by_id(&mut state.responsibilities, task);
        Ok(state.responsibilities.clone())
    }

    async fn update_responsibility(&self, task: &TeamTask) -> Result<Vec<TeamTask>, GatewayError> {
        self.check("update_responsibility").await?;
        let mut state = self.state.lock().await;
        if let Some(existing) = state.responsibilities.iter_mut().find(|r| r.id == task.id) {
            *existing = task.clone();
        }
        Ok(state.responsibilities.clone())
    }

    async fn delete_responsibility(&self, id: &str) -> Result<Vec<TeamTask>, GatewayError> {
        self.check("delete_responsibility").await?;
        let mut state = self.state.lock().await;
        state.responsibilities.retain(|record| record.id != id);
        Ok(state.responsibilities.clone())
    }

    async fn save_contract_task(
        &self,
        view: ContractView,
        task: &ContractTask,
    ) -> Result<Vec<ContractTask>, GatewayError> {
        self.check("save_contract_task").await?;
        let mut state = self.state.lock().await;
        let records = state.contract_tasks_mut(view);
        upsert_by_id(records, task);
        Ok(records.clone())
    }

    async fn delete_contract_task(
        &self,
        view: ContractView,
        id: &str,
    ) -> Result<Vec<ContractTask>, GatewayError> {
        self.check("delete_contract_task").await?;
        let mut state = self.state.lock().await;
        let records = state.contract_tasks_mut(view);
        records.retain(|record| record.id != id);
        Ok(records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> InMemoryGateway {
        InMemoryGateway::new(ResponsibilityBundle {
            responsibilities: vec![TeamTask::new("s1", "Site safety plan", "1. SAFETY")],
            ..ResponsibilityBundle::default()
        })
    }

    #[tokio::test]
    async fn update_of_absent_id_changes_nothing() {
        let gateway = gateway();
        let ghost = TeamTask::new("ghost", "Never created", "1. SAFETY");

        let records = match gateway.update_responsibility(&ghost).await {
            Ok(records) => records,
            Err(err) => panic!("update should succeed: {err}"),
        };

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "s1");
    }

    #[tokio::test]
    async fn primed_failures_are_consumed_one_per_call() {
        let gateway = gateway();
        gateway.fail_next(1);

        let first = gateway.delete_responsibility("s1").await;
        let second = gateway.delete_responsibility("s1").await;

        let rejected = GatewayError::new("delete_responsibility", "data source unavailable");
        assert_eq!(first, Err(rejected));
        assert_eq!(second, Ok(Vec::new()));
        assert_eq!(gateway.calls().await.len(), 2);
    }

    #[test]
    fn bundle_parses_camel_case_payload() {
        let raw = r#"{"projectRoles":[{"key":"PX","label":"Project Executive"}]}"#;
        let bundle = match ResponsibilityBundle::from_json(raw) {
            Ok(bundle) => bundle,
            Err(err) => panic!("bundle should parse: {err}"),
        };
        assert_eq!(bundle.project_roles[0].key, "PX");
        assert!(bundle.contract_tasks(ContractView::Sub).is_empty());
    }
}
