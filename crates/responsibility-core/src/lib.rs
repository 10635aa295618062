//! Responsibility matrix core.
//!
//! Keeps the team responsibility matrix consistent with role assignments made on the
//! prime-contract and subcontract views, and shapes the three views for display and CSV export.
//! Everything in this crate is synchronous and free of I/O; persistence lives behind the session
//! layer in `responsibility-api`.

pub mod error;
pub mod export;
pub mod filter;
pub mod propagation;
pub mod role;
pub mod store;
pub mod task;

pub use error::CoreError;
pub use export::{contract_columns, export_csv, export_file_name, team_columns, Column, CsvFields};
pub use filter::{
    filter_by_role, filter_rows, group_for_display, plain_rows, summarize_roles, DisplayRow,
    RoleFilter, RoleMatch, RoleSummary,
};
pub use propagation::{
    apply, derive_team_task, derived_task_id, propagate, retraction_for_deleted, Propagation,
    PropagationPolicy,
};
pub use role::{Role, RoleRegistry};
pub use store::{Categorized, Record, RecordStore};
pub use task::{
    generate_task_id, AssignmentState, ContractTask, ContractView, RoleKey, TaskOrigin, TeamTask,
    DERIVED_ID_PREFIX,
};
