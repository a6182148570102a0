pub mod authz;
pub mod engine;
pub mod error;
pub mod models;
pub mod stats;
pub mod storage;
pub mod workflow;

pub use authz::{Action, allows, authorize};
pub use engine::WorkflowEngine;
pub use error::LoanError;
pub use models::{Actor, LoanApplication, LoanRequestForm, LoanState, LoanStatus, Role, User};
pub use stats::{LoanStatistics, RECENT_APPLICATIONS_LIMIT, RecentApplication};
pub use storage::{LoanStore, StateUpdate, UserStore};
