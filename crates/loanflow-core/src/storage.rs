use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{LoanApplication, LoanState, LoanStatus, Role, User};
use crate::stats::LoanStatistics;

/// Outcome of a status-guarded update. `Conflict` carries the status the
/// record actually had, so the caller can report a precise denial.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    Applied(LoanApplication),
    Conflict(LoanStatus),
    Missing,
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn insert(&self, loan: &LoanApplication) -> anyhow::Result<()>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<LoanApplication>>;
    /// All applications, newest first.
    async fn list_all(&self) -> anyhow::Result<Vec<LoanApplication>>;
    /// Applications submitted by one account, newest first.
    async fn list_by_owner(&self, owner_user_id: Uuid) -> anyhow::Result<Vec<LoanApplication>>;
    /// Atomically replaces the state of `id` if its current status is one
    /// of `expected`. Concurrent deciders race here; exactly one wins.
    async fn update_state(
        &self,
        id: Uuid,
        expected: &[LoanStatus],
        next: LoanState,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<StateUpdate>;
    async fn statistics(&self) -> anyhow::Result<LoanStatistics>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> anyhow::Result<()>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// All accounts, oldest first.
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Returns false when no account with that id existed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn count_by_role(&self, role: Role) -> anyhow::Result<i64>;
}
