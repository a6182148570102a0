use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loanflow_core::{
    LoanApplication, LoanState, LoanStatistics, LoanStatus, LoanStore, Role, StateUpdate, User,
    UserStore,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryLoanStore {
    loans: RwLock<HashMap<Uuid, LoanApplication>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn insert(&self, loan: &LoanApplication) -> anyhow::Result<()> {
        let mut loans = self.loans.write().await;
        loans.insert(loan.id, loan.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<LoanApplication>> {
        let loans = self.loans.read().await;
        Ok(loans.get(&id).cloned())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<LoanApplication>> {
        let loans = self.loans.read().await;
        Ok(newest_first(loans.values().cloned().collect()))
    }

    async fn list_by_owner(&self, owner_user_id: Uuid) -> anyhow::Result<Vec<LoanApplication>> {
        let loans = self.loans.read().await;
        Ok(newest_first(
            loans
                .values()
                .filter(|loan| loan.owner_user_id == owner_user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn update_state(
        &self,
        id: Uuid,
        expected: &[LoanStatus],
        next: LoanState,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<StateUpdate> {
        // Guard and write happen under one write lock, so racing deciders
        // serialize here just as they do on the database row.
        let mut loans = self.loans.write().await;
        let Some(loan) = loans.get_mut(&id) else {
            return Ok(StateUpdate::Missing);
        };
        let current = loan.status();
        if !expected.contains(&current) {
            return Ok(StateUpdate::Conflict(current));
        }
        loan.state = next;
        loan.updated_at = updated_at;
        Ok(StateUpdate::Applied(loan.clone()))
    }

    async fn statistics(&self) -> anyhow::Result<LoanStatistics> {
        let loans = self.loans.read().await;
        let records: Vec<LoanApplication> = loans.values().cloned().collect();
        Ok(LoanStatistics::from_records(&records))
    }
}

fn newest_first(mut records: Vec<LoanApplication>) -> Vec<LoanApplication> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    records
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = self.users.read().await;
        let mut records: Vec<User> = users.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        Ok(users.remove(&id).is_some())
    }

    async fn count_by_role(&self, role: Role) -> anyhow::Result<i64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|user| user.role == role).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;

    fn loan(owner: Uuid, created_at: DateTime<Utc>) -> LoanApplication {
        LoanApplication {
            id: Uuid::new_v4(),
            applicant_name: "Applicant".to_string(),
            email: "applicant@example.com".to_string(),
            amount: dec!(2500),
            time: "3 months".to_string(),
            employment_status: "self-employed".to_string(),
            employment_address: "4 Market Lane".to_string(),
            purpose: "inventory".to_string(),
            state: LoanState::Pending,
            owner_user_id: owner,
            created_at,
            updated_at: created_at,
        }
    }

    fn user(email: &str, role: Role, created_at: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role,
            created_at,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryLoanStore::new();
        let record = loan(Uuid::new_v4(), Utc::now());
        store.insert(&record).await.unwrap();
        assert_eq!(store.get(record.id).await.unwrap(), Some(record));
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_scoped_to_owner() {
        let store = InMemoryLoanStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let base = Utc::now();
        let older = loan(owner, base);
        let newer = loan(owner, base + Duration::seconds(5));
        let foreign = loan(other, base + Duration::seconds(10));
        for record in [&older, &newer, &foreign] {
            store.insert(record).await.unwrap();
        }

        let all = store.list_all().await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![foreign.id, newer.id, older.id]);

        let own = store.list_by_owner(owner).await.unwrap();
        let ids: Vec<Uuid> = own.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn update_state_applies_only_when_status_matches() {
        let store = InMemoryLoanStore::new();
        let record = loan(Uuid::new_v4(), Utc::now());
        store.insert(&record).await.unwrap();
        let verifier = Uuid::new_v4();
        let decided_at = record.updated_at + Duration::seconds(30);

        let applied = store
            .update_state(
                record.id,
                &[LoanStatus::Pending],
                LoanState::Verified { by: verifier },
                decided_at,
            )
            .await
            .unwrap();
        let updated = match applied {
            StateUpdate::Applied(updated) => updated,
            other => panic!("expected Applied, got {other:?}"),
        };
        assert_eq!(updated.status(), LoanStatus::Verified);
        assert_eq!(updated.updated_at, decided_at);

        // Same guard again: the record is no longer PENDING.
        let conflict = store
            .update_state(
                record.id,
                &[LoanStatus::Pending],
                LoanState::Verified { by: verifier },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(matches!(conflict, StateUpdate::Conflict(LoanStatus::Verified)));

        let missing = store
            .update_state(
                Uuid::new_v4(),
                &[LoanStatus::Pending],
                LoanState::Verified { by: verifier },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(matches!(missing, StateUpdate::Missing));
    }

    #[tokio::test]
    async fn update_state_accepts_any_expected_status() {
        let store = InMemoryLoanStore::new();
        let mut record = loan(Uuid::new_v4(), Utc::now());
        record.state = LoanState::Verified { by: Uuid::new_v4() };
        store.insert(&record).await.unwrap();

        let rejecter = Uuid::new_v4();
        let outcome = store
            .update_state(
                record.id,
                &[LoanStatus::Pending, LoanStatus::Verified],
                LoanState::Rejected {
                    by: rejecter,
                    reason: "documents expired".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let updated = match outcome {
            StateUpdate::Applied(updated) => updated,
            other => panic!("expected Applied, got {other:?}"),
        };
        assert_eq!(updated.state.rejection_reason(), Some("documents expired"));
    }

    #[tokio::test]
    async fn statistics_reflect_the_stored_records() {
        let store = InMemoryLoanStore::new();
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let pending = loan(owner, now);
        let mut approved = loan(owner, now + Duration::seconds(1));
        approved.amount = dec!(3000);
        approved.state = LoanState::Approved { by: Uuid::new_v4() };
        store.insert(&pending).await.unwrap();
        store.insert(&approved).await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_loans, 2);
        assert_eq!(stats.pending_loans, 1);
        assert_eq!(stats.approved_loans, 1);
        assert_eq!(stats.approved_amount, dec!(3000));
        assert_eq!(stats.recent_applications[0].id, approved.id);
    }

    #[tokio::test]
    async fn user_store_finds_deletes_and_counts() {
        let store = InMemoryUserStore::new();
        let base = Utc::now();
        let admin = user("admin@example.com", Role::Admin, base);
        let applicant = user("ada@example.com", Role::User, base + Duration::seconds(1));
        store.insert(&admin).await.unwrap();
        store.insert(&applicant).await.unwrap();

        let found = store.find_by_email("ada@example.com").await.unwrap();
        assert_eq!(found, Some(applicant.clone()));
        assert_eq!(store.find_by_email("nobody@example.com").await.unwrap(), None);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, admin.id);

        assert_eq!(store.count_by_role(Role::User).await.unwrap(), 1);
        assert_eq!(store.count_by_role(Role::Verifier).await.unwrap(), 0);

        assert!(store.delete(applicant.id).await.unwrap());
        assert!(!store.delete(applicant.id).await.unwrap());
        assert_eq!(store.count_by_role(Role::User).await.unwrap(), 0);
    }
}
