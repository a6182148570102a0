use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::authz::{self, Action};
use crate::error::LoanError;
use crate::models::{Actor, LoanApplication, LoanRequestForm, LoanState, LoanStatus};
use crate::stats::LoanStatistics;
use crate::storage::{LoanStore, StateUpdate};
use crate::workflow;

/// Coordinates the authorization gate, the transition rules and the store.
/// The gate is checked before any record is read, so a caller without the
/// required role learns nothing about whether the record exists.
#[derive(Clone)]
pub struct WorkflowEngine {
    loans: Arc<dyn LoanStore>,
}

impl WorkflowEngine {
    pub fn new(loans: Arc<dyn LoanStore>) -> Self {
        Self { loans }
    }

    pub async fn submit(
        &self,
        actor: Actor,
        form: LoanRequestForm,
    ) -> Result<LoanApplication, LoanError> {
        authz::authorize(actor.role, Action::Submit)?;
        let loan = workflow::submit(form, actor.id)?;
        self.loans.insert(&loan).await?;
        Ok(loan)
    }

    pub async fn verify(&self, actor: Actor, loan_id: Uuid) -> Result<LoanApplication, LoanError> {
        authz::authorize(actor.role, Action::Verify)?;
        let loan = self.fetch(loan_id).await?;
        let next = workflow::verify(&loan.state, actor.id)?;
        self.persist(loan_id, &[LoanStatus::Pending], next, workflow::verify_denied)
            .await
    }

    pub async fn reject(
        &self,
        actor: Actor,
        loan_id: Uuid,
        reason: &str,
    ) -> Result<LoanApplication, LoanError> {
        authz::authorize(actor.role, Action::Reject)?;
        // Reason validation precedes the lookup: an empty reason is a
        // validation failure even when the id is unknown.
        let reason = workflow::rejection_reason(reason)?;
        let loan = self.fetch(loan_id).await?;
        let next = workflow::reject(&loan.state, actor.id, reason)?;
        self.persist(
            loan_id,
            &[LoanStatus::Pending, LoanStatus::Verified],
            next,
            workflow::reject_denied,
        )
        .await
    }

    pub async fn approve(&self, actor: Actor, loan_id: Uuid) -> Result<LoanApplication, LoanError> {
        authz::authorize(actor.role, Action::Approve)?;
        let loan = self.fetch(loan_id).await?;
        let next = workflow::approve(&loan.state, actor.id)?;
        self.persist(loan_id, &[LoanStatus::Verified], next, workflow::approve_denied)
            .await
    }

    pub async fn loan(&self, loan_id: Uuid) -> Result<LoanApplication, LoanError> {
        self.fetch(loan_id).await
    }

    pub async fn all_loans(&self, actor: Actor) -> Result<Vec<LoanApplication>, LoanError> {
        authz::authorize(actor.role, Action::ReadAll)?;
        Ok(self.loans.list_all().await?)
    }

    pub async fn loans_for(&self, actor: Actor) -> Result<Vec<LoanApplication>, LoanError> {
        authz::authorize(actor.role, Action::ReadOwn)?;
        Ok(self.loans.list_by_owner(actor.id).await?)
    }

    pub async fn statistics(&self) -> Result<LoanStatistics, LoanError> {
        Ok(self.loans.statistics().await?)
    }

    async fn fetch(&self, loan_id: Uuid) -> Result<LoanApplication, LoanError> {
        self.loans
            .get(loan_id)
            .await?
            .ok_or(LoanError::NotFound("Loan application"))
    }

    async fn persist(
        &self,
        loan_id: Uuid,
        expected: &[LoanStatus],
        next: LoanState,
        denied: fn(LoanStatus) -> LoanError,
    ) -> Result<LoanApplication, LoanError> {
        match self
            .loans
            .update_state(loan_id, expected, next, Utc::now())
            .await?
        {
            StateUpdate::Applied(updated) => Ok(updated),
            // Lost a race: another decider moved the record between our
            // read and the guarded write. Report against the fresh status.
            StateUpdate::Conflict(current) => Err(denied(current)),
            StateUpdate::Missing => Err(LoanError::NotFound("Loan application")),
        }
    }
}
