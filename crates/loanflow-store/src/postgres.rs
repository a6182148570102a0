use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loanflow_core::{
    LoanApplication, LoanState, LoanStatistics, LoanStatus, LoanStore,
    RECENT_APPLICATIONS_LIMIT, RecentApplication, Role, StateUpdate, User, UserStore,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgLoanStore {
    pool: PgPool,
}

impl PgLoanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for PgLoanStore {
    async fn insert(&self, loan: &LoanApplication) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loan_applications (
                id, applicant_name, email, amount, time, employment_status,
                employment_address, purpose, status, verified_by, approved_by,
                rejected_by, rejection_reason, user_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(loan.id)
        .bind(&loan.applicant_name)
        .bind(&loan.email)
        .bind(loan.amount)
        .bind(&loan.time)
        .bind(&loan.employment_status)
        .bind(&loan.employment_address)
        .bind(&loan.purpose)
        .bind(loan.status().as_str())
        .bind(loan.state.verified_by())
        .bind(loan.state.approved_by())
        .bind(loan.state.rejected_by())
        .bind(loan.state.rejection_reason())
        .bind(loan.owner_user_id)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<LoanApplication>> {
        let row = sqlx::query(
            r#"
            SELECT id, applicant_name, email, amount, time, employment_status,
                   employment_address, purpose, status, verified_by, approved_by,
                   rejected_by, rejection_reason, user_id, created_at, updated_at
            FROM loan_applications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| loan_from_row(&row)).transpose()
    }

    async fn list_all(&self) -> anyhow::Result<Vec<LoanApplication>> {
        let rows = sqlx::query(
            r#"
            SELECT id, applicant_name, email, amount, time, employment_status,
                   employment_address, purpose, status, verified_by, approved_by,
                   rejected_by, rejection_reason, user_id, created_at, updated_at
            FROM loan_applications
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(loan_from_row).collect()
    }

    async fn list_by_owner(&self, owner_user_id: Uuid) -> anyhow::Result<Vec<LoanApplication>> {
        let rows = sqlx::query(
            r#"
            SELECT id, applicant_name, email, amount, time, employment_status,
                   employment_address, purpose, status, verified_by, approved_by,
                   rejected_by, rejection_reason, user_id, created_at, updated_at
            FROM loan_applications
            WHERE user_id = $1
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(loan_from_row).collect()
    }

    async fn update_state(
        &self,
        id: Uuid,
        expected: &[LoanStatus],
        next: LoanState,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<StateUpdate> {
        let expected_text: Vec<String> = expected
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        // The status guard rides on the UPDATE itself, so two racing
        // deciders cannot both see their expected status.
        let row = sqlx::query(
            r#"
            UPDATE loan_applications
            SET status = $2, verified_by = $3, approved_by = $4, rejected_by = $5,
                rejection_reason = $6, updated_at = $7
            WHERE id = $1 AND status = ANY($8)
            RETURNING id, applicant_name, email, amount, time, employment_status,
                      employment_address, purpose, status, verified_by, approved_by,
                      rejected_by, rejection_reason, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(next.status().as_str())
        .bind(next.verified_by())
        .bind(next.approved_by())
        .bind(next.rejected_by())
        .bind(next.rejection_reason())
        .bind(updated_at)
        .bind(&expected_text)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StateUpdate::Applied(loan_from_row(&row)?));
        }

        let current = sqlx::query("SELECT status FROM loan_applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match current {
            Some(row) => {
                let status_text: String = row.try_get("status")?;
                Ok(StateUpdate::Conflict(parse_status(&status_text)?))
            }
            None => Ok(StateUpdate::Missing),
        }
    }

    async fn statistics(&self) -> anyhow::Result<LoanStatistics> {
        let totals = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_loans,
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_loans,
                COUNT(*) FILTER (WHERE status = 'VERIFIED') AS verified_loans,
                COUNT(*) FILTER (WHERE status = 'APPROVED') AS approved_loans,
                COUNT(*) FILTER (WHERE status = 'REJECTED') AS rejected_loans,
                COALESCE(SUM(amount) FILTER (WHERE status = 'APPROVED'), 0) AS approved_amount
            FROM loan_applications
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let recent_rows = sqlx::query(
            r#"
            SELECT id, applicant_name, amount, status, created_at
            FROM loan_applications
            ORDER BY created_at DESC, id ASC
            LIMIT $1
            "#,
        )
        .bind(RECENT_APPLICATIONS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut recent_applications = Vec::with_capacity(recent_rows.len());
        for row in &recent_rows {
            let status_text: String = row.try_get("status")?;
            recent_applications.push(RecentApplication {
                id: row.try_get("id")?,
                applicant_name: row.try_get("applicant_name")?,
                amount: row.try_get("amount")?,
                status: parse_status(&status_text)?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(LoanStatistics {
            total_loans: totals.try_get("total_loans")?,
            pending_loans: totals.try_get("pending_loans")?,
            verified_loans: totals.try_get("verified_loans")?,
            approved_loans: totals.try_get("approved_loans")?,
            rejected_loans: totals.try_get("rejected_loans")?,
            approved_amount: totals.try_get("approved_amount")?,
            recent_applications,
        })
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_role(&self, role: Role) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("total")?)
    }
}

fn loan_from_row(row: &PgRow) -> anyhow::Result<LoanApplication> {
    let status_text: String = row.try_get("status")?;
    let status = parse_status(&status_text)?;
    let verified_by: Option<Uuid> = row.try_get("verified_by")?;
    let approved_by: Option<Uuid> = row.try_get("approved_by")?;
    let rejected_by: Option<Uuid> = row.try_get("rejected_by")?;
    let rejection_reason: Option<String> = row.try_get("rejection_reason")?;

    let state = match status {
        LoanStatus::Pending => LoanState::Pending,
        LoanStatus::Verified => {
            let Some(by) = verified_by else {
                bail!("VERIFIED loan row is missing verified_by");
            };
            LoanState::Verified { by }
        }
        LoanStatus::Approved => {
            let Some(by) = approved_by else {
                bail!("APPROVED loan row is missing approved_by");
            };
            LoanState::Approved { by }
        }
        LoanStatus::Rejected => {
            let (Some(by), Some(reason)) = (rejected_by, rejection_reason) else {
                bail!("REJECTED loan row is missing rejected_by or rejection_reason");
            };
            LoanState::Rejected { by, reason }
        }
    };

    Ok(LoanApplication {
        id: row.try_get("id")?,
        applicant_name: row.try_get("applicant_name")?,
        email: row.try_get("email")?,
        amount: row.try_get("amount")?,
        time: row.try_get("time")?,
        employment_status: row.try_get("employment_status")?,
        employment_address: row.try_get("employment_address")?,
        purpose: row.try_get("purpose")?,
        state,
        owner_user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    let role_text: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: parse_role(&role_text)?,
        created_at: row.try_get("created_at")?,
    })
}

fn parse_status(value: &str) -> anyhow::Result<LoanStatus> {
    let Some(status) = LoanStatus::parse(value) else {
        bail!("unknown loan status {value}");
    };
    Ok(status)
}

fn parse_role(value: &str) -> anyhow::Result<Role> {
    let Some(role) = Role::parse(value) else {
        bail!("unknown user role {value}");
    };
    Ok(role)
}
