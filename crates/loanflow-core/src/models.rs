use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Verifier,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Verifier => "VERIFIER",
            Role::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Role::Admin),
            "VERIFIER" => Some(Role::Verifier),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Pending,
    Verified,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Verified => "VERIFIED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(LoanStatus::Pending),
            "VERIFIED" => Some(LoanStatus::Verified),
            "APPROVED" => Some(LoanStatus::Approved),
            "REJECTED" => Some(LoanStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Rejected)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow state plus the resolution data that only exists in that state.
/// A rejected application always carries its reason; a pending one cannot.
#[derive(Debug, Clone, PartialEq)]
pub enum LoanState {
    Pending,
    Verified { by: Uuid },
    Approved { by: Uuid },
    Rejected { by: Uuid, reason: String },
}

impl LoanState {
    pub fn status(&self) -> LoanStatus {
        match self {
            LoanState::Pending => LoanStatus::Pending,
            LoanState::Verified { .. } => LoanStatus::Verified,
            LoanState::Approved { .. } => LoanStatus::Approved,
            LoanState::Rejected { .. } => LoanStatus::Rejected,
        }
    }

    pub fn verified_by(&self) -> Option<Uuid> {
        match self {
            LoanState::Verified { by } => Some(*by),
            _ => None,
        }
    }

    pub fn approved_by(&self) -> Option<Uuid> {
        match self {
            LoanState::Approved { by } => Some(*by),
            _ => None,
        }
    }

    pub fn rejected_by(&self) -> Option<Uuid> {
        match self {
            LoanState::Rejected { by, .. } => Some(*by),
            _ => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            LoanState::Rejected { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanApplication {
    pub id: Uuid,
    pub applicant_name: String,
    pub email: String,
    pub amount: Decimal,
    pub time: String,
    pub employment_status: String,
    pub employment_address: String,
    pub purpose: String,
    pub state: LoanState,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanApplication {
    pub fn status(&self) -> LoanStatus {
        self.state.status()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The authenticated principal an operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

/// Raw submission fields as received from the applicant, prior to validation.
#[derive(Debug, Clone)]
pub struct LoanRequestForm {
    pub applicant_name: String,
    pub email: String,
    pub amount: Decimal,
    pub time: String,
    pub employment_status: String,
    pub employment_address: String,
    pub purpose: String,
}
