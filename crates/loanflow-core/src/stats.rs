use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LoanApplication, LoanStatus};

pub const RECENT_APPLICATIONS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentApplication {
    pub id: Uuid,
    pub applicant_name: String,
    pub amount: Decimal,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatistics {
    pub total_loans: i64,
    pub pending_loans: i64,
    pub verified_loans: i64,
    pub approved_loans: i64,
    pub rejected_loans: i64,
    pub approved_amount: Decimal,
    pub recent_applications: Vec<RecentApplication>,
}

impl LoanStatistics {
    /// Aggregates a snapshot of records. Only APPROVED principal counts
    /// toward `approved_amount`; requested amounts are never mixed in.
    pub fn from_records(records: &[LoanApplication]) -> Self {
        let mut pending_loans = 0;
        let mut verified_loans = 0;
        let mut approved_loans = 0;
        let mut rejected_loans = 0;
        let mut approved_amount = Decimal::ZERO;
        for record in records {
            match record.status() {
                LoanStatus::Pending => pending_loans += 1,
                LoanStatus::Verified => verified_loans += 1,
                LoanStatus::Approved => {
                    approved_loans += 1;
                    approved_amount += record.amount;
                }
                LoanStatus::Rejected => rejected_loans += 1,
            }
        }

        let mut recent: Vec<&LoanApplication> = records.iter().collect();
        // Newest first; equal timestamps fall back to id order so the
        // listing is stable across runs.
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let recent_applications = recent
            .into_iter()
            .take(RECENT_APPLICATIONS_LIMIT)
            .map(|record| RecentApplication {
                id: record.id,
                applicant_name: record.applicant_name.clone(),
                amount: record.amount,
                status: record.status(),
                created_at: record.created_at,
            })
            .collect();

        LoanStatistics {
            total_loans: records.len() as i64,
            pending_loans,
            verified_loans,
            approved_loans,
            rejected_loans,
            approved_amount,
            recent_applications,
        }
    }
}
