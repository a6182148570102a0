use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LoanError;
use crate::models::{LoanApplication, LoanRequestForm, LoanState, LoanStatus};

/// Validates a submission and builds the initial PENDING record.
pub fn submit(form: LoanRequestForm, owner_user_id: Uuid) -> Result<LoanApplication, LoanError> {
    let applicant_name = required(&form.applicant_name, "applicantName")?;
    let email = required(&form.email, "email")?;
    let time = required(&form.time, "time")?;
    let employment_status = required(&form.employment_status, "employmentStatus")?;
    let employment_address = required(&form.employment_address, "employmentAddress")?;
    let purpose = required(&form.purpose, "purpose")?;
    if form.amount <= Decimal::ZERO {
        return Err(LoanError::validation("amount must be a positive number"));
    }

    let now = Utc::now();
    Ok(LoanApplication {
        id: Uuid::new_v4(),
        applicant_name,
        email,
        amount: form.amount,
        time,
        employment_status,
        employment_address,
        purpose,
        state: LoanState::Pending,
        owner_user_id,
        created_at: now,
        updated_at: now,
    })
}

pub fn verify(state: &LoanState, actor: Uuid) -> Result<LoanState, LoanError> {
    match state.status() {
        LoanStatus::Pending => Ok(LoanState::Verified { by: actor }),
        status => Err(verify_denied(status)),
    }
}

/// Rejection is reachable from both PENDING and VERIFIED. The caller is
/// responsible for producing the reason via [`rejection_reason`].
pub fn reject(state: &LoanState, actor: Uuid, reason: String) -> Result<LoanState, LoanError> {
    match state.status() {
        LoanStatus::Pending | LoanStatus::Verified => {
            Ok(LoanState::Rejected { by: actor, reason })
        }
        status => Err(reject_denied(status)),
    }
}

pub fn approve(state: &LoanState, actor: Uuid) -> Result<LoanState, LoanError> {
    match state.status() {
        LoanStatus::Verified => Ok(LoanState::Approved { by: actor }),
        status => Err(approve_denied(status)),
    }
}

pub fn rejection_reason(raw: &str) -> Result<String, LoanError> {
    let reason = raw.trim();
    if reason.is_empty() {
        return Err(LoanError::validation("Rejection reason is required"));
    }
    Ok(reason.to_string())
}

pub(crate) fn verify_denied(current: LoanStatus) -> LoanError {
    LoanError::invalid_transition(format!(
        "Loan application cannot be verified because it is already {}",
        current.as_str().to_ascii_lowercase()
    ))
}

pub(crate) fn reject_denied(current: LoanStatus) -> LoanError {
    LoanError::invalid_transition(format!(
        "Loan application cannot be rejected because it is already {}",
        current.as_str().to_ascii_lowercase()
    ))
}

pub(crate) fn approve_denied(_current: LoanStatus) -> LoanError {
    LoanError::invalid_transition("Loan application must be verified before approval")
}

fn required(value: &str, field: &str) -> Result<String, LoanError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoanError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn form() -> LoanRequestForm {
        LoanRequestForm {
            applicant_name: "Ada Okafor".to_string(),
            email: "ada@example.com".to_string(),
            amount: dec!(5000),
            time: "6 months".to_string(),
            employment_status: "employed".to_string(),
            employment_address: "12 Broad Street, Lagos".to_string(),
            purpose: "equipment purchase".to_string(),
        }
    }

    #[test]
    fn submit_builds_a_pending_record() {
        let owner = Uuid::new_v4();
        let loan = submit(form(), owner).unwrap();
        assert_eq!(loan.status(), LoanStatus::Pending);
        assert_eq!(loan.state, LoanState::Pending);
        assert_eq!(loan.amount, dec!(5000));
        assert_eq!(loan.owner_user_id, owner);
        assert_eq!(loan.created_at, loan.updated_at);
    }

    #[test]
    fn submit_trims_free_form_fields() {
        let mut input = form();
        input.applicant_name = "  Ada Okafor ".to_string();
        let loan = submit(input, Uuid::new_v4()).unwrap();
        assert_eq!(loan.applicant_name, "Ada Okafor");
    }

    #[test]
    fn submit_requires_a_positive_amount() {
        for amount in [dec!(0), dec!(-25)] {
            let mut input = form();
            input.amount = amount;
            let err = submit(input, Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, LoanError::Validation(_)));
            assert_eq!(err.to_string(), "amount must be a positive number");
        }
    }

    #[test]
    fn submit_rejects_blank_required_fields() {
        let mut input = form();
        input.purpose = "   ".to_string();
        let err = submit(input, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.to_string(), "purpose is required");
    }

    #[test]
    fn verify_moves_pending_to_verified() {
        let actor = Uuid::new_v4();
        let next = verify(&LoanState::Pending, actor).unwrap();
        assert_eq!(next, LoanState::Verified { by: actor });
    }

    #[test]
    fn verify_fails_outside_pending() {
        let actor = Uuid::new_v4();
        let cases = [
            (LoanState::Verified { by: actor }, "verified"),
            (LoanState::Approved { by: actor }, "approved"),
            (
                LoanState::Rejected {
                    by: actor,
                    reason: "x".to_string(),
                },
                "rejected",
            ),
        ];
        for (state, word) in cases {
            let err = verify(&state, actor).unwrap_err();
            assert!(matches!(err, LoanError::InvalidTransition(_)));
            assert_eq!(
                err.to_string(),
                format!("Loan application cannot be verified because it is already {word}")
            );
        }
    }

    #[test]
    fn reject_is_reachable_from_pending_and_verified() {
        let verifier = Uuid::new_v4();
        let reason = "insufficient income".to_string();
        let from_pending = reject(&LoanState::Pending, verifier, reason.clone()).unwrap();
        assert_eq!(
            from_pending,
            LoanState::Rejected {
                by: verifier,
                reason: reason.clone()
            }
        );
        let from_verified = reject(
            &LoanState::Verified { by: Uuid::new_v4() },
            verifier,
            reason.clone(),
        )
        .unwrap();
        assert_eq!(from_verified.status(), LoanStatus::Rejected);
    }

    #[test]
    fn reject_fails_on_terminal_states() {
        let actor = Uuid::new_v4();
        let err = reject(
            &LoanState::Approved { by: actor },
            actor,
            "late".to_string(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Loan application cannot be rejected because it is already approved"
        );
        let err = reject(
            &LoanState::Rejected {
                by: actor,
                reason: "first".to_string(),
            },
            actor,
            "second".to_string(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Loan application cannot be rejected because it is already rejected"
        );
    }

    #[test]
    fn approve_requires_verified() {
        let admin = Uuid::new_v4();
        let approved = approve(&LoanState::Verified { by: Uuid::new_v4() }, admin).unwrap();
        assert_eq!(approved, LoanState::Approved { by: admin });

        for state in [
            LoanState::Pending,
            LoanState::Approved { by: admin },
            LoanState::Rejected {
                by: admin,
                reason: "no".to_string(),
            },
        ] {
            let err = approve(&state, admin).unwrap_err();
            assert!(matches!(err, LoanError::InvalidTransition(_)));
            assert_eq!(
                err.to_string(),
                "Loan application must be verified before approval"
            );
        }
    }

    #[test]
    fn rejection_reason_must_not_be_blank() {
        assert_eq!(rejection_reason(" documents missing ").unwrap(), "documents missing");
        for raw in ["", "   "] {
            let err = rejection_reason(raw).unwrap_err();
            assert!(matches!(err, LoanError::Validation(_)));
            assert_eq!(err.to_string(), "Rejection reason is required");
        }
    }
}
