use thiserror::Error;

/// Failure taxonomy for loan workflow operations. Message text is shown to
/// API clients verbatim, except for `Storage` which is logged and masked.
#[derive(Debug, Error)]
pub enum LoanError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LoanError {
    pub fn validation(message: impl Into<String>) -> Self {
        LoanError::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        LoanError::Authorization(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        LoanError::InvalidTransition(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(
            LoanError::NotFound("Loan application").to_string(),
            "Loan application not found"
        );
        assert_eq!(LoanError::NotFound("User").to_string(), "User not found");
    }

    #[test]
    fn storage_errors_wrap_their_cause() {
        let err = LoanError::from(anyhow::anyhow!("connection refused"));
        assert!(matches!(err, LoanError::Storage(_)));
        assert_eq!(err.to_string(), "storage failure: connection refused");
    }
}
