use std::fmt;

use crate::error::LoanError;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Verify,
    Reject,
    Approve,
    ReadOwn,
    ReadAll,
    ManageUsers,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Submit => "submit loan applications",
            Action::Verify => "verify loan applications",
            Action::Reject => "reject loan applications",
            Action::Approve => "approve loan applications",
            Action::ReadOwn => "read own loan applications",
            Action::ReadAll => "read all loan applications",
            Action::ManageUsers => "manage users",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role capabilities, independent of workflow state. Roles are disjoint:
/// an admin does not inherit the applicant's submit right.
const PERMISSIONS: &[(Role, &[Action])] = &[
    (Role::User, &[Action::Submit, Action::ReadOwn]),
    (Role::Verifier, &[Action::Verify, Action::Reject, Action::ReadAll]),
    (
        Role::Admin,
        &[
            Action::Verify,
            Action::Reject,
            Action::Approve,
            Action::ReadAll,
            Action::ManageUsers,
        ],
    ),
];

pub fn allows(role: Role, action: Action) -> bool {
    PERMISSIONS
        .iter()
        .any(|(candidate, actions)| *candidate == role && actions.contains(&action))
}

pub fn authorize(role: Role, action: Action) -> Result<(), LoanError> {
    if allows(role, action) {
        Ok(())
    } else {
        Err(LoanError::authorization(format!(
            "Access denied: {role} is not permitted to {action}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_may_only_submit_and_read_own() {
        assert!(allows(Role::User, Action::Submit));
        assert!(allows(Role::User, Action::ReadOwn));
        assert!(!allows(Role::User, Action::Verify));
        assert!(!allows(Role::User, Action::Reject));
        assert!(!allows(Role::User, Action::Approve));
        assert!(!allows(Role::User, Action::ReadAll));
        assert!(!allows(Role::User, Action::ManageUsers));
    }

    #[test]
    fn verifier_may_verify_and_reject_but_not_approve() {
        assert!(allows(Role::Verifier, Action::Verify));
        assert!(allows(Role::Verifier, Action::Reject));
        assert!(allows(Role::Verifier, Action::ReadAll));
        assert!(!allows(Role::Verifier, Action::Approve));
        assert!(!allows(Role::Verifier, Action::Submit));
        assert!(!allows(Role::Verifier, Action::ReadOwn));
        assert!(!allows(Role::Verifier, Action::ManageUsers));
    }

    #[test]
    fn admin_decides_but_does_not_submit() {
        assert!(allows(Role::Admin, Action::Verify));
        assert!(allows(Role::Admin, Action::Reject));
        assert!(allows(Role::Admin, Action::Approve));
        assert!(allows(Role::Admin, Action::ReadAll));
        assert!(allows(Role::Admin, Action::ManageUsers));
        assert!(!allows(Role::Admin, Action::Submit));
        assert!(!allows(Role::Admin, Action::ReadOwn));
    }

    #[test]
    fn authorize_reports_role_and_action() {
        let err = authorize(Role::Verifier, Action::Approve).unwrap_err();
        assert!(matches!(err, LoanError::Authorization(_)));
        assert_eq!(
            err.to_string(),
            "Access denied: VERIFIER is not permitted to approve loan applications"
        );
    }
}
