use thiserror::Error;

use crate::permissions::Permission;
use crate::staff::StaffAccount;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("account is disabled")]
    AccountDisabled,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a staff account for one required permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(account: &StaffAccount, required: &Permission) -> Result<(), AuthzError> {
    if !account.active {
        return Err(AuthzError::AccountDisabled);
    }

    let allowed = account
        .role
        .permissions()
        .iter()
        .any(|granted| granted.is_wildcard() || granted == required);

    if allowed {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
