use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "admission.admit").
/// A special wildcard permission `"*"` indicates "allow all" without
/// hardcoding every domain permission into the admin role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known permission names checked by service callers.
pub mod names {
    pub const WILDCARD: &str = "*";

    pub const ADMISSION_REGISTER: &str = "admission.register";
    pub const ADMISSION_LOOKUP: &str = "admission.lookup";
    pub const ADMISSION_ADMIT: &str = "admission.admit";
    pub const ADMISSION_WITHDRAW: &str = "admission.withdraw";

    pub const INVENTORY_MANAGE: &str = "inventory.manage";
    pub const INVENTORY_MOVE: &str = "inventory.move";

    pub const SALES_SELL: &str = "sales.sell";
}
