use serde::{Deserialize, Serialize};

use crate::permissions::{Permission, names};

/// Staff role, one of the three fixed profiles of the system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Door staff: registration desk and admission scanning.
    Door,
    /// Bar staff: stock movements and point-of-sale.
    Bar,
    /// Event administrator: everything.
    Admin,
}

impl StaffRole {
    /// Permissions granted by this role.
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            StaffRole::Door => vec![
                Permission::new(names::ADMISSION_REGISTER),
                Permission::new(names::ADMISSION_LOOKUP),
                Permission::new(names::ADMISSION_ADMIT),
                Permission::new(names::ADMISSION_WITHDRAW),
            ],
            StaffRole::Bar => vec![
                Permission::new(names::ADMISSION_LOOKUP),
                Permission::new(names::INVENTORY_MANAGE),
                Permission::new(names::INVENTORY_MOVE),
                Permission::new(names::SALES_SELL),
            ],
            StaffRole::Admin => vec![Permission::new(names::WILDCARD)],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Door => "door",
            StaffRole::Bar => "bar",
            StaffRole::Admin => "admin",
        }
    }
}

impl core::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
