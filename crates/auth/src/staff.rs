use serde::{Deserialize, Serialize};

use turnstile_core::StaffId;

use crate::roles::StaffRole;

/// A resolved staff account for authorization decisions.
///
/// Construction is decoupled from storage and transport; the caller derives
/// this from whatever session or directory mechanism it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAccount {
    pub staff_id: StaffId,
    pub display_name: String,
    pub role: StaffRole,
    pub active: bool,
}

impl StaffAccount {
    pub fn new(staff_id: StaffId, display_name: impl Into<String>, role: StaffRole) -> Self {
        Self {
            staff_id,
            display_name: display_name.into(),
            role,
            active: true,
        }
    }
}
