//! Roles, workflow operations and the capability table
//!
//! Two layers of authorization apply to every achievement operation:
//!
//! - a coarse route gate on the permission strings carried in the token
//!   (`achievement:create`, `achievement:verify`)
//! - a fine-grained scope check from [`capability`], evaluated by the
//!   workflow service against ownership and advising relationships

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission required to report and manage one's own achievements
pub const PERMISSION_CREATE: &str = "achievement:create";

/// Permission required to verify or reject advisees' achievements
pub const PERMISSION_VERIFY: &str = "achievement:verify";

/// Caller role as carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Mahasiswa")]
    Student,
    #[serde(rename = "Dosen Wali")]
    Advisor,
    #[serde(rename = "Admin")]
    Admin,
}

impl Role {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "Mahasiswa",
            Role::Advisor => "Dosen Wali",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Edit,
    UploadAttachment,
    Submit,
    Delete,
    Verify,
    Reject,
    View,
    List,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::UploadAttachment => "upload_attachment",
            Operation::Submit => "submit",
            Operation::Delete => "delete",
            Operation::Verify => "verify",
            Operation::Reject => "reject",
            Operation::View => "view",
            Operation::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which achievements a capability reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Achievements owned by the caller's student profile
    Own,
    /// Achievements of students the caller advises
    Advisees,
    /// Every achievement
    All,
}

/// (role, operation) -> scope. Pairs not listed are denied.
const CAPABILITIES: &[(Role, Operation, Scope)] = &[
    (Role::Student, Operation::Create, Scope::Own),
    (Role::Student, Operation::Edit, Scope::Own),
    (Role::Student, Operation::UploadAttachment, Scope::Own),
    (Role::Student, Operation::Submit, Scope::Own),
    (Role::Student, Operation::Delete, Scope::Own),
    (Role::Student, Operation::View, Scope::Own),
    (Role::Student, Operation::List, Scope::Own),
    (Role::Advisor, Operation::Verify, Scope::Advisees),
    (Role::Advisor, Operation::Reject, Scope::Advisees),
    (Role::Advisor, Operation::View, Scope::Advisees),
    (Role::Advisor, Operation::List, Scope::Advisees),
    (Role::Admin, Operation::View, Scope::All),
    (Role::Admin, Operation::List, Scope::All),
];

/// Look up the scope a role has for an operation.
/// Returns None when the role may not perform it at all.
pub fn capability(role: Role, operation: Operation) -> Option<Scope> {
    CAPABILITIES
        .iter()
        .find(|(r, op, _)| *r == role && *op == operation)
        .map(|(_, _, scope)| *scope)
}

/// Token permission a route requires for an operation, if any.
/// Read operations only require authentication.
pub fn required_permission(operation: Operation) -> Option<&'static str> {
    match operation {
        Operation::Create
        | Operation::Edit
        | Operation::UploadAttachment
        | Operation::Submit
        | Operation::Delete => Some(PERMISSION_CREATE),
        Operation::Verify | Operation::Reject => Some(PERMISSION_VERIFY),
        Operation::View | Operation::List => None,
    }
}

/// Check the route gate against the permissions carried in a token
pub fn has_permission(granted: &[String], operation: Operation) -> bool {
    match required_permission(operation) {
        Some(required) => granted.iter().any(|p| p == required),
        None => true,
    }
}
