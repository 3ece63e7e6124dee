//! Identity types resolved from the profile tables
//!
//! Profiles are owned by an external profile service. Here they are read-only
//! lookups keyed by the authenticated account id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Claims, Role};

/// Authenticated caller, as taken from the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Self::new(claims.user_id, claims.role)
    }
}

/// Student profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
    /// Student profile id; the `student_id` carried by achievements
    pub id: Uuid,
    /// Owning account
    pub user_id: Uuid,
    pub student_number: String,
    pub full_name: String,
    #[serde(default)]
    pub program_study: String,
    #[serde(default)]
    pub academic_year: String,
    /// Lecturer profile id of the assigned advisor
    #[serde(default)]
    pub advisor_id: Option<Uuid>,
}

impl StudentIdentity {
    pub fn is_advised_by(&self, advisor: &AdvisorIdentity) -> bool {
        self.advisor_id == Some(advisor.id)
    }
}

/// Lecturer profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorIdentity {
    /// Lecturer profile id; the value stored in `verified_by`
    pub id: Uuid,
    pub user_id: Uuid,
    pub lecturer_number: String,
    #[serde(default)]
    pub full_name: String,
}

/// Student block embedded in an achievement detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentSummary {
    pub id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub program_study: String,
    pub academic_year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor_id: Option<Uuid>,
}

impl From<&StudentIdentity> for StudentSummary {
    fn from(student: &StudentIdentity) -> Self {
        Self {
            id: student.id,
            student_number: student.student_number.clone(),
            full_name: student.full_name.clone(),
            program_study: student.program_study.clone(),
            academic_year: student.academic_year.clone(),
            advisor_id: student.advisor_id,
        }
    }
}
