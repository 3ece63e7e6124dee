//! Domain model: achievements, their workflow status, and caller identity

pub mod achievement;
pub mod identity;
pub mod reconciliation;

pub use achievement::{
    AchievementDetail, AchievementDocument, AchievementListItem, AchievementReference,
    AchievementStatus, Attachment, ContentUpdate, CreateAchievementRequest, Details, ListFilter,
    NewDocument, PageRequest, PaginatedAchievements, ReferenceListing, RejectAchievementRequest,
    Transition, UpdateAchievementRequest, VerifyAchievementRequest, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use identity::{Actor, AdvisorIdentity, StudentIdentity, StudentSummary};
pub use reconciliation::{ReconcileKind, ReconciliationEntry};
