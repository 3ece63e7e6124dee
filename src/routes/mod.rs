//! HTTP routes for prestasi

pub mod achievements;
pub mod health;
pub mod response;

pub use achievements::{handle_achievement_request, match_route, AchievementRoute};
pub use health::{health_check, readiness_check, version_info};
pub use response::{error_response, not_found_response, preflight_response, success};
