//! Authentication and authorization for prestasi
//!
//! Provides:
//! - JWT bearer token validation
//! - Roles, permission strings and the (role, operation) capability table

pub mod jwt;
pub mod permissions;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use permissions::{
    capability, has_permission, required_permission, Operation, Role, Scope, PERMISSION_CREATE,
    PERMISSION_VERIFY,
};
