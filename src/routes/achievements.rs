//! Achievement API routes
//!
//! | Method | Path | Gate |
//! |---|---|---|
//! | POST | /achievements | `achievement:create` |
//! | GET | /achievements | authenticated |
//! | GET | /achievements/{id} | authenticated |
//! | PUT | /achievements/{id} | `achievement:create` |
//! | DELETE | /achievements/{id} | `achievement:create` |
//! | POST | /achievements/{id}/submit | `achievement:create` |
//! | POST | /achievements/{id}/attachments | `achievement:create` |
//! | POST | /achievements/{id}/verify | `achievement:verify` |
//! | POST | /achievements/{id}/reject | `achievement:verify` |
//! | GET | /students/{id}/achievements | authenticated |
//!
//! Ownership, advising and status rules are enforced by the workflow
//! service; this layer only authenticates, applies the permission gate and
//! translates HTTP to service calls.
//!
//! Attachment uploads carry the raw file as the body, the declared type in
//! `Content-Type`, and the original name in `X-File-Name` (or `?file_name=`).

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::attachments::IncomingFile;
use crate::auth::{
    extract_token_from_header, has_permission, required_permission, Claims, JwtValidator,
    Operation,
};
use crate::model::{
    Actor, AchievementStatus, CreateAchievementRequest, PageRequest, RejectAchievementRequest,
    UpdateAchievementRequest, VerifyAchievementRequest,
};
use crate::routes::response::{error_response, success};
use crate::server::AppState;
use crate::services::ListParams;
use crate::types::AppError;

/// Largest accepted JSON body
const MAX_JSON_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// Route matching
// =============================================================================

/// A matched achievement route; ids are kept raw until authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AchievementRoute {
    Create,
    List,
    Detail(String),
    Update(String),
    Delete(String),
    Submit(String),
    UploadAttachment(String),
    Verify(String),
    Reject(String),
    ByStudent(String),
}

impl AchievementRoute {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Create => Operation::Create,
            Self::List | Self::ByStudent(_) => Operation::List,
            Self::Detail(_) => Operation::View,
            Self::Update(_) => Operation::Edit,
            Self::Delete(_) => Operation::Delete,
            Self::Submit(_) => Operation::Submit,
            Self::UploadAttachment(_) => Operation::UploadAttachment,
            Self::Verify(_) => Operation::Verify,
            Self::Reject(_) => Operation::Reject,
        }
    }
}

/// Match method and path against the achievement routes
pub fn match_route(method: &Method, path: &str) -> Option<AchievementRoute> {
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let route = match (method, segments.as_slice()) {
        (&Method::POST, ["achievements"]) => AchievementRoute::Create,
        (&Method::GET, ["achievements"]) => AchievementRoute::List,
        (&Method::GET, ["achievements", id]) => AchievementRoute::Detail(id.to_string()),
        (&Method::PUT, ["achievements", id]) => AchievementRoute::Update(id.to_string()),
        (&Method::DELETE, ["achievements", id]) => AchievementRoute::Delete(id.to_string()),
        (&Method::POST, ["achievements", id, "submit"]) => AchievementRoute::Submit(id.to_string()),
        (&Method::POST, ["achievements", id, "attachments"]) => {
            AchievementRoute::UploadAttachment(id.to_string())
        }
        (&Method::POST, ["achievements", id, "verify"]) => AchievementRoute::Verify(id.to_string()),
        (&Method::POST, ["achievements", id, "reject"]) => AchievementRoute::Reject(id.to_string()),
        (&Method::GET, ["students", id, "achievements"]) => {
            AchievementRoute::ByStudent(id.to_string())
        }
        _ => return None,
    };
    Some(route)
}

// =============================================================================
// Handler
// =============================================================================

/// Handle an achievement request.
/// Returns None when the path is not an achievement route.
pub async fn handle_achievement_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let route = match_route(req.method(), req.uri().path())?;

    Some(match dispatch(route, req, &state).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_server_error() {
                warn!(error = %err, "Request failed");
            } else {
                debug!(error = %err, "Request rejected");
            }
            error_response(&err)
        }
    })
}

async fn dispatch<B>(
    route: AchievementRoute,
    req: Request<B>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let claims = authenticate(req.headers(), &state.jwt)?;
    gate(&claims, route.operation())?;

    let actor = Actor::from(&claims);
    let service = &state.service;

    debug!(user_id = %actor.user_id, role = %actor.role, route = ?route, "Achievement request");

    match route {
        AchievementRoute::Create => {
            let body: CreateAchievementRequest = read_json(req.into_body()).await?;
            let reference = service.create(&actor, body).await?;
            Ok(success(StatusCode::CREATED, "Achievement created", reference))
        }

        AchievementRoute::List => {
            let params = parse_list_query(req.uri().query())?;
            let page = service.list(&actor, params).await?;
            Ok(success(StatusCode::OK, "Achievements retrieved", page))
        }

        AchievementRoute::Detail(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let detail = service.get_detail(&actor, id).await?;
            Ok(success(StatusCode::OK, "Achievement retrieved", detail))
        }

        AchievementRoute::Update(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let body: UpdateAchievementRequest = read_json(req.into_body()).await?;
            service.edit(&actor, id, body).await?;
            let detail = service.get_detail(&actor, id).await?;
            Ok(success(StatusCode::OK, "Achievement updated", detail))
        }

        AchievementRoute::Delete(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let reference = service.delete(&actor, id).await?;
            Ok(success(StatusCode::OK, "Achievement deleted", reference))
        }

        AchievementRoute::Submit(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let reference = service.submit(&actor, id).await?;
            Ok(success(StatusCode::OK, "Achievement submitted", reference))
        }

        AchievementRoute::UploadAttachment(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let file_name = upload_file_name(req.headers(), req.uri().query());
            let content_type = header_str(req.headers(), "Content-Type")
                .unwrap_or("application/octet-stream")
                .to_string();

            let policy = service.uploader().policy().clone();
            let data = match read_body(req.into_body(), policy.max_bytes as usize).await {
                Ok(data) => data,
                Err(BodyError::TooLarge) => return Err(policy.too_large()),
                Err(BodyError::Read(e)) => {
                    return Err(AppError::validation(format!("Failed to read file: {}", e)))
                }
            };

            let attachment = service
                .upload_attachment(
                    &actor,
                    id,
                    IncomingFile {
                        file_name,
                        content_type,
                        data,
                    },
                )
                .await?;
            Ok(success(StatusCode::OK, "Attachment uploaded", attachment))
        }

        AchievementRoute::Verify(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let body: VerifyAchievementRequest = read_json(req.into_body()).await?;
            let reference = service.verify(&actor, id, body.points).await?;
            Ok(success(StatusCode::OK, "Achievement verified", reference))
        }

        AchievementRoute::Reject(id) => {
            let id = parse_id(&id, "Achievement not found")?;
            let body: RejectAchievementRequest = read_json(req.into_body()).await?;
            let reference = service.reject(&actor, id, &body.rejection_note).await?;
            Ok(success(StatusCode::OK, "Achievement rejected", reference))
        }

        AchievementRoute::ByStudent(id) => {
            let student_id = parse_id(&id, "Student not found")?;
            let params = parse_list_query(req.uri().query())?;
            let page = service
                .list_by_student(&actor, student_id, params.status, params.page)
                .await?;
            Ok(success(StatusCode::OK, "Achievements retrieved", page))
        }
    }
}

// =============================================================================
// Auth helpers
// =============================================================================

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Validate the bearer token and return its claims
pub fn authenticate(headers: &HeaderMap, jwt: &JwtValidator) -> Result<Claims, AppError> {
    let token = extract_token_from_header(header_str(headers, "Authorization")).ok_or_else(
        || AppError::Authentication("Missing or malformed Authorization header".into()),
    )?;
    jwt.verify_token(token).into_claims()
}

/// Route-level permission gate
pub fn gate(claims: &Claims, operation: Operation) -> Result<(), AppError> {
    if has_permission(&claims.permissions, operation) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "Missing permission {}",
        required_permission(operation).unwrap_or_default()
    )))
}

// =============================================================================
// Request parsing
// =============================================================================

/// Path ids that do not parse cannot exist
fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(not_found))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
    search: Option<String>,
    status: Option<String>,
    file_name: Option<String>,
}

fn parse_query(query: Option<&str>) -> Result<ListQuery, AppError> {
    match query {
        Some(q) if !q.is_empty() => serde_urlencoded::from_str(q)
            .map_err(|e| AppError::validation(format!("Invalid query string: {}", e))),
        _ => Ok(ListQuery::default()),
    }
}

/// Parse page, limit, search and status. Non-numeric page or limit fall
/// back to their defaults; an unknown status is rejected.
pub fn parse_list_query(query: Option<&str>) -> Result<ListParams, AppError> {
    let q = parse_query(query)?;

    let number = |v: &Option<String>, default: i64| {
        v.as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(default)
    };
    let page = PageRequest::new(
        number(&q.page, 1),
        number(&q.limit, crate::model::DEFAULT_PAGE_SIZE as i64),
    );

    let status = match q.status.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(
            s.parse::<AchievementStatus>()
                .map_err(|_| AppError::validation(format!("Invalid status filter '{}'", s)))?,
        ),
        _ => None,
    };

    Ok(ListParams {
        status,
        search: q.search,
        page,
    })
}

fn upload_file_name(headers: &HeaderMap, query: Option<&str>) -> String {
    header_str(headers, "X-File-Name")
        .map(str::to_string)
        .or_else(|| parse_query(query).ok().and_then(|q| q.file_name))
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "attachment".to_string())
}

enum BodyError {
    TooLarge,
    Read(String),
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(BodyError::TooLarge),
        Err(e) => Err(BodyError::Read(e.to_string())),
    }
}

async fn read_json<T, B>(body: B) -> Result<T, AppError>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = match read_body(body, MAX_JSON_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(BodyError::TooLarge) => return Err(AppError::validation("Request body too large")),
        Err(BodyError::Read(e)) => {
            return Err(AppError::validation(format!("Failed to read request body: {}", e)))
        }
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::validation(format!("Invalid request body: {}", e)))
}
