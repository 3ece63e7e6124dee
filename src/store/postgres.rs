//! PostgreSQL store backends
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so builds
//! do not need a live database. Profile tables (`users`, `students`,
//! `lecturers`) belong to the profile service and are only read here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::{
    AchievementReference, AchievementStatus, AdvisorIdentity, ListFilter, PageRequest,
    ReconcileKind, ReconciliationEntry, ReferenceListing, StudentIdentity, Transition,
};
use crate::store::{
    IdentityResolver, ReconciliationLog, ReferenceStore, StoreError, StoreResult,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS achievement_references (
    id                   UUID PRIMARY KEY,
    student_id           UUID NOT NULL,
    mongo_achievement_id TEXT NOT NULL,
    status               TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'submitted', 'verified', 'rejected', 'deleted')),
    rejection_note       TEXT,
    verified_by          UUID,
    submitted_at         TIMESTAMPTZ,
    verified_at          TIMESTAMPTZ,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at           TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_achievement_references_student
    ON achievement_references (student_id);
CREATE INDEX IF NOT EXISTS idx_achievement_references_status
    ON achievement_references (status);
CREATE INDEX IF NOT EXISTS idx_achievement_references_document
    ON achievement_references (mongo_achievement_id);

CREATE TABLE IF NOT EXISTS achievement_reconciliation (
    id          UUID PRIMARY KEY,
    kind        TEXT NOT NULL,
    payload     JSONB NOT NULL,
    reason      TEXT NOT NULL,
    attempts    INTEGER NOT NULL DEFAULT 0,
    last_error  TEXT,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_achievement_reconciliation_pending
    ON achievement_reconciliation (recorded_at) WHERE resolved_at IS NULL;
"#;

const REFERENCE_COLUMNS: &str = "id, student_id, mongo_achievement_id, status, rejection_note, \
     verified_by, submitted_at, verified_at, created_at, updated_at";

/// Create the achievement tables if absent
pub async fn ensure_schema(pool: &PgPool) -> StoreResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReferenceRow {
    id: Uuid,
    student_id: Uuid,
    mongo_achievement_id: String,
    status: String,
    rejection_note: Option<String>,
    verified_by: Option<Uuid>,
    submitted_at: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReferenceRow> for AchievementReference {
    type Error = StoreError;

    fn try_from(row: ReferenceRow) -> Result<Self, Self::Error> {
        let status: AchievementStatus = row.status.parse().map_err(StoreError::Corrupt)?;
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            document_id: row.mongo_achievement_id,
            status,
            rejection_note: row.rejection_note,
            verified_by: row.verified_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            submitted_at: row.submitted_at,
            verified_at: row.verified_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    #[sqlx(flatten)]
    reference: ReferenceRow,
    student_number: String,
    student_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    user_id: Uuid,
    student_number: String,
    full_name: String,
    program_study: Option<String>,
    academic_year: Option<String>,
    advisor_id: Option<Uuid>,
}

impl From<StudentRow> for StudentIdentity {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            student_number: row.student_number,
            full_name: row.full_name,
            program_study: row.program_study.unwrap_or_default(),
            academic_year: row.academic_year.unwrap_or_default(),
            advisor_id: row.advisor_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LecturerRow {
    id: Uuid,
    user_id: Uuid,
    lecturer_number: String,
    full_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ReconciliationRow {
    id: Uuid,
    payload: Json<ReconcileKind>,
    reason: String,
    attempts: i32,
    last_error: Option<String>,
    recorded_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<ReconciliationRow> for ReconciliationEntry {
    fn from(row: ReconciliationRow) -> Self {
        Self {
            id: row.id,
            kind: row.payload.0,
            reason: row.reason,
            attempts: row.attempts,
            last_error: row.last_error,
            recorded_at: row.recorded_at,
            resolved_at: row.resolved_at,
        }
    }
}

// =============================================================================
// PgReferenceStore
// =============================================================================

/// References in `achievement_references`
#[derive(Clone)]
pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        ensure_schema(&self.pool).await
    }
}

/// WHERE clause shared by the page and count queries. Optional filters are
/// bound as NULL when absent.
const LIST_WHERE: &str = r#"
    FROM achievement_references ar
    JOIN students s ON ar.student_id = s.id
    JOIN users u ON s.user_id = u.id
    WHERE ar.status <> 'deleted'
      AND ($1::text IS NULL OR ar.status = $1)
      AND ($2::uuid IS NULL OR ar.student_id = $2)
      AND ($3::uuid IS NULL OR s.advisor_id = $3)
      AND ($4::text IS NULL OR u.full_name ILIKE $4 ESCAPE '\' OR s.student_id ILIKE $4 ESCAPE '\')
"#;

fn search_pattern(filter: &ListFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)))
}

/// Escape LIKE wildcards so the search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn insert(&self, reference: &AchievementReference) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO achievement_references
                (id, student_id, mongo_achievement_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reference.id)
        .bind(reference.student_id)
        .bind(&reference.document_id)
        .bind(reference.status.as_str())
        .bind(reference.created_at)
        .bind(reference.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AchievementReference>> {
        let query = format!(
            "SELECT {} FROM achievement_references WHERE id = $1",
            REFERENCE_COLUMNS
        );
        let row = sqlx::query_as::<_, ReferenceRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AchievementReference::try_from).transpose()
    }

    async fn touch_draft(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE achievement_references SET updated_at = $2 WHERE id = $1 AND status = 'draft'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AchievementReference>> {
        let (verified_by, note) = match transition {
            Transition::Verify { advisor_id } => (Some(*advisor_id), None),
            Transition::Reject { advisor_id, note } => (Some(*advisor_id), Some(note.as_str())),
            Transition::Submit | Transition::Delete => (None, None),
        };

        let query = format!(
            r#"
            UPDATE achievement_references
            SET status = $3::text,
                updated_at = $4,
                submitted_at = CASE WHEN $3::text = 'submitted' THEN $4 ELSE submitted_at END,
                verified_at = CASE WHEN $3::text IN ('verified', 'rejected') THEN $4 ELSE verified_at END,
                verified_by = COALESCE($5, verified_by),
                rejection_note = COALESCE($6, rejection_note)
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            REFERENCE_COLUMNS
        );

        let row = sqlx::query_as::<_, ReferenceRow>(&query)
            .bind(id)
            .bind(transition.from_status().as_str())
            .bind(transition.to_status().as_str())
            .bind(now)
            .bind(verified_by)
            .bind(note)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AchievementReference::try_from).transpose()
    }

    async fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ReferenceListing>, u64)> {
        let status = filter.status.map(|s| s.as_str());
        let search = search_pattern(filter);

        let count_query = format!("SELECT COUNT(*) {}", LIST_WHERE);
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(status)
            .bind(filter.student_id)
            .bind(filter.advisor_id)
            .bind(search.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let page_query = format!(
            r#"
            SELECT ar.id, ar.student_id, ar.mongo_achievement_id, ar.status, ar.rejection_note,
                   ar.verified_by, ar.submitted_at, ar.verified_at, ar.created_at, ar.updated_at,
                   s.student_id AS student_number, u.full_name AS student_name
            {}
            ORDER BY ar.created_at DESC, ar.id DESC
            LIMIT $5 OFFSET $6
            "#,
            LIST_WHERE
        );
        let rows = sqlx::query_as::<_, ListingRow>(&page_query)
            .bind(status)
            .bind(filter.student_id)
            .bind(filter.advisor_id)
            .bind(search.as_deref())
            .bind(page.page_size as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let listings = rows
            .into_iter()
            .map(|row| {
                Ok(ReferenceListing {
                    reference: row.reference.try_into()?,
                    student_number: row.student_number,
                    student_name: row.student_name,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((listings, total.max(0) as u64))
    }

    async fn exists_for_document(&self, document_id: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM achievement_references WHERE mongo_achievement_id = $1)",
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// PgIdentityResolver
// =============================================================================

const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.student_id AS student_number, u.full_name,
           s.program_study, s.academic_year, s.advisor_id
    FROM students s
    JOIN users u ON s.user_id = u.id
"#;

/// Read-only lookups over the profile tables
#[derive(Clone)]
pub struct PgIdentityResolver {
    pool: PgPool,
}

impl PgIdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn student_where(&self, clause: &str, id: Uuid) -> StoreResult<Option<StudentIdentity>> {
        let query = format!("{} WHERE {}", STUDENT_SELECT, clause);
        let row = sqlx::query_as::<_, StudentRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StudentIdentity::from))
    }
}

#[async_trait]
impl IdentityResolver for PgIdentityResolver {
    async fn student_by_user(&self, user_id: Uuid) -> StoreResult<Option<StudentIdentity>> {
        self.student_where("s.user_id = $1", user_id).await
    }

    async fn advisor_by_user(&self, user_id: Uuid) -> StoreResult<Option<AdvisorIdentity>> {
        let row = sqlx::query_as::<_, LecturerRow>(
            r#"
            SELECT l.id, l.user_id, l.lecturer_id AS lecturer_number, u.full_name
            FROM lecturers l
            JOIN users u ON l.user_id = u.id
            WHERE l.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AdvisorIdentity {
            id: r.id,
            user_id: r.user_id,
            lecturer_number: r.lecturer_number,
            full_name: r.full_name,
        }))
    }

    async fn student_by_id(&self, student_id: Uuid) -> StoreResult<Option<StudentIdentity>> {
        self.student_where("s.id = $1", student_id).await
    }
}

// =============================================================================
// PgReconciliationLog
// =============================================================================

/// Entries in `achievement_reconciliation`
#[derive(Clone)]
pub struct PgReconciliationLog {
    pool: PgPool,
}

impl PgReconciliationLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationLog for PgReconciliationLog {
    async fn record(&self, kind: ReconcileKind, reason: &str) -> StoreResult<Uuid> {
        let entry = ReconciliationEntry::new(kind, reason, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO achievement_reconciliation (id, kind, payload, reason, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id)
        .bind(entry.kind.label())
        .bind(Json(&entry.kind))
        .bind(&entry.reason)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(entry.id)
    }

    async fn pending(&self, limit: u32, max_attempts: u32) -> StoreResult<Vec<ReconciliationEntry>> {
        let rows = sqlx::query_as::<_, ReconciliationRow>(
            r#"
            SELECT id, payload, reason, attempts, last_error, recorded_at, resolved_at
            FROM achievement_reconciliation
            WHERE resolved_at IS NULL AND attempts < $2
            ORDER BY recorded_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .bind(max_attempts as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReconciliationEntry::from).collect())
    }

    async fn resolve(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE achievement_reconciliation SET resolved_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bump_attempt(&self, id: Uuid, error: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE achievement_reconciliation SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_wraps_and_trims() {
        let filter = ListFilter {
            search: Some("  ani ".into()),
            ..Default::default()
        };
        assert_eq!(search_pattern(&filter).as_deref(), Some("%ani%"));

        let blank = ListFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(search_pattern(&blank), None);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = |term: &str| ListFilter {
            search: Some(term.into()),
            ..Default::default()
        };
        assert_eq!(search_pattern(&filter("%")).as_deref(), Some(r"%\%%"));
        assert_eq!(search_pattern(&filter("22_05")).as_deref(), Some(r"%22\_05%"));
        assert_eq!(search_pattern(&filter(r"a\b")).as_deref(), Some(r"%a\\b%"));
    }

    #[test]
    fn test_corrupt_status_is_rejected() {
        let row = ReferenceRow {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            mongo_achievement_id: "abc".into(),
            status: "archived".into(),
            rejection_note: None,
            verified_by: None,
            submitted_at: None,
            verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            AchievementReference::try_from(row),
            Err(StoreError::Corrupt(_))
        ));
    }
}
