//! End-to-end workflow tests over the in-memory stores

mod common;

use common::{create_request, pdf, Faults, Fixture};
use prestasi::model::{AchievementStatus, ContentUpdate, PageRequest, ReconcileKind};
use prestasi::services::{ListParams, DEFAULT_MAX_ATTEMPTS};
use prestasi::store::{DocumentStore, ReconciliationLog, ReferenceStore};
use prestasi::types::AppError;
use uuid::Uuid;

fn page(page: i64, size: i64) -> ListParams {
    ListParams {
        page: PageRequest::new(page, size),
        ..Default::default()
    }
}

// =============================================================================
// Create / read
// =============================================================================

#[tokio::test]
async fn test_create_then_detail_round_trip() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1 Hackathon").await;

    assert_eq!(reference.status, AchievementStatus::Draft);
    assert_eq!(reference.student_id, f.student.profile.id);
    assert!(f.documents.contains(&reference.document_id));

    let detail = f
        .service
        .get_detail(&f.student.actor, reference.id)
        .await
        .unwrap();
    assert_eq!(detail.title, "Juara 1 Hackathon");
    assert_eq!(detail.achievement_type, "Nasional");
    assert_eq!(detail.status, AchievementStatus::Draft);
    assert!(detail.attachments.is_empty());
    assert_eq!(detail.points, 0);
    assert_eq!(detail.student.student_number, "2210511001");
    assert_eq!(detail.details["rank"], serde_json::json!(1));
}

#[tokio::test]
async fn test_create_requires_title_and_type() {
    let f = Fixture::new();

    let mut req = create_request("   ");
    let err = f.service.create(&f.student.actor, req.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    req.title = "Juara 2".into();
    req.achievement_type = String::new();
    let err = f.service.create(&f.student.actor, req).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(f.documents.is_empty());
    assert!(f.references.is_empty());
}

#[tokio::test]
async fn test_only_students_create() {
    let f = Fixture::new();
    let err = f
        .service
        .create(&f.advisor.actor, create_request("Juara 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(f.documents.is_empty());
}

#[tokio::test]
async fn test_detail_visibility() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    assert!(f.service.get_detail(&f.advisor.actor, reference.id).await.is_ok());
    assert!(f.service.get_detail(&f.admin, reference.id).await.is_ok());

    let err = f
        .service
        .get_detail(&f.other_student.actor, reference.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = f
        .service
        .get_detail(&f.other_advisor.actor, reference.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = f
        .service
        .get_detail(&f.student.actor, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// =============================================================================
// Drafts
// =============================================================================

#[tokio::test]
async fn test_edit_applies_supplied_fields_only() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    f.service
        .edit(
            &f.student.actor,
            reference.id,
            ContentUpdate {
                title: Some("Juara 1 Hackathon Nasional".into()),
                tags: Some(vec!["ai".into(), "hackathon".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.title, "Juara 1 Hackathon Nasional");
    assert_eq!(detail.tags, vec!["ai".to_string(), "hackathon".to_string()]);
    assert_eq!(detail.description, "Lomba tingkat nasional");
    assert_eq!(detail.status, AchievementStatus::Draft);
    assert!(detail.updated_at >= reference.updated_at);
}

#[tokio::test]
async fn test_edit_trims_title_and_type() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    f.service
        .edit(
            &f.student.actor,
            reference.id,
            ContentUpdate {
                achievement_type: Some("  Internasional ".into()),
                title: Some("\tJuara 2 Olimpiade  ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.achievement_type, "Internasional");
    assert_eq!(detail.title, "Juara 2 Olimpiade");

    let blank = ContentUpdate {
        title: Some("   ".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.service.edit(&f.student.actor, reference.id, blank).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_only_owner_changes_draft() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;
    let intruder = &f.other_student.actor;

    let update = ContentUpdate {
        title: Some("Hijacked".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.service.edit(intruder, reference.id, update).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.submit(intruder, reference.id).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.delete(intruder, reference.id).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.upload_attachment(intruder, reference.id, pdf(16)).await,
        Err(AppError::Validation(_))
    ));

    let stored = f.references.get(reference.id).await.unwrap().unwrap();
    assert_eq!(stored, reference);
    let doc = f.documents.get(&reference.document_id).await.unwrap().unwrap();
    assert_eq!(doc.title, "Juara 1");
    assert!(doc.attachments.is_empty());
    assert!(f.blobs.is_empty());
}

#[tokio::test]
async fn test_submitted_achievement_is_frozen() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;
    assert_eq!(reference.status, AchievementStatus::Submitted);
    assert!(reference.submitted_at.is_some());

    let actor = &f.student.actor;
    let update = ContentUpdate {
        title: Some("Changed".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.service.edit(actor, reference.id, update).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.submit(actor, reference.id).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.delete(actor, reference.id).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.upload_attachment(actor, reference.id, pdf(16)).await,
        Err(AppError::Validation(_))
    ));

    let stored = f.references.get(reference.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AchievementStatus::Submitted);
}

#[tokio::test]
async fn test_delete_is_soft() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    let deleted = f.service.delete(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(deleted.status, AchievementStatus::Deleted);
    assert!(f.documents.contains(&reference.document_id));

    let listing = f.service.list(&f.student.actor, page(1, 10)).await.unwrap();
    assert_eq!(listing.total, 0);

    assert!(matches!(
        f.service.submit(&f.student.actor, reference.id).await,
        Err(AppError::Validation(_))
    ));
}

// =============================================================================
// Attachments
// =============================================================================

#[tokio::test]
async fn test_upload_appends_attachment() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    let attachment = f
        .service
        .upload_attachment(&f.student.actor, reference.id, pdf(1024))
        .await
        .unwrap();
    assert!(attachment
        .file_name
        .starts_with(&format!("ACH-{}-", reference.id)));
    assert!(attachment.file_name.ends_with(".pdf"));
    assert_eq!(attachment.file_type, "application/pdf");
    assert_eq!(f.blobs.len(), 1);

    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.attachments, vec![attachment]);
}

#[tokio::test]
async fn test_upload_touches_reference() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    f.service
        .upload_attachment(&f.student.actor, reference.id, pdf(16))
        .await
        .unwrap();

    let stored = f.references.get(reference.id).await.unwrap().unwrap();
    assert!(stored.updated_at > reference.updated_at);
    assert_eq!(stored.status, AchievementStatus::Draft);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    let err = f
        .service
        .upload_attachment(&f.student.actor, reference.id, pdf(6 * 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(err.public_message().contains("5MB"));

    assert!(f.blobs.is_empty());
    let doc = f.documents.get(&reference.document_id).await.unwrap().unwrap();
    assert!(doc.attachments.is_empty());
}

#[tokio::test]
async fn test_unsupported_file_type_is_rejected() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    let mut file = pdf(64);
    file.content_type = "application/zip".into();
    let err = f
        .service
        .upload_attachment(&f.student.actor, reference.id, file)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(f.blobs.is_empty());
}

// =============================================================================
// Review
// =============================================================================

#[tokio::test]
async fn test_verify_awards_points() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;

    let verified = f
        .service
        .verify(&f.advisor.actor, reference.id, 100)
        .await
        .unwrap();
    assert_eq!(verified.status, AchievementStatus::Verified);
    assert_eq!(verified.verified_by, Some(f.advisor.profile.id));
    assert!(verified.verified_at.is_some());

    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.status, AchievementStatus::Verified);
    assert_eq!(detail.points, 100);

    let err = f
        .service
        .verify(&f.advisor.actor, reference.id, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.points, 100);
}

#[tokio::test]
async fn test_verify_requires_positive_points() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;

    for points in [0, -5] {
        let err = f
            .service
            .verify(&f.advisor.actor, reference.id, points)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
    let stored = f.references.get(reference.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AchievementStatus::Submitted);
}

#[tokio::test]
async fn test_reject_records_note_and_is_terminal() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;

    let rejected = f
        .service
        .reject(&f.advisor.actor, reference.id, "  Bukti tidak valid ")
        .await
        .unwrap();
    assert_eq!(rejected.status, AchievementStatus::Rejected);

    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.status, AchievementStatus::Rejected);
    assert_eq!(detail.rejection_note.as_deref(), Some("Bukti tidak valid"));

    assert!(matches!(
        f.service
            .reject(&f.advisor.actor, reference.id, "Bukti tidak valid")
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.submit(&f.student.actor, reference.id).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.verify(&f.advisor.actor, reference.id, 10).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_reject_requires_note() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;

    let err = f
        .service
        .reject(&f.advisor.actor, reference.id, "  no ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_only_assigned_advisor_reviews() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;

    assert!(matches!(
        f.service.verify(&f.other_advisor.actor, reference.id, 10).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service
            .reject(&f.other_advisor.actor, reference.id, "Bukti tidak valid")
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service.verify(&f.student.actor, reference.id, 10).await,
        Err(AppError::Validation(_))
    ));

    // Reassigning the student moves review rights with them
    f.directory
        .set_advisor(f.student.profile.id, Some(f.other_advisor.profile.id));
    assert!(matches!(
        f.service.verify(&f.advisor.actor, reference.id, 10).await,
        Err(AppError::Validation(_))
    ));
    f.service
        .verify(&f.other_advisor.actor, reference.id, 10)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_review_requires_submitted_status() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    assert!(matches!(
        f.service.verify(&f.advisor.actor, reference.id, 10).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service
            .reject(&f.advisor.actor, reference.id, "Bukti tidak valid")
            .await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_concurrent_verify_has_one_winner() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;

    let service_a = f.service.clone();
    let service_b = f.service.clone();
    let actor = f.advisor.actor;
    let id = reference.id;

    // Both callers see `submitted` before either one writes.
    Faults::set(&f.faults.pair_reads, true);
    let writes_before = f.faults.transitions();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { service_a.verify(&actor, id, 50).await }),
        tokio::spawn(async move { service_b.verify(&actor, id, 80).await }),
    );
    Faults::set(&f.faults.pair_reads, false);
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(f.faults.transitions() - writes_before, 2);
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let loser = if a.is_ok() { &b } else { &a };
    assert!(matches!(loser, Err(AppError::Validation(_))));

    let expected_points = if a.is_ok() { 50 } else { 80 };
    let detail = f.service.get_detail(&f.student.actor, id).await.unwrap();
    assert_eq!(detail.status, AchievementStatus::Verified);
    assert_eq!(detail.points, expected_points);
    assert!(f.log.entries().is_empty());
}

#[tokio::test]
async fn test_upload_racing_submit_is_rejected() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;

    let submitter = f.service.clone();
    let uploader = f.service.clone();
    let actor = f.student.actor;
    let id = reference.id;

    // The upload reads `draft` first; submit then reads and writes before
    // the upload resumes.
    Faults::set(&f.faults.pair_reads, true);
    let upload = tokio::spawn(async move { uploader.upload_attachment(&actor, id, pdf(64)).await });
    f.faults.wait_for_parked_reads(1).await;
    let submit = tokio::spawn(async move { submitter.submit(&actor, id).await });
    let (submit, upload) = tokio::join!(submit, upload);
    Faults::set(&f.faults.pair_reads, false);

    let submitted = submit.unwrap().unwrap();
    assert_eq!(submitted.status, AchievementStatus::Submitted);
    assert!(matches!(upload.unwrap(), Err(AppError::Validation(_))));

    assert!(f.blobs.is_empty());
    let doc = f.documents.get(&reference.document_id).await.unwrap().unwrap();
    assert!(doc.attachments.is_empty());
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_advisor_listing_is_scoped_to_advisees() {
    let f = Fixture::new();
    for i in 0..3 {
        f.submitted(&f.student.actor, &format!("Submitted {}", i)).await;
    }
    f.draft(&f.student.actor, "Still a draft").await;
    f.submitted(&f.other_student.actor, "Someone else's").await;

    let params = ListParams {
        status: Some(AchievementStatus::Submitted),
        page: PageRequest::new(1, 2),
        ..Default::default()
    };
    let listing = f.service.list(&f.advisor.actor, params.clone()).await.unwrap();
    assert_eq!(listing.total, 3);
    assert_eq!(listing.total_pages, 2);
    assert_eq!(listing.page, 1);
    assert_eq!(listing.page_size, 2);
    assert_eq!(listing.data.len(), 2);
    assert!(listing
        .data
        .iter()
        .all(|item| item.student_id == f.student.profile.id
            && item.status == AchievementStatus::Submitted));
    assert!(listing.data.iter().all(|item| item.title.starts_with("Submitted")));
    assert!(listing.data[0].created_at >= listing.data[1].created_at);

    let second = f
        .service
        .list(
            &f.advisor.actor,
            ListParams {
                page: PageRequest::new(2, 2),
                ..params
            },
        )
        .await
        .unwrap();
    assert_eq!(second.data.len(), 1);
}

#[tokio::test]
async fn test_listing_scopes_by_role() {
    let f = Fixture::new();
    f.draft(&f.student.actor, "Mine").await;
    f.draft(&f.other_student.actor, "Theirs").await;

    let own = f.service.list(&f.student.actor, page(1, 10)).await.unwrap();
    assert_eq!(own.total, 1);
    assert_eq!(own.data[0].title, "Mine");
    assert_eq!(own.data[0].student_name, "Budi Santoso");

    let all = f.service.list(&f.admin, page(1, 10)).await.unwrap();
    assert_eq!(all.total, 2);
}

#[tokio::test]
async fn test_listing_search_matches_name_or_number() {
    let f = Fixture::new();
    f.draft(&f.student.actor, "Mine").await;
    f.draft(&f.other_student.actor, "Theirs").await;

    let by_name = ListParams {
        search: Some("citra".into()),
        ..page(1, 10)
    };
    let listing = f.service.list(&f.admin, by_name).await.unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.data[0].title, "Theirs");

    let by_number = ListParams {
        search: Some("511001".into()),
        ..page(1, 10)
    };
    let listing = f.service.list(&f.admin, by_number).await.unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.data[0].title, "Mine");
}

#[tokio::test]
async fn test_list_by_student() {
    let f = Fixture::new();
    f.submitted(&f.student.actor, "Submitted").await;
    f.draft(&f.student.actor, "Draft").await;
    let student_id = f.student.profile.id;

    let listing = f
        .service
        .list_by_student(&f.advisor.actor, student_id, None, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(listing.total, 2);

    let listing = f
        .service
        .list_by_student(
            &f.student.actor,
            student_id,
            Some(AchievementStatus::Draft),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.data[0].title, "Draft");

    assert!(f
        .service
        .list_by_student(&f.admin, student_id, None, PageRequest::default())
        .await
        .is_ok());
    assert!(matches!(
        f.service
            .list_by_student(&f.other_advisor.actor, student_id, None, PageRequest::default())
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        f.service
            .list_by_student(&f.admin, Uuid::new_v4(), None, PageRequest::default())
            .await,
        Err(AppError::NotFound(_))
    ));
}

// =============================================================================
// Compensation and reconciliation
// =============================================================================

#[tokio::test]
async fn test_failed_reference_insert_removes_document() {
    let f = Fixture::new();
    Faults::set(&f.faults.reference_insert, true);

    let err = f
        .service
        .create(&f.student.actor, create_request("Juara 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(err.public_message(), prestasi::types::GENERIC_DATABASE_MESSAGE);

    assert!(f.documents.is_empty());
    assert!(f.references.is_empty());
    assert!(f.log.entries().is_empty());
}

#[tokio::test]
async fn test_orphan_document_is_recorded_and_reconciled() {
    let f = Fixture::new();
    Faults::set(&f.faults.reference_insert, true);
    Faults::set(&f.faults.document_delete, true);

    let err = f
        .service
        .create(&f.student.actor, create_request("Juara 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(f.documents.len(), 1);

    let pending = f.log.pending(10, DEFAULT_MAX_ATTEMPTS).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(matches!(pending[0].kind, ReconcileKind::OrphanDocument { .. }));

    // Still failing: the entry stays pending with an attempt recorded
    let report = f.reconciler.run_once().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(f.log.pending(10, DEFAULT_MAX_ATTEMPTS).await.unwrap()[0].attempts, 1);

    Faults::set(&f.faults.document_delete, false);
    let report = f.reconciler.run_once().await.unwrap();
    assert_eq!(report.resolved, 1);
    assert!(f.documents.is_empty());
    assert!(f.log.pending(10, DEFAULT_MAX_ATTEMPTS).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_attachment_append_removes_file() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;
    Faults::set(&f.faults.document_push, true);

    let err = f
        .service
        .upload_attachment(&f.student.actor, reference.id, pdf(128))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert!(f.blobs.is_empty());
    assert!(f.log.entries().is_empty());
}

#[tokio::test]
async fn test_orphan_file_is_recorded_and_reconciled() {
    let f = Fixture::new();
    let reference = f.draft(&f.student.actor, "Juara 1").await;
    Faults::set(&f.faults.document_push, true);
    Faults::set(&f.faults.blob_delete, true);

    assert!(f
        .service
        .upload_attachment(&f.student.actor, reference.id, pdf(128))
        .await
        .is_err());
    assert_eq!(f.blobs.len(), 1);

    let pending = f.log.pending(10, DEFAULT_MAX_ATTEMPTS).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(matches!(pending[0].kind, ReconcileKind::OrphanFile { .. }));

    Faults::set(&f.faults.blob_delete, false);
    let report = f.reconciler.run_once().await.unwrap();
    assert_eq!(report.resolved, 1);
    assert!(f.blobs.is_empty());
}

#[tokio::test]
async fn test_failed_points_write_is_reconciled() {
    let f = Fixture::new();
    let reference = f.submitted(&f.student.actor, "Juara 1").await;
    Faults::set(&f.faults.document_points, true);

    let err = f
        .service
        .verify(&f.advisor.actor, reference.id, 75)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));

    // The status change stands; only the points are outstanding
    let stored = f.references.get(reference.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AchievementStatus::Verified);
    let pending = f.log.pending(10, DEFAULT_MAX_ATTEMPTS).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(matches!(
        pending[0].kind,
        ReconcileKind::PendingPoints { points: 75, .. }
    ));

    Faults::set(&f.faults.document_points, false);
    let report = f.reconciler.run_once().await.unwrap();
    assert_eq!(report.resolved, 1);

    let detail = f.service.get_detail(&f.student.actor, reference.id).await.unwrap();
    assert_eq!(detail.points, 75);
}
