//! Prestasi - achievement reporting and verification service

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prestasi::{
    attachments::{AttachmentPolicy, AttachmentUploader, FilesystemStorage},
    config::Args,
    db::{self, MongoClient},
    server::{self, AppState, Backends},
    services::{spawn_reconcile_task, AchievementService, Reconciler},
    store::{
        postgres, DocumentStore, IdentityResolver, MemoryDirectory, MemoryDocumentStore,
        MemoryReconciliationLog, MemoryReferenceStore, MongoDocumentStore, PgIdentityResolver,
        PgReconciliationLog, PgReferenceStore, ReconciliationLog, ReferenceStore,
    },
};

/// Reference-side stores, which share one backend
struct ReferenceSide {
    references: Arc<dyn ReferenceStore>,
    identities: Arc<dyn IdentityResolver>,
    reconciliation: Arc<dyn ReconciliationLog>,
    backend: &'static str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("prestasi={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Prestasi - Achievement Reporting");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db: {})", args.mongodb_uri, args.mongodb_db);
    info!("Uploads: {}", args.upload_dir.display());
    info!("======================================");

    let jwt = args.jwt_validator().context("JWT configuration")?;

    // PostgreSQL: references, profiles, reconciliation log
    let reference_side = match connect_postgres(&args).await {
        Ok(side) => side,
        Err(e) if args.dev_mode => {
            warn!("PostgreSQL unavailable (dev mode, using in-memory stores): {:#}", e);
            memory_reference_side(&args).await?
        }
        Err(e) => {
            error!("PostgreSQL connection failed: {:#}", e);
            std::process::exit(1);
        }
    };

    // MongoDB: achievement documents
    let (documents, documents_backend): (Arc<dyn DocumentStore>, &'static str) =
        match connect_mongo(&args).await {
            Ok(store) => (Arc::new(store), "mongodb"),
            Err(e) if args.dev_mode => {
                warn!("MongoDB unavailable (dev mode, using in-memory store): {:#}", e);
                (Arc::new(MemoryDocumentStore::new()), "memory")
            }
            Err(e) => {
                error!("MongoDB connection failed: {:#}", e);
                std::process::exit(1);
            }
        };

    // Proof file storage
    let storage = Arc::new(FilesystemStorage::new(&args.upload_dir));
    if let Err(e) = storage.validate().await {
        error!("Upload directory unusable: {}", e);
        std::process::exit(1);
    }
    let uploader = Arc::new(AttachmentUploader::new(
        AttachmentPolicy::new(args.max_upload_bytes, args.upload_url_prefix.clone()),
        storage.clone(),
    ));

    let service = Arc::new(AchievementService::new(
        Arc::clone(&reference_side.references),
        Arc::clone(&documents),
        Arc::clone(&reference_side.identities),
        Arc::clone(&reference_side.reconciliation),
        uploader,
    ));

    match args.reconcile_interval() {
        Some(interval) => {
            let reconciler = Arc::new(Reconciler::new(
                Arc::clone(&reference_side.references),
                Arc::clone(&documents),
                storage,
                Arc::clone(&reference_side.reconciliation),
            )
            .with_batch_size(args.reconcile_batch_size)
            .with_max_attempts(args.reconcile_max_attempts));
            spawn_reconcile_task(reconciler, interval);
        }
        None => warn!("Reconciliation disabled (RECONCILE_INTERVAL_SECS=0)"),
    }

    let backends = Backends {
        references: reference_side.backend,
        documents: documents_backend,
    };
    let state = Arc::new(AppState::new(args, service, jwt, backends));

    server::run(state).await.context("HTTP server")?;
    Ok(())
}

async fn connect_postgres(args: &Args) -> anyhow::Result<ReferenceSide> {
    let url = args
        .postgres_url
        .as_deref()
        .context("POSTGRES_URL not set")?;
    let pool = db::postgres::connect(url, args.postgres_max_connections).await?;
    postgres::ensure_schema(&pool).await?;
    info!("PostgreSQL connected, schema ready");

    Ok(ReferenceSide {
        references: Arc::new(PgReferenceStore::new(pool.clone())),
        identities: Arc::new(PgIdentityResolver::new(pool.clone())),
        reconciliation: Arc::new(PgReconciliationLog::new(pool)),
        backend: "postgres",
    })
}

async fn memory_reference_side(args: &Args) -> anyhow::Result<ReferenceSide> {
    let directory = match &args.dev_directory {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let directory = MemoryDirectory::from_json(&json)?;
            info!(
                students = directory.student_count(),
                lecturers = directory.lecturer_count(),
                "Loaded dev directory"
            );
            directory
        }
        None => {
            warn!("No DEV_DIRECTORY set; every profile lookup will fail");
            MemoryDirectory::new()
        }
    };
    let directory = Arc::new(directory);

    Ok(ReferenceSide {
        references: Arc::new(MemoryReferenceStore::new(Arc::clone(&directory))),
        identities: directory,
        reconciliation: Arc::new(MemoryReconciliationLog::new()),
        backend: "memory",
    })
}

async fn connect_mongo(args: &Args) -> anyhow::Result<MongoDocumentStore> {
    let client = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    client.ping().await?;
    let store = MongoDocumentStore::open(client).await?;
    info!("MongoDB connected, indexes applied");
    Ok(store)
}
