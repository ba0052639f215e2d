//! Rovema Dash — sales-commission and goal-tracking dashboard backend
//!
//! Usage:
//!   rovema-dash serve --port 3001              — Launch the JSON API server
//!   rovema-dash import-bionio <file.csv>       — Import a Bionio CSV export
//!   rovema-dash import-eliq 2025-01-01 2025-01-31 — Sync the ELIQ API

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use clap::{Parser, Subcommand};
use ingest::sources::{asto, bionio, eliq, rovema};
use ingest::{persist_batch, ImportOutcome, ImportResult, StagedBatch};
use persistence::repository::{AuditRepository, NewUser, UserRepository};
use persistence::SqlitePool;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

mod auth;
mod error;
mod extract;
mod handlers;

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "rovema-dash")]
#[command(about = "Sales-commission and goal-tracking dashboard backend", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the dashboard API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Import a Bionio CSV export
    ImportBionio {
        /// Path to the Bionio CSV file
        csv_file: PathBuf,
        /// Id of the user who initiated the import (for the audit trail)
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Import a Rovema Pay CSV export
    ImportRovema {
        /// Path to the Rovema Pay CSV file
        csv_file: PathBuf,
        /// Id of the user who initiated the import (for the audit trail)
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Sync sales from the ELIQ (Uzzipay/Sigyo) API
    ImportEliq {
        /// Start date (YYYY-MM-DD)
        start_date: String,
        /// End date (YYYY-MM-DD)
        end_date: String,
        /// Id of the user who initiated the sync (for the audit trail)
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Sync sales from the ASTO (Logpay) API — currently paused upstream
    ImportAsto {
        /// Start date (YYYY-MM-DD)
        start_date: String,
        /// End date (YYYY-MM-DD)
        end_date: String,
    },
    /// Create a user account (bootstrap path for the first admin)
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// consultant, manager, or admin
        #[arg(long, default_value = "consultant")]
        role: String,
        /// Manager this consultant reports to
        #[arg(long)]
        manager_id: Option<i64>,
    },
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<persistence::Database>,
    pub jwt: auth::JwtConfig,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,ingest=debug,rovema_dash=debug")
    } else {
        EnvFilter::new("info,ingest=info,rovema_dash=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

async fn open_database() -> anyhow::Result<persistence::Database> {
    let db_path =
        std::env::var("ROVEMA_DASH_DB_PATH").unwrap_or_else(|_| "data/rovema.db".to_string());
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::ImportBionio { csv_file, user_id } => {
            cmd_import_csv("bionio", bionio::stage, csv_file, user_id).await?;
        }
        Commands::ImportRovema { csv_file, user_id } => {
            cmd_import_csv("rovema", rovema::stage, csv_file, user_id).await?;
        }
        Commands::ImportEliq {
            start_date,
            end_date,
            user_id,
        } => {
            cmd_import_eliq(&start_date, &end_date, user_id).await?;
        }
        Commands::ImportAsto { .. } => {
            cmd_import_asto();
        }
        Commands::CreateUser {
            email,
            password,
            first_name,
            last_name,
            role,
            manager_id,
        } => {
            cmd_create_user(email, password, first_name, last_name, role, manager_id).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Rovema Dash v{} starting...", APP_VERSION);

    let db = open_database().await?;
    let state = AppState {
        db: Arc::new(db),
        jwt: auth::JwtConfig::from_env(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Determine static files directory
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/dashboard", get(handlers::dashboard::general))
        .route("/portfolio", get(handlers::portfolio::portfolio))
        .route("/clients/orphans", get(handlers::clients::orphans))
        .route("/clients/assign", post(handlers::clients::assign))
        .route(
            "/goals",
            get(handlers::goals::list).put(handlers::goals::save),
        )
        .route("/goals/:id", delete(handlers::goals::remove))
        .route(
            "/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/users/:id",
            put(handlers::users::update).delete(handlers::users::remove),
        )
        .route(
            "/commission-rules",
            get(handlers::commission::list).post(handlers::commission::create),
        )
        .route(
            "/commission-rules/:id",
            put(handlers::commission::update).delete(handlers::commission::remove),
        )
        .route("/imports/csv", post(handlers::imports::upload_csv))
        .route("/imports/api", post(handlers::imports::sync_api))
        .route("/imports/history", get(handlers::imports::history))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Rovema Dash v{} ===", APP_VERSION);
    println!("Sales dashboard backend");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  POST /api/auth/login            - Login (email + password)");
    println!("  POST /api/auth/refresh          - Refresh the access token");
    println!("  POST /api/auth/logout           - Revoke the session");
    println!("  GET  /api/dashboard             - Period KPIs, charts, rankings");
    println!("  GET  /api/portfolio             - Role-scoped book and goals");
    println!("  GET  /api/clients/orphans       - Unattributed sales");
    println!("  POST /api/clients/assign        - Assign a client to a consultant");
    println!("  GET  /api/goals                 - Goals per consultant");
    println!("  PUT  /api/goals                 - Save monthly targets");
    println!("  GET  /api/users                 - User CRUD (admin)");
    println!("  GET  /api/commission-rules      - Commission rule CRUD (admin)");
    println!("  POST /api/imports/csv           - Upload a CSV and import it");
    println!("  POST /api/imports/api           - Sync an API source");
    println!("  GET  /api/imports/history       - Recent import audit entries");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "rovema-dash",
        "version": APP_VERSION,
    }))
}

// ============================================================================
// Import commands — one per data source
// ============================================================================

/// Confirm the initiating user still exists before attributing audit entries
async fn resolve_user(pool: &SqlitePool, user_id: Option<i64>) -> Option<i64> {
    match user_id {
        Some(id) => UserRepository::new(pool)
            .get(id)
            .await
            .ok()
            .flatten()
            .map(|u| u.id),
        None => None,
    }
}

fn record_outcome(details: &mut serde_json::Value, outcome: &ImportOutcome) {
    details["status"] = json!("Success");
    details["rows_found"] = json!(outcome.rows_found);
    details["rows_processed"] = json!(outcome.rows_processed);
    details["rows_saved"] = json!(outcome.rows_saved);
    details["orphans_found"] = json!(outcome.orphans_found);
}

async fn run_csv_import(
    pool: &SqlitePool,
    stage: fn(&str) -> ImportResult<StagedBatch>,
    csv_file: &PathBuf,
) -> ImportResult<ImportOutcome> {
    let raw = std::fs::read(csv_file)?;
    // Exports are Latin-1-ish; recover what we can from non-UTF8 bytes
    let content = String::from_utf8_lossy(&raw);
    let batch = stage(&content)?;
    if batch.staged.is_empty() {
        warn!("No valid sale rows found in {}", csv_file.display());
    }
    persist_batch(pool, batch).await
}

async fn cmd_import_csv(
    file_type: &str,
    stage: fn(&str) -> ImportResult<StagedBatch>,
    csv_file: PathBuf,
    user_id: Option<i64>,
) -> anyhow::Result<()> {
    info!("Starting {} import from {}", file_type, csv_file.display());

    let db = open_database().await?;
    let pool = db.pool();
    let user_id = resolve_user(pool, user_id).await;

    let filename = csv_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut details = json!({ "file_type": file_type, "filename": filename });

    match run_csv_import(pool, stage, &csv_file).await {
        Ok(outcome) => {
            record_outcome(&mut details, &outcome);
            AuditRepository::new(pool)
                .write(user_id, "csv_import_finished", &details)
                .await?;
            info!(
                rows_saved = outcome.rows_saved,
                orphans_found = outcome.orphans_found,
                "{} import complete",
                file_type
            );
            Ok(())
        }
        Err(e) => {
            // The failed run was rolled back; the failure entry must survive it
            details["status"] = json!("Failure");
            details["error"] = json!(e.to_string());
            AuditRepository::new(pool)
                .write(user_id, "csv_import_failed", &details)
                .await
                .ok();
            error!("{} import failed: {}", file_type, e);
            Err(e.into())
        }
    }
}

async fn cmd_import_eliq(
    start_date: &str,
    end_date: &str,
    user_id: Option<i64>,
) -> anyhow::Result<()> {
    let start = chrono::NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid start date '{start_date}' (expected YYYY-MM-DD)"))?;
    let end = chrono::NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid end date '{end_date}' (expected YYYY-MM-DD)"))?;

    info!("Starting ELIQ sync for {} - {}", start_date, end_date);

    let db = open_database().await?;
    let pool = db.pool();
    let user_id = resolve_user(pool, user_id).await;

    let mut details = json!({
        "api_type": "eliq",
        "start_date": start_date,
        "end_date": end_date,
    });

    let result = async {
        let client = eliq::EliqClient::from_env()?;
        let transactions = client.fetch_transactions(start, end).await?;
        if transactions.is_empty() {
            warn!("No ELIQ transactions returned for the period");
        }
        persist_batch(pool, eliq::stage(&transactions)).await
    }
    .await;

    match result {
        Ok(outcome) => {
            record_outcome(&mut details, &outcome);
            AuditRepository::new(pool)
                .write(user_id, "api_sync_finished", &details)
                .await?;
            info!(
                rows_saved = outcome.rows_saved,
                orphans_found = outcome.orphans_found,
                "ELIQ sync complete"
            );
            Ok(())
        }
        Err(e) => {
            details["status"] = json!("Failure");
            details["error"] = json!(e.to_string());
            AuditRepository::new(pool)
                .write(user_id, "api_sync_failed", &details)
                .await
                .ok();
            error!("ELIQ sync failed: {}", e);
            Err(e.into())
        }
    }
}

fn cmd_import_asto() {
    warn!("ASTO integration is paused");
    println!("\n{}\n", asto::MAINTENANCE_NOTICE);
    println!("No ASTO data was imported.");
}

// ============================================================================
// Create-user command — bootstrap accounts from the CLI
// ============================================================================

async fn cmd_create_user(
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    role: String,
    manager_id: Option<i64>,
) -> anyhow::Result<()> {
    if ingest::Role::parse(&role).is_none() {
        anyhow::bail!("Unknown role '{role}' (expected consultant, manager, or admin)");
    }
    auth::validate_password_strength(&password).map_err(|e| anyhow::anyhow!(e))?;

    let db = open_database().await?;
    let pool = db.pool();

    if let Some(mid) = manager_id {
        let is_manager = UserRepository::new(pool)
            .get(mid)
            .await?
            .filter(|u| u.role == "manager")
            .is_some();
        if !is_manager {
            anyhow::bail!("User {mid} is not a manager");
        }
    }

    let password_hash =
        auth::hash_password(&password).map_err(|e| anyhow::anyhow!("Hashing failed: {e}"))?;

    let id = UserRepository::new(pool)
        .create(&NewUser {
            email: email.clone(),
            password_hash,
            first_name,
            last_name,
            role: role.clone(),
            manager_id,
        })
        .await?;

    println!("Created {} user {} (id {})", role, email, id);
    Ok(())
}
