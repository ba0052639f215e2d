//! Data-load endpoints: CSV upload, API sync, and import history
//!
//! Imports run as detached OS processes (the binary re-invoked with the
//! matching import subcommand), so the request returns immediately and the
//! UI polls the audit trail for completion.

use std::path::PathBuf;
use std::process::Stdio;

use axum::extract::{Multipart, Query, State};
use axum::response::Json;
use chrono::NaiveDate;
use persistence::repository::AuditRepository;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extract::RequireManager;
use crate::AppState;

/// Audit actions surfaced by the history endpoint
const IMPORT_ACTIONS: &[&str] = &[
    "csv_import_started",
    "csv_import_finished",
    "csv_import_failed",
    "api_sync_started",
    "api_sync_finished",
    "api_sync_failed",
];

#[derive(Deserialize)]
pub struct SyncApiRequest {
    pub api_type: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

fn tmp_dir() -> PathBuf {
    std::env::var("ROVEMA_DASH_TMP_DIR")
        .unwrap_or_else(|_| "data/tmp".to_string())
        .into()
}

/// Re-invoke this binary with an import subcommand, fully detached
fn spawn_import(args: &[String]) -> AppResult<()> {
    let exe = std::env::current_exe()
        .map_err(|e| AppError::Internal(format!("Cannot locate executable: {e}")))?;

    std::process::Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AppError::Internal(format!("Failed to start import process: {e}")))?;

    Ok(())
}

/// POST /api/imports/csv — multipart `file_type` + `csv_file`.
/// Persists the upload to a temp path and kicks off the import.
pub async fn upload_csv(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut file_type: Option<String> = None;
    let mut original_name: Option<String> = None;
    let mut file_bytes: Option<axum::body::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file_type") => {
                file_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid file_type: {e}")))?,
                );
            }
            Some("csv_file") => {
                original_name = field.file_name().map(|s| s.to_string());
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Upload failed: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let file_type =
        file_type.ok_or_else(|| AppError::BadRequest("Missing file_type field".to_string()))?;
    let bytes =
        file_bytes.ok_or_else(|| AppError::BadRequest("Missing csv_file field".to_string()))?;

    let subcommand = match file_type.as_str() {
        "bionio" => "import-bionio",
        "rovema" => "import-rovema",
        other => {
            return Err(AppError::BadRequest(format!("Unknown file type '{other}'")));
        }
    };

    let dir = tmp_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(format!("Cannot create temp dir: {e}")))?;
    let temp_path = dir.join(format!("{file_type}_{}.csv", Uuid::new_v4()));
    tokio::fs::write(&temp_path, &bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Cannot write upload: {e}")))?;

    spawn_import(&[
        subcommand.to_string(),
        temp_path.to_string_lossy().to_string(),
        "--user-id".to_string(),
        user.user_id.to_string(),
    ])?;

    let filename = original_name.unwrap_or_else(|| temp_path.to_string_lossy().to_string());
    AuditRepository::new(state.db.pool())
        .write(
            Some(user.user_id),
            "csv_import_started",
            &json!({ "file_type": file_type, "filename": filename }),
        )
        .await?;

    info!(file_type = %file_type, path = %temp_path.display(), "CSV import started");

    Ok(Json(json!({
        "success": true,
        "message": format!(
            "{} import started. Data will be available in a few minutes.",
            file_type
        ),
    })))
}

/// POST /api/imports/api — kick off an API sync for a date range
pub async fn sync_api(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Json(req): Json<SyncApiRequest>,
) -> AppResult<Json<Value>> {
    for (label, value) in [("start_date", &req.start_date), ("end_date", &req.end_date)] {
        if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
            return Err(AppError::BadRequest(format!(
                "Invalid {label} '{value}' (expected YYYY-MM-DD)"
            )));
        }
    }

    let subcommand = match req.api_type.as_str() {
        "eliq" => "import-eliq",
        "asto" => "import-asto",
        other => {
            return Err(AppError::BadRequest(format!("Unknown API type '{other}'")));
        }
    };

    let mut args = vec![
        subcommand.to_string(),
        req.start_date.clone(),
        req.end_date.clone(),
    ];
    // The ASTO stub takes no user attribution
    if req.api_type == "eliq" {
        args.push("--user-id".to_string());
        args.push(user.user_id.to_string());
    }
    spawn_import(&args)?;

    AuditRepository::new(state.db.pool())
        .write(
            Some(user.user_id),
            "api_sync_started",
            &json!({
                "api_type": req.api_type,
                "start_date": req.start_date,
                "end_date": req.end_date,
            }),
        )
        .await?;

    info!(api_type = %req.api_type, "API sync started");

    Ok(Json(json!({
        "success": true,
        "message": format!("{} sync started.", req.api_type.to_uppercase()),
    })))
}

/// GET /api/imports/history — recent import audit entries for polling
pub async fn history(
    State(state): State<AppState>,
    RequireManager(_user): RequireManager,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<Value>> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let entries: Vec<Value> = AuditRepository::new(state.db.pool())
        .recent(IMPORT_ACTIONS, limit)
        .await?
        .into_iter()
        .map(|log| {
            json!({
                "id": log.id,
                "user_id": log.user_id,
                "timestamp": log.timestamp,
                "action": log.action,
                "details": log.details_json(),
            })
        })
        .collect();

    Ok(Json(json!({ "history": entries })))
}
