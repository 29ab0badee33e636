//! The `document_analyses` entity.

use chrono::Utc;
use contractai_types::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

use crate::{ensure_document_exists, new_entity_id, parse_json_column};

/// One analysis run over a document.
///
/// The `status` field is a free-form short string owned by the pipeline
/// (`"pending"`, `"running"`, `"completed"`, …) rather than a closed set;
/// only the default is fixed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentAnalysis {
    /// UUID v4, 36 chars.
    pub id: String,
    /// The analyzed document.
    pub document_id: String,
    /// What kind of analysis ran (e.g. `"full"`, `"risk_scan"`).
    pub analysis_type: String,
    /// Pipeline-owned status string, defaults to `"pending"`.
    pub status: String,
    /// Structured result payload produced by the pipeline.
    pub result: Option<Value>,
    /// Error text when the run failed.
    pub error: Option<String>,
    /// Creation timestamp (ISO 8601 UTC).
    pub created_at: String,
    /// Last modification timestamp (ISO 8601 UTC).
    pub updated_at: String,
}

/// Parameters for recording a new analysis run.
#[derive(Debug, Clone, Default)]
pub struct CreateAnalysisParams {
    /// Identifier to use; generated when absent.
    pub id: Option<String>,
    /// The analyzed document; must exist.
    pub document_id: String,
    pub analysis_type: String,
    /// Initial status; `"pending"` when absent.
    pub status: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Full-row update of an analysis run's mutable fields.
#[derive(Debug, Clone)]
pub struct UpdateAnalysisParams {
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

const ANALYSIS_COLUMNS: &str =
    "id, document_id, analysis_type, status, result, error, created_at, updated_at";

/// Records a new analysis run for an existing document.
pub async fn create_analysis(
    conn: &mut AnyConnection,
    params: &CreateAnalysisParams,
) -> Result<DocumentAnalysis, AppError> {
    let id = new_entity_id(params.id.clone())?;
    ensure_document_exists(conn, &params.document_id).await?;

    let status = params
        .status
        .clone()
        .unwrap_or_else(|| "pending".to_string());
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO document_analyses (
            id, document_id, analysis_type, status, result, error, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&id)
    .bind(&params.document_id)
    .bind(&params.analysis_type)
    .bind(&status)
    .bind(params.result.as_ref().map(Value::to_string))
    .bind(&params.error)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        analysis_id = %id,
        document_id = %params.document_id,
        analysis_type = %params.analysis_type,
        "analysis recorded"
    );

    Ok(DocumentAnalysis {
        id,
        document_id: params.document_id.clone(),
        analysis_type: params.analysis_type.clone(),
        status,
        result: params.result.clone(),
        error: params.error.clone(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Retrieves an analysis run by id.
pub async fn get_analysis(
    conn: &mut AnyConnection,
    analysis_id: &str,
) -> Result<DocumentAnalysis, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM document_analyses WHERE id = $1"
    ))
    .bind(analysis_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(map_row_to_analysis(&row)?),
        None => Err(AppError::not_found(format!(
            "analysis not found: {analysis_id}"
        ))),
    }
}

/// Lists a document's analysis runs, newest first.
pub async fn list_analyses_for_document(
    conn: &mut AnyConnection,
    document_id: &str,
) -> Result<Vec<DocumentAnalysis>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM document_analyses
         WHERE document_id = $1 ORDER BY created_at DESC, id ASC"
    ))
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut analyses = Vec::with_capacity(rows.len());
    for row in &rows {
        analyses.push(map_row_to_analysis(row)?);
    }
    Ok(analyses)
}

/// Replaces an analysis run's mutable fields and refreshes `updated_at`.
pub async fn update_analysis(
    conn: &mut AnyConnection,
    analysis_id: &str,
    params: &UpdateAnalysisParams,
) -> Result<DocumentAnalysis, AppError> {
    let now = Utc::now().to_rfc3339();
    let updated = sqlx::query(
        "UPDATE document_analyses SET
            status = $1, result = $2, error = $3, updated_at = $4
        WHERE id = $5",
    )
    .bind(&params.status)
    .bind(params.result.as_ref().map(Value::to_string))
    .bind(&params.error)
    .bind(&now)
    .bind(analysis_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::not_found(format!(
            "analysis not found: {analysis_id}"
        )));
    }

    get_analysis(conn, analysis_id).await
}

fn map_row_to_analysis(row: &AnyRow) -> Result<DocumentAnalysis, sqlx::Error> {
    let result = parse_json_column(row, "result")?;

    Ok(DocumentAnalysis {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        analysis_type: row.try_get("analysis_type")?,
        status: row.try_get("status")?,
        result,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
