//! The `clauses` and `clause_risks` entities.

use chrono::Utc;
use contractai_types::{AppError, ErrorKind, JsonMap, RiskLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row};

use crate::{ensure_clause_exists, ensure_document_exists, new_entity_id, parse_json_column};

/// A clause extracted from a document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clause {
    /// UUID v4, 36 chars.
    pub id: String,
    /// The source document.
    pub document_id: String,
    /// Clause category tag (e.g. `"indemnity"`, `"termination"`).
    pub clause_type: String,
    /// The extracted clause text.
    pub text: String,
    /// Start offset into the document's extracted text, in characters.
    pub start_offset: Option<i64>,
    /// End offset into the document's extracted text, in characters.
    pub end_offset: Option<i64>,
    /// Extraction confidence on a 0–100 scale.
    pub confidence: Option<i64>,
    /// Opaque metadata map filled by the extractor.
    pub metadata: Option<Value>,
    /// Creation timestamp (ISO 8601 UTC).
    pub created_at: String,
}

/// A risk attached to a clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClauseRisk {
    /// UUID v4, 36 chars.
    pub id: String,
    /// The clause this risk belongs to.
    pub clause_id: String,
    /// Risk category tag (e.g. `"liability"`).
    pub risk_type: String,
    /// Human-readable description of the exposure.
    pub description: String,
    /// Severity level.
    pub severity: RiskLevel,
    /// Expected impact if the risk materializes.
    pub impact: Option<String>,
    /// Suggested mitigation.
    pub mitigation: Option<String>,
    /// Opaque metadata map filled by the scorer.
    pub metadata: Option<Value>,
    /// Creation timestamp (ISO 8601 UTC).
    pub created_at: String,
}

/// Parameters for recording an extracted clause.
#[derive(Debug, Clone, Default)]
pub struct CreateClauseParams {
    /// Identifier to use; generated when absent.
    pub id: Option<String>,
    /// The source document; must exist.
    pub document_id: String,
    pub clause_type: String,
    pub text: String,
    pub start_offset: Option<i64>,
    pub end_offset: Option<i64>,
    /// Extraction confidence; must be within 0–100 when present.
    pub confidence: Option<i64>,
    pub metadata: Option<Value>,
}

/// Parameters for recording a clause risk.
#[derive(Debug, Clone)]
pub struct CreateClauseRiskParams {
    /// Identifier to use; generated when absent.
    pub id: Option<String>,
    /// The clause this risk belongs to; must exist.
    pub clause_id: String,
    pub risk_type: String,
    pub description: String,
    pub severity: RiskLevel,
    pub impact: Option<String>,
    pub mitigation: Option<String>,
    pub metadata: Option<Value>,
}

const CLAUSE_COLUMNS: &str = "id, document_id, clause_type, text, start_offset, end_offset, \
     confidence, metadata, created_at";

const RISK_COLUMNS: &str = "id, clause_id, risk_type, description, severity, impact, \
     mitigation, metadata, created_at";

/// Records an extracted clause for an existing document.
///
/// Rejects a confidence score outside the 0–100 scale.
pub async fn create_clause(
    conn: &mut AnyConnection,
    params: &CreateClauseParams,
) -> Result<Clause, AppError> {
    let id = new_entity_id(params.id.clone())?;

    if let Some(confidence) = params.confidence {
        if !(0..=100).contains(&confidence) {
            let mut details = JsonMap::new();
            details.insert("confidence".to_string(), Value::from(confidence));
            return Err(AppError::new(
                ErrorKind::Validation,
                "confidence must be within the 0-100 scale",
                details,
            ));
        }
    }

    ensure_document_exists(conn, &params.document_id).await?;

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO clauses (
            id, document_id, clause_type, text, start_offset, end_offset,
            confidence, metadata, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&id)
    .bind(&params.document_id)
    .bind(&params.clause_type)
    .bind(&params.text)
    .bind(params.start_offset)
    .bind(params.end_offset)
    .bind(params.confidence)
    .bind(params.metadata.as_ref().map(Value::to_string))
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(clause_id = %id, document_id = %params.document_id, "clause recorded");

    Ok(Clause {
        id,
        document_id: params.document_id.clone(),
        clause_type: params.clause_type.clone(),
        text: params.text.clone(),
        start_offset: params.start_offset,
        end_offset: params.end_offset,
        confidence: params.confidence,
        metadata: params.metadata.clone(),
        created_at: now,
    })
}

/// Retrieves a clause by id.
pub async fn get_clause(conn: &mut AnyConnection, clause_id: &str) -> Result<Clause, AppError> {
    let row = sqlx::query(&format!("SELECT {CLAUSE_COLUMNS} FROM clauses WHERE id = $1"))
        .bind(clause_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(map_row_to_clause(&row)?),
        None => Err(AppError::not_found(format!("clause not found: {clause_id}"))),
    }
}

/// Lists a document's clauses in text order (by start offset, then id).
pub async fn list_clauses_for_document(
    conn: &mut AnyConnection,
    document_id: &str,
) -> Result<Vec<Clause>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {CLAUSE_COLUMNS} FROM clauses
         WHERE document_id = $1 ORDER BY start_offset ASC, id ASC"
    ))
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut clauses = Vec::with_capacity(rows.len());
    for row in &rows {
        clauses.push(map_row_to_clause(row)?);
    }
    Ok(clauses)
}

/// Deletes a clause and its risks inside one transaction.
pub async fn delete_clause(conn: &mut AnyConnection, clause_id: &str) -> Result<(), AppError> {
    let mut tx = conn.begin().await?;

    let risks = sqlx::query("DELETE FROM clause_risks WHERE clause_id = $1")
        .bind(clause_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM clauses WHERE id = $1")
        .bind(clause_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::not_found(format!("clause not found: {clause_id}")));
    }

    tx.commit().await?;
    tracing::debug!(clause_id = %clause_id, risks, "clause deleted");
    Ok(())
}

/// Records a risk for an existing clause.
pub async fn create_clause_risk(
    conn: &mut AnyConnection,
    params: &CreateClauseRiskParams,
) -> Result<ClauseRisk, AppError> {
    let id = new_entity_id(params.id.clone())?;
    ensure_clause_exists(conn, &params.clause_id).await?;

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO clause_risks (
            id, clause_id, risk_type, description, severity, impact,
            mitigation, metadata, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&id)
    .bind(&params.clause_id)
    .bind(&params.risk_type)
    .bind(&params.description)
    .bind(params.severity.as_str())
    .bind(&params.impact)
    .bind(&params.mitigation)
    .bind(params.metadata.as_ref().map(Value::to_string))
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        risk_id = %id,
        clause_id = %params.clause_id,
        severity = %params.severity,
        "clause risk recorded"
    );

    Ok(ClauseRisk {
        id,
        clause_id: params.clause_id.clone(),
        risk_type: params.risk_type.clone(),
        description: params.description.clone(),
        severity: params.severity,
        impact: params.impact.clone(),
        mitigation: params.mitigation.clone(),
        metadata: params.metadata.clone(),
        created_at: now,
    })
}

/// Retrieves a clause risk by id.
pub async fn get_clause_risk(
    conn: &mut AnyConnection,
    risk_id: &str,
) -> Result<ClauseRisk, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {RISK_COLUMNS} FROM clause_risks WHERE id = $1"
    ))
    .bind(risk_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(map_row_to_risk(&row)?),
        None => Err(AppError::not_found(format!(
            "clause risk not found: {risk_id}"
        ))),
    }
}

/// Lists a clause's risks, most severe first.
pub async fn list_risks_for_clause(
    conn: &mut AnyConnection,
    clause_id: &str,
) -> Result<Vec<ClauseRisk>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {RISK_COLUMNS} FROM clause_risks WHERE clause_id = $1"
    ))
    .bind(clause_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut risks = Vec::with_capacity(rows.len());
    for row in &rows {
        risks.push(map_row_to_risk(row)?);
    }
    risks.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.id.cmp(&b.id)));
    Ok(risks)
}

fn map_row_to_clause(row: &AnyRow) -> Result<Clause, sqlx::Error> {
    let metadata = parse_json_column(row, "metadata")?;

    Ok(Clause {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        clause_type: row.try_get("clause_type")?,
        text: row.try_get("text")?,
        start_offset: row.try_get("start_offset")?,
        end_offset: row.try_get("end_offset")?,
        confidence: row.try_get("confidence")?,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

fn map_row_to_risk(row: &AnyRow) -> Result<ClauseRisk, sqlx::Error> {
    let severity_raw: String = row.try_get("severity")?;
    let severity = RiskLevel::parse(&severity_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "severity".to_string(),
        source: format!("unknown risk severity: {severity_raw:?}").into(),
    })?;
    let metadata = parse_json_column(row, "metadata")?;

    Ok(ClauseRisk {
        id: row.try_get("id")?,
        clause_id: row.try_get("clause_id")?,
        risk_type: row.try_get("risk_type")?,
        description: row.try_get("description")?,
        severity,
        impact: row.try_get("impact")?,
        mitigation: row.try_get("mitigation")?,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}
