//! Contract documents and their derived analysis artifacts.
//!
//! Implements the `documents`, `document_analyses`, `clauses`, and
//! `clause_risks` entities: CRUD, parent-existence checks at write time,
//! and the explicit per-parent cascade routines.
//!
//! # Cascade rules
//!
//! - Deleting a document removes its analyses and the document row.
//!   Clause rows deliberately survive their document (see
//!   [`delete_document`]); callers that want a full purge go through the
//!   owning user's delete instead.
//! - Deleting a clause removes its risks and the clause row.

use contractai_types::{AppError, ErrorKind, JsonMap};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

mod analysis;
mod clause;
mod document;

pub use analysis::{
    create_analysis, get_analysis, list_analyses_for_document, update_analysis,
    CreateAnalysisParams, DocumentAnalysis, UpdateAnalysisParams,
};
pub use clause::{
    create_clause, create_clause_risk, delete_clause, get_clause, get_clause_risk,
    list_clauses_for_document, list_risks_for_clause, Clause, ClauseRisk, CreateClauseParams,
    CreateClauseRiskParams,
};
pub use document::{
    create_document, delete_document, get_document, list_documents_for_user, update_document,
    CreateDocumentParams, Document, UpdateDocumentParams,
};


/// Validates a caller-supplied identifier, or generates a fresh UUID v4.
pub(crate) fn new_entity_id(supplied: Option<String>) -> Result<String, AppError> {
    match supplied {
        None => Ok(uuid::Uuid::new_v4().to_string()),
        Some(id) if id.len() == 36 => Ok(id),
        Some(id) => {
            let mut details = JsonMap::new();
            details.insert("id".to_string(), Value::String(id));
            Err(AppError::new(
                ErrorKind::Validation,
                "identifiers must be 36-character strings",
                details,
            ))
        }
    }
}

/// Decodes a TEXT column holding serialized JSON.
pub(crate) fn parse_json_column(row: &AnyRow, column: &str) -> Result<Option<Value>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

/// Fails with a not-found error unless the referenced user exists.
pub(crate) async fn ensure_user_exists(
    conn: &mut AnyConnection,
    user_id: &str,
) -> Result<(), AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if count == 0 {
        return Err(AppError::not_found(format!("user not found: {user_id}")));
    }
    Ok(())
}

/// Fails with a not-found error unless the referenced document exists.
pub(crate) async fn ensure_document_exists(
    conn: &mut AnyConnection,
    document_id: &str,
) -> Result<(), AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = $1")
        .bind(document_id)
        .fetch_one(&mut *conn)
        .await?;
    if count == 0 {
        return Err(AppError::not_found(format!(
            "document not found: {document_id}"
        )));
    }
    Ok(())
}

/// Fails with a not-found error unless the referenced clause exists.
pub(crate) async fn ensure_clause_exists(
    conn: &mut AnyConnection,
    clause_id: &str,
) -> Result<(), AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clauses WHERE id = $1")
        .bind(clause_id)
        .fetch_one(&mut *conn)
        .await?;
    if count == 0 {
        return Err(AppError::not_found(format!("clause not found: {clause_id}")));
    }
    Ok(())
}
