//! The `documents` entity.

use chrono::Utc;
use contractai_types::{AppError, DocumentStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row};

use crate::{ensure_user_exists, new_entity_id, parse_json_column};

/// An uploaded contract file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// UUID v4, 36 chars.
    pub id: String,
    /// Display name, usually derived from the filename.
    pub name: String,
    /// Filename as uploaded by the user.
    pub original_filename: String,
    /// Path in the object-storage backend.
    pub file_path: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type as detected at upload time.
    pub mime_type: String,
    /// Processing lifecycle state.
    pub status: DocumentStatus,
    /// Extracted plain text, once the pipeline has produced it.
    pub text_content: Option<String>,
    /// Opaque metadata map filled by the pipeline.
    pub metadata: Option<Value>,
    /// Owning user.
    pub user_id: String,
    /// Creation timestamp (ISO 8601 UTC).
    pub created_at: String,
    /// Last modification timestamp (ISO 8601 UTC).
    pub updated_at: String,
}

/// Parameters for registering a freshly uploaded document.
///
/// New documents start in [`DocumentStatus::Uploaded`].
#[derive(Debug, Clone, Default)]
pub struct CreateDocumentParams {
    /// Identifier to use; generated when absent.
    pub id: Option<String>,
    pub name: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub metadata: Option<Value>,
    /// Owning user; must exist.
    pub user_id: String,
}

/// Full-row update of a document's mutable fields. The file identity
/// (path, size, MIME type) is fixed at upload time.
#[derive(Debug, Clone)]
pub struct UpdateDocumentParams {
    pub name: String,
    pub status: DocumentStatus,
    pub text_content: Option<String>,
    pub metadata: Option<Value>,
}

const DOCUMENT_COLUMNS: &str = "id, name, original_filename, file_path, file_size, mime_type, \
     status, text_content, metadata, user_id, created_at, updated_at";

/// Registers an uploaded document for an existing user.
pub async fn create_document(
    conn: &mut AnyConnection,
    params: &CreateDocumentParams,
) -> Result<Document, AppError> {
    let id = new_entity_id(params.id.clone())?;
    ensure_user_exists(conn, &params.user_id).await?;

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO documents (
            id, name, original_filename, file_path, file_size, mime_type,
            status, text_content, metadata, user_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(&id)
    .bind(&params.name)
    .bind(&params.original_filename)
    .bind(&params.file_path)
    .bind(params.file_size)
    .bind(&params.mime_type)
    .bind(DocumentStatus::Uploaded.as_str())
    .bind(None::<String>)
    .bind(params.metadata.as_ref().map(Value::to_string))
    .bind(&params.user_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(document_id = %id, user_id = %params.user_id, "document created");

    Ok(Document {
        id,
        name: params.name.clone(),
        original_filename: params.original_filename.clone(),
        file_path: params.file_path.clone(),
        file_size: params.file_size,
        mime_type: params.mime_type.clone(),
        status: DocumentStatus::Uploaded,
        text_content: None,
        metadata: params.metadata.clone(),
        user_id: params.user_id.clone(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Retrieves a document by id.
pub async fn get_document(
    conn: &mut AnyConnection,
    document_id: &str,
) -> Result<Document, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
    ))
    .bind(document_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(map_row_to_document(&row)?),
        None => Err(AppError::not_found(format!(
            "document not found: {document_id}"
        ))),
    }
}

/// Lists a user's documents, newest first.
pub async fn list_documents_for_user(
    conn: &mut AnyConnection,
    user_id: &str,
) -> Result<Vec<Document>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents
         WHERE user_id = $1 ORDER BY created_at DESC, id ASC"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut documents = Vec::with_capacity(rows.len());
    for row in &rows {
        documents.push(map_row_to_document(row)?);
    }
    Ok(documents)
}

/// Replaces a document's mutable fields and refreshes `updated_at`.
pub async fn update_document(
    conn: &mut AnyConnection,
    document_id: &str,
    params: &UpdateDocumentParams,
) -> Result<Document, AppError> {
    let now = Utc::now().to_rfc3339();
    let updated = sqlx::query(
        "UPDATE documents SET
            name = $1, status = $2, text_content = $3, metadata = $4, updated_at = $5
        WHERE id = $6",
    )
    .bind(&params.name)
    .bind(params.status.as_str())
    .bind(&params.text_content)
    .bind(params.metadata.as_ref().map(Value::to_string))
    .bind(&now)
    .bind(document_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::not_found(format!(
            "document not found: {document_id}"
        )));
    }

    get_document(conn, document_id).await
}

/// Deletes a document and its analyses inside one transaction.
///
/// Clause rows referencing the document are left in place: the stored
/// schema has never removed clauses with their document, and existing
/// deployments depend on that exact behavior. A full purge happens only
/// through the owning user's delete.
pub async fn delete_document(
    conn: &mut AnyConnection,
    document_id: &str,
) -> Result<(), AppError> {
    let mut tx = conn.begin().await?;

    let analyses = sqlx::query("DELETE FROM document_analyses WHERE document_id = $1")
        .bind(document_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(document_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::not_found(format!(
            "document not found: {document_id}"
        )));
    }

    tx.commit().await?;
    tracing::debug!(document_id = %document_id, analyses, "document deleted");
    Ok(())
}

fn map_row_to_document(row: &AnyRow) -> Result<Document, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    let status = DocumentStatus::parse(&status_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: format!("unknown document status: {status_raw:?}").into(),
    })?;
    let metadata = parse_json_column(row, "metadata")?;

    Ok(Document {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        original_filename: row.try_get("original_filename")?,
        file_path: row.try_get("file_path")?,
        file_size: row.try_get("file_size")?,
        mime_type: row.try_get("mime_type")?,
        status,
        text_content: row.try_get("text_content")?,
        metadata,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
