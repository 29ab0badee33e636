//! User accounts for the ContractAI platform.
//!
//! Implements user CRUD, email and API-key lookups, last-login tracking,
//! and the cascading delete that purges every artifact a user owns:
//! documents, their analyses, their clauses, and the clauses' risks, all
//! inside one transaction.
//!
//! Credential *hashing* happens in the authentication component; this
//! crate only stores and returns the hashed value.

use chrono::{DateTime, Utc};
use contractai_types::{AppError, ErrorKind, JsonMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row};

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// UUID v4, 36 chars.
    pub id: String,
    /// Login email, unique across the platform.
    pub email: String,
    /// Hashed credential, produced by the authentication component.
    pub hashed_password: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Inactive users cannot authenticate.
    pub is_active: bool,
    /// Superusers bypass per-document authorization.
    pub is_superuser: bool,
    /// Company name, free-form profile field.
    pub company: Option<String>,
    /// Job title, free-form profile field.
    pub job_title: Option<String>,
    /// Phone number, free-form profile field.
    pub phone: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Opaque preference map, owned by the frontend.
    pub preferences: Option<Value>,
    /// Programmatic access key, unique when present.
    pub api_key: Option<String>,
    /// API key expiry (ISO 8601 UTC).
    pub api_key_expires_at: Option<String>,
    /// Creation timestamp (ISO 8601 UTC).
    pub created_at: String,
    /// Last modification timestamp (ISO 8601 UTC).
    pub updated_at: String,
    /// Last successful login (ISO 8601 UTC).
    pub last_login_at: Option<String>,
}

/// Parameters for creating a new user.
///
/// New users start active and without superuser rights; both flags are
/// changed through [`update_user`].
#[derive(Debug, Clone, Default)]
pub struct CreateUserParams {
    /// Identifier to use; generated when absent.
    pub id: Option<String>,
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub preferences: Option<Value>,
    pub api_key: Option<String>,
    pub api_key_expires_at: Option<String>,
}

/// Full-row update of a user's mutable fields. There is no partial
/// update: callers read the row, change what they need, and write the
/// whole thing back.
#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub preferences: Option<Value>,
    pub api_key: Option<String>,
    pub api_key_expires_at: Option<String>,
}

const USER_COLUMNS: &str = "id, email, hashed_password, full_name, is_active, is_superuser, \
     company, job_title, phone, avatar_url, preferences, api_key, api_key_expires_at, \
     created_at, updated_at, last_login_at";

/// Creates a new user.
///
/// Rejects a duplicate email with a validation error and generates the
/// identifier when the caller does not supply one.
pub async fn create_user(
    conn: &mut AnyConnection,
    params: &CreateUserParams,
) -> Result<User, AppError> {
    let id = new_entity_id(params.id.clone())?;

    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&params.email)
        .fetch_one(&mut *conn)
        .await?;
    if taken > 0 {
        let mut details = JsonMap::new();
        details.insert("email".to_string(), Value::String(params.email.clone()));
        return Err(AppError::new(
            ErrorKind::Validation,
            "email is already registered",
            details,
        ));
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (
            id, email, hashed_password, full_name, is_active, is_superuser,
            company, job_title, phone, avatar_url, preferences, api_key,
            api_key_expires_at, created_at, updated_at, last_login_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(&id)
    .bind(&params.email)
    .bind(&params.hashed_password)
    .bind(&params.full_name)
    .bind(1_i64)
    .bind(0_i64)
    .bind(&params.company)
    .bind(&params.job_title)
    .bind(&params.phone)
    .bind(&params.avatar_url)
    .bind(params.preferences.as_ref().map(Value::to_string))
    .bind(&params.api_key)
    .bind(&params.api_key_expires_at)
    .bind(&now)
    .bind(&now)
    .bind(None::<String>)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(user_id = %id, "user created");

    Ok(User {
        id,
        email: params.email.clone(),
        hashed_password: params.hashed_password.clone(),
        full_name: params.full_name.clone(),
        is_active: true,
        is_superuser: false,
        company: params.company.clone(),
        job_title: params.job_title.clone(),
        phone: params.phone.clone(),
        avatar_url: params.avatar_url.clone(),
        preferences: params.preferences.clone(),
        api_key: params.api_key.clone(),
        api_key_expires_at: params.api_key_expires_at.clone(),
        created_at: now.clone(),
        updated_at: now,
        last_login_at: None,
    })
}

/// Retrieves a user by id.
pub async fn get_user(conn: &mut AnyConnection, user_id: &str) -> Result<User, AppError> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(map_row_to_user(&row)?),
        None => Err(AppError::not_found(format!("user not found: {user_id}"))),
    }
}

/// Retrieves a user by email.
pub async fn get_user_by_email(conn: &mut AnyConnection, email: &str) -> Result<User, AppError> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(map_row_to_user(&row)?),
        None => Err(AppError::not_found(format!("user not found: {email}"))),
    }
}

/// Retrieves a user by API key.
///
/// A key past its expiry authenticates nobody: the lookup fails with an
/// authentication error rather than returning the user.
pub async fn get_user_by_api_key(
    conn: &mut AnyConnection,
    api_key: &str,
) -> Result<User, AppError> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE api_key = $1"))
        .bind(api_key)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Err(AppError::not_found("no user with the supplied API key"));
    };
    let user = map_row_to_user(&row)?;

    if let Some(expires_at) = &user.api_key_expires_at {
        let expired = match DateTime::parse_from_rfc3339(expires_at) {
            Ok(expiry) => expiry <= Utc::now(),
            // An unreadable expiry never grants access.
            Err(_) => true,
        };
        if expired {
            let mut details = JsonMap::new();
            details.insert(
                "expires_at".to_string(),
                Value::String(expires_at.clone()),
            );
            return Err(AppError::new(
                ErrorKind::Authentication,
                "API key has expired",
                details,
            ));
        }
    }

    Ok(user)
}

/// Lists all users, oldest first.
pub async fn list_users(conn: &mut AnyConnection) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
    ))
    .fetch_all(&mut *conn)
    .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        users.push(map_row_to_user(row)?);
    }
    Ok(users)
}

/// Replaces a user's mutable fields and refreshes `updated_at`.
pub async fn update_user(
    conn: &mut AnyConnection,
    user_id: &str,
    params: &UpdateUserParams,
) -> Result<User, AppError> {
    let taken: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1 AND id <> $2")
            .bind(&params.email)
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
    if taken > 0 {
        let mut details = JsonMap::new();
        details.insert("email".to_string(), Value::String(params.email.clone()));
        return Err(AppError::new(
            ErrorKind::Validation,
            "email is already registered",
            details,
        ));
    }

    let now = Utc::now().to_rfc3339();
    let updated = sqlx::query(
        "UPDATE users SET
            email = $1, hashed_password = $2, full_name = $3, is_active = $4,
            is_superuser = $5, company = $6, job_title = $7, phone = $8,
            avatar_url = $9, preferences = $10, api_key = $11,
            api_key_expires_at = $12, updated_at = $13
        WHERE id = $14",
    )
    .bind(&params.email)
    .bind(&params.hashed_password)
    .bind(&params.full_name)
    .bind(i64::from(params.is_active))
    .bind(i64::from(params.is_superuser))
    .bind(&params.company)
    .bind(&params.job_title)
    .bind(&params.phone)
    .bind(&params.avatar_url)
    .bind(params.preferences.as_ref().map(Value::to_string))
    .bind(&params.api_key)
    .bind(&params.api_key_expires_at)
    .bind(&now)
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::not_found(format!("user not found: {user_id}")));
    }

    get_user(conn, user_id).await
}

/// Records a successful login.
pub async fn touch_last_login(conn: &mut AnyConnection, user_id: &str) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    let updated = sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $2 WHERE id = $3")
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::not_found(format!("user not found: {user_id}")));
    }
    Ok(())
}

/// Deletes a user and everything the user owns.
///
/// Runs inside one transaction and removes, in dependency order: clause
/// risks, clauses, document analyses, documents, and finally the user row.
pub async fn delete_user(conn: &mut AnyConnection, user_id: &str) -> Result<(), AppError> {
    let mut tx = conn.begin().await?;

    sqlx::query(
        "DELETE FROM clause_risks WHERE clause_id IN (
            SELECT id FROM clauses WHERE document_id IN (
                SELECT id FROM documents WHERE user_id = $1))",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM clauses WHERE document_id IN (
            SELECT id FROM documents WHERE user_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM document_analyses WHERE document_id IN (
            SELECT id FROM documents WHERE user_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let documents = sqlx::query("DELETE FROM documents WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::not_found(format!("user not found: {user_id}")));
    }

    tx.commit().await?;
    tracing::debug!(user_id = %user_id, documents, "user deleted");
    Ok(())
}

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

fn map_row_to_user(row: &AnyRow) -> Result<User, sqlx::Error> {
    let is_active: i64 = row.try_get("is_active")?;
    let is_superuser: i64 = row.try_get("is_superuser")?;
    let preferences = parse_json_column(row, "preferences")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        hashed_password: row.try_get("hashed_password")?,
        full_name: row.try_get("full_name")?,
        is_active: is_active != 0,
        is_superuser: is_superuser != 0,
        company: row.try_get("company")?,
        job_title: row.try_get("job_title")?,
        phone: row.try_get("phone")?,
        avatar_url: row.try_get("avatar_url")?,
        preferences,
        api_key: row.try_get("api_key")?,
        api_key_expires_at: row.try_get("api_key_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_login_at: row.try_get("last_login_at")?,
    })
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

#[cfg(test)]
mod tests {
    use super::*;
    use contractai_db::{acquire, create_pool, init_db, DbPool, PoolSettings};
    use serde_json::json;

    async fn setup_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("contractai.db").display()
        );
        let pool = create_pool(&url, PoolSettings::default())
            .await
            .expect("should create pool");
        init_db(&pool).await.expect("should run migrations");
        (dir, pool)
    }

    fn alice() -> CreateUserParams {
        CreateUserParams {
            email: "alice@example.com".to_string(),
            hashed_password: "$argon2id$stub".to_string(),
            full_name: Some("Alice Example".to_string()),
            preferences: Some(json!({"theme": "dark"})),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn user_crud() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let created = create_user(&mut conn, &alice()).await.expect("create failed");
        assert_eq!(created.id.len(), 36);
        assert!(created.is_active);
        assert!(!created.is_superuser);
        assert_eq!(created.preferences, Some(json!({"theme": "dark"})));

        let fetched = get_user(&mut conn, &created.id).await.expect("get failed");
        assert_eq!(fetched, created);

        let listed = list_users(&mut conn).await.expect("list failed");
        assert_eq!(listed.len(), 1);

        let updated = update_user(
            &mut conn,
            &created.id,
            &UpdateUserParams {
                email: "alice@corp.example.com".to_string(),
                hashed_password: created.hashed_password.clone(),
                full_name: created.full_name.clone(),
                is_active: true,
                is_superuser: true,
                company: Some("Example Corp".to_string()),
                job_title: Some("Counsel".to_string()),
                phone: None,
                avatar_url: None,
                preferences: created.preferences.clone(),
                api_key: None,
                api_key_expires_at: None,
            },
        )
        .await
        .expect("update failed");
        assert_eq!(updated.email, "alice@corp.example.com");
        assert!(updated.is_superuser);
        assert_eq!(updated.company.as_deref(), Some("Example Corp"));
        assert!(updated.updated_at >= updated.created_at);

        delete_user(&mut conn, &created.id).await.expect("delete failed");
        let err = get_user(&mut conn, &created.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn supplied_id_is_kept_and_validated() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let mut params = alice();
        params.id = Some(id.clone());
        let created = create_user(&mut conn, &params).await.expect("create failed");
        assert_eq!(created.id, id);

        let mut params = alice();
        params.email = "bob@example.com".to_string();
        params.id = Some("short".to_string());
        let err = create_user(&mut conn, &params).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        create_user(&mut conn, &alice()).await.expect("create failed");
        let err = create_user(&mut conn, &alice()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.details["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn email_lookup() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let created = create_user(&mut conn, &alice()).await.unwrap();
        let fetched = get_user_by_email(&mut conn, "alice@example.com")
            .await
            .expect("lookup failed");
        assert_eq!(fetched.id, created.id);

        let err = get_user_by_email(&mut conn, "nobody@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn api_key_lookup_honors_expiry() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let mut params = alice();
        params.api_key = Some("live-key".to_string());
        params.api_key_expires_at =
            Some((Utc::now() + chrono::Duration::days(1)).to_rfc3339());
        let created = create_user(&mut conn, &params).await.unwrap();

        let fetched = get_user_by_api_key(&mut conn, "live-key")
            .await
            .expect("valid key should resolve");
        assert_eq!(fetched.id, created.id);

        let mut params = alice();
        params.email = "bob@example.com".to_string();
        params.api_key = Some("stale-key".to_string());
        params.api_key_expires_at =
            Some((Utc::now() - chrono::Duration::days(1)).to_rfc3339());
        create_user(&mut conn, &params).await.unwrap();

        let err = get_user_by_api_key(&mut conn, "stale-key").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);

        let err = get_user_by_api_key(&mut conn, "no-such-key").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn touch_last_login_sets_timestamp() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let created = create_user(&mut conn, &alice()).await.unwrap();
        assert!(created.last_login_at.is_none());

        touch_last_login(&mut conn, &created.id).await.expect("touch failed");
        let fetched = get_user(&mut conn, &created.id).await.unwrap();
        assert!(fetched.last_login_at.is_some());
        assert!(fetched.updated_at >= fetched.created_at);

        let err = touch_last_login(&mut conn, "0000-missing").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_user_purges_owned_artifacts() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let user = create_user(&mut conn, &alice()).await.unwrap();
        let now = Utc::now().to_rfc3339();

        // Two documents with an analysis, a clause, and a clause risk each.
        for n in 0..2 {
            let doc_id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO documents (id, name, original_filename, file_path, file_size,
                    mime_type, status, user_id, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, 'uploaded', $7, $8, $8)",
            )
            .bind(&doc_id)
            .bind(format!("contract-{n}"))
            .bind(format!("contract-{n}.pdf"))
            .bind(format!("/files/contract-{n}.pdf"))
            .bind(1024_i64)
            .bind("application/pdf")
            .bind(&user.id)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .unwrap();

            sqlx::query(
                "INSERT INTO document_analyses (id, document_id, analysis_type, status,
                    created_at, updated_at)
                 VALUES ($1, $2, 'full', 'pending', $3, $3)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&doc_id)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .unwrap();

            let clause_id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO clauses (id, document_id, clause_type, text, created_at)
                 VALUES ($1, $2, 'indemnity', 'the parties agree', $3)",
            )
            .bind(&clause_id)
            .bind(&doc_id)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .unwrap();

            sqlx::query(
                "INSERT INTO clause_risks (id, clause_id, risk_type, description, severity,
                    created_at)
                 VALUES ($1, $2, 'liability', 'uncapped indemnity', 'high', $3)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&clause_id)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .unwrap();
        }

        delete_user(&mut conn, &user.id).await.expect("delete failed");

        for table in ["documents", "document_analyses", "clauses", "clause_risks", "users"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty after the purge");
        }
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let err = delete_user(&mut conn, "does-not-exist").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn serialization_round_trips() {
        let (_dir, pool) = setup_pool().await;
        let mut conn = acquire(&pool).await.unwrap();

        let mut params = alice();
        params.api_key = Some("key".to_string());
        let created = create_user(&mut conn, &params).await.unwrap();

        let encoded = serde_json::to_string(&created).unwrap();
        let decoded: User = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, created);
        assert!(decoded.created_at.contains('T'), "timestamps stay ISO 8601");
    }
}
