//! Owner repository.
//!
//! Owners are created by the account flow and read on every room request
//! (by slug). The lifecycle code never mutates them.

use crate::errors::RoomError;
use crate::models::Owner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::OwnerId;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Fields required to create an owner.
#[derive(Clone)]
pub struct NewOwner {
    pub email: String,
    pub display_name: String,
    pub slug: String,
    /// Already-encrypted credential.
    pub credential: String,
}

/// Owner persistence operations.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    /// Look up the owner of a room slug.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Owner>, RoomError>;

    /// Look up an owner by login email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Owner>, RoomError>;

    /// All taken slugs starting with `prefix` (used for slug allocation).
    async fn slugs_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RoomError>;

    /// Create an owner.
    async fn insert_owner(&self, owner: NewOwner) -> Result<Owner, RoomError>;

    /// Replace an owner's encrypted credential.
    async fn update_credential(&self, owner_id: OwnerId, credential: &str)
        -> Result<(), RoomError>;

    /// Check store connectivity.
    async fn ping(&self) -> Result<(), RoomError>;
}

/// Owner row as stored in PostgreSQL.
#[derive(sqlx::FromRow)]
struct OwnerRow {
    owner_id: Uuid,
    email: String,
    display_name: String,
    slug: String,
    credential_enc: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OwnerRow> for Owner {
    fn from(row: OwnerRow) -> Self {
        Owner {
            owner_id: OwnerId(row.owner_id),
            email: row.email,
            display_name: row.display_name,
            slug: row.slug,
            credential: row.credential_enc,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed owner store.
#[derive(Clone)]
pub struct PgOwnersRepository {
    pool: PgPool,
}

impl PgOwnersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnerStore for PgOwnersRepository {
    #[instrument(skip_all, fields(slug = %slug))]
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Owner>, RoomError> {
        let row = sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT owner_id, email, display_name, slug, credential_enc, created_at, updated_at
            FROM owners
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to fetch owner by slug: {}", e)))?;

        Ok(row.map(Owner::from))
    }

    #[instrument(skip_all)]
    async fn find_by_email(&self, email: &str) -> Result<Option<Owner>, RoomError> {
        let row = sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT owner_id, email, display_name, slug, credential_enc, created_at, updated_at
            FROM owners
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to fetch owner by email: {}", e)))?;

        Ok(row.map(Owner::from))
    }

    #[instrument(skip_all, fields(prefix = %prefix))]
    async fn slugs_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RoomError> {
        // Slugs never contain LIKE metacharacters, so the prefix needs no escaping.
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT slug FROM owners WHERE slug LIKE $1 || '%'
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to list slugs: {}", e)))?;

        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    #[instrument(skip_all, fields(slug = %owner.slug))]
    async fn insert_owner(&self, owner: NewOwner) -> Result<Owner, RoomError> {
        let row = sqlx::query_as::<_, OwnerRow>(
            r#"
            INSERT INTO owners (owner_id, email, display_name, slug, credential_enc)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING owner_id, email, display_name, slug, credential_enc, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&owner.email)
        .bind(&owner.display_name)
        .bind(&owner.slug)
        .bind(&owner.credential)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to insert owner: {}", e)))?;

        Ok(row.into())
    }

    #[instrument(skip_all, fields(owner_id = %owner_id))]
    async fn update_credential(
        &self,
        owner_id: OwnerId,
        credential: &str,
    ) -> Result<(), RoomError> {
        let result = sqlx::query(
            r#"
            UPDATE owners
            SET credential_enc = $2, updated_at = NOW()
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id.0)
        .bind(credential)
        .execute(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to update credential: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(RoomError::NotFound("Owner not found".to_string()));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), RoomError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
