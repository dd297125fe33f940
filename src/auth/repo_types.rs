use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String, // unique, enforced by the store
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash, never serialized
    pub created_at: OffsetDateTime,
}
