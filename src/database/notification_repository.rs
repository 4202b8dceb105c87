use crate::database::error::DatabaseError;
use sqlx::PgPool;
use uuid::Uuid;

/// An in-app notification row to insert.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

/// Repository for the notifications table plus the user lookups the
/// dispatcher needs (admin fan-out, gift-card recipient resolution).
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: &NewNotification) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO notifications (user_id, type, title, message, link, is_read) \
             VALUES ($1, $2, $3, $4, $5, false)",
        )
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Ids of every operator/admin account, for refund fan-out.
    pub async fn find_admin_user_ids(&self) -> Result<Vec<Uuid>, DatabaseError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE role = 'admin'")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Resolve an email address to a user account, if one exists.
    pub async fn find_user_id_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(id,)| id))
    }
}
