use crate::database::error::DatabaseError;
use crate::services::stores::GiftCardStore;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Gift card entity. The balance is only ever increased by the refund
/// compensation path.
#[derive(Debug, Clone, FromRow)]
pub struct GiftCard {
    pub id: Uuid,
    pub code: String,
    pub current_balance: BigDecimal,
    pub recipient_email: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

const GIFT_CARD_COLUMNS: &str = "id, code, current_balance, recipient_email, updated_at";

/// Repository for the gift_cards table
pub struct GiftCardRepository {
    pool: PgPool,
}

impl GiftCardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<GiftCard>, DatabaseError> {
        sqlx::query_as::<_, GiftCard>(&format!(
            "SELECT {GIFT_CARD_COLUMNS} FROM gift_cards WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Atomically increase the card's balance by `amount`.
    pub async fn credit_balance(
        &self,
        code: &str,
        amount: &BigDecimal,
    ) -> Result<GiftCard, DatabaseError> {
        sqlx::query_as::<_, GiftCard>(&format!(
            "UPDATE gift_cards \
             SET current_balance = current_balance + $2, updated_at = NOW() \
             WHERE code = $1 \
             RETURNING {GIFT_CARD_COLUMNS}",
        ))
        .bind(code)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("gift card", code.to_string()))
    }
}

#[async_trait]
impl GiftCardStore for GiftCardRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<GiftCard>, DatabaseError> {
        GiftCardRepository::find_by_code(self, code).await
    }

    async fn credit_balance(
        &self,
        code: &str,
        amount: &BigDecimal,
    ) -> Result<GiftCard, DatabaseError> {
        GiftCardRepository::credit_balance(self, code, amount).await
    }
}
