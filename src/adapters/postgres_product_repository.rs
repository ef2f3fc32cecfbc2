//! Postgres implementation of ProductRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Product;
use crate::ports::{ProductRepository, RepositoryError, RepositoryResult};

/// Reads and flips listings through the service's own pool, never a caller-scoped one.
#[derive(Clone)]
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, is_available, seller_id FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(ProductRow::into_domain))
    }

    async fn reserve(&self, id: Uuid) -> RepositoryResult<bool> {
        // The availability predicate makes this a compare-and-swap: of two racing buyers
        // only one UPDATE can match the row.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_available = FALSE, updated_at = NOW()
            WHERE id = $1 AND is_available = TRUE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_available = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: BigDecimal,
    is_available: bool,
    seller_id: Uuid,
}

impl ProductRow {
    fn into_domain(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            price: self.price,
            is_available: self.is_available,
            seller_id: self.seller_id,
        }
    }
}
