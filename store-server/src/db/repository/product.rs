//! Product Repository

use crate::db::DbService;
use crate::db::models::{LedgerEntryType, Product, ProductCreate, ProductUpdate};
use crate::inventory::{self, InventoryError, InventoryResult};
use crate::utils::now_millis;

pub struct ProductRepository {
    db: DbService,
}

impl ProductRepository {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    pub async fn find_all_active(&self) -> InventoryResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM product WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(products)
    }

    pub async fn find_by_id(&self, id: i64) -> InventoryResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(InventoryError::ProductNotFound(id))
    }

    /// Create a product. The initial stock goes through the mutator and is
    /// ledgered as `restock`, so a brand-new product reconciles from entry one.
    pub async fn create(&self, payload: ProductCreate, actor: &str) -> InventoryResult<Product> {
        if payload.name.trim().is_empty() {
            return Err(InventoryError::Validation("product name is required".into()));
        }
        if payload.price < 0.0 || payload.stock < 0 {
            return Err(InventoryError::Validation(
                "price and stock must be non-negative".into(),
            ));
        }
        if payload.reservation_minutes <= 0 {
            return Err(InventoryError::Validation(
                "reservation_minutes must be positive".into(),
            ));
        }

        let now = now_millis();
        let mut tx = self.db.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO product \
             (name, price, stock, reservation_minutes, quota_limit, is_active, created_at, updated_at) \
             VALUES (?1, ?2, 0, ?3, ?4, 1, ?5, ?5) RETURNING id",
        )
        .bind(&payload.name)
        .bind(payload.price)
        .bind(payload.reservation_minutes)
        .bind(payload.quota_limit)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if payload.stock > 0 {
            let change = inventory::try_adjust(&mut *tx, id, payload.stock).await?;
            inventory::ledger::record(
                &mut *tx,
                &change,
                LedgerEntryType::Restock,
                None,
                Some(actor),
                Some("initial stock"),
            )
            .await?;
        }

        let product = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(product_id = id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Update catalog fields. Stock is deliberately absent from the payload.
    pub async fn update(&self, id: i64, payload: ProductUpdate) -> InventoryResult<Product> {
        let mut tx = self.db.pool.begin().await?;
        let current = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(InventoryError::ProductNotFound(id))?;

        let name = payload.name.unwrap_or(current.name);
        let price = payload.price.unwrap_or(current.price);
        let reservation_minutes = payload
            .reservation_minutes
            .unwrap_or(current.reservation_minutes);
        let quota_limit = payload.quota_limit.unwrap_or(current.quota_limit);
        let is_active = payload.is_active.unwrap_or(current.is_active);

        if reservation_minutes <= 0 {
            return Err(InventoryError::Validation(
                "reservation_minutes must be positive".into(),
            ));
        }

        sqlx::query(
            "UPDATE product SET name = ?1, price = ?2, reservation_minutes = ?3, \
             quota_limit = ?4, is_active = ?5, updated_at = ?6 WHERE id = ?7",
        )
        .bind(&name)
        .bind(price)
        .bind(reservation_minutes)
        .bind(quota_limit)
        .bind(is_active)
        .bind(now_millis())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let product = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::in_memory_db;

    fn payload(name: &str, price: f64, stock: i64) -> ProductCreate {
        ProductCreate {
            name: name.to_string(),
            price,
            stock,
            reservation_minutes: 30,
            quota_limit: 0,
        }
    }

    #[tokio::test]
    async fn test_create_ledgers_initial_stock() {
        let db = in_memory_db().await;
        let repo = ProductRepository::new(db.clone());

        let product = repo.create(payload("Widget", 9.9, 7), "admin-1").await.unwrap();
        assert_eq!(product.stock, 7);
        assert!(product.is_active);

        let entries: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_ledger WHERE product_id = ?1 AND entry_type = 'restock'",
        )
        .bind(product.id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_update_cannot_touch_stock() {
        let db = in_memory_db().await;
        let repo = ProductRepository::new(db.clone());
        let product = repo.create(payload("Widget", 9.9, 7), "admin-1").await.unwrap();

        let updated = repo
            .update(
                product.id,
                ProductUpdate {
                    price: Some(12.5),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 12.5);
        assert!(!updated.is_active);
        assert_eq!(updated.stock, 7);
    }

    #[tokio::test]
    async fn test_create_validates_payload() {
        let db = in_memory_db().await;
        let repo = ProductRepository::new(db.clone());
        assert!(repo.create(payload("", 1.0, 1), "admin-1").await.is_err());
        assert!(repo.create(payload("X", -1.0, 1), "admin-1").await.is_err());
        assert!(repo.create(payload("X", 1.0, -1), "admin-1").await.is_err());
    }
}
