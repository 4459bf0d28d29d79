//! Order Repository (read side)
//!
//! 订单的写路径都在 orders 模块（结算、回收、支付、履约），
//! 这里只有查询。

use crate::db::DbService;
use crate::db::models::{Order, OrderDetail, OrderItem, OrderStatusHistory};
use crate::inventory::{InventoryError, InventoryResult};

pub struct OrderRepository {
    db: DbService,
}

impl OrderRepository {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    pub async fn find_by_user(&self, user_id: &str) -> InventoryResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(orders)
    }

    pub async fn find_by_id(&self, order_id: i64) -> InventoryResult<Order> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(InventoryError::OrderNotFound(order_id))
    }

    pub async fn find_detail(&self, order_id: i64) -> InventoryResult<OrderDetail> {
        let order = self.find_by_id(order_id).await?;
        let items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ?1")
                .bind(order_id)
                .fetch_all(&self.db.pool)
                .await?;
        let status_history = sqlx::query_as::<_, OrderStatusHistory>(
            "SELECT * FROM order_status_history WHERE order_id = ?1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(OrderDetail {
            order,
            items,
            status_history,
        })
    }
}
