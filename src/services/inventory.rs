use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use tracing::{info, instrument, warn};

use crate::entities::inventory_level::{self, Entity as InventoryLevels};
use crate::errors::ServiceError;

/// Result of a conditional reservation. Insufficiency is a normal negative
/// outcome, not an error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    Insufficient { available: i32 },
}

/// The inventory ledger. The checkout and reconciliation workflows are the
/// only callers allowed to move stock, and only through `reserve`/`release`;
/// both operate on whatever connection (usually a transaction) the caller is
/// inside.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Current stock for one product; absent records read as zero.
    pub async fn get_stock(&self, product_id: &str) -> Result<i32, ServiceError> {
        Self::stock_on(&*self.db, product_id).await
    }

    /// Stock lookup on an arbitrary connection, so callers can observe levels
    /// inside their own transaction.
    pub async fn stock_on<C: ConnectionTrait>(
        conn: &C,
        product_id: &str,
    ) -> Result<i32, ServiceError> {
        let level = InventoryLevels::find_by_id(product_id.to_string())
            .one(conn)
            .await?;
        Ok(level.map(|l| l.stock).unwrap_or(0))
    }

    /// Bulk lookup; ids without a record map to zero.
    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    pub async fn stock_levels(
        &self,
        product_ids: &[String],
    ) -> Result<HashMap<String, i32>, ServiceError> {
        let found = InventoryLevels::find()
            .filter(inventory_level::Column::ProductId.is_in(product_ids.to_vec()))
            .all(&*self.db)
            .await?;

        let mut levels: HashMap<String, i32> =
            product_ids.iter().map(|id| (id.clone(), 0)).collect();
        for level in found {
            levels.insert(level.product_id, level.stock);
        }
        Ok(levels)
    }

    /// Upserts the absolute stock level (admin surface).
    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        product_id: &str,
        new_stock: i32,
    ) -> Result<inventory_level::Model, ServiceError> {
        if new_stock < 0 {
            return Err(ServiceError::InvalidInput(
                "stock must be a non-negative integer".to_string(),
            ));
        }

        let now = Utc::now();
        let updated = InventoryLevels::update_many()
            .col_expr(inventory_level::Column::Stock, Expr::value(new_stock))
            .col_expr(inventory_level::Column::UpdatedAt, Expr::value(now))
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        if updated.rows_affected == 0 {
            let model = inventory_level::ActiveModel {
                product_id: Set(product_id.to_string()),
                stock: Set(new_stock),
                updated_at: Set(now),
            };
            let inserted = model.insert(&*self.db).await?;
            info!(product_id, new_stock, "inventory record created");
            return Ok(inserted);
        }

        info!(product_id, new_stock, "inventory level set");
        InventoryLevels::find_by_id(product_id.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))
    }

    /// Atomically decrements stock iff `stock >= quantity` at the moment of
    /// the update. One conditional UPDATE, never read-then-write; safe under
    /// concurrent callers for the same product.
    pub async fn reserve<C: ConnectionTrait>(
        conn: &C,
        product_id: &str,
        quantity: i32,
    ) -> Result<ReserveOutcome, ServiceError> {
        let result = InventoryLevels::update_many()
            .col_expr(
                inventory_level::Column::Stock,
                Expr::col(inventory_level::Column::Stock).sub(quantity),
            )
            .col_expr(inventory_level::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .filter(inventory_level::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let available = Self::stock_on(conn, product_id).await?;
            return Ok(ReserveOutcome::Insufficient { available });
        }
        Ok(ReserveOutcome::Reserved)
    }

    /// Atomically increments stock, upserting the record when absent. Always
    /// succeeds; a lost race on the insert falls back to the increment.
    pub async fn release<C: ConnectionTrait>(
        conn: &C,
        product_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let result = InventoryLevels::update_many()
            .col_expr(
                inventory_level::Column::Stock,
                Expr::col(inventory_level::Column::Stock).add(quantity),
            )
            .col_expr(inventory_level::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .exec(conn)
            .await?;

        if result.rows_affected > 0 {
            return Ok(());
        }

        let model = inventory_level::ActiveModel {
            product_id: Set(product_id.to_string()),
            stock: Set(quantity),
            updated_at: Set(Utc::now()),
        };
        match model.insert(conn).await {
            Ok(_) => Ok(()),
            Err(insert_err) => {
                // Another caller inserted the record first; retry as an
                // increment.
                warn!(product_id, error = %insert_err, "release insert raced, retrying as increment");
                let retry = InventoryLevels::update_many()
                    .col_expr(
                        inventory_level::Column::Stock,
                        Expr::col(inventory_level::Column::Stock).add(quantity),
                    )
                    .col_expr(inventory_level::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(inventory_level::Column::ProductId.eq(product_id))
                    .exec(conn)
                    .await?;
                if retry.rows_affected == 0 {
                    return Err(ServiceError::InternalError(format!(
                        "failed to restore {} units of {}",
                        quantity, product_id
                    )));
                }
                Ok(())
            }
        }
    }
}
