use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order lifecycle. Exactly one status holds at any time.
///
/// `PendingPreference` covers the window between committing the stock
/// reservation and persisting the gateway checkout session; the order flips
/// to `PendingPayment` once the session id is stored.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPreference,
    PendingPayment,
    Paid,
    Failed,
    Shipped,
}

impl OrderStatus {
    /// Stock has been reserved but payment never completed; a failure
    /// transition from here must release the reservation.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, Self::PendingPreference | Self::PendingPayment)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,

    pub status: String,
    pub total_amount: Decimal,
    pub currency: String,

    pub payment_method: Option<String>,
    /// External checkout-session id returned by the gateway.
    pub preference_id: Option<String>,
    /// External payment id, mirrored from notifications.
    pub payment_id: Option<String>,
    /// Raw gateway status vocabulary, mirrored as-is.
    pub gateway_status: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,

    pub shipping_method: Option<String>,
    pub shipping_cost: Decimal,
    pub tracking_number: Option<String>,

    pub referral_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(
        belongs_to = "super::sales_agent::Entity",
        from = "Column::ReferralCode",
        to = "super::sales_agent::Column::Code"
    )]
    SalesAgent,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::sales_agent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesAgent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn parsed_status(&self) -> Result<OrderStatus, DbErr> {
        self.status
            .parse()
            .map_err(|_| DbErr::Custom(format!("unknown order status '{}'", self.status)))
    }
}
