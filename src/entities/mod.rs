pub mod dispatcher;
pub mod inventory_level;
pub mod order;
pub mod order_item;
pub mod sales_agent;
