//! HTTP request handlers

pub mod health;
pub mod orders;
pub mod stages;

pub use health::health_check;
pub use orders::{create_order, delete_order, get_order, get_order_report, update_order};
pub use stages::{list_stage_documents, list_stages, submit_stage_update};
