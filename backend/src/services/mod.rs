//! Business logic services for the Manufacturing Order Workflow

pub mod catalog;
pub mod documents;
pub mod orders;
pub mod stage_data;
pub mod workflow;

pub use documents::DocumentService;
pub use orders::OrderService;
pub use workflow::WorkflowService;
