//! Domain models for the manufacturing order workflow

mod document;
mod formula;
mod order;
mod stage;
mod stage_data;

pub use document::*;
pub use formula::*;
pub use order::*;
pub use stage::*;
pub use stage_data::*;
