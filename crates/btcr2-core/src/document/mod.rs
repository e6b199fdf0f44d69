pub mod builder;
pub mod model;
pub mod placeholder;

pub use model::*;
