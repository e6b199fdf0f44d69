pub mod engine;
pub mod payload;

pub use engine::Updater;
pub use payload::{DataIntegrityProof, SecuredUpdate, UpdatePayload};
