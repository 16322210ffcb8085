pub mod backend;
pub mod error;

pub use backend::{BackendClient, Envelope};
pub use error::ApiError;
