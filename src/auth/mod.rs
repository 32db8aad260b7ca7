pub mod service;
pub mod verify;

pub use service::ServiceIdentity;
pub use verify::{SessionVerifier, UserSession};
