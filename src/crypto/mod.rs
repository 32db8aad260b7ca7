pub mod engine;

pub use engine::{pkce_challenge, CryptoEngine};
