//! Server side of OAuth account linking.

pub mod authorize;
pub mod exchange;
pub mod provider;
pub mod state;

pub use authorize::{begin_authorization, AuthorizationGrant, AuthorizeRequest};
pub use exchange::{link_account, ExchangeRequest, ExchangeResponse, LinkResult};
pub use provider::{ProviderClient, ProviderFailure};
