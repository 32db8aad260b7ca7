//! Browser-side half of account linking: start the redirect, then finish it
//! when the provider sends the user back.

pub mod backend;
pub mod callback;
pub mod initiator;
pub mod state;

#[cfg(test)]
pub(crate) mod test_doubles;

pub use backend::{ClientSession, HttpBackend, LinkBackend};
pub use callback::{CallbackHandler, CallbackOptions, CallbackOutcome, CallbackParams, CallbackStatus};
pub use initiator::{Navigator, RedirectInitiator};
pub use state::{
    FileStorage, MemoryStorage, PendingAuthorization, PendingStateStorage, StateMatch,
    StateTokenManager,
};
