//! The backend's own identity.
//!
//! Linking writes account rows on behalf of a user after the provider has
//! vouched for them, so those writes bypass per-row ownership checks. The
//! store only accepts such writes when handed a [`ServiceIdentity`], which
//! cannot be built from any request input.

/// Elevated capability held by trusted backend code paths.
#[derive(Debug)]
pub struct ServiceIdentity {
    name: &'static str,
}

impl ServiceIdentity {
    pub(crate) fn backend() -> Self {
        Self { name: "link-service" }
    }

    /// Actor name recorded in audit events.
    pub fn name(&self) -> &str {
        self.name
    }
}
