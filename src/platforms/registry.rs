use std::collections::HashMap;

use super::traits::{Platform, SocialPlatform};
use crate::error::LinkError;

/// Registry of onboarded platforms, keyed by platform.
///
/// A platform is present only when its app credentials are configured.
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: HashMap<Platform, Box<dyn SocialPlatform>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a platform, replacing any previous registration for it.
    pub fn register(&mut self, platform: Box<dyn SocialPlatform>) {
        self.platforms.insert(platform.platform(), platform);
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn SocialPlatform> {
        self.platforms.get(&platform).map(|p| p.as_ref())
    }

    /// Look up a platform, treating absence as a configuration problem.
    pub fn require(&self, platform: Platform) -> Result<&dyn SocialPlatform, LinkError> {
        self.get(platform).ok_or_else(|| {
            LinkError::Configuration(format!("{platform} is not onboarded (no app credentials)"))
        })
    }

    /// Configured platforms in a stable order.
    pub fn list(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.platforms.contains_key(p))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.platforms.len()
    }
}
