mod facebook;
mod instagram;
mod linkedin;
mod registry;
mod traits;
mod twitter;

pub use facebook::FacebookPlatform;
pub use instagram::InstagramPlatform;
pub use linkedin::LinkedinPlatform;
pub use registry::PlatformRegistry;
pub use traits::{
    authorization_code_form, AppCredentials, NormalizedProfile, Platform, PlatformEndpoints,
    SocialPlatform, TokenRequest, TokenSet, UnsupportedPlatform,
};
pub use twitter::TwitterPlatform;

use crate::config::Config;

/// Register every platform that has app credentials configured.
pub fn register_defaults(registry: &mut PlatformRegistry, config: &Config) {
    if let Some(creds) = &config.twitter {
        registry.register(Box::new(TwitterPlatform::new(creds.clone())));
    }
    if let Some(creds) = &config.facebook {
        registry.register(Box::new(FacebookPlatform::new(creds.clone())));
    }
    if let Some(creds) = &config.instagram {
        registry.register(Box::new(InstagramPlatform::new(creds.clone())));
    }
    if let Some(creds) = &config.linkedin {
        registry.register(Box::new(LinkedinPlatform::new(creds.clone())));
    }
}
