use super::traits::{
    json_string, json_u64, missing_field, urlencoding, AppCredentials,
    NormalizedProfile, Platform, PlatformEndpoints, SocialPlatform,
};
use crate::error::LinkError;

/// Instagram Login for business and creator accounts.
///
/// Quirks:
/// - Token exchange goes to `api.instagram.com`, profile reads to
///   `graph.instagram.com`.
/// - The short-lived token response has no `token_type` or `expires_in`.
/// - Ids can arrive as JSON numbers.
pub struct InstagramPlatform {
    credentials: AppCredentials,
    endpoints: PlatformEndpoints,
}

impl InstagramPlatform {
    pub fn new(credentials: AppCredentials) -> Self {
        Self {
            credentials,
            endpoints: PlatformEndpoints {
                authorize: "https://www.instagram.com/oauth/authorize".into(),
                token: "https://api.instagram.com/oauth/access_token".into(),
                profile: "https://graph.instagram.com/me".into(),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl SocialPlatform for InstagramPlatform {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn display_name(&self) -> &str {
        "Instagram"
    }

    fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    fn default_scopes(&self) -> Vec<String> {
        vec![
            "instagram_business_basic".into(),
            "instagram_business_content_publish".into(),
            "instagram_business_manage_comments".into(),
        ]
    }

    fn authorize_url(&self, state: &str, _pkce_challenge: Option<&str>) -> String {
        format!(
            "{base}?\
             response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            base = self.endpoints.authorize,
            client_id = urlencoding(&self.credentials.client_id),
            redirect_uri = urlencoding(&self.credentials.redirect_uri),
            scope = urlencoding(&self.default_scopes().join(",")),
            state = urlencoding(state),
        )
    }

    fn token_endpoint(&self) -> &str {
        &self.endpoints.token
    }

    fn profile_endpoint(&self) -> String {
        format!(
            "{}?fields=user_id,username,name,followers_count,profile_picture_url",
            self.endpoints.profile
        )
    }

    fn normalize_profile(&self, body: &serde_json::Value) -> Result<NormalizedProfile, LinkError> {
        let id = json_string(body, "/user_id")
            .or_else(|| json_string(body, "/id"))
            .ok_or_else(|| missing_field(Platform::Instagram, "user_id"))?;
        let username = json_string(body, "/username")
            .ok_or_else(|| missing_field(Platform::Instagram, "username"))?;

        Ok(NormalizedProfile {
            id,
            name: json_string(body, "/name").unwrap_or_else(|| username.clone()),
            username,
            followers_count: json_u64(body, "/followers_count"),
            profile_image_url: json_string(body, "/profile_picture_url"),
        })
    }
}
