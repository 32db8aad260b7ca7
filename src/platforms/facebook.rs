use super::traits::{
    json_string, json_u64, missing_field, urlencoding, AppCredentials,
    NormalizedProfile, Platform, PlatformEndpoints, SocialPlatform,
};
use crate::error::LinkError;

const GRAPH_VERSION: &str = "v18.0";

/// Facebook Login (Graph API).
///
/// Quirks:
/// - No refresh tokens; long-lived tokens are re-obtained by re-linking.
/// - Scopes are comma separated.
/// - Profile pictures are nested under `picture.data.url`.
pub struct FacebookPlatform {
    credentials: AppCredentials,
    endpoints: PlatformEndpoints,
}

impl FacebookPlatform {
    pub fn new(credentials: AppCredentials) -> Self {
        Self {
            credentials,
            endpoints: PlatformEndpoints {
                authorize: format!("https://www.facebook.com/{GRAPH_VERSION}/dialog/oauth"),
                token: format!("https://graph.facebook.com/{GRAPH_VERSION}/oauth/access_token"),
                profile: format!("https://graph.facebook.com/{GRAPH_VERSION}/me"),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl SocialPlatform for FacebookPlatform {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn display_name(&self) -> &str {
        "Facebook"
    }

    fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    fn default_scopes(&self) -> Vec<String> {
        vec![
            "public_profile".into(),
            "pages_show_list".into(),
            "pages_read_engagement".into(),
            "pages_manage_posts".into(),
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
            "{}?fields=id,name,picture.type(large),friends.limit(0)",
            self.endpoints.profile
        )
    }

    fn normalize_profile(&self, body: &serde_json::Value) -> Result<NormalizedProfile, LinkError> {
        let id = json_string(body, "/id").ok_or_else(|| missing_field(Platform::Facebook, "id"))?;
        let name = json_string(body, "/name").ok_or_else(|| missing_field(Platform::Facebook, "name"))?;

        Ok(NormalizedProfile {
            id,
            username: name.clone(),
            name,
            followers_count: json_u64(body, "/friends/summary/total_count"),
            profile_image_url: json_string(body, "/picture/data/url"),
        })
    }
}
