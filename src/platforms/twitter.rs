use super::traits::{
    authorization_code_form, json_string, json_u64, missing_field, urlencoding, AppCredentials,
    NormalizedProfile, Platform, PlatformEndpoints, SocialPlatform, TokenRequest,
};
use crate::error::LinkError;

/// X (Twitter) OAuth 2.0.
///
/// Quirks:
/// - PKCE is mandatory; the challenge is S256.
/// - Confidential clients authenticate to the token endpoint with HTTP Basic.
/// - Refresh tokens are only issued when `offline.access` is requested.
/// - Follower counts live under `public_metrics` and must be asked for.
pub struct TwitterPlatform {
    credentials: AppCredentials,
    endpoints: PlatformEndpoints,
}

impl TwitterPlatform {
    pub fn new(credentials: AppCredentials) -> Self {
        Self {
            credentials,
            endpoints: PlatformEndpoints {
                authorize: "https://twitter.com/i/oauth2/authorize".into(),
                token: "https://api.twitter.com/2/oauth2/token".into(),
                profile: "https://api.twitter.com/2/users/me".into(),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        Some((
            self.credentials.client_id.clone(),
            self.credentials.client_secret.clone(),
        ))
    }
}

impl SocialPlatform for TwitterPlatform {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn display_name(&self) -> &str {
        "X (Twitter)"
    }

    fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    fn default_scopes(&self) -> Vec<String> {
        vec![
            "tweet.read".into(),
            "tweet.write".into(),
            "users.read".into(),
            "offline.access".into(),
        ]
    }

    fn authorize_url(&self, state: &str, pkce_challenge: Option<&str>) -> String {
        let mut url = format!(
            "{base}?\
             response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            base = self.endpoints.authorize,
            client_id = urlencoding(&self.credentials.client_id),
            redirect_uri = urlencoding(&self.credentials.redirect_uri),
            scope = urlencoding(&self.default_scopes().join(" ")),
            state = urlencoding(state),
        );
        if let Some(challenge) = pkce_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                urlencoding(challenge)
            ));
        }
        url
    }

    fn token_endpoint(&self) -> &str {
        &self.endpoints.token
    }

    fn build_exchange_request(&self, code: &str, pkce_verifier: Option<&str>) -> TokenRequest {
        let mut form = authorization_code_form(self.credentials(), code);
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier.to_string()));
        }
        TokenRequest {
            url: self.token_endpoint().to_string(),
            form,
            basic_auth: self.basic_auth(),
        }
    }

    fn build_refresh_request(&self, refresh_token: &str) -> Option<TokenRequest> {
        Some(TokenRequest {
            url: self.token_endpoint().to_string(),
            form: vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.to_string()),
                ("client_id", self.credentials.client_id.clone()),
            ],
            basic_auth: self.basic_auth(),
        })
    }

    fn profile_endpoint(&self) -> String {
        format!(
            "{}?user.fields=public_metrics,profile_image_url",
            self.endpoints.profile
        )
    }

    fn normalize_profile(&self, body: &serde_json::Value) -> Result<NormalizedProfile, LinkError> {
        let id = json_string(body, "/data/id").ok_or_else(|| missing_field(Platform::Twitter, "data.id"))?;
        let username = json_string(body, "/data/username")
            .ok_or_else(|| missing_field(Platform::Twitter, "data.username"))?;

        Ok(NormalizedProfile {
            id,
            name: json_string(body, "/data/name").unwrap_or_else(|| username.clone()),
            username,
            followers_count: json_u64(body, "/data/public_metrics/followers_count"),
            profile_image_url: json_string(body, "/data/profile_image_url"),
        })
    }

    fn uses_pkce(&self) -> bool {
        true
    }
}
