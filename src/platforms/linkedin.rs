use super::traits::{
    json_string, missing_field, urlencoding, AppCredentials,
    NormalizedProfile, Platform, PlatformEndpoints, SocialPlatform, TokenRequest,
};
use crate::error::LinkError;

/// LinkedIn OAuth 2.0.
///
/// Quirks:
/// - Profile comes from the OpenID Connect `userinfo` endpoint.
/// - Access tokens live 60 days; refresh tokens need partner approval.
/// - No public handle, so the username falls back to the member's email.
pub struct LinkedinPlatform {
    credentials: AppCredentials,
    endpoints: PlatformEndpoints,
}

impl LinkedinPlatform {
    pub fn new(credentials: AppCredentials) -> Self {
        Self {
            credentials,
            endpoints: PlatformEndpoints {
                authorize: "https://www.linkedin.com/oauth/v2/authorization".into(),
                token: "https://www.linkedin.com/oauth/v2/accessToken".into(),
                profile: "https://api.linkedin.com/v2/userinfo".into(),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl SocialPlatform for LinkedinPlatform {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn display_name(&self) -> &str {
        "LinkedIn"
    }

    fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    fn default_scopes(&self) -> Vec<String> {
        vec![
            "openid".into(),
            "profile".into(),
            "email".into(),
            "w_member_social".into(),
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
            scope = urlencoding(&self.default_scopes().join(" ")),
            state = urlencoding(state),
        )
    }

    fn token_endpoint(&self) -> &str {
        &self.endpoints.token
    }

    fn build_refresh_request(&self, refresh_token: &str) -> Option<TokenRequest> {
        Some(TokenRequest {
            url: self.token_endpoint().to_string(),
            form: vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.to_string()),
                ("client_id", self.credentials().client_id.clone()),
                ("client_secret", self.credentials().client_secret.clone()),
            ],
            basic_auth: None,
        })
    }

    fn profile_endpoint(&self) -> String {
        self.endpoints.profile.clone()
    }

    fn normalize_profile(&self, body: &serde_json::Value) -> Result<NormalizedProfile, LinkError> {
        let id = json_string(body, "/sub").ok_or_else(|| missing_field(Platform::Linkedin, "sub"))?;

        let name = json_string(body, "/name").or_else(|| {
            let given = json_string(body, "/given_name")?;
            Some(match json_string(body, "/family_name") {
                Some(family) => format!("{given} {family}"),
                None => given,
            })
        });
        let name = name.ok_or_else(|| missing_field(Platform::Linkedin, "name"))?;

        let username = json_string(body, "/email").unwrap_or_else(|| name.clone());

        Ok(NormalizedProfile {
            id,
            name,
            username,
            followers_count: None,
            profile_image_url: json_string(body, "/picture"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn platform() -> LinkedinPlatform {
        LinkedinPlatform::new(AppCredentials {
            client_id: "li-client".into(),
            client_secret: "li-secret".into(),
            redirect_uri: "https://app.example/auth/callback".into(),
        })
    }

    #[test]
    fn exchange_request_is_standard_form_post() {
        let req = platform().build_exchange_request("abc", None);
        assert_eq!(req.url, "https://www.linkedin.com/oauth/v2/accessToken");
        assert_eq!(req.param("grant_type"), Some("authorization_code"));
        assert_eq!(req.param("client_id"), Some("li-client"));
        assert_eq!(req.param("redirect_uri"), Some("https://app.example/auth/callback"));
        assert!(req.basic_auth.is_none());
        assert!(req.param("code_verifier").is_none());
    }

    #[test]
    fn normalizes_userinfo() {
        let body = json!({
            "sub": "782bbtaQ",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "email": "ada@example.com",
            "picture": "https://media.licdn.com/ada.jpg"
        });
        let profile = platform().normalize_profile(&body).unwrap();
        assert_eq!(profile.id, "782bbtaQ");
        assert_eq!(profile.name, "Ada Lovelace");
        assert_eq!(profile.username, "ada@example.com");
        assert_eq!(profile.followers_count, None);
    }

    #[test]
    fn authorize_url_has_no_pkce() {
        let url = platform().authorize_url("s1", Some("ignored"));
        assert!(!url.contains("code_challenge"));
        assert!(url.contains("scope=openid+profile+email+w_member_social"));
    }
}
