use crate::error::OAuth2Error;
use crate::types::OAuth2Settings;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Exchange client credentials for a bearer token at `settings.token_url`.
pub async fn fetch_token(
    client: &Client,
    settings: &OAuth2Settings,
    timeout: Duration,
) -> Result<String, OAuth2Error> {
    tracing::debug!(
        url = %settings.token_url,
        client_id = %settings.client_id,
        "Requesting OAuth2 token"
    );

    let mut form: Vec<(&str, &str)> = vec![
        ("client_id", settings.client_id.as_str()),
        ("client_secret", settings.client_secret.as_str()),
        ("grant_type", settings.grant_type.as_str()),
    ];
    let optional = [
        ("username", &settings.username),
        ("password", &settings.password),
        ("scope", &settings.scope),
    ];
    for (key, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            form.push((key, value));
        }
    }

    let response = client
        .post(&settings.token_url)
        .form(&form)
        .timeout(timeout)
        .send()
        .await
        .map_err(OAuth2Error::Request)?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "OAuth2 server returned error status");
        return Err(OAuth2Error::Status(status.as_u16()));
    }

    let body = response.bytes().await.map_err(OAuth2Error::Read)?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)?;

    let token = parsed
        .get("access_token")
        .and_then(serde_json::Value::as_str)
        .ok_or(OAuth2Error::MissingToken)?;

    tracing::debug!("Successfully retrieved OAuth2 token");
    Ok(token.to_string())
}

/// Bounded-lifetime token store keyed by `(token_url, client_id)`.
pub struct TokenCache {
    ttl: Duration,
    tokens: Mutex<HashMap<(String, String), (String, Instant)>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, settings: &OAuth2Settings) -> Option<String> {
        let tokens = self.tokens.lock().await;
        tokens
            .get(&Self::key(settings))
            .filter(|(_, fetched_at)| fetched_at.elapsed() < self.ttl)
            .map(|(token, _)| token.clone())
    }

    pub async fn insert(&self, settings: &OAuth2Settings, token: String) {
        let mut tokens = self.tokens.lock().await;
        tokens.insert(Self::key(settings), (token, Instant::now()));
    }

    fn key(settings: &OAuth2Settings) -> (String, String) {
        (settings.token_url.clone(), settings.client_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(token_url: String) -> OAuth2Settings {
        OAuth2Settings {
            token_url,
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            grant_type: "password".to_string(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            scope: Some("openid profile email".to_string()),
        }
    }

    async fn token_server(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn posts_form_and_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("client_id=client-id"))
            .and(body_string_contains("client_secret=client-secret"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=user"))
            .and(body_string_contains("password=pass"))
            .and(body_string_contains("scope=openid+profile+email"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"access_token": "mocked-token"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = fetch_token(&Client::new(), &settings(server.uri()), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(token, "mocked-token");
    }

    #[tokio::test]
    async fn omits_absent_optional_fields() {
        let server = token_server(200, r#"{"access_token": "t"}"#).await;
        let mut settings = settings(server.uri());
        settings.grant_type = "client_credentials".to_string();
        settings.username = None;
        settings.password = Some(String::new());
        settings.scope = None;

        fetch_token(&Client::new(), &settings, Duration::from_secs(2))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.contains("grant_type=client_credentials"));
        assert!(!body.contains("username"));
        assert!(!body.contains("password"));
        assert!(!body.contains("scope"));
    }

    #[tokio::test]
    async fn reports_specific_failure_cause() {
        let server = token_server(400, r#"{"error": "invalid_request"}"#).await;
        let err = fetch_token(&Client::new(), &settings(server.uri()), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::Status(400)));
        assert!(err.to_string().contains("OAuth server returned status"));

        let server = token_server(200, "invalid json").await;
        let err = fetch_token(&Client::new(), &settings(server.uri()), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::Parse(_)));

        let server = token_server(200, "{}").await;
        let err = fetch_token(&Client::new(), &settings(server.uri()), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::MissingToken));

        let server = token_server(200, r#"{"access_token": 42}"#).await;
        let err = fetch_token(&Client::new(), &settings(server.uri()), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::MissingToken));
    }

    #[tokio::test]
    async fn cache_expires_after_ttl() {
        let cache = TokenCache::new(Duration::from_millis(50));
        let settings = settings("http://auth.local/token".to_string());

        assert_eq!(cache.get(&settings).await, None);
        cache.insert(&settings, "cached".to_string()).await;
        assert_eq!(cache.get(&settings).await.as_deref(), Some("cached"));

        let mut other_client = settings.clone();
        other_client.client_id = "someone-else".to_string();
        assert_eq!(cache.get(&other_client).await, None);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&settings).await, None);
    }
}
