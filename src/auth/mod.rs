mod oauth2;

pub use oauth2::{TokenCache, fetch_token};

use crate::error::ProbeError;
use crate::types::{AuthHeader, AuthPolicy, Endpoint, OAuth2Settings};
use base64::Engine as _;
use reqwest::Client;
use std::time::Duration;

/// Turns the effective auth policy of an endpoint into at most one header.
pub struct AuthResolver {
    client: Client,
    global: AuthPolicy,
    timeout: Duration,
    tokens: Option<TokenCache>,
}

impl AuthResolver {
    pub fn new(client: Client, global: AuthPolicy, timeout: Duration) -> Self {
        Self {
            client,
            global,
            timeout,
            tokens: None,
        }
    }

    /// Reuse OAuth2 tokens for `ttl` instead of exchanging once per job.
    pub fn with_token_cache(mut self, ttl: Duration) -> Self {
        self.tokens = Some(TokenCache::new(ttl));
        self
    }

    /// An endpoint-level policy, even `Disabled`, fully replaces the global one.
    pub fn effective<'a>(&'a self, endpoint: &'a Endpoint) -> &'a AuthPolicy {
        endpoint.auth.as_ref().unwrap_or(&self.global)
    }

    pub async fn resolve(&self, endpoint: &Endpoint) -> Result<Option<AuthHeader>, ProbeError> {
        let policy = self.effective(endpoint);
        let header = match policy {
            AuthPolicy::Disabled => None,
            AuthPolicy::ApiKey { header, value } => Some(AuthHeader::new(header, value)),
            AuthPolicy::Basic { username, password } => {
                Some(AuthHeader::new("Authorization", basic_value(username, password)))
            }
            AuthPolicy::OAuth2(settings) => {
                let token = self.oauth2_token(settings).await.inspect_err(|e| {
                    tracing::error!(url = %endpoint.url, error = %e, "Failed to fetch OAuth token");
                })?;
                Some(AuthHeader::new("Authorization", format!("Bearer {}", token)))
            }
            AuthPolicy::Unsupported(kind) => {
                tracing::error!(auth_type = %kind, url = %endpoint.url, "Unsupported authentication type");
                return Err(ProbeError::AuthResolution(kind.clone()));
            }
        };

        tracing::debug!(auth_type = policy.as_str(), url = %endpoint.url, "Resolved authentication");
        Ok(header)
    }

    async fn oauth2_token(&self, settings: &OAuth2Settings) -> Result<String, ProbeError> {
        let Some(cache) = &self.tokens else {
            return Ok(fetch_token(&self.client, settings, self.timeout).await?);
        };

        if let Some(token) = cache.get(settings).await {
            return Ok(token);
        }
        let token = fetch_token(&self.client, settings, self.timeout).await?;
        cache.insert(settings, token.clone()).await;
        Ok(token)
    }

    /// Fails when some endpoint would fall back to an unusable global policy.
    ///
    /// Endpoint-level unsupported policies only fail their own jobs.
    pub fn preflight(&self, endpoints: &[impl AsRef<Endpoint>]) -> Result<(), ProbeError> {
        if let AuthPolicy::Unsupported(kind) = &self.global {
            if endpoints.iter().any(|e| e.as_ref().auth.is_none()) {
                tracing::error!(auth_type = %kind, "Unsupported global authentication type");
                return Err(ProbeError::AuthResolution(kind.clone()));
            }
        }

        match &self.global {
            AuthPolicy::Disabled => tracing::info!("Authentication is disabled"),
            policy => tracing::info!(auth_type = policy.as_str(), "Using global authentication"),
        }
        Ok(())
    }
}

fn basic_value(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}
