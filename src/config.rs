use crate::cli::RunArgs;
use crate::types::{
    AuthPolicy, DEFAULT_REQUEST_TIMEOUT_MS, DelayPolicy, Endpoint, OAuth2Settings, ProbeConfig,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable '{0}' not set")]
    MissingEnv(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub probe: ProbeSection,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AuthSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub api_key: ApiKeySection,
    #[serde(default)]
    pub basic: BasicSection,
    #[serde(default)]
    pub oauth2: OAuth2Section,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ApiKeySection {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BasicSection {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct OAuth2Section {
    #[serde(default)]
    pub token_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProbeSection {
    pub concurrent_requests: Option<u32>,
    pub total_requests: Option<u32>,
    pub request_timeout_ms: Option<u64>,
    #[serde(default, with = "humantime_serde::option")]
    pub connect_timeout: Option<Duration>,
    pub queue_capacity: Option<usize>,
    #[serde(default, with = "humantime_serde::option")]
    pub token_cache_ttl: Option<Duration>,
    #[serde(default)]
    pub delay_between: DelaySection,
    #[serde(default)]
    pub endpoints: Vec<EndpointSection>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DelaySection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub fixed: u64,
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: u64,
}

#[derive(Debug, Deserialize)]
pub struct EndpointSection {
    pub url: String,
    pub method: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub auth: Option<AuthSection>,
}

pub fn load_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<TomlConfig, ConfigError> {
    let mut config: TomlConfig = toml::from_str(content)?;
    config.expand_env(&EnvExpander::new()?)?;
    Ok(config)
}

/// Expands `${VAR}`, `${VAR:-default}` and `$(VAR)` references inside parsed values.
struct EnvExpander {
    re: regex_lite::Regex,
}

impl EnvExpander {
    fn new() -> Result<Self, ConfigError> {
        let re = regex_lite::Regex::new(r"\$\{([^}]+)\}|\$\(([^)]+)\)")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self { re })
    }

    fn expand(&self, value: &mut String) -> Result<(), ConfigError> {
        if !value.contains('$') {
            return Ok(());
        }

        let mut result = String::with_capacity(value.len());
        let mut last = 0;
        for cap in self.re.captures_iter(value) {
            let Some(full_match) = cap.get(0) else {
                continue;
            };
            let var_expr = cap
                .get(1)
                .or_else(|| cap.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();

            let (var_name, default) = match var_expr.find(":-") {
                Some(pos) => (&var_expr[..pos], Some(&var_expr[pos + 2..])),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => return Err(ConfigError::MissingEnv(var_name.to_string())),
                },
            };

            result.push_str(&value[last..full_match.start()]);
            result.push_str(&replacement);
            last = full_match.end();
        }
        result.push_str(&value[last..]);

        *value = result;
        Ok(())
    }

    fn expand_opt(&self, value: &mut Option<String>) -> Result<(), ConfigError> {
        match value {
            Some(v) => self.expand(v),
            None => Ok(()),
        }
    }
}

impl TomlConfig {
    fn expand_env(&mut self, env: &EnvExpander) -> Result<(), ConfigError> {
        self.auth.expand_env(env)?;

        for endpoint in &mut self.probe.endpoints {
            env.expand(&mut endpoint.url)?;
            env.expand_opt(&mut endpoint.method)?;
            env.expand_opt(&mut endpoint.body)?;
            for value in endpoint.headers.values_mut() {
                env.expand(value)?;
            }
            if let Some(auth) = endpoint.auth.as_mut() {
                auth.expand_env(env)?;
            }
        }

        Ok(())
    }
}

impl AuthSection {
    fn expand_env(&mut self, env: &EnvExpander) -> Result<(), ConfigError> {
        env.expand(&mut self.kind)?;
        env.expand(&mut self.api_key.header)?;
        env.expand(&mut self.api_key.value)?;
        env.expand(&mut self.basic.username)?;
        env.expand(&mut self.basic.password)?;

        let oauth2 = &mut self.oauth2;
        env.expand(&mut oauth2.token_url)?;
        env.expand(&mut oauth2.client_id)?;
        env.expand(&mut oauth2.client_secret)?;
        env.expand(&mut oauth2.grant_type)?;
        env.expand_opt(&mut oauth2.username)?;
        env.expand_opt(&mut oauth2.password)?;
        env.expand_opt(&mut oauth2.scope)
    }

    pub fn to_policy(&self) -> AuthPolicy {
        if !self.enabled {
            return AuthPolicy::Disabled;
        }

        match self.kind.as_str() {
            "api_key" => AuthPolicy::ApiKey {
                header: self.api_key.header.clone(),
                value: self.api_key.value.clone(),
            },
            "basic" => AuthPolicy::Basic {
                username: self.basic.username.clone(),
                password: self.basic.password.clone(),
            },
            "oauth2" => AuthPolicy::OAuth2(OAuth2Settings {
                token_url: self.oauth2.token_url.clone(),
                client_id: self.oauth2.client_id.clone(),
                client_secret: self.oauth2.client_secret.clone(),
                grant_type: self.oauth2.grant_type.clone(),
                username: self.oauth2.username.clone(),
                password: self.oauth2.password.clone(),
                scope: self.oauth2.scope.clone(),
            }),
            other => AuthPolicy::Unsupported(other.to_string()),
        }
    }
}

impl DelaySection {
    fn to_policy(&self) -> Result<DelayPolicy, ConfigError> {
        if !self.enabled {
            return Ok(DelayPolicy::None);
        }

        match self.kind.as_str() {
            "" | "fixed" => Ok(DelayPolicy::Fixed { ms: self.fixed }),
            "random" if self.min > self.max => Err(ConfigError::Invalid(format!(
                "random delay min ({}) exceeds max ({})",
                self.min, self.max
            ))),
            "random" => Ok(DelayPolicy::Random {
                min_ms: self.min,
                max_ms: self.max,
            }),
            other => Err(ConfigError::Invalid(format!("unknown delay type '{}'", other))),
        }
    }
}

/// Combine the config file with command-line overrides into a validated run config.
pub fn merge_config(args: &RunArgs, toml: TomlConfig) -> Result<ProbeConfig, ConfigError> {
    let probe = toml.probe;

    let concurrency = args.concurrency.or(probe.concurrent_requests).unwrap_or(1);
    if concurrency == 0 {
        return Err(ConfigError::Invalid("concurrent_requests must be at least 1".into()));
    }

    let total_requests = args.total_requests.or(probe.total_requests).unwrap_or(1);
    if total_requests == 0 {
        return Err(ConfigError::Invalid("total_requests must be at least 1".into()));
    }

    let timeout_ms = args
        .timeout_ms
        .or(probe.request_timeout_ms)
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

    if probe.queue_capacity == Some(0) {
        return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
    }

    if probe.endpoints.is_empty() {
        return Err(ConfigError::Invalid("at least one endpoint is required".into()));
    }

    let endpoints = probe
        .endpoints
        .into_iter()
        .map(|e| {
            if e.url.trim().is_empty() {
                return Err(ConfigError::Invalid("endpoint url must not be empty".into()));
            }
            let method = e.method.unwrap_or_else(|| "GET".to_string());
            Ok(Arc::new(Endpoint {
                body: e.body.filter(|b| !b.is_empty()),
                headers: e.headers,
                auth: e.auth.as_ref().map(AuthSection::to_policy),
                ..Endpoint::new(method, e.url)
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProbeConfig {
        concurrency,
        total_requests,
        timeout: Duration::from_millis(timeout_ms),
        connect_timeout: probe.connect_timeout.unwrap_or(Duration::from_secs(2)),
        delay: probe.delay_between.to_policy()?,
        auth: toml.auth.to_policy(),
        endpoints,
        queue_capacity: probe.queue_capacity,
        token_cache_ttl: probe.token_cache_ttl,
    })
}
