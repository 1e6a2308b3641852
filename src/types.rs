use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    Disabled,
    ApiKey { header: String, value: String },
    Basic { username: String, password: String },
    OAuth2(OAuth2Settings),
    /// An auth type the resolver does not know how to apply.
    Unsupported(String),
}

impl AuthPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            AuthPolicy::Disabled => "disabled",
            AuthPolicy::ApiKey { .. } => "api_key",
            AuthPolicy::Basic { .. } => "basic",
            AuthPolicy::OAuth2(_) => "oauth2",
            AuthPolicy::Unsupported(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OAuth2Settings {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: String,
    pub value: String,
}

impl AuthHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Delay
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayPolicy {
    #[default]
    None,
    Fixed { ms: u64 },
    /// Uniform over the half-open interval `[min_ms, max_ms)`.
    Random { min_ms: u64, max_ms: u64 },
}

impl DelayPolicy {
    /// Pick the pre-request sleep for one job.
    pub fn pick(&self) -> Option<Duration> {
        match *self {
            DelayPolicy::None => None,
            DelayPolicy::Fixed { ms } => Some(Duration::from_millis(ms)),
            DelayPolicy::Random { min_ms, max_ms } if min_ms >= max_ms => {
                Some(Duration::from_millis(min_ms))
            }
            DelayPolicy::Random { min_ms, max_ms } => {
                let ms = rand::rng().random_range(min_ms..max_ms);
                Some(Duration::from_millis(ms))
            }
        }
    }
}

// ============================================================================
// Endpoints & run configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub method: String,
    pub body: Option<String>,
    pub headers: HashMap<String, String>,
    /// Overrides the global policy entirely when present, including `Disabled`.
    pub auth: Option<AuthPolicy>,
}

impl Endpoint {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            body: None,
            headers: HashMap::new(),
            auth: None,
        }
    }
}

#[cfg(test)]
impl Endpoint {
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthPolicy) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// One scheduled execution of an endpoint.
pub type Job = Arc<Endpoint>;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub concurrency: u32,
    pub total_requests: u32,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub delay: DelayPolicy,
    pub auth: AuthPolicy,
    pub endpoints: Vec<Arc<Endpoint>>,
    pub queue_capacity: Option<usize>,
    /// When set, OAuth2 tokens are reused for this long instead of fetched per job.
    pub token_cache_ttl: Option<Duration>,
}

impl ProbeConfig {
    #[cfg(test)]
    pub fn new(concurrency: u32, total_requests: u32, endpoints: Vec<Endpoint>) -> Self {
        Self {
            concurrency,
            total_requests,
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_secs(2),
            delay: DelayPolicy::None,
            auth: AuthPolicy::Disabled,
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
            queue_capacity: None,
            token_cache_ttl: None,
        }
    }

    pub fn total_jobs(&self) -> usize {
        self.total_requests as usize * self.endpoints.len()
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub latency: Duration,
    pub status: u16,
}

#[derive(Debug, Clone, Default)]
pub struct LatencySummary {
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub samples: u64,
    /// `None` when no request succeeded.
    pub latency: Option<LatencySummary>,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub errors: BTreeMap<&'static str, u64>,
    pub status_codes: BTreeMap<u16, u64>,
}

impl RunSummary {
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn average(&self) -> Option<Duration> {
        self.latency.as_ref().map(|l| l.mean)
    }
}
