use reqwest::Client;
use std::time::Duration;

pub const USER_AGENT: &str = concat!(
    "scouter/",
    env!("CARGO_PKG_VERSION"),
    " (load-probing-tool)"
);

/// Build the pooled client shared by every worker and token exchange in a run.
///
/// No client-wide request timeout is set: each request carries its own.
pub fn create_client(concurrency: u32, connect_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .tcp_nodelay(true)
        .gzip(true)
        .brotli(true)
        .pool_max_idle_per_host(concurrency as usize)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}
