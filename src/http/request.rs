use crate::error::ProbeError;
use crate::types::{DelayPolicy, Endpoint, Sample};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Run one probe request: delay, send under `timeout`, classify.
///
/// `headers` are applied in order, so a later entry replaces an earlier one
/// with the same (case-insensitive) name.
pub async fn execute_request(
    client: &Client,
    endpoint: &Endpoint,
    headers: &[(String, String)],
    delay: &DelayPolicy,
    timeout: Duration,
) -> Result<Sample, ProbeError> {
    if let Some(pause) = delay.pick() {
        sleep(pause).await;
    }

    let start = Instant::now();

    let request = build_request(client, endpoint, headers, timeout).inspect_err(|e| {
        tracing::error!(url = %endpoint.url, error = %e, "Failed to create request");
    })?;

    let response = client.execute(request).await.map_err(|e| {
        let err = ProbeError::network(e);
        tracing::error!(url = %endpoint.url, error = %err, "Request failed");
        err
    })?;

    let status = response.status().as_u16();
    if status >= 400 {
        tracing::warn!(url = %endpoint.url, status_code = status, "Received error status");
        return Err(ProbeError::HttpStatus(status));
    }

    let latency = start.elapsed();

    // Consume body to allow connection reuse
    let _ = response.bytes().await;

    tracing::debug!(
        url = %endpoint.url,
        status_code = status,
        latency = ?latency,
        "Request successful"
    );
    Ok(Sample { latency, status })
}

fn build_request(
    client: &Client,
    endpoint: &Endpoint,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<reqwest::Request, ProbeError> {
    let method = Method::from_bytes(endpoint.method.to_uppercase().as_bytes())
        .map_err(|_| ProbeError::RequestConstruction(format!("invalid method '{}'", endpoint.method)))?;

    let url = Url::parse(&endpoint.url)
        .map_err(|e| ProbeError::RequestConstruction(format!("invalid url '{}': {}", endpoint.url, e)))?;

    let mut header_map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ProbeError::RequestConstruction(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ProbeError::RequestConstruction(format!("invalid value for header '{}'", name))
        })?;
        header_map.insert(name, value);
    }

    let mut request = client
        .request(method, url)
        .headers(header_map)
        .timeout(timeout);

    if let Some(body) = &endpoint.body {
        request = request.body(body.clone());
    }

    request
        .build()
        .map_err(|e| ProbeError::RequestConstruction(e.to_string()))
}
