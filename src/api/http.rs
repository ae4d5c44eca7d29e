//! Transport shared by the public and the authenticated client.

use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::api::errors::ApiError;
use crate::config::ApiConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Raw outcome of one HTTP exchange that reached the server.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
    /// Set when the status is a failure and the body carried no JSON.
    pub error: Option<ApiError>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: String) -> Self {
        let error = if !status.is_success() && serde_json::from_str::<Value>(&body).is_err() {
            Some(ApiError::from_status(status))
        } else {
            None
        };
        Self {
            status,
            body,
            error,
        }
    }
}

/// Build the HTTP client: fixed connect/total timeouts, bounded redirects.
pub fn build_client(config: &ApiConfig, user_agent: &str) -> LicenseResult<Client> {
    Ok(Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.timeout())
        .redirect(Policy::limited(config.max_redirects))
        .user_agent(user_agent)
        .build()?)
}

/// Send one request and collect status and body text.
pub(crate) async fn execute(
    client: &Client,
    method: Method,
    url: &str,
    headers: Vec<(&'static str, String)>,
    body: Option<String>,
) -> LicenseResult<RawResponse> {
    let mut request = client.request(method.clone(), url);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    log::debug!("{} {}", method, url);
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    log::debug!("{} {} -> {}", method, url, status);

    Ok(RawResponse::new(status, body))
}

/// Inspect the three failure surfaces in order: transport error, top-level
/// error, then the `error` field of the decoded body. The first hit is
/// returned as a typed error; otherwise the decoded body.
pub fn validate_response(response: LicenseResult<RawResponse>) -> LicenseResult<Value> {
    let raw = response?;

    if let Some(err) = raw.error {
        return Err(LicenseError::Api(err));
    }

    let body: Value = serde_json::from_str(&raw.body).map_err(|e| {
        LicenseError::UnexpectedResponse(format!(
            "HTTP {} with undecodable body: {e}",
            raw.status
        ))
    })?;

    if let Some(err) = ApiError::from_body(&body) {
        return Err(LicenseError::Api(err));
    }

    Ok(body)
}

/// Flatten a JSON object into query pairs. Strings are used verbatim,
/// other scalars through their JSON text; nulls are dropped.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
    match params.as_object() {
        Some(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        None => Vec::new(),
    }
}

/// True when `data` carries nothing worth sending.
pub fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
