//! Unauthenticated client: plain JSON requests to fixed endpoints.
//!
//! ```rust,ignore
//! let api = PublicApi::new(&config.api, &config.site.user_agent())?;
//! let response = api.post("v1/plugins/1524/activate.json", &payload).await;
//! let install = PublicApi::validate_response(response)?;
//! ```

use reqwest::{Client, Method};
use serde_json::Value;

use crate::api::http::{self, build_client, is_empty_payload, query_pairs, RawResponse};
use crate::api::signature::JSON_CONTENT_TYPE;
use crate::config::ApiConfig;
use crate::errors::LicenseResult;

#[derive(Debug, Clone)]
pub struct PublicApi {
    base_url: String,
    client: Client,
}

impl PublicApi {
    pub fn new(config: &ApiConfig, user_agent: &str) -> LicenseResult<Self> {
        Ok(Self::with_client(&config.base_url, build_client(config, user_agent)?))
    }

    /// Reuse an existing HTTP client (and its connection pool).
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn get(&self, endpoint: &str, params: &Value) -> LicenseResult<RawResponse> {
        let mut url = self.url_for(endpoint);
        let pairs = query_pairs(params);
        if !pairs.is_empty() {
            url.push('?');
            url.push_str(&encode_query(&pairs));
        }
        self.perform(Method::GET, &url, None).await
    }

    pub async fn post(&self, endpoint: &str, data: &Value) -> LicenseResult<RawResponse> {
        self.perform(Method::POST, &self.url_for(endpoint), Some(data)).await
    }

    pub async fn put(&self, endpoint: &str, data: &Value) -> LicenseResult<RawResponse> {
        self.perform(Method::PUT, &self.url_for(endpoint), Some(data)).await
    }

    pub async fn delete(&self, endpoint: &str, data: &Value) -> LicenseResult<RawResponse> {
        self.perform(Method::DELETE, &self.url_for(endpoint), Some(data)).await
    }

    /// Double check a response for errors; see [`http::validate_response`].
    pub fn validate_response(response: LicenseResult<RawResponse>) -> LicenseResult<Value> {
        http::validate_response(response)
    }

    async fn perform(
        &self,
        method: Method,
        url: &str,
        data: Option<&Value>,
    ) -> LicenseResult<RawResponse> {
        let body = match data {
            Some(data) if !is_empty_payload(data) => Some(serde_json::to_string(data)?),
            Some(_) => Some("{}".to_string()),
            None => None,
        };
        let headers = vec![("Content-Type", JSON_CONTENT_TYPE.to_string())];

        http::execute(&self.client, method, url, headers, body).await
    }
}

/// Encode query pairs the way `application/x-www-form-urlencoded` does.
pub(crate) fn encode_query(pairs: &[(String, String)]) -> String {
    reqwest::Url::parse_with_params("http://query.invalid/", pairs)
        .ok()
        .and_then(|u| u.query().map(str::to_string))
        .unwrap_or_default()
}
