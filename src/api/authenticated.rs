//! Authenticated client: every request is signed for one scoped entity.
//!
//! Endpoints resolve to `/v1/<scope>s/<id>/<endpoint>`. GET parameters move
//! into the query string (and out of the signed body); the signature covers
//! the resolved path without the query.
//!
//! ```rust,ignore
//! let api = AuthenticatedApi::new(public_api, Scope::Install, signer);
//! let response = api.get("/updates/latest.json", &json!({"is_premium": "true"})).await;
//! ```

use reqwest::Method;
use serde_json::Value;
use std::fmt;

use crate::api::http::{self, is_empty_payload, query_pairs, RawResponse};
use crate::api::public::{encode_query, PublicApi};
use crate::api::signature::{signed_content_type, RequestSigner, JSON_CONTENT_TYPE};
use crate::errors::LicenseResult;

/// Entity type a signed request is made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    User,
    Install,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Install => "install",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedApi {
    public: PublicApi,
    scope: Scope,
    signer: RequestSigner,
}

impl AuthenticatedApi {
    pub fn new(public: PublicApi, scope: Scope, signer: RequestSigner) -> Self {
        Self {
            public,
            scope,
            signer,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Path that is both requested and signed.
    pub fn resource_path(&self, endpoint: &str) -> String {
        format!(
            "/v1/{}s/{}/{}",
            self.scope,
            self.signer.id(),
            endpoint.trim_start_matches('/')
        )
    }

    pub async fn get(&self, endpoint: &str, params: &Value) -> LicenseResult<RawResponse> {
        self.prepare_request(Method::GET, endpoint, params).await
    }

    pub async fn post(&self, endpoint: &str, data: &Value) -> LicenseResult<RawResponse> {
        self.prepare_request(Method::POST, endpoint, data).await
    }

    pub async fn put(&self, endpoint: &str, data: &Value) -> LicenseResult<RawResponse> {
        self.prepare_request(Method::PUT, endpoint, data).await
    }

    pub async fn delete(&self, endpoint: &str, data: &Value) -> LicenseResult<RawResponse> {
        self.prepare_request(Method::DELETE, endpoint, data).await
    }

    pub fn validate_response(response: LicenseResult<RawResponse>) -> LicenseResult<Value> {
        http::validate_response(response)
    }

    async fn prepare_request(
        &self,
        method: Method,
        endpoint: &str,
        data: &Value,
    ) -> LicenseResult<RawResponse> {
        let path = self.resource_path(endpoint);
        let mut url = format!("{}{}", self.public.base_url(), path);

        let body = if method == Method::GET {
            let pairs = query_pairs(data);
            if !pairs.is_empty() {
                url.push('?');
                url.push_str(&encode_query(&pairs));
            }
            None
        } else if is_empty_payload(data) {
            None
        } else {
            Some(serde_json::to_string(data)?)
        };

        let signed = self.signer.sign_now(&method, &path, body.as_deref());
        let mut headers = signed.pairs();
        if !signed_content_type(&method).is_empty() {
            headers.push(("Content-Type", JSON_CONTENT_TYPE.to_string()));
        }

        http::execute(self.public.client(), method, &url, headers, body).await
    }
}
