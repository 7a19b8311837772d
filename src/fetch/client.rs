use super::header::{parse_response, RawRecordBatch};
use super::{FetchError, LogFetcher};
use crate::config::types::{ProxyConfig, RequestConfig, SaasConfig};
use crate::retrieval::window::TimeWindow;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;

const FORENSIC_PATH: &str = "/mwg/api/reporting/forensic";
const API_VERSION_HEADER: &str = "x-mwg-api-version";

type Result<T> = std::result::Result<T, FetchError>;

/// Query for one tenant and one time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub customer_id: u64,
    pub window: TimeWindow,
}

impl RetrievalRequest {
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}{}/{}?filter.requestTimestampFrom={}&filter.requestTimestampTo={}&order.0.requestTimestamp=asc",
            base_url, FORENSIC_PATH, self.customer_id, self.window.start, self.window.end
        )
    }
}

/// HTTP client for the reporting API
pub struct SaasClient {
    customer_id: u64,
    base_url: String,
    user_id: String,
    password: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for SaasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaasClient")
            .field("customer_id", &self.customer_id)
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SaasClient {
    pub fn new(saas: &SaasConfig, request: &RequestConfig, proxy: &ProxyConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("logpuller/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/csv"));
        headers.insert(API_VERSION_HEADER, HeaderValue::from(saas.api_version));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request.connection_timeout);

        match &proxy.url {
            Some(url) if !url.is_empty() => {
                tracing::info!("Using proxy for requests");
                builder = builder.proxy(reqwest::Proxy::all(url.as_str())?);
            }
            _ => {
                tracing::info!("Using direct connection for requests");
                builder = builder.no_proxy();
            }
        }

        Ok(Self {
            customer_id: saas.customer_id,
            base_url: format!("{}://{}", saas.scheme, saas.host.trim_end_matches('/')),
            user_id: saas.user_id.clone(),
            password: saas.password.clone(),
            timeout: request.connection_timeout,
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_for(&self, window: TimeWindow) -> RetrievalRequest {
        RetrievalRequest {
            customer_id: self.customer_id,
            window,
        }
    }

    async fn execute(&self, request: &RetrievalRequest) -> Result<(u16, String)> {
        let url = request.url(&self.base_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user_id, Some(&self.password))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Remote {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|e| FetchError::Body(e.to_string()))?;
        Ok((status.as_u16(), body))
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(error)
        }
    }
}

#[async_trait]
impl LogFetcher for SaasClient {
    async fn fetch(&self, window: TimeWindow) -> Result<RawRecordBatch> {
        let request = self.request_for(window);
        let (status, body) = self.execute(&request).await?;
        Ok(parse_response(&body).with_status(status))
    }
}
