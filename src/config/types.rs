use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub saas: SaasConfig,
    pub request: RequestConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    pub checkpoint: CheckpointConfig,
}

/// Tenant identity and credentials for the reporting API.
#[derive(Clone, Serialize, Deserialize)]
pub struct SaasConfig {
    pub customer_id: u64,
    pub user_id: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
}

// Keeps the password out of `{:?}` output.
impl std::fmt::Debug for SaasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaasConfig")
            .field("customer_id", &self.customer_id)
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_api_version() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Width of each time window requested from the API
    #[serde(with = "humantime_serde")]
    pub chunk_increment: Duration,
    #[serde(with = "humantime_serde", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    /// How far back the first run reaches when no checkpoint exists
    #[serde(with = "humantime_serde", default = "default_initial_lookback")]
    pub initial_lookback: Duration,
    /// Explicit epoch to start from when no checkpoint exists (0 = unset)
    #[serde(default)]
    pub start_from: i64,
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_prefix() -> String {
    "OutputLog".to_string()
}

fn default_initial_lookback() -> Duration {
    Duration::from_secs(86400)
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub url: Option<String>,
}

// Proxy URLs may embed credentials.
impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_forward_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: ForwardProtocol,
    /// Keep the CSV file after it has been forwarded
    #[serde(default = "default_keep_file")]
    pub keep_file: bool,
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_forward_port(),
            protocol: ForwardProtocol::default(),
            keep_file: default_keep_file(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_forward_port() -> u16 {
    514
}

fn default_keep_file() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardProtocol {
    #[default]
    #[serde(alias = "TCP")]
    Tcp,
    #[serde(alias = "UDP")]
    Udp,
}

impl std::fmt::Display for ForwardProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardProtocol::Tcp => write!(f, "TCP"),
            ForwardProtocol::Udp => write!(f, "UDP"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: PathBuf,
}
