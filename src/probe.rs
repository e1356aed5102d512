//! Single timed HTTP probes against site endpoints

use crate::errors::Result;
use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error as _;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Outcome of one probe as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// A response arrived with this status code
    Code(u16),
    /// No response within the probe timeout
    Timeout,
    /// DNS, connect or TLS failure
    TransportError,
}

impl ProbeStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            ProbeStatus::Code(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Code(code) => write!(f, "{}", code),
            ProbeStatus::Timeout => write!(f, "TIMEOUT"),
            ProbeStatus::TransportError => write!(f, "ERROR"),
        }
    }
}

impl Serialize for ProbeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ProbeStatus::Code(code) => serializer.serialize_u16(*code),
            ProbeStatus::Timeout => serializer.serialize_str("TIMEOUT"),
            ProbeStatus::TransportError => serializer.serialize_str("ERROR"),
        }
    }
}

impl<'de> Deserialize<'de> for ProbeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u16),
            Sentinel(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Ok(ProbeStatus::Code(code)),
            Raw::Sentinel(s) if s == "TIMEOUT" => Ok(ProbeStatus::Timeout),
            Raw::Sentinel(s) if s == "ERROR" => Ok(ProbeStatus::TransportError),
            Raw::Sentinel(other) => Err(serde::de::Error::custom(format!(
                "unknown probe status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub success: bool,
    #[serde(rename = "statusCode")]
    pub status: ProbeStatus,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
}

impl ProbeResult {
    /// Result for a received response; 200..400 counts as success
    pub fn from_status(code: u16, latency_ms: u64) -> Self {
        Self {
            success: (200..400).contains(&code),
            status: ProbeStatus::Code(code),
            latency_ms,
            error_message: None,
            cache_control: None,
            content_encoding: None,
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            success: false,
            status: ProbeStatus::Timeout,
            latency_ms: after.as_millis() as u64,
            error_message: None,
            cache_control: None,
            content_encoding: None,
        }
    }

    pub fn transport_error(latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: ProbeStatus::TransportError,
            latency_ms,
            error_message: Some(message.into()),
            cache_control: None,
            content_encoding: None,
        }
    }

    fn from_response(response: &Response, latency_ms: u64) -> Self {
        let header_value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            cache_control: header_value(header::CACHE_CONTROL),
            content_encoding: header_value(header::CONTENT_ENCODING),
            ..Self::from_status(response.status().as_u16(), latency_ms)
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.status == ProbeStatus::Timeout
    }
}

/// Something that can probe a URL. Never fails: every outcome is a `ProbeResult`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

/// Probe backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        // Redirects are reported as-is: a 3xx is itself a healthy answer.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(format!("site_uptime_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            timeout: request_timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();

        // Dropping the send future on expiry aborts the connection.
        let result = match timeout(self.timeout, self.client.get(url).send()).await {
            Err(_) => ProbeResult::timed_out(self.timeout),
            Ok(Err(e)) => ProbeResult::transport_error(elapsed_ms(start), describe_error(&e)),
            Ok(Ok(response)) => ProbeResult::from_response(&response, elapsed_ms(start)),
        };

        debug!(
            "Probed {} -> {} in {}ms",
            url, result.status, result.latency_ms
        );

        result
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// reqwest's top-level message hides the cause; append the source chain
fn describe_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
