// HTTP client configuration and utilities

use std::time::Duration;
use streamed_core::{AudioError, Result};

/// Agent settings for remote resources
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
    pub max_redirects: u32,
    /// Extra attempts after the first failed GET
    pub retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            user_agent: format!("streamed-audio/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            retries: 2,
        }
    }
}

/// Create a configured HTTP agent
pub fn create_http_agent(config: &HttpConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(config.connect_timeout)
        .timeout_read(config.read_timeout)
        .user_agent(&config.user_agent)
        .redirects(config.max_redirects)
        .build()
}

/// HTTP client wrapper
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_config(HttpConfig::default())
    }

    pub fn with_config(config: HttpConfig) -> Self {
        Self {
            agent: create_http_agent(&config),
            config,
        }
    }

    /// GET with exponential backoff between attempts
    pub fn get(&self, url: &str) -> Result<ureq::Response> {
        let mut last_error = None;

        for attempt in 0..=self.config.retries {
            match self.agent.get(url).call() {
                Ok(response) => return Ok(response),
                // Client errors will not improve on retry
                Err(ureq::Error::Status(code, _)) if (400..500).contains(&code) => {
                    return Err(AudioError::Network(format!("HTTP GET {} returned {}", url, code)));
                }
                Err(e) => {
                    if attempt < self.config.retries {
                        let delay = backoff(attempt);
                        log::warn!("GET {} failed (attempt {}): {}, retrying after {:?}", url, attempt + 1, e, delay);
                        std::thread::sleep(delay);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AudioError::Network(format!(
            "HTTP GET {} failed after {} attempts: {}",
            url,
            self.config.retries + 1,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub fn head(&self, url: &str) -> Result<ureq::Response> {
        self.agent
            .head(url)
            .call()
            .map_err(|e| AudioError::Network(format!("HTTP HEAD failed: {}", e)))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.min(6)))
}

/// Parse a Content-Length header value
pub fn content_length(response: &ureq::Response) -> Option<u64> {
    parse_length(response.header("Content-Length"))
}

fn parse_length(value: Option<&str>) -> Option<u64> {
    value.and_then(|s| s.trim().parse::<u64>().ok())
}
