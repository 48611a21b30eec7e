//! HTTP client for plantwatch sensor devices.
//!
//! A sensor device (or its cloud proxy) exposes two endpoints:
//!
//! - `GET {base_url}/data` returns the latest reading as JSON
//!   (`{"temperature": 25.5, "humidity": 60.0, "light": 300, "soil": 1800}`,
//!   unknown fields ignored)
//! - `GET {base_url}/setThreshold?tempThreshold={int}&lightThreshold={int}`
//!   stores new alert thresholds on the device; success iff HTTP 200
//!
//! The client performs no retries and sets no request timeout; failure
//! handling and scheduling belong to the caller.
//!
//! # Example
//!
//! ```no_run
//! use plantwatch_client::{DeviceClient, SensorSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DeviceClient::new("http://192.168.1.50")?;
//! let reading = client.fetch_reading().await?;
//! println!("temperature: {}", reading.temperature);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use plantwatch_types::Reading;

/// Error type for device client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device is not reachable (connection refused, timeout, DNS).
    #[error("Device not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed after a connection was established.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The device answered with a non-success status.
    #[error("Device returned HTTP {status}")]
    Status { status: u16 },
}

/// Result type for device client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Anything the repository can poll for readings.
///
/// Implemented by [`DeviceClient`]; test code substitutes its own source.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Fetch the latest reading.
    async fn fetch_reading(&self) -> Result<Reading>;

    /// Push new thresholds to the device.
    async fn set_thresholds(&self, temperature: i32, light: i32) -> Result<()>;
}

/// HTTP client for a single sensor device.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    client: Client,
    base_url: String,
}

impl DeviceClient {
    /// Create a new client for the device at `base_url`.
    ///
    /// The URL must use `http://` or `https://`; a trailing slash is
    /// stripped.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = normalize_url(base_url)?;
        let client = Client::builder().build().map_err(Error::Request)?;
        Ok(Self { client, base_url })
    }

    /// Create a client with a custom reqwest `Client`.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let base_url = normalize_url(base_url)?;
        Ok(Self { client, base_url })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::NotReachable {
                url: url.to_string(),
                source: e,
            })
    }
}

fn normalize_url(base_url: &str) -> Result<String> {
    let base_url = base_url.trim_end_matches('/').to_string();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }
    Ok(base_url)
}

#[async_trait]
impl SensorSource for DeviceClient {
    async fn fetch_reading(&self) -> Result<Reading> {
        let url = format!("{}/data", self.base_url);
        let response = self.get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
            });
        }

        let reading: Reading = response.json().await.map_err(Error::Request)?;
        debug!(
            temperature = reading.temperature,
            light = reading.light,
            "fetched reading"
        );
        Ok(reading)
    }

    async fn set_thresholds(&self, temperature: i32, light: i32) -> Result<()> {
        let url = format!(
            "{}/setThreshold?tempThreshold={}&lightThreshold={}",
            self.base_url, temperature, light
        );
        let response = self.get(&url).await?;

        let status = response.status();
        // The device firmware acknowledges with a bare 200; anything else
        // counts as failure.
        if status.as_u16() == 200 {
            debug!(temperature, light, "thresholds pushed to device");
            Ok(())
        } else {
            Err(Error::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = DeviceClient::new("http://192.168.1.50:8080").unwrap();
        assert_eq!(client.base_url(), "http://192.168.1.50:8080");
    }

    #[test]
    fn client_normalizes_trailing_slash() {
        let client = DeviceClient::new("http://192.168.1.50/").unwrap();
        assert_eq!(client.base_url(), "http://192.168.1.50");
    }

    #[test]
    fn client_rejects_missing_scheme() {
        let result = DeviceClient::new("192.168.1.50:8080");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn error_display_includes_status() {
        let err = Error::Status { status: 503 };
        assert_eq!(err.to_string(), "Device returned HTTP 503");
    }
}
