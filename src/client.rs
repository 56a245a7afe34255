//! USGS earthquake feed client.
//!
//! Provides blocking HTTP access to the four "all events" summary feeds.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::errors::FetchError;
use crate::models::{self, QuakeEvent};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakemap/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for earthquake feeds.
pub const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Time span covered by a summary feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl TimeWindow {
    pub const ALL: [Self; 4] = [Self::Hour, Self::Day, Self::Week, Self::Month];

    /// Short name used on the command line and in URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Label shown in the time-range selector.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hour => "Last Hour",
            Self::Day => "Last 24 Hours",
            Self::Week => "Last 7 Days",
            Self::Month => "Last 30 Days",
        }
    }

    /// Summary feed file for this window.
    #[must_use]
    pub const fn feed_name(self) -> &'static str {
        match self {
            Self::Hour => "all_hour",
            Self::Day => "all_day",
            Self::Week => "all_week",
            Self::Month => "all_month",
        }
    }

    /// Full endpoint URL under `base_url`.
    #[must_use]
    pub fn endpoint(self, base_url: &str) -> String {
        format!(
            "{}/earthquakes/feed/v1.0/summary/{}.geojson",
            base_url.trim_end_matches('/'),
            self.feed_name()
        )
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" | "all_hour" => Ok(Self::Hour),
            "day" | "all_day" => Ok(Self::Day),
            "week" | "all_week" => Ok(Self::Week),
            "month" | "all_month" => Ok(Self::Month),
            _ => Err(format!(
                "unknown time window: {s} (expected: hour, day, week, month)"
            )),
        }
    }
}

/// Anything that can produce the event list for a time window.
///
/// The controller is driven through this seam so tests can substitute a
/// scripted source for the network.
pub trait FeedSource {
    /// Fetch every event in `window`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the feed cannot be retrieved.
    fn fetch_events(&self, window: TimeWindow) -> Result<Vec<QuakeEvent>, FetchError>;
}

/// Client for the USGS summary feeds.
pub struct UsgsClient {
    client: Client,
    base_url: String,
}

impl UsgsClient {
    /// Create a client against an arbitrary feed host.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl FeedSource for UsgsClient {
    #[instrument(skip(self), fields(window = window.as_str()))]
    fn fetch_events(&self, window: TimeWindow) -> Result<Vec<QuakeEvent>, FetchError> {
        let url = window.endpoint(&self.base_url);

        debug!("fetching feed from {}", url);

        let response = self.client.get(&url).send()?;

        // Check status before reading the body
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        let events = models::parse_feed(&body);

        debug!("fetched {} events", events.len());
        Ok(events)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use axum::http::{StatusCode, Uri};
    use axum::Router;

    /// Spawn a local feed host that answers every path with `status` and
    /// `body`. Returns the base URL and the list of requested paths.
    pub fn spawn_stub(status: StatusCode, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorded = hits.clone();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let app = Router::new().fallback(move |uri: Uri| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().unwrap().push(uri.path().to_string());
                        (status, body)
                    }
                });
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        (format!("http://{addr}"), hits)
    }
}
