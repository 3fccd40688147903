use crate::core::error::RateError;
use crate::providers::util::{RetryPolicy, with_retry};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Source of raw bulletin documents.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetches the XML document for `date`, or the rolling `today` document
    /// when `is_today` is set.
    async fn fetch(&self, date: NaiveDate, is_today: bool) -> Result<String, RateError>;
}

pub struct TcmbClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    /// Minimum spacing between the starts of two requests, across tasks.
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl TcmbClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, RateError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tcmb-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RateError::permanent(base_url, None, e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
            request_delay: Duration::ZERO,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    /// Waits until `request_delay` has passed since the previous request.
    /// The lock is held while waiting, so concurrent callers queue up.
    async fn throttle(&self) {
        if self.request_delay.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.request_delay).await;
        }
        *last = Some(Instant::now());
    }

    pub fn today_url(&self) -> String {
        format!("{}/kurlar/today.xml", self.base_url)
    }

    /// `2024-01-15` maps to `/kurlar/202401/15012024.xml`.
    pub fn historical_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/kurlar/{}/{}.xml",
            self.base_url,
            date.format("%Y%m"),
            date.format("%d%m%Y")
        )
    }

    async fn get_once(&self, url: &str) -> Result<String, RateError> {
        self.throttle().await;
        debug!("Requesting rate bulletin from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let message = format!("HTTP {status}");
            return Err(if status.is_server_error() || code == 429 {
                RateError::transient(url, Some(code), message)
            } else {
                RateError::permanent(url, Some(code), message)
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))
    }
}

fn classify_request_error(url: &str, err: reqwest::Error) -> RateError {
    let status = err.status().map(|s| s.as_u16());
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        RateError::transient(url, status, err)
    } else {
        RateError::permanent(url, status, err)
    }
}

#[async_trait]
impl FeedSource for TcmbClient {
    async fn fetch(&self, date: NaiveDate, is_today: bool) -> Result<String, RateError> {
        let url = if is_today {
            self.today_url()
        } else {
            self.historical_url(date)
        };
        with_retry(&self.retry, || self.get_once(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, retries: u32) -> TcmbClient {
        TcmbClient::new(
            &server.uri(),
            Duration::from_secs(5),
            RetryPolicy::new(retries, Duration::from_millis(1)),
        )
        .unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = TcmbClient::new(
            "https://www.tcmb.gov.tr/",
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(
            client.today_url(),
            "https://www.tcmb.gov.tr/kurlar/today.xml"
        );
        assert_eq!(
            client.historical_url(day()),
            "https://www.tcmb.gov.tr/kurlar/202401/15012024.xml"
        );
        assert_eq!(
            client.historical_url(NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()),
            "https://www.tcmb.gov.tr/kurlar/202312/01122023.xml"
        );
    }

    #[tokio::test]
    async fn test_fetch_historical_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kurlar/202401/15012024.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<Tarih_Date/>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server, 3).fetch(day(), false).await.unwrap();
        assert_eq!(body, "<Tarih_Date/>");
    }

    #[tokio::test]
    async fn test_fetch_today_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kurlar/today.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("today"))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server, 0).fetch(day(), true).await.unwrap();
        assert_eq!(body, "today");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kurlar/202401/15012024.xml"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, 2).fetch(day(), false).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.code(), "TCMB_CONNECTION_ERROR");
    }

    #[tokio::test]
    async fn test_not_found_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kurlar/202401/15012024.xml"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, 3).fetch(day(), false).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(err.code(), "TCMB_API_ERROR");
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kurlar/today.xml"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kurlar/today.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server, 3).fetch(day(), true).await.unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let client = TcmbClient::new(
            "http://127.0.0.1:1",
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .unwrap();
        let err = client.fetch(day(), true).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_requests() {
        let client = TcmbClient::new(
            "http://localhost",
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .unwrap()
        .with_request_delay(Duration::from_millis(100));

        let started = Instant::now();
        client.throttle().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
        client.throttle().await;
        client.throttle().await;
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_spaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kurlar/today.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("today"))
            .expect(3)
            .mount(&server)
            .await;
        let client = client(&server, 0).with_request_delay(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let results =
            futures::future::join_all((0..3).map(|_| client.fetch(day(), true))).await;
        assert!(results.iter().all(Result::is_ok));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
