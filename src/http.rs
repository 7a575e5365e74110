//! Shared HTTP plumbing for the embedding and completion clients.

use std::future::Future;
use std::time::Duration;

/// Upper bound on any wait between attempts, including server-requested ones.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(32);

/// Build a client with a bounded request timeout.
pub(crate) fn client_with_timeout(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Send a request, retrying transient failures with exponential backoff.
///
/// - HTTP 429 and 5xx → retry (honouring `Retry-After` when present, capped
///   at 32s)
/// - other non-success statuses → fail immediately
/// - network errors and timeouts → retry
///
/// The error string is ready to be wrapped in the caller's error variant.
pub(crate) async fn send_with_retry<F, Fut>(
    label: &str,
    max_retries: u32,
    mut send: F,
) -> Result<reqwest::Response, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut last_err = None;
    let mut delay = Duration::ZERO;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tracing::warn!(
                "{} retrying in {}s ({}/{})",
                label,
                delay.as_secs(),
                attempt,
                max_retries
            );
            tokio::time::sleep(delay).await;
        }
        let backoff = Duration::from_secs(1 << attempt.min(5));

        match send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    delay = retry_after(response.headers()).unwrap_or(backoff);
                    let body = response.text().await.unwrap_or_default();
                    last_err = Some(format!("{} API error {}: {}", label, status, body));
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                return Err(format!("{} API error {}: {}", label, status, body));
            }
            Err(e) => {
                delay = backoff;
                last_err = Some(format!("{} request failed: {}", label, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", label)))
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers(retry_after: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(RETRY_AFTER, HeaderValue::from_str(retry_after).unwrap());
        map
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(retry_after(&headers("3")), Some(Duration::from_secs(3)));
        assert_eq!(retry_after(&headers(" 0 ")), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_is_capped() {
        assert_eq!(retry_after(&headers("3600")), Some(MAX_RETRY_DELAY));
    }

    #[test]
    fn test_retry_after_ignores_dates_and_garbage() {
        assert_eq!(retry_after(&headers("Wed, 21 Oct 2026 07:28:00 GMT")), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    async fn post(server: &MockServer, max_retries: u32) -> Result<reqwest::Response, String> {
        let client = client_with_timeout(5).unwrap();
        let url = format!("{}/v1/op", server.uri());
        send_with_retry("Test", max_retries, || client.post(&url).send()).await
    }

    #[tokio::test]
    async fn test_rate_limit_then_success_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/op"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/op"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let started = Instant::now();
        let response = post(&server, 2).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_server_error_then_success_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(post(&server, 1).await.is_ok());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = post(&server, 3).await.unwrap_err();
        assert!(err.contains("400"), "{}", err);
        assert!(err.contains("bad request"), "{}", err);
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).insert_header("retry-after", "0"))
            .expect(3)
            .mount(&server)
            .await;

        let err = post(&server, 2).await.unwrap_err();
        assert!(err.starts_with("Test API error 500"), "{}", err);
    }
}
