//! Shared HTTP client construction for consistent timeout configuration.

use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create an HTTP client with a per-request timeout.
///
/// Config: 5s connect timeout, `timeout` for the whole request, rustls TLS,
/// `vellum/{version}` user-agent, redirect limit 10.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized (should never happen with rustls).
#[must_use]
pub fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .user_agent(concat!("vellum/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("HTTP client construction must not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_successfully() {
        let _client = client_with_timeout(Duration::from_secs(30));
    }

    #[test]
    fn client_builds_with_short_timeout() {
        let _client = client_with_timeout(Duration::from_millis(200));
    }
}
