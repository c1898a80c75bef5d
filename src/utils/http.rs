use std::time::Duration;

use reqwest::Client;

/// Builds the client shared by every remote model call. Per-request timeouts
/// (image generation) are applied on top of this one.
pub fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to build HTTP client")
}
