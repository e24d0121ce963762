//! The fetch entry point abstraction and its network implementation.

use crate::error::{FetchMockError, Result};
use crate::request::{FetchCall, FetchInput};
use crate::response::{MockResponse, ResponseSpec};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Anything that can answer a fetch call: the network, a mock, a test double.
#[async_trait]
pub trait FetchHandler: Send + Sync {
    async fn fetch(&self, call: FetchCall) -> Result<MockResponse>;
}

/// Shared HTTP client for network fetches
static HTTP_CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();

fn get_http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Real network fetch backed by `reqwest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkFetch;

impl NetworkFetch {
    pub fn new() -> Self {
        NetworkFetch
    }
}

#[async_trait]
impl FetchHandler for NetworkFetch {
    async fn fetch(&self, call: FetchCall) -> Result<MockResponse> {
        let client = get_http_client();
        let url = call.url();
        let method = reqwest::Method::from_bytes(call.method().to_uppercase().as_bytes())
            .map_err(|e| FetchMockError::Network(format!("invalid method: {e}")))?;

        debug!("Network fetch: {} {}", method, url);

        let mut request = client.request(method, &url);
        match &call.input {
            FetchInput::Request(native) => {
                request = request.headers(native.headers().clone());
                if !native.body().is_empty() {
                    request = request.body(native.body().clone());
                }
            }
            FetchInput::Url(_) => {
                if let Some(init) = &call.init {
                    for (name, values) in init.headers.iter() {
                        if name == "host" || name == "content-length" {
                            continue;
                        }
                        for value in values {
                            request = request.header(name, value.as_str());
                        }
                    }
                    if let Some(body) = &init.body {
                        request = request.body(body.clone());
                    }
                }
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response.bytes().await?;

        let built = MockResponse::new(status, headers, Some(body), url.as_str());
        Ok(if final_url != url {
            built.redirected_view(final_url)
        } else {
            built
        })
    }
}

/// A response spec that forwards the call to `handler`.
pub fn forward_to(handler: Arc<dyn FetchHandler>) -> ResponseSpec {
    ResponseSpec::callback(move |url, options| {
        let handler = Arc::clone(&handler);
        let call = FetchCall::new(url, Some(options.clone()));
        ResponseSpec::try_deferred(async move {
            let response = handler.fetch(call).await?;
            Ok(ResponseSpec::from(response))
        })
    })
}
