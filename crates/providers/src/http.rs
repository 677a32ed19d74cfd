//! Shared HTTP plumbing for the vendor adapters.

use forgeloop_core::error::ProviderError;
use forgeloop_core::message::Message;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Build the HTTP client used by an adapter.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Map a transport failure onto the error taxonomy.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Send a prepared request and decode a successful JSON body.
///
/// Non-success statuses are classified from the status and the error body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let error = ProviderError::from_status(status.as_u16(), &body);
        warn!(provider, status = status.as_u16(), error = %error, "Provider returned error");
        return Err(error);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("{provider}: {e}")))
}

/// Text rendering of an assistant turn whose tool calls were never answered.
///
/// Vendors reject a tool invocation without a matching result, so such a
/// turn is replayed as prose.
pub(crate) fn unanswered_calls_as_text(msg: &Message) -> String {
    let calls = msg
        .tool_calls
        .iter()
        .map(|c| c.signature())
        .collect::<Vec<_>>()
        .join(", ");
    if msg.content.is_empty() {
        format!("[tool calls not executed: {calls}]")
    } else {
        format!("{}\n\n[tool calls not executed: {calls}]", msg.content)
    }
}
