pub mod audit;
pub mod health;
pub mod init;
pub mod plans;
pub mod settle;
pub mod validate;

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Default API endpoint of a local node.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8640";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

/// Decode a successful response, or turn the node's error body into an error.
pub(crate) async fn read_response<T: DeserializeOwned>(
    what: &str,
    resp: reqwest::Response,
) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    if let Ok(err) = resp.json::<ErrorResponse>().await {
        anyhow::bail!("{what} failed (HTTP {status}, {}): {}", err.code, err.error);
    } else {
        anyhow::bail!("{what} failed (HTTP {status})");
    }
}

pub(crate) fn connect_error(endpoint: &str, err: reqwest::Error) -> anyhow::Error {
    anyhow::anyhow!(
        "could not reach node at {endpoint}: {err}\nIs the node running? Start it with: voucherpay-node"
    )
}
