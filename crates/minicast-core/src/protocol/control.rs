//! Role flag, control message, and source endpoint construction.

use thiserror::Error;
use url::Url;

/// Query parameter carrying the role flag on the upgrade request.
pub const SOURCE_QUERY_KEY: &str = "source";

/// Path the relay accepts upgrades on unless configured otherwise.
pub const DEFAULT_RELAY_PATH: &str = "/ws";

/// The only text message the relay sends: a second source is refused.
///
/// A source receiving this is closed immediately afterwards and should not
/// reconnect without backing off.
pub const SOURCE_BUSY_MESSAGE: &str = "Another source is already connected";

/// Errors building a source endpoint URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid relay URL: {0}")]
    Parse(#[from] url::ParseError),

    /// Only `ws` and `wss` endpoints can carry a WebSocket session.
    #[error("unsupported URL scheme '{0}' (expected ws or wss)")]
    UnsupportedScheme(String),
}

/// Turns a relay endpoint into the URL a source connects to.
///
/// Any existing `source` parameter is replaced by `source=true`; other query
/// parameters are preserved.
///
/// ```rust
/// let url = minicast_core::source_url("ws://127.0.0.1:8000/ws").unwrap();
/// assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws?source=true");
/// ```
///
/// # Errors
///
/// Returns [`EndpointError::Parse`] for malformed URLs and
/// [`EndpointError::UnsupportedScheme`] for anything other than `ws`/`wss`.
pub fn source_url(endpoint: &str) -> Result<Url, EndpointError> {
    let mut url = Url::parse(endpoint)?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SOURCE_QUERY_KEY)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(SOURCE_QUERY_KEY, "true");

    Ok(url)
}
