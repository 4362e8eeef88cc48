//! Connection roles and how they are read from the upgrade request.

use std::fmt;

use crate::protocol::control::SOURCE_QUERY_KEY;

/// Which side of the relay a connection is on.
///
/// Decided once, while the WebSocket handshake is being accepted, and never
/// re-inspected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The single producer supplying the live stream.
    Source,
    /// A consumer receiving copies of the stream.
    Listener,
}

impl Role {
    /// Classifies a connection from the raw query string of its upgrade
    /// request (without the leading `?`).
    ///
    /// The role is [`Role::Source`] only when the query carries
    /// `source=true` exactly; any other value, a missing key, or a missing
    /// query means [`Role::Listener`].  If the key is repeated the first
    /// occurrence wins.
    ///
    /// ```rust
    /// use minicast_core::Role;
    ///
    /// assert_eq!(Role::from_query(Some("source=true")), Role::Source);
    /// assert_eq!(Role::from_query(Some("source=1")), Role::Listener);
    /// assert_eq!(Role::from_query(None), Role::Listener);
    /// ```
    pub fn from_query(query: Option<&str>) -> Self {
        let Some(query) = query else {
            return Role::Listener;
        };

        let flag = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == SOURCE_QUERY_KEY)
            .map(|(_, value)| value);

        match flag.as_deref() {
            Some("true") => Role::Source,
            _ => Role::Listener,
        }
    }

    pub fn is_source(self) -> bool {
        matches!(self, Role::Source)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Listener => "listener",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
