//! Server address parsing.

use std::fmt;

use serde::Serialize;

/// Port assumed when an address omits one.
pub const DEFAULT_PORT: u16 = 11211;

/// A backend endpoint: `host[:port]` or a `unix://` socket path (port 0).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerAddress {
    pub node: String,
    pub port: u16,
}

impl ServerAddress {
    /// Parses an address. A missing or unparsable port falls back to the default.
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        if let Some(path) = address.strip_prefix("unix://") {
            return Self {
                node: path.to_string(),
                port: 0,
            };
        }

        match address.split_once(':') {
            Some((node, port)) => Self {
                node: node.to_string(),
                port: port.parse().unwrap_or(DEFAULT_PORT),
            },
            None => Self {
                node: address.to_string(),
                port: DEFAULT_PORT,
            },
        }
    }

    pub fn is_unix_socket(&self) -> bool {
        self.port == 0
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unix_socket() {
            write!(f, "unix://{}", self.node)
        } else {
            write!(f, "{}:{}", self.node, self.port)
        }
    }
}
