use std::{fmt::Display, net::SocketAddr};

use bytes::Bytes;

use crate::{net::address::Address, pipeline::Continuation};

/// Control messages travelling on the pipeline bus, orthogonal to the data flow.
#[derive(Debug, Clone)]
pub enum Action {
    PresetInit,
    ConnectionCreated {
        peer: SocketAddr,
    },
    ConnectionClosed {
        peer: SocketAddr,
    },
    /// Ask the session to dial `address` then resume the pipeline at `on_connected`.
    ConnectToRemote {
        address: Address,
        on_connected: Continuation,
    },
    /// Raised by `Context::fail`, `org_data` is the raw buffer which was fed to the pipeline.
    PresetFailed {
        name: &'static str,
        message: String,
        org_data: Bytes,
    },
    PresetCloseConnection,
}

impl Action {
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::PresetInit => "@action:preset_init",
            Action::ConnectionCreated { .. } => "@action:connection_created",
            Action::ConnectionClosed { .. } => "@action:connection_closed",
            Action::ConnectToRemote { .. } => "@action:connect_to_remote",
            Action::PresetFailed { .. } => "@action:preset_failed",
            Action::PresetCloseConnection => "@action:preset_close_connection",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::ConnectionCreated { peer } | Action::ConnectionClosed { peer } => {
                write!(f, "{} {}", self.type_name(), peer)
            }
            Action::ConnectToRemote { address, .. } => write!(f, "{} {}", self.type_name(), address),
            Action::PresetFailed { name, message, .. } => {
                write!(f, "{} [{}] {}", self.type_name(), name, message)
            }
            _ => f.write_str(self.type_name()),
        }
    }
}
