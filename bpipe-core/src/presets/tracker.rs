use std::{net::SocketAddr, time::Instant};

use bytes::Bytes;

use crate::{
    action::Action,
    net::address::Address,
    pipeline::{Context, Preset},
    presets::PRESET_TRACKER,
    utils::fmt::format_size,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Traffic {
    pub bytes: u64,
    pub packets: u64,
}

impl Traffic {
    fn record(&mut self, buf: &Bytes) {
        self.bytes += buf.len() as u64;
        self.packets += 1;
    }
}

/// Counts the traffic of a connection and logs it when the connection is closed,
/// always the last preset.
pub struct Tracker {
    peer: Option<SocketAddr>,
    target: Option<Address>,
    upward: Traffic,
    downward: Traffic,
    created_at: Instant,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            peer: None,
            target: None,
            upward: Traffic::default(),
            downward: Traffic::default(),
            created_at: Instant::now(),
        }
    }

    pub fn summary(&self) -> String {
        let target = self.target.as_ref().map(|t| t.as_string()).unwrap_or_else(|| "-".into());

        format!(
            "{} up {} ({} packets) down {} ({} packets)",
            target,
            format_size(self.upward.bytes),
            self.upward.packets,
            format_size(self.downward.bytes),
            self.downward.packets,
        )
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Preset for Tracker {
    fn name(&self) -> &'static str {
        PRESET_TRACKER
    }

    fn on_notified(&mut self, action: &Action) -> bool {
        match action {
            Action::ConnectionCreated { peer } => {
                self.peer = Some(*peer);
            }
            Action::ConnectToRemote { address, .. } => {
                self.target = Some(address.clone());
            }
            Action::ConnectionClosed { peer } => {
                log::info!(
                    "[{}] [tracker] {} in {:.2}s",
                    self.peer.unwrap_or(*peer),
                    self.summary(),
                    self.created_at.elapsed().as_secs_f64()
                );
            }
            _ => {}
        }
        false
    }

    fn before_out(&mut self, buf: Bytes, ctx: &mut Context) {
        self.upward.record(&buf);
        ctx.next(buf);
    }

    fn before_in(&mut self, buf: Bytes, ctx: &mut Context) {
        self.downward.record(&buf);
        ctx.next(buf);
    }
}
