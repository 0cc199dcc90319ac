use bytes::Bytes;

use crate::{
    action::Action,
    pipeline::{Context, Preset},
    presets::PRESET_PROXY,
    proxy::{ClientProxy, Completion, Handshake, Pending},
};

/// Answers Socks5, Socks4(a) and HTTP proxy handshakes of applications, always
/// the first preset on the client.
#[derive(Default)]
pub struct Proxy {
    detector: ClientProxy,
    // application data received while waiting for the remote
    held: Vec<Bytes>,
}

impl Proxy {
    pub fn new() -> Self {
        Default::default()
    }

    fn finish(&mut self, ctx: &mut Context) {
        let Completion { reply, forward } = self.detector.complete();

        if let Some(reply) = reply {
            ctx.reply(reply);
        }

        if let Some(forward) = forward {
            ctx.next(forward);
        }

        for buf in self.held.drain(..) {
            if self.detector.is_socks_udp_ready() {
                continue;
            }
            ctx.next(buf);
        }
    }
}

impl Preset for Proxy {
    fn name(&self) -> &'static str {
        PRESET_PROXY
    }

    fn before_out(&mut self, buf: Bytes, ctx: &mut Context) {
        if self.detector.is_done() {
            // an udp associated tcp connection is a control channel only
            if !self.detector.is_socks_udp_ready() {
                ctx.next(buf);
            }
            return;
        }

        if self.detector.is_pending() {
            self.held.push(buf);
            return;
        }

        let Handshake { reply, address } = self.detector.make_handshake(&buf);

        if let Some(reply) = reply {
            ctx.reply(reply);
        }

        let address = match address {
            Some(address) => address,
            None => return,
        };

        if matches!(self.detector.pending(), Some(Pending::Socks5 { udp: true, .. })) {
            // nothing to connect for udp associate
            self.finish(ctx);
            return;
        }

        ctx.broadcast(Action::ConnectToRemote {
            address,
            on_connected: ctx.continuation(),
        });
    }

    fn on_connected(&mut self, ctx: &mut Context) {
        self.finish(ctx);
    }
}
