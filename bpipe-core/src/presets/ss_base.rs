use bytes::{Bytes, BytesMut};

use crate::{
    action::Action,
    net::address::Address,
    options::ServiceType,
    pipeline::{Context, Preset},
    presets::PRESET_SS_BASE,
    utils::buffer::concat,
};

/// # Protocol
/// +------+----------+----------+-------------+
/// | ATYP | DST.ADDR | DST.PORT |    Data     |
/// +------+----------+----------+-------------+
/// |  1   | Variable |    2     |  Variable   |
/// +------+----------+----------+-------------+
///
/// The client learns the destination from `ConnectToRemote` and puts it in front
/// of the first outgoing buffer, the server reads it back and asks to be connected.
pub struct SsBase {
    service_type: ServiceType,
    address: Option<Address>,
    header_sent: bool,
    header_buf: BytesMut,
    pending: Vec<Bytes>,
    connected: bool,
}

impl SsBase {
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            address: None,
            header_sent: false,
            header_buf: BytesMut::new(),
            pending: vec![],
            connected: false,
        }
    }
}

impl Preset for SsBase {
    fn name(&self) -> &'static str {
        PRESET_SS_BASE
    }

    fn on_notified(&mut self, action: &Action) -> bool {
        if let (ServiceType::Client, Action::ConnectToRemote { address, .. }) = (self.service_type, action) {
            self.address = Some(address.clone());
        }
        false
    }

    fn client_out(&mut self, buf: Bytes, ctx: &mut Context) {
        if self.header_sent {
            ctx.next(buf);
            return;
        }

        match &self.address {
            Some(address) => {
                ctx.next(concat(&address.as_bytes(), &buf));
                self.header_sent = true;
            }
            None => ctx.fail("destination is unknown when sending the first packet"),
        }
    }

    fn server_in(&mut self, buf: Bytes, ctx: &mut Context) {
        if self.connected {
            ctx.next(buf);
            return;
        }

        if self.address.is_some() {
            self.pending.push(buf);
            return;
        }

        self.header_buf.extend_from_slice(&buf);

        match Address::try_from_bytes(&self.header_buf) {
            Ok(Some((address, len))) => {
                let rest = self.header_buf.split_off(len);

                if !rest.is_empty() {
                    self.pending.push(rest.freeze());
                }

                self.header_buf.clear();
                self.address = Some(address.clone());

                ctx.broadcast(Action::ConnectToRemote {
                    address,
                    on_connected: ctx.continuation(),
                });
            }
            Ok(None) => {}
            Err(err) => ctx.fail(format!("cannot resolve destination: {}", err)),
        }
    }

    fn on_connected(&mut self, ctx: &mut Context) {
        self.connected = true;

        for buf in self.pending.drain(..) {
            ctx.next(buf);
        }
    }
}
