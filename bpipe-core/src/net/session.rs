use std::{net::SocketAddr, sync::Arc};

use anyhow::{Error, Result};
use bytes::Bytes;
use tokio::{
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::{
    action::Action,
    behaviour::Behaviour,
    net::{
        address::Address,
        balancer::Upstream,
        connect,
        io::{spawn_reader, SocketWriter},
        service::ServiceContext,
    },
    options::ServiceType,
    pipeline::{Continuation, Direction, Output, Pipeline},
    presets::create_presets,
};

enum Flow {
    Continue,
    Close,
}

enum Event {
    Inbound(Option<Bytes>),
    Outbound(Option<Bytes>),
    Drained,
    Timeout,
}

async fn recv(rx: &mut Option<mpsc::Receiver<Bytes>>) -> Option<Bytes> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn drained(writer: &Option<SocketWriter>) {
    match writer {
        Some(writer) => writer.drained().await,
        None => std::future::pending().await,
    }
}

/// One proxied connection.
///
/// The inbound socket is the accepted one: an application on the client, a client
/// on the server. The outbound socket is dialed on `ConnectToRemote`: the upstream
/// server on the client, the destination on the server.
pub struct Session {
    peer: SocketAddr,
    ctx: Arc<ServiceContext>,
    upstream: Option<Upstream>,
    pipeline: Pipeline,
    actions: mpsc::UnboundedReceiver<Action>,
    inbound: mpsc::Receiver<Bytes>,
    inbound_writer: SocketWriter,
    outbound: Option<mpsc::Receiver<Bytes>>,
    outbound_writer: Option<SocketWriter>,
    // pipeline output produced before the outbound socket is connected
    outbound_pending: Vec<Bytes>,
    readers: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(stream: TcpStream, peer: SocketAddr, ctx: Arc<ServiceContext>) -> Result<Self> {
        // the client picks its server once, the pipeline is built from that server's presets
        let upstream = match ctx.service_type {
            ServiceType::Client => Some(
                ctx.balancer
                    .select()
                    .ok_or_else(|| Error::msg(format!("[{}] no server is available", peer)))?,
            ),
            ServiceType::Server => None,
        };

        let (configs, key) = match &upstream {
            Some(upstream) => (&upstream.presets, &upstream.key),
            None => (&ctx.presets, &ctx.key),
        };

        let presets = create_presets(configs, ctx.service_type, key)?;
        let mut pipeline = Pipeline::new(ctx.service_type, presets);

        let (tx, actions) = mpsc::unbounded_channel::<Action>();

        pipeline.on_notified(Box::new(move |action| {
            let _ = tx.send(action);
        }));

        let (reader, writer) = stream.into_split();
        let (inbound, reader_handle) = spawn_reader(reader, peer.to_string());
        let inbound_writer = SocketWriter::spawn(writer, peer.to_string());

        Ok(Self {
            peer,
            ctx,
            upstream,
            pipeline,
            actions,
            inbound,
            inbound_writer,
            outbound: None,
            outbound_writer: None,
            outbound_pending: vec![],
            readers: vec![reader_handle],
        })
    }

    pub fn preset_names(&self) -> Vec<&'static str> {
        self.pipeline.preset_names()
    }

    pub async fn handle(mut self) -> Result<()> {
        log::debug!("[{}] presets: {}", self.peer, self.preset_names().join(" -> "));

        self.pipeline.on_broadcast(Action::PresetInit);
        self.pipeline.on_broadcast(Action::ConnectionCreated { peer: self.peer });

        let result = self.run().await;

        self.close().await;

        result
    }

    fn inbound_direction(&self) -> Direction {
        match self.ctx.service_type {
            ServiceType::Client => Direction::Upward,
            ServiceType::Server => Direction::Downward,
        }
    }

    async fn run(&mut self) -> Result<()> {
        let timeout = self.ctx.timeout;
        let idle = time::sleep(timeout);
        tokio::pin!(idle);

        loop {
            if let Flow::Close = self.handle_actions().await? {
                return Ok(());
            }

            let inbound_blocked = self.outbound_writer.as_ref().map(|w| w.is_congested()).unwrap_or(false);
            let outbound_blocked = self.inbound_writer.is_congested();

            let event = tokio::select! {
                buf = self.inbound.recv(), if !inbound_blocked => Event::Inbound(buf),
                buf = recv(&mut self.outbound), if !outbound_blocked => Event::Outbound(buf),
                _ = self.inbound_writer.drained(), if outbound_blocked => Event::Drained,
                _ = drained(&self.outbound_writer), if inbound_blocked => Event::Drained,
                _ = &mut idle => Event::Timeout,
            };

            match event {
                Event::Inbound(Some(buf)) => {
                    idle.as_mut().reset(Instant::now() + timeout);
                    let output = self.pipeline.feed(self.inbound_direction(), buf);
                    self.route(output)?;
                }
                Event::Outbound(Some(buf)) => {
                    idle.as_mut().reset(Instant::now() + timeout);
                    let output = self.pipeline.feed(self.inbound_direction().opposite(), buf);
                    self.route(output)?;
                }
                Event::Inbound(None) => {
                    log::debug!("[{}] inbound is closed", self.peer);
                    return Ok(());
                }
                Event::Outbound(None) => {
                    log::debug!("[{}] outbound is closed", self.peer);
                    return Ok(());
                }
                Event::Drained => {}
                Event::Timeout => {
                    log::info!("[{}] closed after {}s of inactivity", self.peer, timeout.as_secs());
                    return Ok(());
                }
            }
        }
    }

    /// Write pipeline output to the exit socket of each direction.
    fn route(&mut self, output: Output) -> Result<()> {
        let Output { upward, downward } = output;

        let (to_outbound, to_inbound) = match self.ctx.service_type {
            ServiceType::Client => (upward, downward),
            ServiceType::Server => (downward, upward),
        };

        for buf in to_inbound {
            if !self.inbound_writer.write(buf) {
                return Err(Error::msg(format!("[{}] inbound is not writable", self.peer)));
            }
        }

        for buf in to_outbound {
            match &self.outbound_writer {
                Some(writer) => {
                    if !writer.write(buf) {
                        return Err(Error::msg(format!("[{}] outbound is not writable", self.peer)));
                    }
                }
                None => self.outbound_pending.push(buf),
            }
        }

        Ok(())
    }

    async fn handle_actions(&mut self) -> Result<Flow> {
        while let Ok(action) = self.actions.try_recv() {
            match action {
                Action::ConnectToRemote { address, on_connected } => {
                    self.connect(address, on_connected).await?;
                }
                Action::PresetFailed { name, message, org_data } => {
                    log::warn!(
                        "[{}] preset {} failed: {}, apply \"{}\"",
                        self.peer,
                        name,
                        message,
                        self.ctx.on_preset_failed
                    );
                    self.on_preset_failed(org_data).await?;
                    return Ok(Flow::Close);
                }
                Action::PresetCloseConnection => {
                    log::debug!("[{}] closed by preset", self.peer);
                    return Ok(Flow::Close);
                }
                action => {
                    log::trace!("[{}] ignore {}", self.peer, action);
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn connect(&mut self, address: Address, on_connected: Continuation) -> Result<()> {
        if self.outbound_writer.is_some() {
            log::warn!("[{}] already connected, ignore connecting to {}", self.peer, address);
            return Ok(());
        }

        if !address.is_valid() {
            return Err(Error::msg(format!("[{}] destination {} is invalid", self.peer, address)));
        }

        let target = match &self.upstream {
            Some(upstream) => upstream.address.clone(),
            None => address.clone(),
        };

        let start = Instant::now();

        let stream = match connect(self.ctx.resolver.as_ref(), &target).await {
            Ok(stream) => stream,
            Err(err) => {
                if let Some(upstream) = &self.upstream {
                    self.ctx.balancer.report_failure(upstream.id);
                }
                return Err(Error::msg(format!("[{}] {}", self.peer, err)));
            }
        };

        if let Some(upstream) = &self.upstream {
            self.ctx.balancer.report_latency(upstream.id, start.elapsed());
            log::info!("[{}] connected to {} via {}", self.peer, address, target);
        } else {
            log::info!("[{}] connected to {}", self.peer, address);
        }

        let name = format!("{} -> {}", self.peer, target);
        let (reader, writer) = stream.into_split();
        let (outbound, handle) = spawn_reader(reader, name.clone());
        let writer = SocketWriter::spawn(writer, name);

        for buf in self.outbound_pending.drain(..) {
            writer.write(buf);
        }

        self.readers.push(handle);
        self.outbound = Some(outbound);
        self.outbound_writer = Some(writer);

        let output = self.pipeline.resume(on_connected);
        self.route(output)
    }

    async fn close_outbound(&mut self) {
        self.outbound.take();
        self.outbound_pending.clear();

        if let Some(writer) = self.outbound_writer.take() {
            writer.close(self.ctx.timeout).await;
        }
    }

    async fn on_preset_failed(&mut self, org_data: Bytes) -> Result<()> {
        match self.ctx.on_preset_failed.clone() {
            Behaviour::Close => Ok(()),
            Behaviour::RandomTimeout => {
                let timeout = Behaviour::random_timeout();

                log::info!("[{}] connection will be closed in {}s", self.peer, timeout.as_secs());

                self.close_outbound().await;

                let deadline = time::sleep(timeout);
                tokio::pin!(deadline);

                loop {
                    tokio::select! {
                        _ = &mut deadline => break,
                        buf = self.inbound.recv() => {
                            if buf.is_none() {
                                break;
                            }
                        }
                    }
                }

                Ok(())
            }
            Behaviour::Redirect(address) => {
                self.close_outbound().await;
                self.redirect(&address, org_data).await
            }
        }
    }

    /// Relay raw bytes between the inbound socket and `address`, starting with `org_data`.
    async fn redirect(&mut self, address: &Address, org_data: Bytes) -> Result<()> {
        let stream = connect(self.ctx.resolver.as_ref(), address)
            .await
            .map_err(|err| Error::msg(format!("[{}] redirect failed: {}", self.peer, err)))?;

        log::info!("[{}] redirect to {}", self.peer, address);

        let name = format!("{} -> {}", self.peer, address);
        let (reader, writer) = stream.into_split();
        let (mut rx, handle) = spawn_reader(reader, name.clone());
        let writer = SocketWriter::spawn(writer, name);

        self.readers.push(handle);
        writer.write(org_data);

        let timeout = self.ctx.timeout;
        let idle = time::sleep(timeout);
        tokio::pin!(idle);

        loop {
            let inbound_blocked = writer.is_congested();
            let redirect_blocked = self.inbound_writer.is_congested();

            let event = tokio::select! {
                buf = self.inbound.recv(), if !inbound_blocked => Event::Inbound(buf),
                buf = rx.recv(), if !redirect_blocked => Event::Outbound(buf),
                _ = writer.drained(), if inbound_blocked => Event::Drained,
                _ = self.inbound_writer.drained(), if redirect_blocked => Event::Drained,
                _ = &mut idle => Event::Timeout,
            };

            match event {
                Event::Inbound(Some(buf)) => {
                    idle.as_mut().reset(Instant::now() + timeout);
                    if !writer.write(buf) {
                        break;
                    }
                }
                Event::Outbound(Some(buf)) => {
                    idle.as_mut().reset(Instant::now() + timeout);
                    if !self.inbound_writer.write(buf) {
                        break;
                    }
                }
                Event::Drained => {}
                _ => break,
            }
        }

        writer.close(timeout).await;

        Ok(())
    }

    /// Drain then close both sockets, the pipeline is destroyed exactly once here.
    async fn close(self) {
        let Session {
            peer,
            ctx,
            mut pipeline,
            inbound_writer,
            outbound_writer,
            readers,
            ..
        } = self;

        pipeline.on_broadcast(Action::ConnectionClosed { peer });
        pipeline.destroy();

        if let Some(writer) = outbound_writer {
            writer.close(ctx.timeout).await;
        }

        inbound_writer.close(ctx.timeout).await;

        for handle in readers {
            handle.abort();
        }
    }
}
