use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::{mpsc, Notify},
    task::JoinHandle,
    time,
};

use crate::config::{MAX_BUFFERED_SIZE, READ_CHANNEL_CAPACITY, RECV_BUFFER_SIZE};

/// Pump the read half of a socket into a channel, the channel closes on EOF or error.
pub fn spawn_reader(mut reader: OwnedReadHalf, name: String) -> (mpsc::Receiver<Bytes>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Bytes>(READ_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(RECV_BUFFER_SIZE);

        loop {
            buf.reserve(RECV_BUFFER_SIZE);

            match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(buf.split().freeze()).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::debug!("[{}] read error: {}", name, err);
                    break;
                }
            }
        }
    });

    (rx, handle)
}

/// The write half of a socket, owned by a task which writes queued buffers in order.
pub struct SocketWriter {
    name: String,
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    pending: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    drained: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl SocketWriter {
    pub fn spawn(mut writer: OwnedWriteHalf, name: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

        let pending = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let drained = Arc::new(Notify::new());

        let handle = {
            let name = name.clone();
            let pending = pending.clone();
            let closed = closed.clone();
            let drained = drained.clone();

            tokio::spawn(async move {
                while let Some(buf) = rx.recv().await {
                    if let Err(err) = writer.write_all(&buf).await {
                        log::debug!("[{}] write error: {}", name, err);
                        break;
                    }

                    let left = pending.fetch_sub(buf.len(), Ordering::SeqCst) - buf.len();

                    if left <= MAX_BUFFERED_SIZE {
                        drained.notify_waiters();
                    }
                }

                let _ = writer.shutdown().await;

                closed.store(true, Ordering::SeqCst);
                drained.notify_waiters();
            })
        };

        Self {
            name,
            tx: Some(tx),
            pending,
            closed,
            drained,
            handle,
        }
    }

    /// Queue `buf`, returns false if the socket is no longer writable.
    pub fn write(&self, buf: Bytes) -> bool {
        if buf.is_empty() {
            return !self.is_closed();
        }

        let len = buf.len();

        match &self.tx {
            Some(tx) if !self.is_closed() => {
                self.pending.fetch_add(len, Ordering::SeqCst);

                if tx.send(buf).is_err() {
                    self.pending.fetch_sub(len, Ordering::SeqCst);
                    return false;
                }
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_congested(&self) -> bool {
        self.pending() > MAX_BUFFERED_SIZE && !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolve once the queue is back under the watermark or the socket is closed.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();

            if !self.is_congested() {
                return;
            }

            notified.await;
        }
    }

    /// Flush what is queued then shut the socket down, give up after `timeout`.
    pub async fn close(mut self, timeout: Duration) {
        self.tx.take();

        if time::timeout(timeout, &mut self.handle).await.is_err() {
            log::debug!("[{}] {} bytes are dropped on close", self.name, self.pending());
            self.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        (local, peer)
    }

    #[tokio::test]
    async fn test_congested_until_peer_reads() {
        let (local, mut peer) = socket_pair().await;
        let (_reader, writer) = local.into_split();
        let writer = SocketWriter::spawn(writer, "congested".to_string());

        let chunk = Bytes::from(vec![0xab; 64 * 1024]);
        let total = 32 * 1024 * 1024;

        for _ in 0..total / chunk.len() {
            assert!(writer.write(chunk.clone()));
        }

        assert!(writer.is_congested());
        assert!(writer.pending() > MAX_BUFFERED_SIZE);

        let reading = tokio::spawn(async move {
            let mut buf = Vec::new();
            peer.read_to_end(&mut buf).await.unwrap();
            buf.len()
        });

        time::timeout(Duration::from_secs(10), writer.drained()).await.unwrap();

        assert!(!writer.is_congested());
        assert!(writer.pending() <= MAX_BUFFERED_SIZE);

        writer.close(Duration::from_secs(10)).await;

        assert_eq!(reading.await.unwrap(), total);
    }

    #[tokio::test]
    async fn test_close_flushes_queue() {
        let (local, mut peer) = socket_pair().await;
        let (_reader, writer) = local.into_split();
        let writer = SocketWriter::spawn(writer, "flush".to_string());

        assert!(writer.write(Bytes::from_static(b"hello")));
        assert!(writer.write(Bytes::new()));
        assert!(writer.write(Bytes::from_static(b" world")));

        writer.close(Duration::from_secs(5)).await;

        let mut buf = Vec::new();
        peer.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[tokio::test]
    async fn test_close_gives_up_after_timeout() {
        let (local, _peer) = socket_pair().await;
        let (_reader, writer) = local.into_split();
        let writer = SocketWriter::spawn(writer, "stuck".to_string());

        for _ in 0..512 {
            writer.write(Bytes::from(vec![0u8; 64 * 1024]));
        }

        time::timeout(Duration::from_secs(5), writer.close(Duration::from_millis(100)))
            .await
            .unwrap();
    }
}
