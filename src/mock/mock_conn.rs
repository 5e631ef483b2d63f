use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use util::conn::Conn;

type Datagram = (Bytes, SocketAddr);

/// A datagram handed to `send` or `send_to`, with the target of `send_to`.
pub type Written = (Bytes, Option<SocketAddr>);

/// MockConn is an in-memory `Conn` for testing sessions: datagrams injected
/// with `deliver` come out of `recv_from`, everything sent is recorded and
/// can be awaited with `written`.
pub struct MockConn {
    local: SocketAddr,
    remote: Option<SocketAddr>,

    inbound_tx: Mutex<Option<mpsc::Sender<Datagram>>>,
    inbound_rx: Mutex<mpsc::Receiver<Datagram>>,
    written_tx: mpsc::UnboundedSender<Written>,
    written_rx: Mutex<mpsc::UnboundedReceiver<Written>>,

    closed: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockConn {
    /// new creates a MockConn bound to `local`. With `remote` set it behaves
    /// like a connected socket.
    pub fn new(local: SocketAddr, remote: Option<SocketAddr>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(1000);
        let (written_tx, written_rx) = mpsc::unbounded_channel();

        MockConn {
            local,
            remote,

            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(inbound_rx),
            written_tx,
            written_rx: Mutex::new(written_rx),

            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// deliver queues `raw` as received from `from`.
    pub async fn deliver(&self, raw: Bytes, from: SocketAddr) {
        let inbound_tx = self.inbound_tx.lock().await;
        if let Some(tx) = &*inbound_tx {
            let _ = tx.send((raw, from)).await;
        }
    }

    /// written waits for the next datagram sent through the conn.
    pub async fn written(&self) -> Option<Written> {
        let mut written_rx = self.written_rx.lock().await;
        written_rx.recv().await
    }

    /// try_written returns the next sent datagram if there is one.
    pub async fn try_written(&self) -> Option<Written> {
        let mut written_rx = self.written_rx.lock().await;
        written_rx.try_recv().ok()
    }

    /// With `fail` set, every send returns an error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, buf: &[u8], target: Option<SocketAddr>) -> util::Result<usize> {
        if self.is_closed() {
            return Err(util::Error::ErrUseClosedNetworkConn);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(util::Error::Other("mock send failure".to_owned()));
        }

        let _ = self
            .written_tx
            .send((Bytes::copy_from_slice(buf), target));
        Ok(buf.len())
    }
}

#[async_trait]
impl Conn for MockConn {
    async fn connect(&self, _addr: SocketAddr) -> util::Result<()> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    async fn recv(&self, buf: &mut [u8]) -> util::Result<usize> {
        let (n, _) = self.recv_from(buf).await?;
        Ok(n)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> util::Result<(usize, SocketAddr)> {
        let mut inbound_rx = self.inbound_rx.lock().await;
        let (raw, from) = inbound_rx
            .recv()
            .await
            .ok_or(util::Error::ErrUseClosedNetworkConn)?;
        if raw.len() > buf.len() {
            return Err(util::Error::ErrBufferShort);
        }
        buf[..raw.len()].copy_from_slice(&raw);
        Ok((raw.len(), from))
    }

    async fn send(&self, buf: &[u8]) -> util::Result<usize> {
        if self.remote.is_none() {
            return Err(util::Error::ErrNoRemAddr);
        }
        self.record(buf, None)
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> util::Result<usize> {
        self.record(buf, Some(target))
    }

    fn local_addr(&self) -> util::Result<SocketAddr> {
        Ok(self.local)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    async fn close(&self) -> util::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(util::Error::ErrAlreadyClosed);
        }
        // dropping the sender ends a pending recv_from
        let mut inbound_tx = self.inbound_tx.lock().await;
        inbound_tx.take();
        Ok(())
    }
}
