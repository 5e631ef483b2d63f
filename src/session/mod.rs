#[cfg(test)]
mod session_test;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use rtcp::reception_report::ReceptionReport;
use tokio::sync::{mpsc, Mutex};
use util::conn::Conn;
use waitgroup::WaitGroup;

use crate::config::SessionConfig;
use crate::engine::RtcpEngine;
use crate::error::{Error, Result};
use crate::handler::{AvpHandler, RtcpHandler};
use crate::membership::{Origin, RtpPacketInfo, SenderInfo};

/// Largest datagram the control task reads.
const RECEIVE_MTU: usize = 8192;

pub type FnTimeGen = Arc<dyn Fn() -> SystemTime + Sync + 'static + Send>;

/// RtcpProtector authenticates and encrypts control packets, as SRTCP does.
/// Both directions are opaque to the session; failures use the transport
/// error type, with `util::Error::from_std` for the protector's own errors.
pub trait RtcpProtector: Send + Sync {
    fn protect(&self, compound: &Bytes) -> util::Result<Bytes>;
    fn unprotect(&self, datagram: &Bytes) -> util::Result<Bytes>;
}

#[derive(Debug)]
enum CloseRequest {
    Leave(Bytes),
    Abort,
}

/// RtpSessionBuilder configures an RtpSession.
pub struct RtpSessionBuilder {
    config: SessionConfig,
    handler: Option<Box<dyn RtcpHandler>>,
    now: Option<FnTimeGen>,
    protector: Option<Arc<dyn RtcpProtector>>,
    destinations: Vec<SocketAddr>,
}

impl RtpSessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        RtpSessionBuilder {
            config,
            handler: None,
            now: None,
            protector: None,
            destinations: vec![],
        }
    }

    /// with_handler sets the profile handler, AvpHandler by default.
    pub fn with_handler(mut self, handler: Box<dyn RtcpHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// with_now_fn replaces SystemTime::now as the clock of the session.
    pub fn with_now_fn(mut self, now: FnTimeGen) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_protector(mut self, protector: Arc<dyn RtcpProtector>) -> Self {
        self.protector = Some(protector);
        self
    }

    /// with_destinations makes the session send every report to each of
    /// `destinations` instead of the connected peer.
    pub fn with_destinations(mut self, destinations: Vec<SocketAddr>) -> Self {
        self.destinations = destinations;
        self
    }

    pub fn build(self, conn: Arc<dyn Conn + Send + Sync>) -> Result<RtpSession> {
        let now: FnTimeGen = match self.now {
            Some(now) => now,
            None => Arc::new(SystemTime::now),
        };
        let handler: Box<dyn RtcpHandler> = match self.handler {
            Some(handler) => handler,
            None => Box::<AvpHandler>::default(),
        };
        let check_interval = self.config.check_interval;
        let engine = RtcpEngine::with_handler(self.config, handler, now())?;

        let (close_tx, close_rx) = mpsc::channel(1);
        Ok(RtpSession {
            internal: Arc::new(SessionInternal {
                engine: Mutex::new(engine),
                conn,
                now,
                protector: self.protector,
                destinations: self.destinations,
                check_interval,
                close_rx: Mutex::new(Some(close_rx)),
            }),
            wg: Mutex::new(Some(WaitGroup::new())),
            close_tx: Mutex::new(Some(close_tx)),
        })
    }
}

struct SessionInternal {
    engine: Mutex<RtcpEngine>,
    conn: Arc<dyn Conn + Send + Sync>,
    now: FnTimeGen,
    protector: Option<Arc<dyn RtcpProtector>>,
    destinations: Vec<SocketAddr>,
    check_interval: Duration,
    close_rx: Mutex<Option<mpsc::Receiver<CloseRequest>>>,
}

impl SessionInternal {
    /// flush sends every compound packet the engine has queued. Failures are
    /// logged and the next report is scheduled regardless.
    async fn flush(&self) {
        let pending: Vec<Bytes> = {
            let mut engine = self.engine.lock().await;
            std::iter::from_fn(|| engine.poll_transmit()).collect()
        };

        for compound in pending {
            let datagram = match &self.protector {
                Some(protector) => match protector.protect(&compound) {
                    Ok(datagram) => datagram,
                    Err(err) => {
                        log::warn!("failed to protect RTCP packet: {}", err);
                        continue;
                    }
                },
                None => compound,
            };

            if self.destinations.is_empty() {
                if let Err(err) = self.conn.send(&datagram).await {
                    log::warn!("failed sending RTCP: {}", err);
                }
            } else {
                for target in &self.destinations {
                    if let Err(err) = self.conn.send_to(&datagram, *target).await {
                        log::warn!("failed sending RTCP to {}: {}", target, err);
                    }
                }
            }
        }
    }

    async fn handle_datagram(&self, datagram: Bytes, from: SocketAddr) {
        let compound = match &self.protector {
            Some(protector) => match protector.unprotect(&datagram) {
                Ok(compound) => compound,
                Err(err) => {
                    log::debug!("dropping RTCP from {}: {}", from, err);
                    return;
                }
            },
            None => datagram,
        };

        let now = (self.now)();
        let mut engine = self.engine.lock().await;
        match engine.handle_control(compound, Origin(from), now) {
            Ok(outcome) if !outcome.is_accepted() => {
                log::debug!("rejected RTCP from {}: {:?}", from, outcome);
            }
            Ok(_) => {}
            Err(err) => log::debug!("RTCP from {} not handled: {}", from, err),
        }
    }

    /// How long the control task may wait before the engine needs a tick,
    /// None once the engine is closed.
    async fn next_wait(&self) -> Option<Duration> {
        let deadline = self.engine.lock().await.poll_timeout()?;
        let now = (self.now)();
        Some(
            deadline
                .duration_since(now)
                .unwrap_or_default()
                .min(self.check_interval),
        )
    }
}

/// RtpSession runs the RTCP control channel of one RTP session over a
/// datagram transport. The media path reports its traffic through
/// `on_rtp_sent` and `on_rtp_received`.
pub struct RtpSession {
    internal: Arc<SessionInternal>,
    wg: Mutex<Option<WaitGroup>>,
    close_tx: Mutex<Option<mpsc::Sender<CloseRequest>>>,
}

impl RtpSession {
    pub fn builder(config: SessionConfig) -> RtpSessionBuilder {
        RtpSessionBuilder::new(config)
    }

    /// new creates a session sending to the connected peer of `conn`.
    pub fn new(
        config: SessionConfig,
        conn: Arc<dyn Conn + Send + Sync>,
        handler: Box<dyn RtcpHandler>,
    ) -> Result<Self> {
        RtpSessionBuilder::new(config)
            .with_handler(handler)
            .build(conn)
    }

    /// start spawns the control task.
    pub async fn start(&self) -> Result<()> {
        let close_rx = {
            let mut close_rx = self.internal.close_rx.lock().await;
            close_rx.take().ok_or(Error::ErrSessionStarted)?
        };

        let mut w = {
            let wait_group = self.wg.lock().await;
            wait_group.as_ref().map(|wg| wg.worker())
        };
        let internal = Arc::clone(&self.internal);
        tokio::spawn(async move {
            let _d = w.take();
            if let Err(err) = RtpSession::run(internal, close_rx).await {
                log::warn!("rtp session control task got error: {}", err);
            }
        });

        Ok(())
    }

    async fn run(
        internal: Arc<SessionInternal>,
        mut close_rx: mpsc::Receiver<CloseRequest>,
    ) -> Result<()> {
        let mut buf = vec![0u8; RECEIVE_MTU];
        let mut leaving = false;

        loop {
            internal.flush().await;
            let wait = match internal.next_wait().await {
                Some(wait) => wait,
                None => break,
            };

            tokio::select! {
                req = close_rx.recv(), if !leaving => {
                    let mut engine = internal.engine.lock().await;
                    match req {
                        Some(CloseRequest::Leave(reason)) => {
                            leaving = true;
                            if let Err(err) = engine.leave(reason, (internal.now)()) {
                                log::warn!("failed to leave session: {}", err);
                                engine.abort();
                            }
                        }
                        Some(CloseRequest::Abort) | None => engine.abort(),
                    }
                }
                res = internal.conn.recv_from(&mut buf) => {
                    match res {
                        Ok((n, from)) => {
                            let datagram = Bytes::copy_from_slice(&buf[..n]);
                            internal.handle_datagram(datagram, from).await;
                        }
                        Err(err) => {
                            internal.engine.lock().await.abort();
                            return Err(err.into());
                        }
                    }
                }
                _ = tokio::time::sleep(wait) => {
                    let now = (internal.now)();
                    let mut engine = internal.engine.lock().await;
                    if let Err(err) = engine.handle_timeout(now) {
                        log::warn!("failed to generate report: {}", err);
                    }
                }
            }
        }

        internal.flush().await;
        Ok(())
    }

    /// on_rtp_sent accounts one RTP packet sent by the local source.
    pub async fn on_rtp_sent(&self, payload_len: usize) -> Result<()> {
        let now = (self.internal.now)();
        let mut engine = self.internal.engine.lock().await;
        engine.record_rtp_sent(payload_len, now)
    }

    /// on_rtp_received accounts one RTP packet received from `from`. Returns
    /// false when the packet should be dropped.
    pub async fn on_rtp_received(&self, info: &RtpPacketInfo, from: SocketAddr) -> bool {
        let now = (self.internal.now)();
        let mut engine = self.internal.engine.lock().await;
        engine.record_rtp_received(info, Origin(from), now)
    }

    pub async fn local_ssrc(&self) -> u32 {
        self.internal.engine.lock().await.local_ssrc()
    }

    /// RTP timestamp for media sampled now, on the clock the SRs use.
    pub async fn rtp_timestamp(&self) -> u32 {
        let now = (self.internal.now)();
        self.internal
            .engine
            .lock()
            .await
            .local_source()
            .rtp_timestamp(now)
    }

    pub async fn members(&self) -> usize {
        self.internal.engine.lock().await.members()
    }

    pub async fn senders(&self) -> usize {
        self.internal.engine.lock().await.senders()
    }

    pub async fn sender_info(&self, ssrc: u32) -> Option<SenderInfo> {
        self.internal.engine.lock().await.sender_info(ssrc).cloned()
    }

    pub async fn receiver_info(&self, ssrc: u32) -> Option<ReceptionReport> {
        self.internal.engine.lock().await.receiver_info(ssrc).cloned()
    }

    pub async fn is_end_to_end_delayed(&self, ssrc: u32, rtp_timestamp: u32) -> bool {
        let now = (self.internal.now)();
        self.internal
            .engine
            .lock()
            .await
            .is_end_to_end_delayed(ssrc, rtp_timestamp, now)
    }

    pub async fn is_closed(&self) -> bool {
        self.internal.engine.lock().await.is_closed()
    }

    /// close leaves the session and waits until the BYE is out. In large
    /// sessions that takes one back-off interval.
    pub async fn close(&self, reason: Bytes) -> Result<()> {
        self.shutdown(CloseRequest::Leave(reason)).await
    }

    /// abort stops the session without sending BYE.
    pub async fn abort(&self) -> Result<()> {
        self.shutdown(CloseRequest::Abort).await
    }

    async fn shutdown(&self, req: CloseRequest) -> Result<()> {
        let not_started = self.internal.close_rx.lock().await.take().is_some();
        if not_started {
            {
                let mut engine = self.internal.engine.lock().await;
                match req {
                    CloseRequest::Leave(reason) => {
                        let now = (self.internal.now)();
                        engine.leave(reason, now)?;
                        if !engine.is_closed() {
                            // nobody runs the back-off without the control task
                            engine.abort();
                        }
                    }
                    CloseRequest::Abort => engine.abort(),
                }
            }
            self.internal.flush().await;
            self.close_tx.lock().await.take();
            return Ok(());
        }

        {
            let mut close_tx = self.close_tx.lock().await;
            if let Some(close_tx) = close_tx.take() {
                let _ = close_tx.send(req).await;
            }
        }

        {
            let mut wait_group = self.wg.lock().await;
            if let Some(wg) = wait_group.take() {
                wg.wait().await;
            }
        }

        Ok(())
    }
}
