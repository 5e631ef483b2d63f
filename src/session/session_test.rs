use std::time::Duration;

use rtcp::compound_packet::CompoundReader;
use rtcp::goodbye::Goodbye;
use rtcp::header::PacketType;
use rtcp::packet::Packet;
use rtcp::receiver_report::ReceiverReport;
use rtcp::source_description::{
    SdesType, SourceDescription, SourceDescriptionChunk, SourceDescriptionItem,
};

use tokio_test::assert_ok;

use super::*;
use crate::config::BandwidthConfig;
use crate::interval::{IntervalInput, IntervalModel};
use crate::mock::mock_conn::MockConn;
use crate::mock::mock_time::MockTime;

const LOCAL: &str = "127.0.0.1:5005";
const PEER: &str = "127.0.0.1:6005";

struct FixedHandler;

impl RtcpHandler for FixedHandler {
    fn compute_interval(&mut self, input: &IntervalInput, bw: &BandwidthConfig) -> Duration {
        IntervalModel::compute_interval(input, bw, 1.0)
    }

    fn schedule_sdes_item(&mut self, _configured: &[SdesType]) -> Option<SdesType> {
        None
    }
}

/// Prefixes every packet with a four octet tag.
struct TagProtector;

const TAG: &[u8] = b"SRTC";

impl RtcpProtector for TagProtector {
    fn protect(&self, compound: &Bytes) -> util::Result<Bytes> {
        let mut out = TAG.to_vec();
        out.extend_from_slice(compound);
        Ok(Bytes::from(out))
    }

    fn unprotect(&self, datagram: &Bytes) -> util::Result<Bytes> {
        if !datagram.starts_with(TAG) {
            return Err(util::Error::Other("missing tag".to_owned()));
        }
        Ok(datagram.slice(TAG.len()..))
    }
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn config() -> SessionConfig {
    SessionConfig::builder()
        .with_cname("session@example.com")
        .with_local_ssrc(0x5E55)
        .with_check_interval(Duration::from_millis(20))
        .build()
        .unwrap()
}

struct Fixture {
    session: RtpSession,
    conn: Arc<MockConn>,
    time: Arc<MockTime>,
}

fn fixture_with(builder: RtpSessionBuilder) -> Fixture {
    let conn = Arc::new(MockConn::new(addr(LOCAL), Some(addr(PEER))));
    let time = Arc::new(MockTime::new(
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
    ));
    let clock = Arc::clone(&time);
    let session = builder
        .with_handler(Box::new(FixedHandler))
        .with_now_fn(Arc::new(move || clock.now()))
        .build(Arc::clone(&conn) as Arc<dyn Conn + Send + Sync>)
        .unwrap();
    Fixture {
        session,
        conn,
        time,
    }
}

fn fixture() -> Fixture {
    fixture_with(RtpSession::builder(config()))
}

fn peer_report(ssrc: u32) -> Bytes {
    let packets: Vec<Box<dyn Packet + Send + Sync>> = vec![
        Box::new(ReceiverReport {
            ssrc,
            ..Default::default()
        }),
        Box::new(SourceDescription {
            chunks: vec![SourceDescriptionChunk {
                source: ssrc,
                items: vec![SourceDescriptionItem {
                    sdes_type: SdesType::SdesCname,
                    text: Bytes::from_static(b"peer@example.com"),
                }],
            }],
        }),
    ];
    rtcp::packet::marshal(&packets).unwrap()
}

fn goodbye_sources(raw: &Bytes) -> Vec<u32> {
    CompoundReader::new(raw.clone())
        .filter_map(|sub| sub.ok())
        .filter(|sub| sub.header.packet_type == PacketType::Goodbye)
        .flat_map(|sub| sub.decode::<Goodbye>().unwrap().sources)
        .collect()
}

async fn next_written(conn: &MockConn) -> (Bytes, Option<SocketAddr>) {
    tokio::time::timeout(Duration::from_secs(2), conn.written())
        .await
        .expect("nothing was sent")
        .expect("conn dropped")
}

async fn drain_written(conn: &MockConn) -> Vec<(Bytes, Option<SocketAddr>)> {
    let mut out = vec![];
    while let Some(w) = conn.try_written().await {
        out.push(w);
    }
    out
}

async fn wait_for_members(session: &RtpSession, want: usize) {
    for _ in 0..100 {
        if session.members().await == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("member count never reached {want}");
}

#[tokio::test]
async fn test_session_sends_reports() {
    let f = fixture();
    assert_ok!(f.session.start().await);

    // nothing before the first report is due
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(f.conn.try_written().await.is_none());

    f.time.advance(Duration::from_secs(3));
    let (raw, target) = next_written(&f.conn).await;
    assert_eq!(target, None, "connected send");
    let sub = CompoundReader::new(raw).next().unwrap().unwrap();
    assert_eq!(sub.header.packet_type, PacketType::ReceiverReport);
    assert_eq!(sub.first_ssrc(), Some(0x5E55));

    assert_ok!(f.session.abort().await);
}

#[tokio::test]
async fn test_session_receives_reports() {
    let f = fixture();
    assert_ok!(f.session.start().await);

    f.conn.deliver(peer_report(0xBEEF), addr(PEER)).await;
    wait_for_members(&f.session, 2).await;

    assert_ok!(f.session.abort().await);
    assert!(f.session.is_closed().await);
}

#[tokio::test]
async fn test_session_close_sends_bye() {
    let f = fixture();
    assert_ok!(f.session.start().await);
    assert_ok!(f.session.on_rtp_sent(160).await);

    f.session
        .close(Bytes::from_static(b"shutting down"))
        .await
        .unwrap();
    assert!(f.session.is_closed().await);

    let sent = drain_written(&f.conn).await;
    let byes: Vec<u32> = sent.iter().flat_map(|(raw, _)| goodbye_sources(raw)).collect();
    assert_eq!(byes, vec![0x5E55]);
}

#[tokio::test]
async fn test_session_abort_skips_bye() {
    let f = fixture();
    assert_ok!(f.session.start().await);
    assert_ok!(f.session.on_rtp_sent(160).await);

    assert_ok!(f.session.abort().await);
    assert!(f.session.is_closed().await);

    let sent = drain_written(&f.conn).await;
    assert!(sent.iter().all(|(raw, _)| goodbye_sources(raw).is_empty()));
    assert_eq!(
        f.session.on_rtp_sent(160).await,
        Err(Error::ErrSessionClosed)
    );
}

#[tokio::test]
async fn test_session_start_twice() {
    let f = fixture();
    assert_ok!(f.session.start().await);
    assert_eq!(f.session.start().await, Err(Error::ErrSessionStarted));
    assert_ok!(f.session.abort().await);
}

#[tokio::test]
async fn test_close_without_start_uses_destinations() {
    let destinations = vec![addr("10.0.0.1:5005"), addr("10.0.0.2:5005")];
    let f = fixture_with(RtpSession::builder(config()).with_destinations(destinations.clone()));
    assert_ok!(f.session.on_rtp_sent(160).await);

    assert_ok!(f.session.close(Bytes::new()).await);

    let sent = drain_written(&f.conn).await;
    let targets: Vec<Option<SocketAddr>> = sent.iter().map(|(_, t)| *t).collect();
    assert_eq!(
        targets,
        destinations.into_iter().map(Some).collect::<Vec<_>>()
    );
    assert!(sent
        .iter()
        .all(|(raw, _)| goodbye_sources(raw) == vec![0x5E55]));
}

#[tokio::test]
async fn test_session_protector() {
    let f = fixture_with(RtpSession::builder(config()).with_protector(Arc::new(TagProtector)));
    assert_ok!(f.session.start().await);

    // unprotected input is dropped, protected input is processed
    f.conn.deliver(peer_report(0xBEEF), addr(PEER)).await;
    let mut tagged = TAG.to_vec();
    tagged.extend_from_slice(&peer_report(0xCAFE));
    f.conn.deliver(Bytes::from(tagged), addr(PEER)).await;
    wait_for_members(&f.session, 2).await;
    assert!(f.session.receiver_info(0xBEEF).await.is_none());

    f.time.advance(Duration::from_secs(3));
    let (raw, _) = next_written(&f.conn).await;
    assert!(raw.starts_with(TAG));

    assert_ok!(f.session.abort().await);
}

#[tokio::test]
async fn test_send_failure_keeps_scheduling() {
    let f = fixture();
    assert_ok!(f.session.start().await);

    f.conn.set_fail_sends(true);
    f.time.advance(Duration::from_secs(3));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.conn.try_written().await.is_none());
    assert!(!f.session.is_closed().await);

    f.conn.set_fail_sends(false);
    f.time.advance(Duration::from_secs(10));
    let (raw, _) = next_written(&f.conn).await;
    assert!(!raw.is_empty());

    assert_ok!(f.session.abort().await);
}
