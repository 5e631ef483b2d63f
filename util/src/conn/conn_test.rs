use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_test::assert_ok;

use super::*;

#[tokio::test]
async fn test_udp_conn_round_trip() -> Result<()> {
    let a = UdpSocket::bind("127.0.0.1:0").await?;
    let b = UdpSocket::bind("127.0.0.1:0").await?;

    let a_addr = Conn::local_addr(&a)?;
    let b_addr = Conn::local_addr(&b)?;
    Conn::connect(&a, b_addr).await?;
    assert_eq!(Conn::remote_addr(&a), Some(b_addr));

    let n = Conn::send(&a, b"hello").await?;
    assert_eq!(n, 5);

    let mut buf = vec![0u8; 16];
    let (n, from) = tokio::time::timeout(Duration::from_secs(5), Conn::recv_from(&b, &mut buf))
        .await
        .map_err(|_| crate::Error::ErrTimeout)??;
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(from, a_addr);

    Conn::send_to(&b, b"world", a_addr).await?;
    let n = Conn::recv(&a, &mut buf).await?;
    assert_eq!(&buf[..n], b"world");

    Ok(())
}

#[tokio::test]
async fn test_udp_conn_unconnected_remote_addr() -> Result<()> {
    let a = UdpSocket::bind("127.0.0.1:0").await?;
    assert_eq!(Conn::remote_addr(&a), None);
    assert_ok!(Conn::close(&a).await);
    Ok(())
}
