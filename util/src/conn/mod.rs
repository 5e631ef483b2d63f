pub mod conn_udp;

#[cfg(test)]
mod conn_test;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

/// Datagram transport used by the control channel.
///
/// Sends are fire-and-forget from the caller's perspective: a failed send is
/// reported through the returned `Result` and never retried here.
#[async_trait]
pub trait Conn {
    async fn connect(&self, addr: SocketAddr) -> Result<()>;
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
    async fn send(&self, buf: &[u8]) -> Result<usize>;
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;
    fn local_addr(&self) -> Result<SocketAddr>;
    fn remote_addr(&self) -> Option<SocketAddr>;
    async fn close(&self) -> Result<()>;
}
