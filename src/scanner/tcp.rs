//! TCP connect prober.
//!
//! Performs a standard TCP connect through the operating system's socket
//! API. The handshake either completes, is refused, or runs out of time;
//! anything else is a transport error.

use crate::banner::read_banner;
use crate::scanner::traits::{ProbeOptions, ProbeOutcome, Prober};
use crate::types::Port;
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP connect prober.
///
/// Needs no elevated privileges. Each call opens one socket, optionally
/// reads a banner, and closes it again when the stream is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }
}

/// How a failed connect is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectFailure {
    Refused,
    TimedOut,
    Other(String),
}

impl From<io::Error> for ConnectFailure {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Other(e.to_string()),
        }
    }
}

impl ConnectFailure {
    fn into_outcome(self, host: Ipv4Addr, port: Port, elapsed: Duration) -> ProbeOutcome {
        match self {
            Self::Refused => ProbeOutcome::closed(host, port, elapsed),
            Self::TimedOut => ProbeOutcome::filtered(host, port, elapsed),
            Self::Other(cause) => ProbeOutcome::error(host, port, elapsed, cause),
        }
    }
}

/// Run a connect attempt under `wait`; running out of time is `TimedOut`.
async fn bounded_connect<F, T>(wait: Duration, connect: F) -> Result<T, ConnectFailure>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(wait, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ConnectFailure::TimedOut),
    }
}

#[async_trait]
impl Prober for TcpConnectProber {
    async fn probe(&self, host: Ipv4Addr, port: Port, options: &ProbeOptions) -> ProbeOutcome {
        let addr = SocketAddr::V4(SocketAddrV4::new(host, port.as_u16()));
        let start = Instant::now();

        match bounded_connect(options.connect_timeout, TcpStream::connect(addr)).await {
            Ok(mut stream) => {
                let elapsed = start.elapsed();
                let banner = match options.banner_timeout {
                    Some(wait) => read_banner(&mut stream, wait).await,
                    None => None,
                };
                ProbeOutcome::open(host, port, elapsed).with_banner(banner)
            }
            Err(failure) => failure.into_outcome(host, port, start.elapsed()),
        }
    }
}
