use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use crate::config::ProbeConfig;

/// Single TCP connect attempt bounded by `deadline`.
///
/// The connect and the deadline race inside one future, so the first of
/// connect/error/timeout settles the result and the other is never observed.
/// The socket is dropped before returning on every path.
pub async fn probe(host: &str, port: u16, deadline: Duration) -> bool {
    let attempt = match host.parse::<IpAddr>() {
        Ok(ip) => timeout(deadline, TcpStream::connect(SocketAddr::new(ip, port))).await,
        Err(_) => timeout(deadline, TcpStream::connect((host, port))).await,
    };

    match attempt {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            tracing::trace!("{}:{} refused: {}", host, port, e);
            false
        }
        Err(_elapsed) => {
            tracing::trace!("{}:{} timed out after {:?}", host, port, deadline);
            false
        }
    }
}

/// Probe settings shared by every request, with a global cap on open sockets
#[derive(Clone)]
pub struct Prober {
    deadline: Duration,
    max_concurrent: usize,
    permits: Arc<Semaphore>,
}

impl Prober {
    pub fn new(config: &ProbeConfig) -> Self {
        Self::with_limits(config.timeout(), config.max_concurrent)
    }

    pub fn with_limits(deadline: Duration, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            deadline,
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Waits for a free slot, then probes. Time spent queued does not count
    /// against the connect deadline.
    pub async fn probe(&self, host: &str, port: u16) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };
        probe(host, port, self.deadline).await
    }

    /// Probes currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }
}
