use std::sync::Arc;
use async_trait::async_trait;
use shared::types::DiscoveredAddresses;
use super::command::CommandRunner;
use super::parse;

/// Finds this host's overlay and LAN addresses.
/// Never fails: anything it cannot determine comes back as "".
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn discover(&self) -> DiscoveredAddresses;
}

async fn tailscale_address(runner: &dyn CommandRunner) -> String {
    parse::first_line(&runner.run("tailscale", &["ip", "-4"]).await)
}

/// Scrapes `ipconfig`, preferring the Wi-Fi adapter
pub struct WindowsResolver {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl AddressResolver for WindowsResolver {
    async fn discover(&self) -> DiscoveredAddresses {
        let (tailscale, ipconfig) = tokio::join!(
            tailscale_address(self.runner.as_ref()),
            self.runner.run("ipconfig", &[]),
        );

        DiscoveredAddresses {
            tailscale,
            lan: parse::lan_from_ipconfig(&ipconfig),
        }
    }
}

/// Scrapes iproute2's one-line output, preferring wireless interfaces
pub struct LinuxResolver {
    runner: Arc<dyn CommandRunner>,
}

impl LinuxResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl AddressResolver for LinuxResolver {
    async fn discover(&self) -> DiscoveredAddresses {
        let (tailscale, ip_addr) = tokio::join!(
            tailscale_address(self.runner.as_ref()),
            self.runner.run("ip", &["-o", "-4", "addr", "show"]),
        );

        DiscoveredAddresses {
            tailscale,
            lan: parse::lan_from_ip_addr(&ip_addr),
        }
    }
}

/// Resolver matching the platform we were built for
pub fn platform_resolver(runner: Arc<dyn CommandRunner>) -> Arc<dyn AddressResolver> {
    if cfg!(windows) {
        Arc::new(WindowsResolver::new(runner))
    } else {
        Arc::new(LinuxResolver::new(runner))
    }
}
