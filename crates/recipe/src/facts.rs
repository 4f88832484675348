use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::{debug, warn};

/// Facts about the running host used to identify the service instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    pub hostname: String,
    pub ipaddress: String,
}

impl HostFacts {
    /// Discover the short hostname and the primary IPv4 address of this host
    pub fn discover() -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
            .to_string_lossy()
            .to_string();

        let ipaddress = primary_ip()
            .unwrap_or_else(|| {
                warn!("Could not determine primary IP address, falling back to loopback");
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            })
            .to_string();

        let facts = Self {
            hostname: short_hostname(&hostname).to_string(),
            ipaddress,
        };
        debug!("Discovered host facts: {:?}", facts);
        facts
    }

    pub fn with_overrides(mut self, hostname: Option<&str>, ipaddress: Option<&str>) -> Self {
        if let Some(hostname) = hostname {
            self.hostname = hostname.to_string();
        }
        if let Some(ipaddress) = ipaddress {
            self.ipaddress = ipaddress.to_string();
        }
        self
    }
}

/// Strip the domain part of a fully qualified hostname
pub fn short_hostname(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

// Connecting a UDP socket sends nothing; it only asks the kernel which source
// address it would route from.
fn primary_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("10.255.255.255:1").ok()?;
    let addr = socket.local_addr().ok()?.ip();
    if addr.is_unspecified() {
        None
    } else {
        Some(addr)
    }
}
