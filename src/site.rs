//! Site identity and local-network detection.

use reqwest::Url;

/// Identity of the installation a module runs on: the public URL, the
/// server's own address, and the host/runtime versions reported to the
/// licensing and update endpoints.
#[derive(Debug, Clone)]
pub struct Site {
    url: String,
    hostname: String,
    server_ip: Option<String>,
    host_version: String,
    runtime_version: String,
}

impl Site {
    pub fn new(
        url: impl Into<String>,
        host_version: impl Into<String>,
        runtime_version: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let hostname = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .or_else(|| whoami::fallible::hostname().ok())
            .unwrap_or_default();

        Self {
            url,
            hostname,
            server_ip: None,
            host_version: host_version.into(),
            runtime_version: runtime_version.into(),
        }
    }

    /// Sets the server's own IPv4 address, as seen by the host environment.
    pub fn server_ip(mut self, ip: impl Into<String>) -> Self {
        self.server_ip = Some(ip.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn host_version(&self) -> &str {
        &self.host_version
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Development and private-network sites don't count toward server-side
    /// activation totals.
    pub fn is_local(&self) -> bool {
        if self.hostname.ends_with(".local")
            || self.hostname.ends_with(".test")
            || self.hostname == "localhost"
        {
            return true;
        }

        match &self.server_ip {
            Some(ip) => {
                ip == "127.0.0.1"
                    || cidr_match(ip, "10.0.0.0/8")
                    || cidr_match(ip, "172.16.0.0/12")
                    || cidr_match(ip, "192.168.0.0/16")
            }
            None => false,
        }
    }
}

/// Whether an IPv4 address falls inside a `prefix/bits` range. A range
/// without `/bits` is a single-address match.
pub fn cidr_match(ip: &str, range: &str) -> bool {
    let (subnet, bits) = match range.split_once('/') {
        Some((subnet, bits)) => (subnet, bits.trim().parse::<u32>().unwrap_or(32)),
        None => (range, 32),
    };

    let (Some(ip), Some(subnet)) = (ipv4_bits(ip), ipv4_bits(subnet)) else {
        return false;
    };

    let mask = ((-1i64) << (32 - bits.min(32))) as u32;

    (ip & mask) == (subnet & mask)
}

fn ipv4_bits(addr: &str) -> Option<u32> {
    addr.trim().parse::<std::net::Ipv4Addr>().ok().map(u32::from)
}
