use std::net::{IpAddr, ToSocketAddrs};

use crate::error::{Result, TraceError};

/// Maps a host name to the address that will be probed
pub trait AddressResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr>;
}

/// Resolver backed by the operating system's name service
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl AddressResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr> {
        let host = host.trim();

        // Try parsing as IP address first
        if let Ok(ip) = host.parse::<IpAddr>() {
            return if ip.is_ipv4() {
                Ok(ip)
            } else {
                Err(TraceError::NoIpv4 { host: host.to_string() })
            };
        }

        if host.is_empty() {
            return Err(TraceError::Resolution { host: host.to_string() });
        }

        let addrs: Vec<IpAddr> = format!("{}:0", host)
            .to_socket_addrs()
            .map_err(|_| TraceError::Resolution { host: host.to_string() })?
            .map(|s| s.ip())
            .collect();

        if addrs.is_empty() {
            return Err(TraceError::Resolution { host: host.to_string() });
        }

        addrs
            .into_iter()
            .find(|ip| ip.is_ipv4())
            .ok_or_else(|| TraceError::NoIpv4 { host: host.to_string() })
    }
}
