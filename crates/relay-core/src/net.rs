use core::fmt;
use core::net::Ipv4Addr;

use heapless::String;

/// Maximum host name length accepted in a `host:port` target
pub const MAX_HOST_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    /// No `:` separator in the target
    MissingPort,
    /// Nothing before the last `:`
    EmptyHost,
    /// Host does not fit into [`MAX_HOST_LEN`]
    HostTooLong,
    /// Port is not a decimal number in `1..=65535`
    InvalidPort,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::MissingPort => write!(f, "missing port separator"),
            EndpointError::EmptyHost => write!(f, "empty host"),
            EndpointError::HostTooLong => write!(f, "host name too long"),
            EndpointError::InvalidPort => write!(f, "invalid port"),
        }
    }
}

/// Remote TCP endpoint given as a host name or a literal address plus port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String<MAX_HOST_LEN>,
    pub port: u16,
}

impl Endpoint {
    /// Parse a `host:port` string.
    ///
    /// The host ends at the *last* `:`, so anything before the final port
    /// separator (including other colons) is kept as the host verbatim.
    pub fn parse(target: &str) -> Result<Self, EndpointError> {
        let (host, port) = target
            .trim()
            .rsplit_once(':')
            .ok_or(EndpointError::MissingPort)?;

        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }

        let port = match port.parse::<u16>() {
            Ok(0) | Err(_) => return Err(EndpointError::InvalidPort),
            Ok(port) => port,
        };

        let mut owned = String::new();
        owned
            .push_str(host)
            .map_err(|()| EndpointError::HostTooLong)?;

        Ok(Self { host: owned, port })
    }

    /// Returns the host as an address when it is a dotted-decimal IPv4
    /// literal, so name resolution can be skipped.
    pub fn literal_ip(&self) -> Option<Ipv4Addr> {
        self.host.parse::<Ipv4Addr>().ok()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
