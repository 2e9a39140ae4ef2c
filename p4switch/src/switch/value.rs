//! Typed match and action parameter values.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::SwitchError;

/// 48-bit Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// The address as an integer.
    pub fn value(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = SwitchError;

    /// Accepts `aa:bb:cc:dd:ee:ff` and `AA-BB-CC-DD-EE-FF`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SwitchError::InvalidValue {
            field: s.to_string(),
            message: "expected six hex octets separated by ':' or '-'".to_string(),
        };

        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

/// An IP network: address plus prefix length.
///
/// Host bits are kept as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPrefix {
    addr: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Build a prefix, checking the length against the address family.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, SwitchError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(SwitchError::InvalidValue {
                field: format!("{addr}/{prefix_len}"),
                message: format!("prefix length must be at most {max}"),
            });
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| SwitchError::InvalidValue {
            field: s.to_string(),
            message: message.to_string(),
        };

        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| invalid("expected <address>/<prefix length>"))?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid("bad IP address"))?;
        let len: u8 = len.parse().map_err(|_| invalid("bad prefix length"))?;
        Self::new(addr, len)
    }
}

/// Integer value of an IP address.
pub(crate) fn ip_value(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// A match field or action parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchValue {
    /// Ethernet address.
    Mac(MacAddress),
    /// IPv4 or IPv6 address.
    Ip(IpAddr),
    /// IP network (LPM key).
    Network(IpPrefix),
    /// Plain unsigned integer (ports, ids, ...).
    Int(u128),
    /// Opaque token passed through verbatim.
    Ident(String),
}

impl MatchValue {
    /// Opaque identifier value.
    pub fn ident(s: impl Into<String>) -> Self {
        Self::Ident(s.into())
    }
}

/// Text as accepted by `simple_switch_CLI`.
impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchValue::Mac(mac) => fmt::Display::fmt(mac, f),
            MatchValue::Ip(ip) => fmt::Display::fmt(ip, f),
            MatchValue::Network(net) => fmt::Display::fmt(net, f),
            MatchValue::Int(n) => fmt::Display::fmt(n, f),
            MatchValue::Ident(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for MatchValue {
                fn from(n: $t) -> Self {
                    MatchValue::Int(u128::from(n))
                }
            }
        )*
    };
}

impl_from_int!(u8, u16, u32, u64, u128);

impl From<MacAddress> for MatchValue {
    fn from(mac: MacAddress) -> Self {
        MatchValue::Mac(mac)
    }
}

impl From<IpAddr> for MatchValue {
    fn from(ip: IpAddr) -> Self {
        MatchValue::Ip(ip)
    }
}

impl From<Ipv4Addr> for MatchValue {
    fn from(ip: Ipv4Addr) -> Self {
        MatchValue::Ip(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for MatchValue {
    fn from(ip: Ipv6Addr) -> Self {
        MatchValue::Ip(IpAddr::V6(ip))
    }
}

impl From<IpPrefix> for MatchValue {
    fn from(net: IpPrefix) -> Self {
        MatchValue::Network(net)
    }
}
