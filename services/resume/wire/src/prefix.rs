//! IP prefixes and their NLRI encoding.

use crate::error::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 or IPv6 prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// Create a prefix, rejecting lengths past the family width and set host bits
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, WireError> {
        let max = max_len(&addr);
        if len > max {
            return Err(WireError::Prefix(format!(
                "{}/{}: length exceeds {}",
                addr, len, max
            )));
        }

        let octets = octets(&addr);
        let full = usize::from(len / 8);
        let host_bits_set = octets.iter().enumerate().any(|(i, &octet)| {
            if i < full {
                false
            } else if i == full && len % 8 != 0 {
                octet & (0xFF >> (len % 8)) != 0
            } else {
                octet != 0
            }
        });
        if host_bits_set {
            return Err(WireError::Prefix(format!("{}/{}: host bits set", addr, len)));
        }

        Ok(Self { addr, len })
    }

    /// Network address
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length in bits
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether this is the default route (`/0`)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this is an IPv6 prefix
    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }

    /// Number of octets the NLRI encoding uses, including the length octet
    pub fn encoded_len(&self) -> usize {
        1 + usize::from(self.len).div_ceil(8)
    }

    /// Write as NLRI: length in bits followed by the significant octets
    pub fn encode(&self, buf: &mut BytesMut) {
        let significant = usize::from(self.len).div_ceil(8);
        buf.put_u8(self.len);
        buf.put_slice(&octets(&self.addr)[..significant]);
    }

    /// Read one NLRI entry of the given family
    pub fn decode(buf: &mut Bytes, ipv6: bool) -> Result<Self, WireError> {
        if !buf.has_remaining() {
            return Err(WireError::Incomplete);
        }

        let len = buf.get_u8();
        let width = if ipv6 { 16 } else { 4 };
        let significant = usize::from(len).div_ceil(8);
        if significant > width {
            return Err(WireError::Prefix(format!("NLRI length {} too long", len)));
        }
        if buf.remaining() < significant {
            return Err(WireError::Incomplete);
        }

        let mut octets = [0u8; 16];
        buf.copy_to_slice(&mut octets[..significant]);

        let addr = if ipv6 {
            IpAddr::V6(Ipv6Addr::from(octets))
        } else {
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
        };
        Self::new(addr, len)
    }
}

fn max_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for Prefix {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| WireError::Prefix(format!("{}: missing '/'", s)))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| WireError::Prefix(format!("{}: bad address", s)))?;
        let len: u8 = len
            .parse()
            .map_err(|_| WireError::Prefix(format!("{}: bad length", s)))?;
        Self::new(addr, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let prefix: Prefix = "2001:db8::/48".parse().unwrap();
        assert!(prefix.is_ipv6());
        assert_eq!(prefix.len(), 48);
        assert_eq!(prefix.to_string(), "2001:db8::/48");

        let prefix: Prefix = "10.0.0.0/24".parse().unwrap();
        assert!(!prefix.is_ipv6());
        assert_eq!(prefix.to_string(), "10.0.0.0/24");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!("10.0.0.0".parse::<Prefix>().is_err());
        assert!("10.0.0.0/33".parse::<Prefix>().is_err());
        assert!("10.0.0.1/24".parse::<Prefix>().is_err());
        assert!("2001:db8::1/48".parse::<Prefix>().is_err());
        assert!("2001:db8::/129".parse::<Prefix>().is_err());
        assert!("nope/8".parse::<Prefix>().is_err());
    }

    #[test]
    fn test_partial_octet_host_bits() {
        assert!("10.0.0.128/25".parse::<Prefix>().is_ok());
        assert!("10.0.0.192/25".parse::<Prefix>().is_err());
    }

    #[test]
    fn test_nlri_encoding() {
        let prefix: Prefix = "2001:db8:1200::/40".parse().unwrap();
        let mut buf = BytesMut::new();
        prefix.encode(&mut buf);
        assert_eq!(&buf[..], &[40, 0x20, 0x01, 0x0d, 0xb8, 0x12]);
        assert_eq!(prefix.encoded_len(), buf.len());

        let mut bytes = buf.freeze();
        assert_eq!(Prefix::decode(&mut bytes, true).unwrap(), prefix);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_nlri_truncated() {
        let mut bytes = Bytes::from_static(&[24, 10, 0]);
        assert_eq!(Prefix::decode(&mut bytes, false), Err(WireError::Incomplete));

        let mut bytes = Bytes::from_static(&[40, 1, 2, 3, 4, 5]);
        assert!(matches!(
            Prefix::decode(&mut bytes, false),
            Err(WireError::Prefix(_))
        ));
    }
}
