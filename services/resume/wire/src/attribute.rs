//! BGP path attributes (RFC 4271, RFC 4760, RFC 8092).
//!
//! Only the attributes needed to advertise a route carrying large
//! communities are interpreted; everything else is kept as raw bytes so a
//! parsed message can still be inspected.
//!
//! ```text
//! +--------+--------+---------------------+-----------------+
//! | flags  | type   | length (1B, or 2B   | value           |
//! | (1B)   | (1B)   | if EXTENDED_LENGTH) |                 |
//! +--------+--------+---------------------+-----------------+
//! ```

use crate::community::{LargeCommunity, LARGE_COMMUNITY_SIZE};
use crate::error::WireError;
use crate::prefix::Prefix;
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// ORIGIN attribute type code
pub const ATTR_ORIGIN: u8 = 1;
/// AS_PATH attribute type code
pub const ATTR_AS_PATH: u8 = 2;
/// NEXT_HOP attribute type code
pub const ATTR_NEXT_HOP: u8 = 3;
/// MP_REACH_NLRI attribute type code
pub const ATTR_MP_REACH_NLRI: u8 = 14;
/// LARGE_COMMUNITY attribute type code
pub const ATTR_LARGE_COMMUNITY: u8 = 32;

/// Address family identifier for IPv6
pub const AFI_IPV6: u16 = 2;
/// Subsequent address family identifier for unicast
pub const SAFI_UNICAST: u8 = 1;

const AS_SEQUENCE: u8 = 2;

bitflags! {
    /// Path attribute flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u8 {
        /// Attribute is optional
        const OPTIONAL = 0x80;
        /// Attribute is transitive
        const TRANSITIVE = 0x40;
        /// Optional transitive attribute was not understood by some speaker
        const PARTIAL = 0x20;
        /// Length field is two octets
        const EXTENDED_LENGTH = 0x10;
    }
}

/// ORIGIN attribute values
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Learned from an interior gateway protocol
    Igp = 0,
    /// Learned via EGP
    Egp = 1,
    /// Learned some other way
    Incomplete = 2,
}

impl TryFrom<u8> for Origin {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Origin::Igp),
            1 => Ok(Origin::Egp),
            2 => Ok(Origin::Incomplete),
            _ => Err(WireError::Malformed(ATTR_ORIGIN)),
        }
    }
}

/// A single path attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAttribute {
    /// ORIGIN
    Origin(Origin),
    /// AS_PATH with 4-octet ASNs, segments flattened in order
    AsPath(Vec<u32>),
    /// NEXT_HOP (IPv4 routes)
    NextHop(Ipv4Addr),
    /// MP_REACH_NLRI for IPv6 unicast
    MpReachNlri {
        /// Global next hop address
        next_hop: Ipv6Addr,
        /// Reachable prefixes
        prefixes: Vec<Prefix>,
    },
    /// LARGE_COMMUNITY
    LargeCommunities(Vec<LargeCommunity>),
    /// Any attribute not interpreted here
    Unknown {
        /// Flags as received
        flags: AttrFlags,
        /// Type code
        type_code: u8,
        /// Raw value
        value: Bytes,
    },
}

impl PathAttribute {
    /// Attribute type code
    pub fn type_code(&self) -> u8 {
        match self {
            PathAttribute::Origin(_) => ATTR_ORIGIN,
            PathAttribute::AsPath(_) => ATTR_AS_PATH,
            PathAttribute::NextHop(_) => ATTR_NEXT_HOP,
            PathAttribute::MpReachNlri { .. } => ATTR_MP_REACH_NLRI,
            PathAttribute::LargeCommunities(_) => ATTR_LARGE_COMMUNITY,
            PathAttribute::Unknown { type_code, .. } => *type_code,
        }
    }

    /// Attribute flags, not counting EXTENDED_LENGTH
    pub fn flags(&self) -> AttrFlags {
        match self {
            PathAttribute::Origin(_) | PathAttribute::AsPath(_) | PathAttribute::NextHop(_) => {
                AttrFlags::TRANSITIVE
            }
            PathAttribute::MpReachNlri { .. } => AttrFlags::OPTIONAL,
            PathAttribute::LargeCommunities(_) => AttrFlags::OPTIONAL | AttrFlags::TRANSITIVE,
            PathAttribute::Unknown { flags, .. } => flags.difference(AttrFlags::EXTENDED_LENGTH),
        }
    }

    fn encode_value(&self, buf: &mut BytesMut) {
        match self {
            PathAttribute::Origin(origin) => buf.put_u8(*origin as u8),
            PathAttribute::AsPath(asns) => {
                for segment in asns.chunks(u8::MAX as usize) {
                    buf.put_u8(AS_SEQUENCE);
                    buf.put_u8(segment.len() as u8);
                    for asn in segment {
                        buf.put_u32(*asn);
                    }
                }
            }
            PathAttribute::NextHop(addr) => buf.put_slice(&addr.octets()),
            PathAttribute::MpReachNlri { next_hop, prefixes } => {
                buf.put_u16(AFI_IPV6);
                buf.put_u8(SAFI_UNICAST);
                buf.put_u8(16);
                buf.put_slice(&next_hop.octets());
                buf.put_u8(0); // reserved
                for prefix in prefixes {
                    prefix.encode(buf);
                }
            }
            PathAttribute::LargeCommunities(communities) => {
                for community in communities {
                    buf.put_slice(&community.to_bytes());
                }
            }
            PathAttribute::Unknown { value, .. } => buf.put_slice(value),
        }
    }

    /// Encode the attribute, switching to a two-octet length above 255 bytes
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        let mut value = BytesMut::new();
        self.encode_value(&mut value);

        if value.len() > u16::MAX as usize {
            return Err(WireError::Size(value.len()));
        }

        let mut flags = self.flags();
        if value.len() > u8::MAX as usize {
            flags |= AttrFlags::EXTENDED_LENGTH;
        }

        buf.put_u8(flags.bits());
        buf.put_u8(self.type_code());
        if flags.contains(AttrFlags::EXTENDED_LENGTH) {
            buf.put_u16(value.len() as u16);
        } else {
            buf.put_u8(value.len() as u8);
        }
        buf.put_slice(&value);

        Ok(())
    }

    /// Decode one attribute from the front of `buf`
    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        if buf.remaining() < 3 {
            return Err(WireError::Incomplete);
        }

        let flags = AttrFlags::from_bits_truncate(buf.get_u8());
        let type_code = buf.get_u8();
        let len = if flags.contains(AttrFlags::EXTENDED_LENGTH) {
            if buf.remaining() < 2 {
                return Err(WireError::Incomplete);
            }
            buf.get_u16() as usize
        } else {
            buf.get_u8() as usize
        };

        if buf.remaining() < len {
            return Err(WireError::Incomplete);
        }
        let mut value = buf.split_to(len);

        let attr = match type_code {
            ATTR_ORIGIN => {
                if value.len() != 1 {
                    return Err(WireError::Malformed(type_code));
                }
                PathAttribute::Origin(Origin::try_from(value.get_u8())?)
            }
            ATTR_AS_PATH => PathAttribute::AsPath(decode_as_path(&mut value)?),
            ATTR_NEXT_HOP => {
                if value.len() != 4 {
                    return Err(WireError::Malformed(type_code));
                }
                PathAttribute::NextHop(Ipv4Addr::from(value.get_u32()))
            }
            ATTR_MP_REACH_NLRI => match decode_mp_reach(value.clone())? {
                Some(attr) => attr,
                None => PathAttribute::Unknown {
                    flags,
                    type_code,
                    value,
                },
            },
            ATTR_LARGE_COMMUNITY => {
                if value.is_empty() || value.len() % LARGE_COMMUNITY_SIZE != 0 {
                    return Err(WireError::Malformed(type_code));
                }
                let mut communities = Vec::with_capacity(value.len() / LARGE_COMMUNITY_SIZE);
                while value.has_remaining() {
                    let mut raw = [0u8; LARGE_COMMUNITY_SIZE];
                    value.copy_to_slice(&mut raw);
                    communities.push(LargeCommunity::from_bytes(raw));
                }
                PathAttribute::LargeCommunities(communities)
            }
            _ => PathAttribute::Unknown {
                flags,
                type_code,
                value,
            },
        };

        Ok(attr)
    }
}

fn decode_as_path(value: &mut Bytes) -> Result<Vec<u32>, WireError> {
    let mut asns = Vec::new();
    while value.has_remaining() {
        if value.remaining() < 2 {
            return Err(WireError::Malformed(ATTR_AS_PATH));
        }
        let _segment_type = value.get_u8();
        let count = value.get_u8() as usize;
        if value.remaining() < count * 4 {
            return Err(WireError::Malformed(ATTR_AS_PATH));
        }
        for _ in 0..count {
            asns.push(value.get_u32());
        }
    }
    Ok(asns)
}

/// Returns `None` for address families other than IPv6 unicast
fn decode_mp_reach(mut value: Bytes) -> Result<Option<PathAttribute>, WireError> {
    if value.remaining() < 5 {
        return Err(WireError::Malformed(ATTR_MP_REACH_NLRI));
    }

    let afi = value.get_u16();
    let safi = value.get_u8();
    if afi != AFI_IPV6 || safi != SAFI_UNICAST {
        return Ok(None);
    }

    // 16 bytes global, or 32 with a trailing link-local address
    let nh_len = value.get_u8() as usize;
    if (nh_len != 16 && nh_len != 32) || value.remaining() < nh_len + 1 {
        return Err(WireError::Malformed(ATTR_MP_REACH_NLRI));
    }
    let mut global = [0u8; 16];
    value.copy_to_slice(&mut global);
    value.advance(nh_len - 16);
    value.advance(1); // reserved

    let mut prefixes = Vec::new();
    while value.has_remaining() {
        prefixes.push(Prefix::decode(&mut value, true)?);
    }

    Ok(Some(PathAttribute::MpReachNlri {
        next_hop: Ipv6Addr::from(global),
        prefixes,
    }))
}
