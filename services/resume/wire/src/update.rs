//! BGP UPDATE messages.
//!
//! ```text
//! +--------------------------+-------------------------------+
//! | marker (16B of 0xFF)     |                               |
//! +--------------------------+-------------------------------+
//! | u16 length | u8 type = 2 | header (19B)                  |
//! +--------------------------+-------------------------------+
//! | u16 withdrawn_len        | withdrawn IPv4 prefixes       |
//! +--------------------------+-------------------------------+
//! | u16 attrs_len            | path attributes               |
//! +--------------------------+-------------------------------+
//! | NLRI                     | announced IPv4 prefixes       |
//! +--------------------------+-------------------------------+
//! ```

use crate::attribute::{Origin, PathAttribute};
use crate::community::LargeCommunity;
use crate::error::WireError;
use crate::prefix::Prefix;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::IpAddr;

/// Message header marker
pub const MARKER: [u8; 16] = [0xFF; 16];

/// Size of the common message header
pub const HEADER_SIZE: usize = 19;

/// UPDATE message type
pub const MESSAGE_TYPE_UPDATE: u8 = 2;

/// Maximum message size without extended messages (RFC 4271)
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Maximum message size with extended messages (RFC 8654)
pub const EXTENDED_MAX_MESSAGE_SIZE: usize = 65535;

/// A BGP UPDATE message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateMessage {
    /// Withdrawn IPv4 routes
    pub withdrawn: Vec<Prefix>,
    /// Path attributes
    pub attributes: Vec<PathAttribute>,
    /// Announced IPv4 routes
    pub nlri: Vec<Prefix>,
}

impl UpdateMessage {
    /// Build an iBGP advertisement of `prefix` via `next_hop`, carrying `communities`
    ///
    /// IPv6 prefixes travel in MP_REACH_NLRI; IPv4 prefixes use the classic
    /// NLRI field with a NEXT_HOP attribute. The AS_PATH is empty as the route
    /// originates locally. No LARGE_COMMUNITY attribute is added when
    /// `communities` is empty.
    pub fn announce(
        prefix: Prefix,
        next_hop: IpAddr,
        communities: Vec<LargeCommunity>,
    ) -> Result<Self, WireError> {
        let mut attributes = vec![
            PathAttribute::Origin(Origin::Igp),
            PathAttribute::AsPath(Vec::new()),
        ];
        let mut nlri = Vec::new();

        match (prefix.addr(), next_hop) {
            (IpAddr::V6(_), IpAddr::V6(next_hop)) => {
                attributes.push(PathAttribute::MpReachNlri {
                    next_hop,
                    prefixes: vec![prefix],
                });
            }
            (IpAddr::V4(_), IpAddr::V4(next_hop)) => {
                attributes.push(PathAttribute::NextHop(next_hop));
                nlri.push(prefix);
            }
            _ => {
                return Err(WireError::Prefix(format!(
                    "next hop {} does not match the family of {}",
                    next_hop, prefix
                )))
            }
        }

        if !communities.is_empty() {
            attributes.push(PathAttribute::LargeCommunities(communities));
        }

        Ok(Self {
            withdrawn: Vec::new(),
            attributes,
            nlri,
        })
    }

    /// All large communities, in attribute order
    pub fn large_communities(&self) -> Vec<LargeCommunity> {
        self.attributes
            .iter()
            .filter_map(|attr| match attr {
                PathAttribute::LargeCommunities(communities) => Some(communities.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Encode to a complete message no larger than `max_message_size`
    pub fn encode(&self, max_message_size: usize) -> Result<Bytes, WireError> {
        let mut withdrawn = BytesMut::new();
        for prefix in &self.withdrawn {
            prefix.encode(&mut withdrawn);
        }

        let mut attrs = BytesMut::new();
        for attr in &self.attributes {
            attr.encode(&mut attrs)?;
        }

        let mut nlri = BytesMut::new();
        for prefix in &self.nlri {
            prefix.encode(&mut nlri);
        }

        let total_size = HEADER_SIZE + 2 + withdrawn.len() + 2 + attrs.len() + nlri.len();
        if total_size > max_message_size.min(EXTENDED_MAX_MESSAGE_SIZE) {
            return Err(WireError::Size(total_size));
        }

        let mut buf = BytesMut::with_capacity(total_size);
        buf.put_slice(&MARKER);
        buf.put_u16(total_size as u16);
        buf.put_u8(MESSAGE_TYPE_UPDATE);

        buf.put_u16(withdrawn.len() as u16);
        buf.put_slice(&withdrawn);

        buf.put_u16(attrs.len() as u16);
        buf.put_slice(&attrs);

        buf.put_slice(&nlri);

        Ok(buf.freeze())
    }

    /// Decode exactly one UPDATE message
    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        if raw.len() < HEADER_SIZE {
            return Err(WireError::Incomplete);
        }
        if raw[..16] != MARKER {
            return Err(WireError::Marker);
        }

        let length = u16::from_be_bytes([raw[16], raw[17]]) as usize;
        if length < HEADER_SIZE + 4 {
            return Err(WireError::Length(length));
        }
        if raw.len() < length {
            return Err(WireError::Incomplete);
        }
        if raw.len() > length {
            return Err(WireError::Length(length));
        }

        let msg_type = raw[18];
        if msg_type != MESSAGE_TYPE_UPDATE {
            return Err(WireError::Type(msg_type));
        }

        let mut body = Bytes::copy_from_slice(&raw[HEADER_SIZE..]);

        let withdrawn_len = body.get_u16() as usize;
        if body.remaining() < withdrawn_len + 2 {
            return Err(WireError::Length(length));
        }
        let mut withdrawn_bytes = body.split_to(withdrawn_len);
        let mut withdrawn = Vec::new();
        while withdrawn_bytes.has_remaining() {
            withdrawn.push(Prefix::decode(&mut withdrawn_bytes, false)?);
        }

        let attrs_len = body.get_u16() as usize;
        if body.remaining() < attrs_len {
            return Err(WireError::Length(length));
        }
        let mut attr_bytes = body.split_to(attrs_len);
        let mut attributes = Vec::new();
        while attr_bytes.has_remaining() {
            attributes.push(PathAttribute::decode(&mut attr_bytes)?);
        }

        let mut nlri = Vec::new();
        while body.has_remaining() {
            nlri.push(Prefix::decode(&mut body, false)?);
        }

        Ok(Self {
            withdrawn,
            attributes,
            nlri,
        })
    }
}
