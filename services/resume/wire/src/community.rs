//! BGP large community (RFC 8092) values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoded size of one large community on the wire
pub const LARGE_COMMUNITY_SIZE: usize = 12;

/// A BGP large community: a global administrator plus two local data parts
///
/// The payload codec uses `global_admin` as the tag that identifies its
/// communities and the two local data parts as packed payload slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LargeCommunity {
    /// Global administrator (the tag, usually an ASN)
    pub global_admin: u32,
    /// First local data part
    pub local_data1: u32,
    /// Second local data part
    pub local_data2: u32,
}

impl LargeCommunity {
    /// Create a new large community
    pub fn new(global_admin: u32, local_data1: u32, local_data2: u32) -> Self {
        Self {
            global_admin,
            local_data1,
            local_data2,
        }
    }

    /// Encode to the 12-octet wire form (big-endian)
    pub fn to_bytes(self) -> [u8; LARGE_COMMUNITY_SIZE] {
        let mut out = [0u8; LARGE_COMMUNITY_SIZE];
        out[0..4].copy_from_slice(&self.global_admin.to_be_bytes());
        out[4..8].copy_from_slice(&self.local_data1.to_be_bytes());
        out[8..12].copy_from_slice(&self.local_data2.to_be_bytes());
        out
    }

    /// Decode from the 12-octet wire form
    pub fn from_bytes(bytes: [u8; LARGE_COMMUNITY_SIZE]) -> Self {
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self::new(word(0), word(4), word(8))
    }

    /// Render in BIRD's `(a, b, c)` notation
    pub fn to_bird(&self) -> String {
        format!(
            "({}, {}, {})",
            self.global_admin, self.local_data1, self.local_data2
        )
    }
}

/// Canonical RFC 8195 `a:b:c` notation
impl fmt::Display for LargeCommunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.global_admin, self.local_data1, self.local_data2
        )
    }
}

/// Error parsing a large community from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid large community: {0:?}")]
pub struct ParseCommunityError(pub String);

/// Parses either `a:b:c` or BIRD's `(a, b, c)`
impl FromStr for LargeCommunity {
    type Err = ParseCommunityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'));

        let parts: Vec<&str> = match inner {
            Some(body) => body.split(',').map(str::trim).collect(),
            None => trimmed.split(':').collect(),
        };

        if parts.len() != 3 {
            return Err(ParseCommunityError(s.to_string()));
        }

        let field = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| ParseCommunityError(s.to_string()))
        };

        Ok(Self::new(field(parts[0])?, field(parts[1])?, field(parts[2])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_bird() {
        let community = LargeCommunity::new(34553, 1065000000, 1000000000);
        assert_eq!(community.to_string(), "34553:1065000000:1000000000");
        assert_eq!(community.to_bird(), "(34553, 1065000000, 1000000000)");
    }

    #[test]
    fn test_parse_both_notations() {
        let expected = LargeCommunity::new(34553, 1065000000, 1000000000);
        assert_eq!("34553:1065000000:1000000000".parse::<LargeCommunity>(), Ok(expected));
        assert_eq!("(34553, 1065000000, 1000000000)".parse::<LargeCommunity>(), Ok(expected));
        assert_eq!(" (34553,1065000000,1000000000) ".parse::<LargeCommunity>(), Ok(expected));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("34553:1065000000".parse::<LargeCommunity>().is_err());
        assert!("a:b:c".parse::<LargeCommunity>().is_err());
        assert!("1:2:4294967296".parse::<LargeCommunity>().is_err());
        assert!("(1, 2)".parse::<LargeCommunity>().is_err());
    }

    #[test]
    fn test_wire_bytes() {
        let community = LargeCommunity::new(0x01020304, 0x05060708, 0x090A0B0C);
        let bytes = community.to_bytes();
        assert_eq!(bytes, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(LargeCommunity::from_bytes(bytes), community);
    }

    #[test]
    fn test_json_shape() {
        let community = LargeCommunity::new(34553, 1065000000, 1000000000);
        let json = serde_json::to_value(community).unwrap();
        assert_eq!(json["global_admin"], 34553);
        assert_eq!(json["local_data2"], 1000000000);
    }
}
