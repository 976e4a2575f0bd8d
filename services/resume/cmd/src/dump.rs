//! Scanners that pull large communities out of router output.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use resume_wire::{LargeCommunity, UpdateMessage};

/// Marker preceding the community list in BIRD's `show route all`
pub const BIRD_MARKER: &str = "BGP.large_community: ";

/// Input formats accepted by `decode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    /// BIRD `show route all` output
    Bird,
    /// Whitespace-separated `asn:data1:data2` tokens
    Colon,
    /// A BGP UPDATE message, raw or as the hex text `update` prints
    Update,
}

/// Scan `input` in the given format
pub fn scan(format: DumpFormat, input: &[u8]) -> Result<Vec<LargeCommunity>> {
    match format {
        DumpFormat::Bird => scan_bird(&String::from_utf8_lossy(input)),
        DumpFormat::Colon => scan_colon(&String::from_utf8_lossy(input)),
        DumpFormat::Update => {
            let bytes = match hex_text(input) {
                Some(text) => hex::decode(text).context("invalid hex UPDATE message")?,
                None => input.to_vec(),
            };
            let update = UpdateMessage::decode(&bytes).context("invalid UPDATE message")?;
            Ok(update.large_communities())
        }
    }
}

/// Hex text as printed by `update`, or `None` for raw bytes
///
/// A raw message starts with the 0xff marker, so the two never overlap.
fn hex_text(input: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(input).ok()?.trim();
    (!text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())).then_some(text)
}

/// Scan the first route's `BGP.large_community` attribute
///
/// BIRD wraps long sets onto continuation lines indented with two tabs;
/// those are read until the next attribute line. Pieces that are not three
/// comma-separated numbers are skipped; a three-part piece with a
/// non-numeric part is an error.
pub fn scan_bird(text: &str) -> Result<Vec<LargeCommunity>> {
    let Some((_, rest)) = text.split_once(BIRD_MARKER) else {
        bail!("no large communities found for route");
    };
    let mut lines = rest.lines();
    let first = lines.next().unwrap_or_default();
    let continued =
        lines.take_while(|line| line.starts_with("\t\t") || line.trim_start().starts_with('('));
    let list = std::iter::once(first)
        .chain(continued)
        .collect::<Vec<_>>()
        .join(" ");

    let mut communities = Vec::new();
    for piece in list.replace(')', "").split('(') {
        let parts: Vec<&str> = piece.trim().split(", ").collect();
        if parts.len() != 3 {
            continue;
        }

        let field = |i: usize| {
            parts[i]
                .parse::<u32>()
                .with_context(|| format!("unable to parse {:?} as a community field", parts[i]))
        };
        communities.push(LargeCommunity::new(field(0)?, field(1)?, field(2)?));
    }

    Ok(communities)
}

/// Scan `a:b:c` tokens anywhere in the text
///
/// Tokens that are not three groups of digits (addresses, words) are
/// skipped; digit groups that overflow `u32` are an error.
pub fn scan_colon(text: &str) -> Result<Vec<LargeCommunity>> {
    let mut communities = Vec::new();
    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| c == ',' || c == ';');
        let parts: Vec<&str> = token.split(':').collect();
        let numeric = parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
        if parts.len() != 3 || !numeric {
            continue;
        }

        let community: LargeCommunity = token.parse()?;
        communities.push(community);
    }
    Ok(communities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resume_wire::{decode, encode, MAX_MESSAGE_SIZE};

    const BIRD_DUMP: &str = "\
Table master6:
2001:db8::/48        unicast [upstream 2026-10-18] * (100) [i]
\tvia 2001:db8::1 on eth0
\tType: BGP univ
\tBGP.origin: IGP
\tBGP.as_path:
\tBGP.next_hop: 2001:db8::1
\tBGP.local_pref: 100
\tBGP.large_community: (34553, 1065000000, 1000000000) (65000, 1, 2) (34553, 1066067000, 1000000000)
\tBGP.otc: 65000
";

    #[test]
    fn test_scan_bird() {
        let communities = scan_bird(BIRD_DUMP).unwrap();
        assert_eq!(
            communities,
            vec![
                LargeCommunity::new(34553, 1065000000, 1000000000),
                LargeCommunity::new(65000, 1, 2),
                LargeCommunity::new(34553, 1066067000, 1000000000),
            ]
        );
    }

    #[test]
    fn test_scan_bird_wrapped_set() {
        let payload = b"This resume is long enough to wrap onto a second line....";
        let communities = encode(payload, 34553).unwrap();
        let tuples: Vec<String> = communities.iter().map(|c| c.to_bird()).collect();
        let dump = format!(
            "\tBGP.local_pref: 100\n\tBGP.large_community: {}\n\t\t{}\n\tBGP.otc: 65000\n\t(1, 2, 3)\n",
            tuples[..3].join(" "),
            tuples[3..].join(" ")
        );

        let scanned = scan_bird(&dump).unwrap();
        assert_eq!(scanned, communities);
        assert_eq!(decode(&scanned, 34553).unwrap(), payload);
    }

    #[test]
    fn test_scan_bird_stops_at_next_attribute() {
        let dump = "\tBGP.large_community: (1, 2, 3)\n\tBGP.ext_community: (rt, 4, 5)\n";
        assert_eq!(scan_bird(dump).unwrap(), vec![LargeCommunity::new(1, 2, 3)]);
    }

    #[test]
    fn test_scan_bird_without_marker() {
        let err = scan_bird("Table master6:\n\tBGP.origin: IGP\n").unwrap_err();
        assert!(err.to_string().contains("no large communities"));
    }

    #[test]
    fn test_scan_bird_bad_number() {
        assert!(scan_bird("BGP.large_community: (34553, 10x5, 1)").is_err());
    }

    #[test]
    fn test_scan_bird_skips_short_pieces() {
        let communities = scan_bird("BGP.large_community: (1, 2) (3, 4, 5)").unwrap();
        assert_eq!(communities, vec![LargeCommunity::new(3, 4, 5)]);
    }

    #[test]
    fn test_scan_colon() {
        let text = "route 2001:db8::/48 via fe80::1\n34553:1065000000:1000000000, 65000:1:2\n";
        let communities = scan_colon(text).unwrap();
        assert_eq!(
            communities,
            vec![
                LargeCommunity::new(34553, 1065000000, 1000000000),
                LargeCommunity::new(65000, 1, 2),
            ]
        );
    }

    #[test]
    fn test_scan_colon_overflow() {
        assert!(scan_colon("1:2:99999999999").is_err());
    }

    #[test]
    fn test_scan_update() {
        let communities = encode(b"QQ==", 34553).unwrap();
        let update = resume_wire::UpdateMessage::announce(
            "2001:db8::/48".parse().unwrap(),
            "2001:db8::1".parse().unwrap(),
            communities.clone(),
        )
        .unwrap();
        let bytes = update.encode(MAX_MESSAGE_SIZE).unwrap();

        assert_eq!(scan(DumpFormat::Update, &bytes).unwrap(), communities);
        assert!(scan(DumpFormat::Update, b"not an update").is_err());
    }

    #[test]
    fn test_scan_update_hex() {
        let communities = encode(b"QQ==", 34553).unwrap();
        let bytes = UpdateMessage::announce(
            "192.0.2.0/24".parse().unwrap(),
            "192.0.2.1".parse().unwrap(),
            communities.clone(),
        )
        .unwrap()
        .encode(MAX_MESSAGE_SIZE)
        .unwrap();

        let printed = format!("{}\n", hex::encode(&bytes));
        assert_eq!(scan(DumpFormat::Update, printed.as_bytes()).unwrap(), communities);
        assert!(scan(DumpFormat::Update, b"ffff0").is_err());
    }
}
