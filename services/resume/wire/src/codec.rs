//! Payload codec between raw bytes and large communities.
//!
//! Every payload byte is written as a three-digit decimal group. Groups are
//! collected three at a time into a bucket, and a bucket is packed into a
//! ten-digit integer with a leading `1` so the value never starts with zero
//! and always fits in a `u32`. Two packed buckets fill the local data parts of
//! one community, whose global administrator carries the caller's tag.
//!
//! ```text
//! "A" -> [065] -> [065 000 000] -> 1065000000 -> (tag, 1065000000, 1000000000)
//! ```
//!
//! The group `000` is the padding sentinel. It fills the tail of the last
//! bucket, and a whole sentinel bucket (`1000000000`) fills an unused second
//! slot. Decoding skips sentinel groups, so a literal zero byte cannot be
//! carried and is rejected at encode time.

use crate::community::LargeCommunity;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Number of digit groups packed into one bucket
pub const GROUPS_PER_BUCKET: usize = 3;

/// Leading digit of every packed bucket, as a value
pub const BUCKET_LEADER: u32 = 1_000_000_000;

/// Packed form of a bucket holding only sentinels
pub const EMPTY_BUCKET: u32 = BUCKET_LEADER;

/// Largest value a packed bucket can take
pub const MAX_PACKED: u32 = 1_999_999_999;

/// Largest payload unit a digit group may carry
pub const MAX_PAYLOAD_VALUE: u32 = u8::MAX as u32;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload unit does not fit in a byte-sized digit group
    #[error("payload value {value} at position {position} is out of range (max 255)")]
    OutOfRange {
        /// Index of the offending unit in the payload
        position: usize,
        /// The unit's numeric value
        value: u32,
    },

    /// Payload byte is zero, which would be read back as padding
    #[error("payload value 0 at position {position} collides with the padding sentinel")]
    ReservedValue {
        /// Index of the offending unit in the payload
        position: usize,
    },

    /// Local data part is not a packed bucket
    #[error("malformed community data {0}: expected a value in 1000000000..=1999999999")]
    Malformed(u32),

    /// Digit group decodes to a value that is not a byte
    #[error("digit group {group:03} in community data {value} is not a byte")]
    InvalidGroup {
        /// The packed value containing the group
        value: u32,
        /// The offending group
        group: u16,
    },
}

/// One payload unit as a three-digit decimal group (`000`..=`999`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DigitGroup(u16);

impl DigitGroup {
    /// Padding sentinel (`000`)
    pub const SENTINEL: DigitGroup = DigitGroup(0);

    /// Validate a payload unit found at `position` and wrap it as a group
    pub fn from_payload(position: usize, value: u32) -> Result<Self, CodecError> {
        if value == 0 {
            return Err(CodecError::ReservedValue { position });
        }
        if value > MAX_PAYLOAD_VALUE {
            return Err(CodecError::OutOfRange { position, value });
        }
        Ok(Self(value as u16))
    }

    /// Numeric value of the group
    pub fn value(self) -> u16 {
        self.0
    }

    /// Whether this is the padding sentinel
    pub fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }
}

impl fmt::Display for DigitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Three digit groups destined for one local data part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bucket([DigitGroup; GROUPS_PER_BUCKET]);

impl Bucket {
    /// Bucket holding only sentinels
    pub const EMPTY: Bucket = Bucket([DigitGroup::SENTINEL; GROUPS_PER_BUCKET]);

    /// Build a bucket from up to three groups, padding the rest with sentinels
    pub fn padded(groups: &[DigitGroup]) -> Self {
        let mut bucket = Self::EMPTY;
        let len = groups.len().min(GROUPS_PER_BUCKET);
        bucket.0[..len].copy_from_slice(&groups[..len]);
        bucket
    }

    /// The bucket's groups in order
    pub fn groups(&self) -> &[DigitGroup; GROUPS_PER_BUCKET] {
        &self.0
    }

    /// Pack into `1` followed by the nine group digits
    pub fn pack(&self) -> u32 {
        let [a, b, c] = self.0;
        BUCKET_LEADER + u32::from(a.0) * 1_000_000 + u32::from(b.0) * 1_000 + u32::from(c.0)
    }

    /// Split a packed value back into its groups
    pub fn unpack(value: u32) -> Result<Self, CodecError> {
        if !(BUCKET_LEADER..=MAX_PACKED).contains(&value) {
            return Err(CodecError::Malformed(value));
        }

        let digits = value - BUCKET_LEADER;
        Ok(Self([
            DigitGroup((digits / 1_000_000) as u16),
            DigitGroup((digits / 1_000 % 1_000) as u16),
            DigitGroup((digits % 1_000) as u16),
        ]))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}{}{}", a, b, c)
    }
}

/// Hook for inspecting the codec's intermediate values
pub trait CodecObserver: Send + Sync {
    /// Buckets built from the payload, after padding
    fn on_buckets(&self, _tag: u32, _buckets: &[Bucket]) {}

    /// Packed bucket values, in slot order, before pairing
    fn on_packed(&self, _tag: u32, _values: &[u32]) {}

    /// Encoding finished
    fn on_encoded(&self, _tag: u32, _payload_len: usize, _communities: usize) {}

    /// Local data parts that survived the tag filter, in slot order
    fn on_filtered(&self, _tag: u32, _values: &[u32]) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CodecObserver for NoopObserver {}

/// Observer that reports intermediate values at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CodecObserver for TracingObserver {
    fn on_buckets(&self, tag: u32, buckets: &[Bucket]) {
        let rendered: Vec<String> = buckets.iter().map(Bucket::to_string).collect();
        debug!(tag, buckets = buckets.len(), "Digit groups: [{}]", rendered.join(" "));
    }

    fn on_packed(&self, tag: u32, values: &[u32]) {
        debug!(tag, "Packed data values: {:?}", values);
    }

    fn on_encoded(&self, tag: u32, payload_len: usize, communities: usize) {
        debug!(tag, "Converted {} bytes into {} communities", payload_len, communities);
    }

    fn on_filtered(&self, tag: u32, values: &[u32]) {
        debug!(tag, "Matched {} data values: {:?}", values.len(), values);
    }
}

/// Encoder/decoder bound to one tag
#[derive(Clone)]
pub struct CommunityCodec {
    tag: u32,
    observer: Arc<dyn CodecObserver>,
}

impl fmt::Debug for CommunityCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommunityCodec")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

impl CommunityCodec {
    /// Create a codec for `tag` with no observer
    pub fn new(tag: u32) -> Self {
        Self {
            tag,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: Arc<dyn CodecObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The tag written to and filtered from the global administrator field
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Encode raw bytes into communities
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<LargeCommunity>, CodecError> {
        self.encode_units(payload.iter().map(|&b| u32::from(b)))
    }

    /// Encode text by character value; characters above U+00FF are rejected
    pub fn encode_text(&self, text: &str) -> Result<Vec<LargeCommunity>, CodecError> {
        self.encode_units(text.chars().map(u32::from))
    }

    fn encode_units<I>(&self, units: I) -> Result<Vec<LargeCommunity>, CodecError>
    where
        I: IntoIterator<Item = u32>,
    {
        let groups = units
            .into_iter()
            .enumerate()
            .map(|(position, value)| DigitGroup::from_payload(position, value))
            .collect::<Result<Vec<_>, _>>()?;

        let buckets: Vec<Bucket> = groups
            .chunks(GROUPS_PER_BUCKET)
            .map(Bucket::padded)
            .collect();
        self.observer.on_buckets(self.tag, &buckets);

        let packed: Vec<u32> = buckets.iter().map(Bucket::pack).collect();
        self.observer.on_packed(self.tag, &packed);

        let communities: Vec<LargeCommunity> = packed
            .chunks(2)
            .map(|pair| {
                let second = pair.get(1).copied().unwrap_or(EMPTY_BUCKET);
                LargeCommunity::new(self.tag, pair[0], second)
            })
            .collect();

        self.observer
            .on_encoded(self.tag, groups.len(), communities.len());
        Ok(communities)
    }

    /// Recover the payload bytes from the communities carrying this codec's tag
    ///
    /// Communities with any other global administrator are ignored; if none
    /// match, the result is empty.
    pub fn decode(&self, communities: &[LargeCommunity]) -> Result<Vec<u8>, CodecError> {
        let values: Vec<u32> = communities
            .iter()
            .filter(|c| c.global_admin == self.tag)
            .flat_map(|c| [c.local_data1, c.local_data2])
            .collect();
        self.observer.on_filtered(self.tag, &values);

        let mut payload = Vec::with_capacity(values.len() * GROUPS_PER_BUCKET);
        for value in values {
            for group in Bucket::unpack(value)?.groups() {
                if group.is_sentinel() {
                    continue;
                }
                let byte = u8::try_from(group.value()).map_err(|_| CodecError::InvalidGroup {
                    value,
                    group: group.value(),
                })?;
                payload.push(byte);
            }
        }

        Ok(payload)
    }

    /// Decode and map each byte to the character with that value
    pub fn decode_text(&self, communities: &[LargeCommunity]) -> Result<String, CodecError> {
        Ok(self.decode(communities)?.into_iter().map(char::from).collect())
    }
}

/// Encode `payload` into communities tagged with `tag`
pub fn encode(payload: &[u8], tag: u32) -> Result<Vec<LargeCommunity>, CodecError> {
    CommunityCodec::new(tag).encode(payload)
}

/// Decode the communities tagged with `tag` back into bytes
pub fn decode(communities: &[LargeCommunity], tag: u32) -> Result<Vec<u8>, CodecError> {
    CommunityCodec::new(tag).decode(communities)
}

/// Encode text by character value (U+0001..=U+00FF)
pub fn encode_text(text: &str, tag: u32) -> Result<Vec<LargeCommunity>, CodecError> {
    CommunityCodec::new(tag).encode_text(text)
}

/// Decode the communities tagged with `tag` back into text
pub fn decode_text(communities: &[LargeCommunity], tag: u32) -> Result<String, CodecError> {
    CommunityCodec::new(tag).decode_text(communities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    const ASN: u32 = 34553;

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Ut gravida mattis urna a tincidunt. Sed urna lacus, pretium a dolor sit amet, eleifend ornare urna. Class aptent taciti sociosqu ad litora torquent per conubia nostra, per inceptos himenaeos.\n\nNulla aliquet pulvinar sem eu tincidunt. Nulla lobortis pretium urna, at fringilla lectus aliquam ut. Mauris eu ante ac ligula consequat ullamcorper. Aenean eros urna, commodo ut iaculis id, malesuada lacinia velit.\n\nInteger blandit nibh vitae diam accumsan, sed efficitur dolor egestas. Nullam tempus venenatis neque.";

    #[test]
    fn test_single_character() {
        let communities = encode(b"A", ASN).unwrap();
        assert_eq!(
            communities,
            vec![LargeCommunity::new(ASN, 1065000000, 1000000000)]
        );
        assert_eq!(decode(&communities, ASN).unwrap(), b"A");
    }

    #[test]
    fn test_empty_payload() {
        assert!(encode(b"", ASN).unwrap().is_empty());
        assert!(decode(&[], ASN).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_samples() {
        let samples: [&[u8]; 3] = [
            b"",
            b"The Quick Brown Fox Jumps Over The Lazy Dog",
            LOREM.as_bytes(),
        ];

        for sample in samples {
            let communities = encode(sample, ASN).unwrap();
            assert_eq!(decode(&communities, ASN).unwrap(), sample);
        }

        assert!(encode(LOREM.as_bytes(), ASN).unwrap().len() > 50);
    }

    #[test]
    fn test_tag_isolation() {
        let communities = encode(b"hello", ASN).unwrap();
        assert!(decode(&communities, ASN + 1).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_communities_interleaved() {
        let ours = encode(b"interleaved payload", ASN).unwrap();
        let mut mixed = Vec::new();
        for (i, community) in ours.iter().enumerate() {
            mixed.push(LargeCommunity::new(65000, i as u32, 7));
            mixed.push(*community);
        }
        mixed.push(LargeCommunity::new(65001, 0, 0));

        assert_eq!(decode(&mixed, ASN).unwrap(), b"interleaved payload");
    }

    #[test]
    fn test_short_payloads_pad_second_slot() {
        for payload in [&b"h"[..], &b"hi"[..]] {
            let communities = encode(payload, ASN).unwrap();
            assert_eq!(communities.len(), 1);
            assert_eq!(communities[0].local_data2, EMPTY_BUCKET);
        }

        let communities = encode(b"hi", ASN).unwrap();
        assert_eq!(communities[0].local_data1, 1104105000);
    }

    #[test]
    fn test_exact_multiples() {
        for len in [6, 12, 60] {
            let payload = vec![b'x'; len];
            let communities = encode(&payload, ASN).unwrap();
            assert_eq!(communities.len(), len / 6);
            assert!(communities
                .iter()
                .all(|c| c.local_data1 != EMPTY_BUCKET && c.local_data2 != EMPTY_BUCKET));
        }

        for len in [3, 9, 15] {
            let payload = vec![b'x'; len];
            let communities = encode(&payload, ASN).unwrap();
            assert_eq!(communities.len(), (len + 5) / 6);
            let sentinels = communities
                .iter()
                .flat_map(|c| [c.local_data1, c.local_data2])
                .filter(|&v| v == EMPTY_BUCKET)
                .count();
            assert_eq!(sentinels, 1);
            assert_eq!(communities.last().unwrap().local_data2, EMPTY_BUCKET);
        }
    }

    #[test]
    fn test_values_in_range() {
        let payload: Vec<u8> = (1..=255).collect();
        for community in encode(&payload, ASN).unwrap() {
            assert_eq!(community.global_admin, ASN);
            assert!((BUCKET_LEADER..=MAX_PACKED).contains(&community.local_data1));
            assert!((BUCKET_LEADER..=MAX_PACKED).contains(&community.local_data2));
        }
    }

    #[test]
    fn test_zero_byte_rejected() {
        assert_eq!(
            encode(b"ab\0c", ASN),
            Err(CodecError::ReservedValue { position: 2 })
        );
    }

    #[test]
    fn test_text_out_of_range() {
        assert_eq!(
            encode_text("price: 5€", ASN),
            Err(CodecError::OutOfRange {
                position: 8,
                value: 0x20AC
            })
        );
    }

    #[test]
    fn test_text_latin1_round_trip() {
        let communities = encode_text("café ÿ", ASN).unwrap();
        assert_eq!(decode_text(&communities, ASN).unwrap(), "café ÿ");
        // 'é' is carried as the single group 233, not as UTF-8
        assert_eq!(communities[0].local_data2, 1233032255);
    }

    #[test]
    fn test_decode_malformed_value() {
        let communities = [LargeCommunity::new(ASN, 999, EMPTY_BUCKET)];
        assert_eq!(decode(&communities, ASN), Err(CodecError::Malformed(999)));

        let communities = [LargeCommunity::new(ASN, EMPTY_BUCKET, 2_000_000_000)];
        assert_eq!(
            decode(&communities, ASN),
            Err(CodecError::Malformed(2_000_000_000))
        );
    }

    #[test]
    fn test_decode_invalid_group() {
        let communities = [LargeCommunity::new(ASN, 1065256000, EMPTY_BUCKET)];
        assert_eq!(
            decode(&communities, ASN),
            Err(CodecError::InvalidGroup {
                value: 1065256000,
                group: 256
            })
        );
    }

    #[test]
    fn test_decode_skips_interior_sentinels() {
        let communities = [LargeCommunity::new(ASN, 1065000066, 1000067000)];
        assert_eq!(decode(&communities, ASN).unwrap(), b"ABC");
    }

    #[test]
    fn test_bucket_display_and_pack() {
        let groups = [
            DigitGroup::from_payload(0, 7).unwrap(),
            DigitGroup::from_payload(1, 65).unwrap(),
        ];
        let bucket = Bucket::padded(&groups);
        assert_eq!(bucket.to_string(), "007065000");
        assert_eq!(bucket.pack(), 1007065000);
        assert_eq!(Bucket::unpack(1007065000).unwrap(), bucket);
        assert_eq!(Bucket::EMPTY.pack(), EMPTY_BUCKET);
    }

    #[derive(Default)]
    struct Recorder {
        buckets: Mutex<Vec<String>>,
        filtered: Mutex<Vec<u32>>,
    }

    impl CodecObserver for Recorder {
        fn on_buckets(&self, _tag: u32, buckets: &[Bucket]) {
            let mut seen = self.buckets.lock().unwrap();
            seen.extend(buckets.iter().map(Bucket::to_string));
        }

        fn on_filtered(&self, _tag: u32, values: &[u32]) {
            self.filtered.lock().unwrap().extend_from_slice(values);
        }
    }

    #[test]
    fn test_observer_hook() {
        let recorder = Arc::new(Recorder::default());
        let codec = CommunityCodec::new(ASN).with_observer(recorder.clone());

        let communities = codec.encode(b"Hi!!").unwrap();
        codec.decode(&communities).unwrap();

        assert_eq!(
            *recorder.buckets.lock().unwrap(),
            vec!["072105033".to_string(), "033000000".to_string()]
        );
        assert_eq!(
            *recorder.filtered.lock().unwrap(),
            vec![1072105033, 1033000000]
        );
    }

    proptest! {
        #[test]
        fn round_trip_any_nonzero_bytes(
            payload in proptest::collection::vec(1u8..=255, 0..512),
            tag in any::<u32>(),
        ) {
            let communities = encode(&payload, tag).unwrap();
            prop_assert_eq!(communities.len(), (payload.len() + 5) / 6);
            prop_assert_eq!(decode(&communities, tag).unwrap(), payload);
        }
    }
}
