//! Large community payload codec and BGP UPDATE wire format for bgp-resume.
//!
//! This crate hides an arbitrary byte payload in BGP large communities and
//! recovers it again, and provides the wire encoding of the UPDATE message
//! that carries those communities to a peer.
//!
//! ## Features
//!
//! - **Payload Codec**: bytes to tagged `(tag, data1, data2)` tuples and back
//! - **Tag Filtering**: communities from other administrators are ignored
//! - **Observer Hook**: intermediate digit groups exposed via [`CodecObserver`]
//! - **UPDATE Encoding**: ORIGIN, AS_PATH, NEXT_HOP, MP_REACH_NLRI and
//!   LARGE_COMMUNITY attributes, with extended-length handling
//!
//! ## Data Layout
//!
//! ```text
//! payload   "Hi!!"
//! groups    072 105 033 | 033 000 000
//! packed    1072105033  | 1033000000
//! community (tag, 1072105033, 1033000000)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod codec;
pub mod community;
pub mod error;
pub mod prefix;
pub mod update;

// Re-export main types
pub use attribute::{AttrFlags, Origin, PathAttribute};
pub use codec::{
    decode, decode_text, encode, encode_text, Bucket, CodecError, CodecObserver, CommunityCodec,
    DigitGroup, NoopObserver, TracingObserver, EMPTY_BUCKET,
};
pub use community::{LargeCommunity, ParseCommunityError};
pub use error::WireError;
pub use prefix::Prefix;
pub use update::{UpdateMessage, EXTENDED_MAX_MESSAGE_SIZE, MAX_MESSAGE_SIZE};
