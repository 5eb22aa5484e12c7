//! TREFA Processing Library
//!
//! Image transcoding for the sync pipeline: decode whatever the source delivers,
//! cap the width, and re-encode as WebP.

#[cfg(feature = "image")]
pub mod transcode;

#[cfg(feature = "image")]
pub use transcode::{ProcessedImage, TranscodeError, WebpTranscoder, WEBP_CONTENT_TYPE};
