// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Video decoder specific support.

use std::fmt;

use crate::codecs::{CodecInfo, CodecProfile};
use crate::common::{FourCc, Rational};
use crate::errors::Result;
use crate::packet::Packet;
use crate::video::GenericVideoBufferRef;

/// A `VideoCodecId` is a unique identifier used to identify a specific video codec.
///
/// # Creating a Codec ID
///
/// Using a [well-known](well_known) codec ID is *highly* recommended to maximize compatibility
/// between components, libraries, and applications. However, if a codec requires a custom codec
/// ID, or there is no well-known ID, then the [`FourCc`] for the codec may be converted into a
/// codec ID.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoCodecId(u32);

/// Null video codec ID.
pub const CODEC_ID_NULL_VIDEO: VideoCodecId = VideoCodecId(0x0);

impl Default for VideoCodecId {
    fn default() -> Self {
        CODEC_ID_NULL_VIDEO
    }
}

impl VideoCodecId {
    /// Create a new video codec ID from a FourCC.
    pub const fn new(cc: FourCc) -> VideoCodecId {
        // A FourCc always only contains ASCII characters. Therefore, the upper bits are always 0.
        Self(0x8000_0000 | u32::from_be_bytes(cc.get()))
    }
}

impl From<FourCc> for VideoCodecId {
    fn from(value: FourCc) -> Self {
        VideoCodecId::new(value)
    }
}

impl fmt::Display for VideoCodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A `VideoExtraDataId` is a unique identifier used to identify a specific video extra data.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoExtraDataId(pub u32);

/// Null video extra data ID.
pub const VIDEO_EXTRA_DATA_ID_NULL: VideoExtraDataId = VideoExtraDataId(0x0);

impl Default for VideoExtraDataId {
    fn default() -> Self {
        VIDEO_EXTRA_DATA_ID_NULL
    }
}

/// Extra data for a video codec.
#[derive(Clone, Debug, Default)]
pub struct VideoExtraData {
    /// The extra data ID.
    pub id: VideoExtraDataId,
    /// Extra data (defined by codec).
    pub data: Box<[u8]>,
}

/// Codec parameters for video codecs.
#[derive(Clone, Debug, Default)]
pub struct VideoCodecParameters {
    /// The codec ID.
    pub codec: VideoCodecId,
    /// The codec-defined profile.
    pub profile: Option<CodecProfile>,
    /// The codec-defined level.
    pub level: Option<u32>,
    /// Video width.
    pub width: Option<u16>,
    /// Video height.
    pub height: Option<u16>,
    /// The sample (pixel) aspect ratio.
    pub sample_aspect_ratio: Option<Rational>,
    /// Extra data (defined by the codec).
    pub extra_data: Vec<VideoExtraData>,
}

impl VideoCodecParameters {
    /// Provide the `VideoCodecId`.
    pub fn for_codec(&mut self, codec: VideoCodecId) -> &mut Self {
        self.codec = codec;
        self
    }

    /// Provide codec profile.
    pub fn with_profile(&mut self, profile: CodecProfile) -> &mut Self {
        self.profile = Some(profile);
        self
    }

    /// Provide codec level.
    pub fn with_level(&mut self, level: u32) -> &mut Self {
        self.level = Some(level);
        self
    }

    /// Provide video width.
    pub fn with_width(&mut self, width: u16) -> &mut Self {
        self.width = Some(width);
        self
    }

    /// Provide video height.
    pub fn with_height(&mut self, height: u16) -> &mut Self {
        self.height = Some(height);
        self
    }

    /// Provide the sample aspect ratio.
    pub fn with_sample_aspect_ratio(&mut self, sar: Rational) -> &mut Self {
        self.sample_aspect_ratio = Some(sar);
        self
    }

    /// Adds codec's extra data.
    pub fn add_extra_data(&mut self, data: VideoExtraData) -> &mut Self {
        self.extra_data.push(data);
        self
    }
}

/// `VideoDecoderOptions` is a common set of options that all video decoders use.
#[derive(Copy, Clone, Debug, Default)]
pub struct VideoDecoderOptions {
    /// The number of worker threads a decoder may use for intra-frame parallelism. A value of 0
    /// lets the decoder choose. Decoders built without threading support ignore this option.
    pub num_threads: usize,
}

/// A `VideoDecoder` implements a video codec's decode algorithm. It consumes `Packet`s and
/// produces video frames.
pub trait VideoDecoder: Send + Sync {
    /// Reset the decoder.
    ///
    /// A decoder must be reset when the next packet is discontinuous with respect to the last
    /// decoded packet. Most notably, this occurs after a seek.
    ///
    /// # For Implementations
    ///
    /// For codecs that do a lot of pre-computation, reset should only reset the absolute minimum
    /// amount of state.
    fn reset(&mut self);

    /// Get basic information about the codec.
    fn codec_info(&self) -> &CodecInfo;

    /// Gets a reference to an updated set of `VideoCodecParameters` based on the codec parameters
    /// the decoder was instantiated with.
    fn codec_params(&self) -> &VideoCodecParameters;

    /// Decodes a `Packet` of video data and returns a generic (untyped) video buffer reference
    /// containing the decoded frame.
    ///
    /// If a `DecodeError` or `IoError` is returned, the packet is undecodeable and should be
    /// discarded. Decoding may be continued with the next packet. If `ResetRequired` is returned,
    /// consumers of the decoded video data should expect the dimensions of the decoded frame to
    /// change. All other errors are unrecoverable.
    fn decode(&mut self, packet: &Packet) -> Result<GenericVideoBufferRef<'_>>;

    /// Allows read access to the internal frame buffer.
    ///
    /// After a successful call to `decode`, this will contain the frame content of the last
    /// decoded `Packet`.
    fn last_decoded(&self) -> GenericVideoBufferRef<'_>;
}

/// Codec IDs for well-known video codecs.
pub mod well_known {
    use super::VideoCodecId;

    /// Motion JPEG
    pub const CODEC_ID_MJPEG: VideoCodecId = VideoCodecId(0x100);

    // SMPTE codecs

    /// DV (SMPTE 314M)
    pub const CODEC_ID_DV: VideoCodecId = VideoCodecId(0x200);

    // Earthsoft codecs

    /// Earthsoft PV3/PV4 DV
    pub const CODEC_ID_PV3_DV: VideoCodecId = VideoCodecId(0x300);

    pub mod extra_data {
        use crate::codecs::video::VideoExtraDataId;

        /// Earthsoft PV3/PV4 stream header (geometry and quantizer tables).
        pub const VIDEO_EXTRA_DATA_ID_PV3_HEADER: VideoExtraDataId = VideoExtraDataId(1);
    }
}
