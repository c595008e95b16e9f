// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry for codecs to support lookup and instantiation of decoders dynamically at runtime.

use std::collections::HashMap;
use std::hash::Hash;

use crate::codecs::video::{VideoCodecId, VideoCodecParameters, VideoDecoder, VideoDecoderOptions};
use crate::codecs::CodecInfo;
use crate::common::Tier;
use crate::errors::{unsupported_error, Result};

/// Description of a supported video codec.
#[derive(Copy, Clone)]
pub struct SupportedVideoCodec {
    pub id: VideoCodecId,
    pub info: CodecInfo,
}

/// To support registration in a codec registry, a `VideoDecoder` must implement the
/// `RegisterableVideoDecoder` trait.
pub trait RegisterableVideoDecoder: VideoDecoder {
    fn try_registry_new(
        params: &VideoCodecParameters,
        opts: &VideoDecoderOptions,
    ) -> Result<Box<dyn VideoDecoder>>
    where
        Self: Sized;

    /// Get a list of video codecs supported by this decoder.
    fn supported_codecs() -> &'static [SupportedVideoCodec];
}

/// `VideoDecoder` factory function. Creates a boxed `VideoDecoder`.
pub type VideoDecoderFactoryFn =
    fn(&VideoCodecParameters, &VideoDecoderOptions) -> Result<Box<dyn VideoDecoder>>;

/// Registration details of a video decoder for a particular video codec.
pub struct RegisteredVideoDecoder {
    /// Video codec details.
    pub codec: SupportedVideoCodec,
    /// Factory function to instantiate the video decoder.
    pub factory: VideoDecoderFactoryFn,
}

struct InnerCodecRegistry<C, R> {
    preferred: HashMap<C, R>,
    standard: HashMap<C, R>,
    fallback: HashMap<C, R>,
}

impl<C, R> Default for InnerCodecRegistry<C, R> {
    fn default() -> Self {
        Self {
            preferred: Default::default(),
            standard: Default::default(),
            fallback: Default::default(),
        }
    }
}

impl<C, R> InnerCodecRegistry<C, R>
where
    C: Hash + Eq,
{
    fn get(&self, id: &C) -> Option<&R> {
        self.preferred.get(id).or_else(|| self.standard.get(id)).or_else(|| self.fallback.get(id))
    }

    fn get_at_tier(&self, tier: Tier, id: &C) -> Option<&R> {
        match tier {
            Tier::Preferred => self.preferred.get(id),
            Tier::Standard => self.standard.get(id),
            Tier::Fallback => self.fallback.get(id),
        }
    }

    fn register_at_tier(&mut self, tier: Tier, id: C, reg: R) -> Option<R> {
        match tier {
            Tier::Preferred => self.preferred.insert(id, reg),
            Tier::Standard => self.standard.insert(id, reg),
            Tier::Fallback => self.fallback.insert(id, reg),
        }
    }
}

/// A `CodecRegistry` allows the registration of codecs, and provides a method to instantiate a
/// `Decoder` given a set of codec parameters.
#[derive(Default)]
pub struct CodecRegistry {
    video: InnerCodecRegistry<VideoCodecId, RegisteredVideoDecoder>,
}

impl CodecRegistry {
    /// Instantiate a new `CodecRegistry`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Get the registration information of the most preferred video decoder for the specified
    /// video codec.
    pub fn get_video_decoder(&self, id: VideoCodecId) -> Option<&RegisteredVideoDecoder> {
        self.video.get(&id)
    }

    /// Get the registration information of the video decoder at the specified tier for the
    /// specified video codec.
    pub fn get_video_decoder_at_tier(
        &self,
        tier: Tier,
        id: VideoCodecId,
    ) -> Option<&RegisteredVideoDecoder> {
        self.video.get_at_tier(tier, &id)
    }

    /// Registers all video codecs supported by the video decoder at the standard tier.
    ///
    /// If a supported video codec was previously registered by another video decoder at the same
    /// tier, it will be replaced within the registry.
    pub fn register_video_decoder<C: RegisterableVideoDecoder>(&mut self) {
        self.register_video_decoder_at_tier::<C>(Tier::Standard);
    }

    /// Registers all video codecs supported by the video decoder at a specific tier.
    ///
    /// If a supported codec was previously registered by another video decoder at the same tier,
    /// it will be replaced within the registry.
    pub fn register_video_decoder_at_tier<C: RegisterableVideoDecoder>(&mut self, tier: Tier) {
        for codec in C::supported_codecs() {
            let reg = RegisteredVideoDecoder {
                codec: *codec,
                factory: |params, opts| C::try_registry_new(params, opts),
            };

            self.video.register_at_tier(tier, codec.id, reg);
        }
    }

    /// Instantiate a video decoder for the specified video codec parameters.
    ///
    /// This function searches the registry for a video decoder that supports the codec. If one is
    /// found, it will be instantiated with the provided video codec parameters and video decoder
    /// options. If a suitable decoder could not be found, or the decoder could not be
    /// instantiated, an error will be returned.
    pub fn make_video_decoder(
        &self,
        params: &VideoCodecParameters,
        opts: &VideoDecoderOptions,
    ) -> Result<Box<dyn VideoDecoder>> {
        if let Some(codec) = self.get_video_decoder(params.codec) {
            Ok((codec.factory)(params, opts)?)
        }
        else {
            unsupported_error("core (codec): unsupported video codec")
        }
    }
}

/// Convenience macro for declaring `CodecProfileInfo`.
#[macro_export]
macro_rules! codec_profile {
    ($id:expr, $short_name:expr, $long_name:expr) => {
        kinema_core::codecs::CodecProfileInfo {
            profile: $id,
            short_name: $short_name,
            long_name: $long_name,
        }
    };
}

/// Convenience macro for declaring a `SupportedVideoCodec`.
#[macro_export]
macro_rules! support_video_codec {
    ($id:expr, $short_name:expr, $long_name:expr) => {
        kinema_core::codecs::registry::SupportedVideoCodec {
            id: $id,
            info: kinema_core::codecs::CodecInfo {
                short_name: $short_name,
                long_name: $long_name,
                profiles: &[],
            },
        }
    };
}
