// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Project Kinema
//!
//! Kinema is a 100% pure Rust video decoding and multimedia format demuxing framework.
//!
//! # Support
//!
//! Supported formats and codecs are listed below.
//!
//! ## Formats
//!
//! | Format              | Feature Flag | Default |
//! |---------------------|--------------|---------|
//! | Earthsoft PV3/PV4   | `pv3`        | Yes     |
//!
//! ## Codecs
//!
//! | Codec               | Feature Flag | Default |
//! |---------------------|--------------|---------|
//! | Earthsoft PV3/PV4   | `pv3`        | Yes     |
//!
//! # Usage
//!
//! The following steps describe a basic usage of Kinema:
//!
//! 1. Instantiate a [`CodecRegistry`][core::codecs::registry::CodecRegistry] and register all the
//!    codecs that are of interest. Alternatively, you may use [`default::get_codecs`] to get the
//!    default registry with all the enabled codecs pre-registered.
//! 2. Instantiate a [`Probe`][core::formats::probe::Probe] and register all the formats that are
//!    of interest. Alternatively, you may use [`default::get_probe`] to get a default format
//!    probe with all the enabled formats pre-registered.
//! 3. Make sure the [`MediaSource`][core::io::MediaSource] trait is implemented for whatever
//!    source you are using. This trait is already implemented for `std::fs::File` and
//!    `std::io::Cursor`.
//! 4. Instantiate a [`MediaSourceStream`][core::io::MediaSourceStream] with the `MediaSource`
//!    above.
//! 5. Using the `Probe`, call [`probe`][core::formats::probe::Probe::probe] and pass it the
//!    `MediaSourceStream`.
//! 6. If the probe successfully detects a compatible format, a
//!    [`FormatReader`][core::formats::FormatReader] will be returned. This is an instance of a
//!    demuxer that can read and demux the provided source into
//!    [`Packet`][core::packet::Packet]s.
//! 7. At this point it is possible to interrogate the `FormatReader` for general information
//!    about the media. Examine the [`Track`][core::formats::Track] listing using
//!    [`tracks`][core::formats::FormatReader::tracks] and select one or more tracks of interest
//!    to decode.
//! 8. To instantiate a [`VideoDecoder`][core::codecs::video::VideoDecoder] for a selected
//!    `Track`, call the `CodecRegistry`'s
//!    [`make_video_decoder`][core::codecs::registry::CodecRegistry::make_video_decoder] function
//!    and pass it the track's codec parameters.
//! 9. To decode a track, obtain a packet from the `FormatReader` by calling
//!    [`next_packet`][core::formats::FormatReader::next_packet] and then pass the `Packet` to the
//!    decoder for that track. The [`decode`][core::codecs::video::VideoDecoder::decode] function
//!    will decode a packet and return a
//!    [`GenericVideoBufferRef`][core::video::GenericVideoBufferRef].
//! 10. Repeat step 9 until `next_packet` returns `Ok(None)`.
//!
//! # Adding support for new formats and codecs
//!
//! Simply implement the [`VideoDecoder`][core::codecs::video::VideoDecoder] trait for a decoder
//! or the [`FormatReader`][core::formats::FormatReader] trait for a demuxer and register it with
//! the appropriate registry or probe!

pub mod default {
    //! The `default` module provides convenience functions and registries to get an implementer
    //! up-and-running as quickly as possible, and to reduce boiler-plate. Using the `default`
    //! module is completely optional and incurs no overhead unless actually used.

    pub mod codecs {
        //! The `codecs` module re-exports all enabled Kinema decoders.

        #[cfg(feature = "pv3")]
        pub use kinema_codec_pv3::Pv3VideoDecoder;
    }

    pub mod formats {
        //! The `formats` module re-exports all enabled Kinema format readers.

        #[cfg(feature = "pv3")]
        pub use kinema_format_pv3::Pv3Reader;
    }

    use lazy_static::lazy_static;

    use kinema_core::codecs::registry::CodecRegistry;
    use kinema_core::formats::probe::Probe;

    lazy_static! {
        static ref CODEC_REGISTRY: CodecRegistry = {
            let mut registry = CodecRegistry::new();
            register_enabled_codecs(&mut registry);
            registry
        };
    }

    lazy_static! {
        static ref PROBE: Probe = {
            let mut probe: Probe = Default::default();
            register_enabled_formats(&mut probe);
            probe
        };
    }

    /// Gets the default `CodecRegistry`. This registry pre-registers all the codecs selected by
    /// the `feature` flags in the includer's `Cargo.toml`. If `features` is not set, the default
    /// set of Kinema codecs is registered.
    ///
    /// This function is lazy and does not instantiate the `CodecRegistry` until the first call to
    /// this function.
    pub fn get_codecs() -> &'static CodecRegistry {
        &CODEC_REGISTRY
    }

    /// Gets the default `Probe`. This registry pre-registers all the formats selected by the
    /// `feature` flags in the includer's `Cargo.toml`. If `features` is not set, the default set
    /// of Kinema formats is registered.
    ///
    /// This function is lazy and does not instantiate the `Probe` until the first call to this
    /// function.
    pub fn get_probe() -> &'static Probe {
        &PROBE
    }

    /// Registers all the codecs selected by the `feature` flags in the includer's `Cargo.toml` on
    /// the provided `CodecRegistry`. If `features` is not set, the default set of Kinema codecs
    /// is registered.
    ///
    /// Use this function to easily populate a custom registry with all enabled codecs.
    pub fn register_enabled_codecs(registry: &mut CodecRegistry) {
        #[cfg(feature = "pv3")]
        registry.register_video_decoder::<codecs::Pv3VideoDecoder>();

        #[cfg(not(feature = "pv3"))]
        let _ = registry;
    }

    /// Registers all the formats selected by the `feature` flags in the includer's `Cargo.toml`
    /// on the provided `Probe`. If `features` is not set, the default set of Kinema formats is
    /// registered.
    ///
    /// Use this function to easily populate a custom probe with all enabled formats.
    pub fn register_enabled_formats(probe: &mut Probe) {
        #[cfg(feature = "pv3")]
        probe.register_format::<formats::Pv3Reader<'_>>();

        #[cfg(not(feature = "pv3"))]
        let _ = probe;
    }
}

pub use kinema_core as core;
