// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `probe` module provides methods and traits to support auto-detection of media formats from
//! arbitrary media streams.

use crate::common::Tier;
use crate::errors::{unsupported_error, Error, Result};
use crate::formats::{FormatInfo, FormatOptions, FormatReader};
use crate::io::{MediaSourceStream, ReadBytes, ScopedStream};

use log::{debug, error, trace, warn};

/// The probe match specification provides declarative information that is used by a `Probe` to
/// detect the presence of a specific container format while scanning a `MediaSourceStream`.
#[derive(Copy, Clone)]
pub struct ProbeDataMatchSpec {
    /// A list of case-insensitive file extensions that are generally used by the format.
    pub extensions: &'static [&'static str],
    /// A list of case-insensitive MIME types that are generally used by the format.
    pub mime_types: &'static [&'static str],
    /// A byte-string start-of-format marker that will be searched for within the stream. Typically
    /// some magic numbers associated with the start of the container format. Each marker must be
    /// between 2 and 16 bytes in length.
    pub markers: &'static [&'static [u8]],
}

/// Container format-specific probe data.
#[derive(Copy, Clone)]
pub struct ProbeFormatData {
    /// The match specification used by the probe to match against the media source stream.
    pub spec: ProbeDataMatchSpec,
    /// A description of the container format and reader if a match with the basic probe data is
    /// found.
    pub info: FormatInfo,
}

/// `FormatReader` probe factory function. Creates a boxed `FormatReader`.
pub type FormatFactoryFn =
    for<'s> fn(MediaSourceStream<'s>, FormatOptions) -> Result<Box<dyn FormatReader + 's>>;

/// A function pointer to the score function of a registered format reader.
type ScoreFn = fn(ScopedStream<&mut MediaSourceStream<'_>>) -> Result<Score>;

/// Private/internal representation of a registered probeable format.
#[derive(Copy, Clone)]
struct RegisteredFormat {
    /// The match specification.
    spec: ProbeDataMatchSpec,
    /// A function to assign a likelyhood score that the media source, readable with scoped access
    /// via the provided stream, is the start of the container format.
    score: ScoreFn,
    /// A basic description of the container format.
    info: FormatInfo,
    /// A factory function to create an instance of the matching format reader.
    factory: FormatFactoryFn,
}

/// The result of a scoring operation.
pub enum Score {
    /// The format is not supported.
    Unsupported,
    /// The format is supported with a confidence between 0 (not confident) and 255 (very
    /// confident).
    Supported(u8),
}

/// The `Scoreable` trait defines the scoring functionality a reader must implement to support
/// probing for a container format.
pub trait Scoreable {
    /// Using scoped access to a `MediaSourceStream`, calculate and return a value between 0 and
    /// 255 indicating the confidence of the reader in decoding or parsing the stream.
    ///
    /// If the format is definitely not supported, then score should return [`Score::Unsupported`]
    /// since a score of 0 is still considered supported, even if unlikely.
    ///
    /// If an error is returned, errors other than [`Error::IoError`] (excluding the unexpected EOF
    /// kind) are treated as if [`Score::Unsupported`] was returned. All other IO errors abort the
    /// probe operation.
    fn score(src: ScopedStream<&mut MediaSourceStream<'_>>) -> Result<Score>;
}

/// To support probing, a `FormatReader` must implement the `ProbeableFormat` trait.
pub trait ProbeableFormat<'s>: FormatReader + Scoreable {
    /// Create an instance of the format reader.
    fn try_probe_new(
        mss: MediaSourceStream<'s>,
        opts: FormatOptions,
    ) -> Result<Box<dyn FormatReader + 's>>
    where
        Self: Sized;

    /// Returns a list of probe data that a [`Probe`] will use to determine if the reader
    /// implementing this trait may support the media source stream.
    fn probe_data() -> &'static [ProbeFormatData];
}

/// A `Hint` provides additional information and context when probing a media source stream.
///
/// For example, the `Probe` cannot examine the extension or mime-type of the media because
/// `MediaSourceStream` abstracts away such details. However, the embedder may have this
/// information from a file path, HTTP header, email attachment metadata, etc. `Hint`s are
/// optional, and won't lead the probe astray if they're wrong.
#[derive(Clone, Debug, Default)]
pub struct Hint {
    extension: Option<String>,
    mime_type: Option<String>,
}

impl Hint {
    /// Instantiate an empty `Hint`.
    pub fn new() -> Self {
        Hint { extension: None, mime_type: None }
    }

    /// Add a file extension hint.
    pub fn with_extension(&mut self, extension: &str) -> &mut Self {
        self.extension = Some(extension.to_owned());
        self
    }

    /// Add a MIME/Media-type hint.
    pub fn mime_type(&mut self, mime_type: &str) -> &mut Self {
        self.mime_type = Some(mime_type.to_owned());
        self
    }

    /// Get the file extension hint, if set.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Get the MIME type hint, if set.
    pub fn get_mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

/// Options for controlling the behaviour of a `Probe`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProbeOptions {
    /// The maximum number of bytes that will be scanned from the media source before giving up.
    ///
    /// The default is 1 MB.
    pub max_probe_depth: u32,
    /// The maximum number of bytes a score operation may read before it will be forced to abort.
    ///
    /// Must not exceed the seekback capability of the media source stream being probed (the
    /// stream's buffer length less its 32 kB read-ahead).
    ///
    /// The default is 16 kB.
    pub max_score_depth: u16,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            max_probe_depth: 1024 * 1024, // 1 MB
            max_score_depth: 16 * 1024,   // 16 kB
        }
    }
}

/// `Probe` scans a `MediaSourceStream` for registered container formats, and instantiates a
/// reader for the first format encountered.
#[derive(Default)]
pub struct Probe {
    preferred: Vec<RegisteredFormat>,
    standard: Vec<RegisteredFormat>,
    fallback: Vec<RegisteredFormat>,
    opts: ProbeOptions,
}

impl Probe {
    /// Instantiate a probe with default options.
    pub fn new() -> Self {
        Probe::new_with_options(&Default::default())
    }

    /// Instantiate a probe with custom options.
    pub fn new_with_options(opts: &ProbeOptions) -> Self {
        Probe { opts: *opts, ..Default::default() }
    }

    /// Register the parameterized format reader at the standard tier.
    pub fn register_format<P>(&mut self)
    where
        for<'a> P: ProbeableFormat<'a>,
    {
        self.register_format_at_tier::<P>(Tier::Standard);
    }

    /// Register the parameterized format reader at a specific tier.
    pub fn register_format_at_tier<P>(&mut self, tier: Tier)
    where
        for<'a> P: ProbeableFormat<'a>,
    {
        for data in P::probe_data() {
            for marker in data.spec.markers {
                // Markers are matched through a 2-byte scan window, and against a 16-byte
                // look-ahead window thereafter.
                assert!(
                    marker.len() >= 2 && marker.len() <= 16,
                    "invalid marker length (only 2-16 bytes supported)"
                );
            }

            let registered = RegisteredFormat {
                spec: data.spec,
                score: P::score,
                info: data.info,
                factory: |mss, opts| P::try_probe_new(mss, opts),
            };

            match tier {
                Tier::Preferred => self.preferred.push(registered),
                Tier::Standard => self.standard.push(registered),
                Tier::Fallback => self.fallback.push(registered),
            }
        }
    }

    /// Searches the provided `MediaSourceStream` for a supported container format and instantiates
    /// a `FormatReader` for it.
    pub fn probe<'s>(
        &self,
        _hint: &Hint,
        mut mss: MediaSourceStream<'s>,
        fmt_opts: FormatOptions,
    ) -> Result<Box<dyn FormatReader + 's>> {
        let init_pos = mss.pos();

        let mut win = 0u16;
        let mut count = 0u32;

        // Scan the stream byte-by-byte, shifting each byte through a 2-byte window.
        loop {
            let byte = match mss.read_byte() {
                Ok(byte) => byte,
                Err(Error::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    error!("probe reached EOF at {} bytes", count);
                    return unsupported_error("core (probe): no suitable format reader found");
                }
                Err(err) => return Err(err),
            };

            win = (win << 8) | u16::from(byte);

            count += 1;

            if count > self.opts.max_probe_depth {
                // Could not find any marker within the probe limit.
                error!("reached probe limit of {} bytes", self.opts.max_probe_depth);
                return unsupported_error("core (probe): no suitable format reader found");
            }

            if count < 2 {
                continue;
            }

            if count % 4096 == 0 {
                debug!(
                    "searching for format marker... {}+{} / {} bytes",
                    init_pos, count, self.opts.max_probe_depth
                );
            }

            // Check if the 2-byte window is the prefix of any registered marker.
            if !self.is_marker_prefix(win.to_be_bytes()) {
                continue;
            }

            // Re-align the stream to the start of the marker.
            mss.seek_buffered_rel(-2);

            // Try to find the best matching format.
            if let Some(registered) = self.find_best_reader(&mut mss)? {
                // Warn if junk bytes were skipped.
                if mss.pos() > init_pos {
                    warn!("skipped {} bytes of junk at {}", mss.pos() - init_pos, init_pos);
                }

                debug!("selected format reader '{}'", registered.info.short_name);

                // Instantiate the format reader.
                return (registered.factory)(mss, fmt_opts);
            }

            // If no match was found, re-align the stream to the end of the 2-byte window, and
            // continue probing.
            mss.seek_buffered_rel(2);
        }
    }

    /// Returns true if the 2-byte window is a prefix of any registered marker.
    fn is_marker_prefix(&self, win: [u8; 2]) -> bool {
        self.tiers()
            .flat_map(|tier| tier.iter())
            .flat_map(|registered| registered.spec.markers.iter())
            .any(|marker| marker[0..2] == win)
    }

    /// Find the best registered reader at the current position of the stream.
    fn find_best_reader(
        &self,
        mss: &mut MediaSourceStream<'_>,
    ) -> Result<Option<RegisteredFormat>> {
        // Read up-to a 16 byte window starting at the marker.
        let mut win = [0u8; 16];
        let win_len = mss.read_buf(&mut win)?;

        // Re-align the stream to the start of the marker for scoring.
        mss.seek_buffered_rel(-(win_len as isize));

        for tier in self.tiers() {
            for registered in tier {
                // If any marker matches, then the format should be scored.
                let is_match = registered.spec.markers.iter().any(|marker| {
                    marker.len() <= win_len && win[0..marker.len()] == **marker
                });

                if !is_match {
                    continue;
                }

                trace!("found a marker for '{}' @ {} bytes", registered.info.short_name, mss.pos());

                // If supported, select this reader.
                if let Score::Supported(score) = self.score(registered, mss)? {
                    trace!("'{}' scored {}", registered.info.short_name, score);
                    return Ok(Some(*registered));
                }

                trace!("format reader '{}' failed scoring", registered.info.short_name);
            }
        }

        Ok(None)
    }

    /// Score a candidate format reader, rewinding the stream afterwards.
    fn score(
        &self,
        registered: &RegisteredFormat,
        mss: &mut MediaSourceStream<'_>,
    ) -> Result<Score> {
        // Save the initial position to rewind back to after scoring is complete.
        let init_pos = mss.pos();

        // Perform the scoring operation.
        let max_score_depth = u64::from(self.opts.max_score_depth);

        let result =
            match (registered.score)(ScopedStream::new(&mut *mss, max_score_depth)) {
                Err(Error::IoError(err)) if err.kind() != std::io::ErrorKind::UnexpectedEof => {
                    // IO errors that are not an unexpected end-of-file (or out-of-bounds) error
                    // abort the entire probe operation.
                    Err(Error::IoError(err))
                }
                Err(_) => {
                    // All other errors are caught and return unsupported.
                    Ok(Score::Unsupported)
                }
                result => result,
            };

        // Rewind to the initial position.
        mss.seek_buffered(init_pos);

        result
    }

    fn tiers(&self) -> impl Iterator<Item = &Vec<RegisteredFormat>> {
        [&self.preferred, &self.standard, &self.fallback].into_iter()
    }
}

/// Convenience macro for declaring a `ProbeFormatData` for a `FormatReader`.
#[macro_export]
macro_rules! support_format {
    ($info:expr, $exts:expr, $mimes:expr, $markers:expr) => {
        kinema_core::formats::probe::ProbeFormatData {
            spec: kinema_core::formats::probe::ProbeDataMatchSpec {
                extensions: $exts,
                mime_types: $mimes,
                markers: $markers,
            },
            info: $info,
        }
    };
}
