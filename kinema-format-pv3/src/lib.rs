// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A demuxer for the Earthsoft PV3/PV4 DV container format.
//!
//! A file is a fixed 16 kB header followed by a sequence of 4 kB aligned frame records, each
//! carrying one video frame and the accompanying span of audio. Random access is provided by an
//! optional sidecar index file; since format readers perform no filesystem access of their own,
//! the embedder passes the sidecar's contents through
//! [`ExternalFormatData`](kinema_core::formats::FormatOptions) under the
//! [`PV3_INDEX_ATTACHMENT_IDENT`] identifier (see [`index_name_for`] for the sidecar naming
//! convention).

use std::io::{Seek, SeekFrom};

use kinema_core::codecs::audio::well_known::CODEC_ID_PCM_S16BE;
use kinema_core::codecs::audio::{AudioCodecId, AudioCodecParameters, Channels, SampleFormat};
use kinema_core::codecs::video::well_known::extra_data::VIDEO_EXTRA_DATA_ID_PV3_HEADER;
use kinema_core::codecs::video::well_known::CODEC_ID_PV3_DV;
use kinema_core::codecs::video::{VideoCodecParameters, VideoExtraData};
use kinema_core::codecs::CodecParameters;
use kinema_core::common::Rational;
use kinema_core::errors::{
    decode_error, seek_error, unsupported_error, Error, Result, SeekErrorKind,
};
use kinema_core::formats::prelude::*;
use kinema_core::formats::probe::{ProbeFormatData, ProbeableFormat, Score, Scoreable};
use kinema_core::formats::well_known::FORMAT_ID_PV3;
use kinema_core::io::{MediaSourceStream, ReadBytes, ScopedStream};
use kinema_core::meta::{Metadata, MetadataLog};
use kinema_core::support_format;

use log::{debug, info, warn};

mod audio;
mod header;

use audio::AudioPacketizer;
use header::{
    align_up, read_index, FrameHeader, StreamHeader, FILE_HEADER_SIZE, FRAME_HEADER_SIZE,
    INDEX_OFFSET_SHIFT, MAX_AUDIO_BLOCK_SIZE, MAX_AUDIO_SAMPLE_RATE, MAX_VIDEO_BLOCK_SIZE,
    PV3_MARKER, RECORD_ALIGNMENT, VIDEO_BLOCK_ALIGNMENT,
};

pub use header::index_name_for;

/// The identifier under which the contents of the sidecar index file are passed to the reader.
pub const PV3_INDEX_ATTACHMENT_IDENT: &str = "application/x-pv3-index";

const PV3_FORMAT_INFO: FormatInfo =
    FormatInfo { format: FORMAT_ID_PV3, short_name: "pv3", long_name: "Earthsoft PV3/PV4 DV" };

const VIDEO_TRACK_ID: u32 = 0;
const AUDIO_TRACK_ID: u32 = 1;

/// The per-frame read state machine.
enum ReadStage {
    FrameHeader,
    AudioBlock,
    VideoBlock,
}

/// Earthsoft PV3/PV4 DV format reader.
///
/// `Pv3Reader` implements a demuxer for the PV3 container format.
pub struct Pv3Reader<'s> {
    reader: MediaSourceStream<'s>,
    tracks: Vec<Track>,
    metadata: MetadataLog,
    header: StreamHeader,
    stage: ReadStage,
    frame: FrameHeader,
    has_audio: bool,
    packetizer: AudioPacketizer,
    /// The cumulative audio-frame count up to, but excluding, the current frame record.
    audio_accum: u64,
    /// The audio sample rate, latched at the first emitted audio packet.
    audio_rate: Option<u32>,
    frame_current: u64,
    index: Vec<header::IndexEntry>,
}

impl<'s> Pv3Reader<'s> {
    pub fn try_new(mut mss: MediaSourceStream<'s>, opts: FormatOptions) -> Result<Self> {
        let header = StreamHeader::read(&mut mss)?;

        debug_assert_eq!(mss.pos(), FILE_HEADER_SIZE);

        debug!(
            "video format: {}x{}, {}",
            header.width,
            header.height,
            if header.interlaced { "interlaced" } else { "progressive" }
        );

        // The sidecar index, if the embedder provided one.
        let mut index = Vec::new();

        for attachment in &opts.external_data.vendor_data {
            if attachment.ident == PV3_INDEX_ATTACHMENT_IDENT {
                index = read_index(&attachment.data)?;
                info!("sidecar index found ({} frames)", index.len());
                break;
            }
        }

        if index.is_empty() {
            info!("no sidecar index, duration is unknown and seeking is unsupported");
        }

        // Without an index the presence of audio cannot be ruled out.
        let has_audio = index
            .last()
            .map_or(true, |last| last.accum_audio_frames + u64::from(last.audio_frame_count) > 0);

        let time_base = if header.interlaced {
            TimeBase::new(1001, 30000)
        }
        else {
            TimeBase::new(1001, 60000)
        };

        let mut video_params = VideoCodecParameters::default();

        video_params.for_codec(CODEC_ID_PV3_DV).with_width(header.width).with_height(header.height);

        video_params.add_extra_data(VideoExtraData {
            id: VIDEO_EXTRA_DATA_ID_PV3_HEADER,
            data: header.to_extra_data(),
        });

        let mut video_track = Track::new(VIDEO_TRACK_ID);

        video_track
            .with_codec_params(CodecParameters::Video(video_params))
            .with_time_base(time_base)
            .with_flags(TrackFlags::DEFAULT);

        if !index.is_empty() {
            let num_frames = index.len() as u64;
            video_track.with_num_frames(num_frames).with_duration(num_frames);
        }

        let mut tracks = vec![video_track];

        if has_audio {
            // The audio codec is not known until the packetizer identifies it, so the track is
            // advertised without codec parameters for now.
            let mut audio_track = Track::new(AUDIO_TRACK_ID);

            audio_track.with_flags(TrackFlags::DEFAULT);

            if let Some(last) = index.last() {
                audio_track
                    .with_num_frames(last.accum_audio_frames + u64::from(last.audio_frame_count));
            }

            tracks.push(audio_track);
        }

        Ok(Pv3Reader {
            reader: mss,
            tracks,
            metadata: opts.external_data.metadata.unwrap_or_default(),
            header,
            stage: ReadStage::FrameHeader,
            frame: Default::default(),
            has_audio,
            packetizer: AudioPacketizer::new(),
            audio_accum: 0,
            audio_rate: None,
            frame_current: 0,
            index,
        })
    }

    /// Skip forward to the next multiple of `align`.
    fn align_to(&mut self, align: u64) -> Result<()> {
        let pos = self.reader.pos();
        let target = align_up(pos, align);

        if target > pos {
            self.reader.ignore_bytes(target - pos)?;
        }

        Ok(())
    }

    /// Record the identity of the newly determined audio codec on the audio track.
    fn init_audio_track(&mut self, codec: AudioCodecId) {
        let mut params = AudioCodecParameters::new();

        params.for_codec(codec);

        if codec == CODEC_ID_PCM_S16BE {
            params
                .with_channels(Channels::FRONT_LEFT | Channels::FRONT_RIGHT)
                .with_sample_format(SampleFormat::S16)
                .with_bits_per_sample(16);
        }

        if let Some(track) = self.tracks.iter_mut().find(|track| track.id == AUDIO_TRACK_ID) {
            track.with_codec_params(CodecParameters::Audio(params));
        }
    }

    /// Latch the audio sample rate of the current frame, or reject a mid-stream change.
    fn update_audio_rate(&mut self) -> Result<()> {
        let rate = self.frame.sample_rate;

        match self.audio_rate {
            Some(latched) if latched != rate => {
                unsupported_error("pv3: mid-stream sample rate change")
            }
            Some(_) => Ok(()),
            None => {
                if rate == 0 {
                    return decode_error("pv3: invalid audio sample rate");
                }

                self.audio_rate = Some(rate);

                if let Some(track) =
                    self.tracks.iter_mut().find(|track| track.id == AUDIO_TRACK_ID)
                {
                    track.with_time_base(TimeBase::new(1, rate));

                    if let Some(params) =
                        track.codec_params.as_mut().and_then(|params| params.audio_mut())
                    {
                        params.with_sample_rate(rate);
                    }
                }

                Ok(())
            }
        }
    }

    /// Read the frame header at the current position, or detect a clean end of stream.
    fn read_frame_header(&mut self) -> Result<Option<FrameHeader>> {
        let start = self.reader.pos();

        if let Some(entry) = self.index.get(self.frame_current as usize) {
            if u64::from(entry.frame_offset) << INDEX_OFFSET_SHIFT != start {
                warn!("stream position disagrees with the index at frame {}", self.frame_current);
            }
        }

        match FrameHeader::read(&mut self.reader) {
            Ok(frame) => {
                debug_assert_eq!(self.reader.pos(), start + FRAME_HEADER_SIZE);
                Ok(Some(frame))
            }
            Err(Error::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof
                    && self.reader.pos() == start =>
            {
                debug!("end of stream reached");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Read and packetize the audio block of the current frame record.
    fn read_audio_block(&mut self) -> Result<Option<Packet>> {
        if self.frame.sample_rate > MAX_AUDIO_SAMPLE_RATE {
            return unsupported_error("pv3: audio sample rate above 48000 hz");
        }

        let size = usize::from(self.frame.audio_frame_count) * 4;

        if size > MAX_AUDIO_BLOCK_SIZE {
            return decode_error("pv3: oversized audio block");
        }

        let block = self.reader.read_boxed_slice_exact(size)?;

        self.align_to(RECORD_ALIGNMENT)?;

        let output = self.packetizer.push_block(&block, self.audio_accum)?;

        self.audio_accum += u64::from(self.frame.audio_frame_count);

        if let Some(codec) = output.latched {
            info!("audio codec determined ({})", codec);
            self.init_audio_track(codec);
        }

        if let Some(packet) = output.packet {
            self.update_audio_rate()?;

            return Ok(Some(Packet::new_from_boxed_slice(
                AUDIO_TRACK_ID,
                packet.ts,
                packet.dur,
                packet.data,
            )));
        }

        Ok(None)
    }

    /// Read the video blocks of the current frame record and assemble the video packet payload:
    /// a fixed header (display aspect ratio, encoding quality, the four block sizes) followed by
    /// the used block payloads.
    fn read_video_blocks(&mut self) -> Result<Packet> {
        let nb_blocks = if self.header.interlaced { 4 } else { 2 };

        let mut total = 0usize;

        for &size in &self.frame.block_size[..nb_blocks] {
            if size > MAX_VIDEO_BLOCK_SIZE {
                return decode_error("pv3: video block exceeds maximum size");
            }
            total += size as usize;
        }

        let mut data = Vec::with_capacity(22 + total);

        data.extend_from_slice(&self.frame.dar.0.to_be_bytes());
        data.extend_from_slice(&self.frame.dar.1.to_be_bytes());
        data.push(self.frame.encoding_q);
        data.push(0);
        for &size in &self.frame.block_size {
            data.extend_from_slice(&size.to_be_bytes());
        }

        let block_sizes: Vec<_> = self.frame.block_size[..nb_blocks].to_vec();
        for (i, &size) in block_sizes.iter().enumerate() {
            if i > 0 {
                self.align_to(VIDEO_BLOCK_ALIGNMENT)?;
            }

            let start = data.len();
            data.resize(start + size as usize, 0);
            self.reader.read_buf_exact(&mut data[start..])?;
        }

        self.align_to(RECORD_ALIGNMENT)?;

        // Derive the sample aspect ratio from the frame's display aspect ratio.
        let (dar_num, dar_den) = self.frame.dar;

        if dar_num != 0 && dar_den != 0 {
            let sar = Rational::reduced(
                u64::from(self.header.height) * u64::from(dar_num),
                u64::from(self.header.width) * u64::from(dar_den),
            );

            if let Some(track) = self.tracks.iter_mut().find(|track| track.id == VIDEO_TRACK_ID) {
                if let Some(params) =
                    track.codec_params.as_mut().and_then(|params| params.video_mut())
                {
                    params.with_sample_aspect_ratio(sar);
                }
            }
        }

        let ts = self.frame_current;

        self.frame_current += 1;

        Ok(Packet::new_from_boxed_slice(VIDEO_TRACK_ID, ts, 1, data.into_boxed_slice()))
    }
}

impl Scoreable for Pv3Reader<'_> {
    fn score(mut src: ScopedStream<&mut MediaSourceStream<'_>>) -> Result<Score> {
        if src.read_triple_bytes()? != PV3_MARKER {
            return Ok(Score::Unsupported);
        }

        Ok(Score::Supported(255))
    }
}

impl<'s, 'p> ProbeableFormat<'p> for Pv3Reader<'s> {
    fn try_probe_new(
        mss: MediaSourceStream<'p>,
        opts: FormatOptions,
    ) -> Result<Box<dyn FormatReader + 'p>> {
        Ok(Box::new(Pv3Reader::try_new(mss, opts)?))
    }

    fn probe_data() -> &'static [ProbeFormatData] {
        &[support_format!(PV3_FORMAT_INFO, &["dv"], &["video/x-pv3-dv"], &[b"PV3"])]
    }
}

impl FormatReader for Pv3Reader<'_> {
    fn format_info(&self) -> &FormatInfo {
        &PV3_FORMAT_INFO
    }

    fn metadata(&mut self) -> Metadata<'_> {
        self.metadata.metadata()
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.stage {
                ReadStage::FrameHeader => {
                    let frame = match self.read_frame_header()? {
                        Some(frame) => frame,
                        None => return Ok(None),
                    };

                    debug!("reading frame {}", self.frame_current);

                    // The header's cumulative count is authoritative. This makes the accumulator
                    // self-correcting after a seek.
                    self.audio_accum = frame.accum_audio_frames;

                    self.frame = frame;
                    self.stage = ReadStage::AudioBlock;
                }
                ReadStage::AudioBlock => {
                    self.stage = ReadStage::VideoBlock;

                    if self.has_audio {
                        if let Some(packet) = self.read_audio_block()? {
                            return Ok(Some(packet));
                        }
                    }
                    else {
                        self.align_to(RECORD_ALIGNMENT)?;
                    }
                }
                ReadStage::VideoBlock => {
                    let packet = self.read_video_blocks()?;

                    self.stage = ReadStage::FrameHeader;

                    return Ok(Some(packet));
                }
            }
        }
    }

    fn seek(&mut self, _mode: SeekMode, to: SeekTo) -> Result<SeekedTo> {
        if self.index.is_empty() {
            return seek_error(SeekErrorKind::Unseekable);
        }

        let required_ts = match to {
            // Frame index given. Timestamps are only meaningful on the video track.
            SeekTo::TimeStamp { ts, track_id } => {
                if track_id != VIDEO_TRACK_ID {
                    return seek_error(SeekErrorKind::InvalidTrack);
                }
                ts
            }
            // Time value given, calculate the frame index using the video timebase.
            SeekTo::Time { time, .. } => {
                let tb = self.tracks[0]
                    .time_base
                    .ok_or(Error::SeekError(SeekErrorKind::Unseekable))?;

                tb.calc_timestamp(time)
            }
        };

        let entry = match self.index.get(required_ts as usize) {
            Some(entry) => *entry,
            None => return seek_error(SeekErrorKind::OutOfRange),
        };

        debug!("seeking to frame {}", required_ts);

        self.reader
            .seek(SeekFrom::Start(u64::from(entry.frame_offset) << INDEX_OFFSET_SHIFT))?;

        self.stage = ReadStage::FrameHeader;
        self.frame_current = required_ts;
        self.audio_accum = entry.accum_audio_frames;
        self.packetizer.flush();

        Ok(SeekedTo { track_id: VIDEO_TRACK_ID, required_ts, actual_ts: required_ts })
    }

    fn into_inner<'ss>(self: Box<Self>) -> MediaSourceStream<'ss>
    where
        Self: 'ss,
    {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use kinema_core::codecs::audio::well_known::{CODEC_ID_AC3, CODEC_ID_PCM_S16BE};
    use kinema_core::formats::probe::{Hint, Probe};
    use kinema_core::formats::{
        ExternalFormatData, FormatOptions, FormatReader, SeekMode, SeekTo, TrackType,
        VendorDataAttachment,
    };
    use kinema_core::io::MediaSourceStream;
    use kinema_core::units::TimeBase;

    use super::{Pv3Reader, PV3_INDEX_ATTACHMENT_IDENT};

    /// Builds a synthetic PV3 stream and its sidecar index in memory.
    pub(crate) struct StreamBuilder {
        data: Vec<u8>,
        index: Vec<u8>,
        accum_audio_frames: u64,
    }

    impl StreamBuilder {
        pub fn new(width_units: u8, height_units: u8, progressive: bool) -> Self {
            let mut data = Vec::new();

            data.extend_from_slice(b"PV3");
            data.push(2);
            data.push(width_units);
            data.push(height_units);
            data.push(u8::from(progressive));
            data.extend_from_slice(&[0u8; 249]);

            for _ in 0..128 {
                data.extend_from_slice(&32u16.to_be_bytes());
            }

            data.resize(16384, 0);

            StreamBuilder { data, index: Vec::new(), accum_audio_frames: 0 }
        }

        fn align(&mut self, align: usize) {
            let len = (self.data.len() + align - 1) & !(align - 1);
            self.data.resize(len, 0);
        }

        pub fn add_frame(&mut self, audio: &[u8], blocks: &[&[u8]], sample_rate: u32) {
            assert!(audio.len() % 4 == 0);

            let offset = self.data.len();
            let audio_frame_count = (audio.len() / 4) as u16;

            // Frame header.
            let accum = self.accum_audio_frames;
            self.data.extend_from_slice(&accum.to_be_bytes()[2..8]);
            self.data.extend_from_slice(&audio_frame_count.to_be_bytes());
            self.data.extend_from_slice(&sample_rate.to_be_bytes());
            self.data.extend_from_slice(&[0u8; 244]);
            self.data.extend_from_slice(&16u16.to_be_bytes());
            self.data.extend_from_slice(&9u16.to_be_bytes());
            self.data.push(255);
            self.data.extend_from_slice(&[0u8; 123]);

            for i in 0..4 {
                let size = blocks.get(i).map_or(0u32, |block| block.len() as u32);
                self.data.extend_from_slice(&size.to_be_bytes());
            }

            self.data.extend_from_slice(&[0u8; 112]);

            // Audio block.
            self.data.extend_from_slice(audio);
            self.align(4096);

            // Video blocks.
            for (i, block) in blocks.iter().enumerate() {
                if i > 0 {
                    self.align(32);
                }
                self.data.extend_from_slice(block);
            }

            self.align(4096);

            // Index entry.
            let len = self.data.len() - offset;

            self.index.extend_from_slice(&((offset >> 12) as u32).to_be_bytes());
            self.index.extend_from_slice(&((len >> 12) as u16).to_be_bytes());
            self.index.extend_from_slice(&accum.to_be_bytes()[2..8]);
            self.index.extend_from_slice(&audio_frame_count.to_be_bytes());
            self.index.push(255);
            self.index.push(0);

            self.accum_audio_frames += u64::from(audio_frame_count);
        }

        pub fn into_reader(self, with_index: bool) -> Pv3Reader<'static> {
            let mut opts = FormatOptions::default();

            if with_index {
                opts.external_data = ExternalFormatData {
                    metadata: None,
                    vendor_data: vec![VendorDataAttachment {
                        ident: PV3_INDEX_ATTACHMENT_IDENT.to_string(),
                        data: self.index.into_boxed_slice(),
                    }],
                };
            }

            let mss = MediaSourceStream::new(Box::new(Cursor::new(self.data)), Default::default());

            Pv3Reader::try_new(mss, opts).unwrap()
        }
    }

    fn silent_audio(frames: usize) -> Vec<u8> {
        vec![0u8; frames * 4]
    }

    fn ac3_audio(frames: usize) -> Vec<u8> {
        let mut audio = vec![0u8; frames * 4];
        audio[0..4].copy_from_slice(&[0xf8, 0x72, 0x4e, 0x1f]);
        audio[4..6].copy_from_slice(&0x0001u16.to_be_bytes());
        audio
    }

    #[test]
    fn verify_open() {
        // 0x78 * 16 = 1920, 0x44 * 8 = 544, interlaced.
        let reader = StreamBuilder::new(0x78, 0x44, false).into_reader(false);

        let video = reader.first_track(TrackType::Video).unwrap();

        assert_eq!(video.time_base, Some(TimeBase::new(1001, 30000)));
        assert_eq!(video.num_frames, None);

        let params = video.codec_params.as_ref().unwrap().video().unwrap();
        assert_eq!(params.width, Some(1920));
        assert_eq!(params.height, Some(544));

        // Without an index, the presence of audio cannot be ruled out, but the audio codec is
        // not known yet.
        assert_eq!(reader.tracks().len(), 2);
        assert!(reader.tracks()[1].codec_params.is_none());
    }

    #[test]
    fn verify_open_progressive_time_base() {
        let reader = StreamBuilder::new(0x50, 0x3c, true).into_reader(false);

        let video = reader.first_track(TrackType::Video).unwrap();
        assert_eq!(video.time_base, Some(TimeBase::new(1001, 60000)));
    }

    #[test]
    fn verify_empty_stream_ends_cleanly() {
        let mut reader = StreamBuilder::new(0x78, 0x44, false).into_reader(false);

        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_video_packet_payload() {
        let block0 = vec![0xa0u8; 64];
        let block1 = vec![0xa1u8; 96];
        let block2 = vec![0xa2u8; 64];
        let block3 = vec![0xa3u8; 32];

        let mut builder = StreamBuilder::new(0x78, 0x44, false);
        builder.add_frame(&[], &[&block0, &block1, &block2, &block3], 48000);

        let mut reader = builder.into_reader(true);

        let packet = reader.next_packet().unwrap().unwrap();

        assert_eq!(packet.track_id(), 0);
        assert_eq!(packet.ts(), 0);
        assert_eq!(packet.dur(), 1);

        let payload = packet.buf();

        // Fixed packet header: dar, encoding quality, reserved, block sizes.
        assert_eq!(&payload[0..4], &[0x00, 0x10, 0x00, 0x09]);
        assert_eq!(payload[4], 255);
        assert_eq!(&payload[6..10], &64u32.to_be_bytes());
        assert_eq!(&payload[10..14], &96u32.to_be_bytes());

        // Block payloads are concatenated without padding.
        assert_eq!(&payload[22..86], block0.as_slice());
        assert_eq!(&payload[86..182], block1.as_slice());
        assert_eq!(&payload[182..246], block2.as_slice());
        assert_eq!(&payload[246..278], block3.as_slice());

        // The sample aspect ratio is derived from the frame DAR.
        let video = reader.first_track(TrackType::Video).unwrap();
        let params = video.codec_params.as_ref().unwrap().video().unwrap();
        let sar = params.sample_aspect_ratio.unwrap();
        assert_eq!((sar.num, sar.den), (68, 135));

        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_record_sizes_are_4096_multiples() {
        let block = vec![0x55u8; 4096 + 32];

        let mut builder = StreamBuilder::new(0x78, 0x44, false);
        builder.add_frame(&silent_audio(800), &[&block, &block, &block, &block], 48000);
        builder.add_frame(&silent_audio(800), &[&block, &block, &block, &block], 48000);

        let mut reader = builder.into_reader(true);

        // Each frame ends on a 4096-byte boundary, in agreement with the index.
        let mut expected_pos = 16384u64;

        for entry in reader.index.clone() {
            assert_eq!(u64::from(entry.frame_offset) << 12, expected_pos);

            let packet = reader.next_packet().unwrap().unwrap();
            assert_eq!(packet.track_id(), 0);

            expected_pos += u64::from(entry.frame_len) << 12;

            assert_eq!(kinema_core::io::ReadBytes::pos(&reader.reader), expected_pos);
            assert_eq!(expected_pos % 4096, 0);
        }
    }

    #[test]
    fn verify_pcm_detection_and_accum() {
        let mut builder = StreamBuilder::new(0x78, 0x44, false);

        let block = vec![0u8; 1024];

        builder.add_frame(&silent_audio(1602), &[&block, &block, &block, &block], 48000);
        builder.add_frame(&silent_audio(1601), &[&block, &block, &block, &block], 48000);

        let mut reader = builder.into_reader(true);

        // Frame 0: the audio block is buffered while the codec is undetermined, so the video
        // packet is emitted first.
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.track_id(), 0);

        // Frame 1: the buffered audio crosses the detection limit and latches linear PCM.
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.track_id(), 1);
        assert_eq!(packet.ts(), 0);
        assert_eq!(packet.dur(), 1602 + 1601);

        let audio = reader.first_track(TrackType::Audio).unwrap();
        let params = audio.codec_params.as_ref().unwrap().audio().unwrap();
        assert_eq!(params.codec, CODEC_ID_PCM_S16BE);
        assert_eq!(params.sample_rate, Some(48000));
        assert_eq!(audio.time_base, Some(TimeBase::new(1, 48000)));

        // The video packet of frame 1 follows.
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.track_id(), 0);
        assert_eq!(packet.ts(), 1);

        // The cumulative audio-frame count advanced by exactly the per-frame counts.
        assert_eq!(reader.audio_accum, 1602 + 1601);

        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_ac3_burst_detection() {
        let mut builder = StreamBuilder::new(0x78, 0x44, false);

        let block = vec![0u8; 1024];

        builder.add_frame(&ac3_audio(1602), &[&block, &block, &block, &block], 48000);

        let mut reader = builder.into_reader(true);

        // The burst is detected in the first audio block and a full AC-3 packet is available
        // immediately.
        let packet = reader.next_packet().unwrap().unwrap();

        assert_eq!(packet.track_id(), 1);
        assert_eq!(packet.buf().len(), 6144);
        assert_eq!(packet.ts(), 2);
        assert_eq!(packet.dur(), 0);

        let audio = reader.first_track(TrackType::Audio).unwrap();
        let params = audio.codec_params.as_ref().unwrap().audio().unwrap();
        assert_eq!(params.codec, CODEC_ID_AC3);
    }

    #[test]
    fn verify_excessive_sample_rate_rejected() {
        let mut builder = StreamBuilder::new(0x78, 0x44, false);

        let block = vec![0u8; 1024];
        builder.add_frame(&silent_audio(100), &[&block, &block, &block, &block], 96000);

        let mut reader = builder.into_reader(false);

        assert!(reader.next_packet().is_err());
    }

    #[test]
    fn verify_seek_round_trip() {
        let mut builder = StreamBuilder::new(0x78, 0x44, false);

        let mut payloads = Vec::new();

        for i in 0u8..3 {
            let block = vec![i; 2048];
            builder.add_frame(&[], &[&block, &block, &block, &block], 48000);
            payloads.push(block);
        }

        let mut reader = builder.into_reader(true);

        assert_eq!(reader.first_track(TrackType::Video).unwrap().num_frames, Some(3));

        // Sequential read to the last frame.
        let mut sequential = Vec::new();

        while let Some(packet) = reader.next_packet().unwrap() {
            sequential.push(packet);
        }

        assert_eq!(sequential.len(), 3);

        // Seek back to frame 2 and re-read it.
        let seeked =
            reader.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 2, track_id: 0 }).unwrap();

        assert_eq!(seeked.actual_ts, 2);

        let packet = reader.next_packet().unwrap().unwrap();

        assert_eq!(packet.ts(), 2);
        assert_eq!(packet.buf(), sequential[2].buf());

        // Seeking past the end of the index is out of range.
        assert!(reader.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 3, track_id: 0 }).is_err());
    }

    #[test]
    fn verify_seek_without_index_unsupported() {
        let mut builder = StreamBuilder::new(0x78, 0x44, false);

        let block = vec![0u8; 2048];
        builder.add_frame(&[], &[&block, &block, &block, &block], 48000);

        let mut reader = builder.into_reader(false);

        assert!(reader.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 0, track_id: 0 }).is_err());
    }

    #[test]
    fn verify_probe_selects_pv3() {
        let mut builder = StreamBuilder::new(0x78, 0x44, false);

        let block = vec![0u8; 2048];
        builder.add_frame(&[], &[&block, &block, &block, &block], 48000);

        let mut probe = Probe::new();
        probe.register_format::<Pv3Reader<'_>>();

        let mss =
            MediaSourceStream::new(Box::new(Cursor::new(builder.data.clone())), Default::default());

        let reader = probe.probe(&Hint::new(), mss, FormatOptions::default()).unwrap();

        assert_eq!(reader.format_info().short_name, "pv3");
    }
}
