// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end demux and decode tests over synthetic PV3 streams.

#![cfg(feature = "pv3")]

use std::io::Cursor;

use kinema::core::codecs::video::{VideoDecoder, VideoDecoderOptions};
use kinema::core::formats::probe::Hint;
use kinema::core::formats::{
    ExternalFormatData, FormatOptions, FormatReader, SeekMode, SeekTo, TrackType,
    VendorDataAttachment,
};
use kinema::core::io::MediaSourceStream;
use kinema::core::units::TimeBase;
use kinema::core::video::GenericVideoBufferRef;

use kinema_format_pv3::PV3_INDEX_ATTACHMENT_IDENT;

/// An MSB-first bit vector writer.
struct BitWriter {
    bytes: Vec<u8>,
    bit: u32,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { bytes: Vec::new(), bit: 0 }
    }

    fn put_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            if self.bit == 0 {
                self.bytes.push(0);
            }

            if value & (1 << i) != 0 {
                *self.bytes.last_mut().unwrap() |= 0x80 >> self.bit;
            }

            self.bit = (self.bit + 1) % 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        // Video block sizes are multiples of 32 bytes.
        let len = (self.bytes.len() + 31) & !31;
        self.bytes.resize(len, 0);
        self.bytes
    }
}

/// Builds one sub-bitstream of `nb_mb` interlaced macroblocks in which every DCT block is DC-only
/// with the given DC value.
fn flat_sub_bitstream(nb_mb: usize, dc: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();

    for _ in 0..nb_mb {
        bw.put_bits(0, 1); // frame mode

        for _ in 0..6 {
            bw.put_bits(dc & 0x1ff, 9);
            bw.put_bits(0, 1); // q
            bw.put_bits(0b0110, 4); // end of block
        }
    }

    bw.finish()
}

/// Builds a 64x64 interlaced PV3 stream of flat frames, one per DC value, plus its sidecar
/// index.
fn build_flat_stream(frame_dcs: &[u32]) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::new();
    let mut index = Vec::new();

    // File header: 64x64, interlaced.
    data.extend_from_slice(b"PV3");
    data.push(2);
    data.push(4);
    data.push(8);
    data.push(0);
    data.extend_from_slice(&[0u8; 249]);

    for _ in 0..128 {
        data.extend_from_slice(&32u16.to_be_bytes());
    }

    data.resize(16384, 0);

    // A 64x64 interlaced frame has 16 macroblocks, 4 per sub-bitstream.
    let nb_mb = 4;

    for &dc in frame_dcs {
        let offset = data.len();

        let blocks: Vec<Vec<u8>> = (0..4).map(|_| flat_sub_bitstream(nb_mb, dc)).collect();

        // Frame header. No audio.
        data.extend_from_slice(&[0u8; 6]);
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&48000u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 244]);
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.push(255);
        data.extend_from_slice(&[0u8; 123]);

        for block in &blocks {
            data.extend_from_slice(&(block.len() as u32).to_be_bytes());
        }

        data.extend_from_slice(&[0u8; 112]);

        // Empty audio block; align to the next 4096 boundary.
        let len = (data.len() + 4095) & !4095;
        data.resize(len, 0);

        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                let len = (data.len() + 31) & !31;
                data.resize(len, 0);
            }
            data.extend_from_slice(block);
        }

        let len = (data.len() + 4095) & !4095;
        data.resize(len, 0);

        // Index entry.
        index.extend_from_slice(&((offset >> 12) as u32).to_be_bytes());
        index.extend_from_slice(&(((data.len() - offset) >> 12) as u16).to_be_bytes());
        index.extend_from_slice(&[0u8; 6]);
        index.extend_from_slice(&0u16.to_be_bytes());
        index.push(255);
        index.push(0);
    }

    (data, index)
}

fn format_options(index: &[u8]) -> FormatOptions {
    FormatOptions {
        external_data: ExternalFormatData {
            metadata: None,
            vendor_data: vec![VendorDataAttachment {
                ident: PV3_INDEX_ATTACHMENT_IDENT.to_string(),
                data: Box::from(index),
            }],
        },
        ..Default::default()
    }
}

fn luma_plane(frame: &GenericVideoBufferRef<'_>) -> Vec<u8> {
    match frame {
        GenericVideoBufferRef::Yuv(buf) => buf.plane(0).data().to_vec(),
        _ => panic!("unexpected frame buffer type"),
    }
}

#[test]
fn verify_probe_demux_decode() {
    // Frame i reconstructs to the flat luma value 128 + i.
    let (data, index) = build_flat_stream(&[0, 2, 4]);

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut reader = kinema::default::get_probe()
        .probe(&Hint::new(), mss, format_options(&index))
        .unwrap();

    assert_eq!(reader.format_info().short_name, "pv3");

    let video = reader.default_track(TrackType::Video).unwrap();

    assert_eq!(video.time_base, Some(TimeBase::new(1001, 30000)));
    assert_eq!(video.num_frames, Some(3));

    // The index shows the stream carries no audio at all.
    assert!(reader.first_track(TrackType::Audio).is_none());
    assert_eq!(reader.tracks().len(), 1);

    let params = video.codec_params.as_ref().unwrap().video().unwrap();

    let mut decoder = kinema::default::get_codecs()
        .make_video_decoder(params, &VideoDecoderOptions::default())
        .unwrap();

    for expected_ts in 0..3u64 {
        let packet = reader.next_packet().unwrap().unwrap();

        assert_eq!(packet.track_id(), 0);
        assert_eq!(packet.ts(), expected_ts);

        let frame = decoder.decode(&packet).unwrap();

        let spec = *frame.spec();
        assert_eq!(spec.width, 64);
        assert_eq!(spec.height, 64);
        assert!(spec.interlaced);

        let luma = luma_plane(&frame);
        let expected = 128 + expected_ts as u8;
        assert!(luma.iter().all(|&sample| sample == expected));
    }

    assert!(reader.next_packet().unwrap().is_none());
}

#[test]
fn verify_seek_decode_round_trip() {
    let (data, index) = build_flat_stream(&[0, 2, 4]);

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut reader = kinema::default::get_probe()
        .probe(&Hint::new(), mss, format_options(&index))
        .unwrap();

    let params = reader
        .default_track(TrackType::Video)
        .unwrap()
        .codec_params
        .as_ref()
        .unwrap()
        .video()
        .unwrap()
        .clone();

    let mut decoder = kinema::default::get_codecs()
        .make_video_decoder(&params, &VideoDecoderOptions::default())
        .unwrap();

    // Decode sequentially through frame 2.
    let mut sequential = Vec::new();

    for _ in 0..3 {
        let packet = reader.next_packet().unwrap().unwrap();
        sequential.push(luma_plane(&decoder.decode(&packet).unwrap()));
    }

    // Seek back to frame 2 and decode again; the picture must be identical.
    let seeked =
        reader.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 2, track_id: 0 }).unwrap();

    assert_eq!(seeked.actual_ts, 2);

    decoder.reset();

    let packet = reader.next_packet().unwrap().unwrap();
    assert_eq!(packet.ts(), 2);

    let reseeked = luma_plane(&decoder.decode(&packet).unwrap());

    assert_eq!(reseeked, sequential[2]);
}
