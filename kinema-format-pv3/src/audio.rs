// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Audio packetization.
//!
//! The container carries 4 bytes per audio frame without identifying the audio codec. The
//! payload is either stereo 16-bit big-endian PCM, or an IEC 61937 burst stream transporting a
//! compressed codec inside the PCM samples. The packetizer scans for the IEC 61937
//! burst-preamble to identify the codec, and regroups the raw per-record blocks into codec
//! packets.

use std::collections::VecDeque;

use kinema_core::codecs::audio::well_known::{
    CODEC_ID_AAC, CODEC_ID_AC3, CODEC_ID_EAC3, CODEC_ID_PCM_S16BE, CODEC_ID_WMA,
};
use kinema_core::codecs::audio::AudioCodecId;
use kinema_core::errors::{limit_error, unsupported_error, Result};
use kinema_core::units::{Duration, TimeStamp};

use log::debug;

use crate::header::MAX_AUDIO_BLOCK_SIZE;

/// The IEC 61937 burst-preamble sync word (Pa = F872h, Pb = 4E1Fh).
const BURST_SYNC_WORD: [u8; 4] = [0xf8, 0x72, 0x4e, 0x1f];

/// If no burst-preamble is found within this many buffered bytes, the stream is determined to be
/// linear PCM.
const FORCE_PCM_LIMIT: usize = 1536 * 4;

/// The capacity of the raw audio reassembly buffer.
const RAW_AUDIO_BUFFER_SIZE: usize = MAX_AUDIO_BLOCK_SIZE * 3;

/// A detected IEC 61937 burst-preamble.
struct BurstPreamble {
    codec: AudioCodecId,
    /// The fixed size in bytes of one packet of the burst stream.
    packet_size: usize,
    /// The offset of the first byte following the preamble.
    data_offset: usize,
}

/// Scan a raw audio block for an IEC 61937 burst-preamble.
///
/// Null and pause bursts are skipped. Any other unrecognized data type fails with `Unsupported`.
fn find_burst_preamble(block: &[u8]) -> Result<Option<BurstPreamble>> {
    let mut pos = 0;

    while pos + 8 <= block.len() {
        if block[pos..pos + 4] != BURST_SYNC_WORD {
            pos += 1;
            continue;
        }

        // The burst-info field Pc: bits 0-4 select the data type, bits 5-6 the subtype.
        let pc = u16::from_be_bytes([block[pos + 4], block[pos + 5]]);

        let (codec, packet_size) = match pc & 0x1f {
            // Null data and pause bursts carry no stream identity.
            0x00 | 0x03 => {
                pos += 8;
                continue;
            }
            // AC-3 data.
            0x01 => (CODEC_ID_AC3, 1536 * 4),
            // WMA professional, types I to IV.
            0x12 => {
                let packet_size = match (pc >> 5) & 0x3 {
                    0 | 1 => 2048 * 4,
                    2 => 1024 * 4,
                    _ => 512 * 4,
                };
                (CODEC_ID_WMA, packet_size)
            }
            // MPEG-4 AAC.
            0x14 => {
                let packet_size = match (pc >> 5) & 0x3 {
                    0 => 1024 * 4,
                    1 => 2048 * 4,
                    2 => 4096 * 4,
                    _ => 512 * 4,
                };
                (CODEC_ID_AAC, packet_size)
            }
            // Enhanced AC-3.
            0x15 => (CODEC_ID_EAC3, 6144 * 4),
            _ => return unsupported_error("pv3: unsupported iec 61937 data type"),
        };

        return Ok(Some(BurstPreamble { codec, packet_size, data_offset: pos + 8 }));
    }

    Ok(None)
}

/// One packetized span of audio.
pub(crate) struct AudioPacket {
    pub data: Box<[u8]>,
    pub ts: TimeStamp,
    pub dur: Duration,
}

/// The result of feeding one raw audio block to the packetizer.
pub(crate) struct PacketizerOutput {
    /// An audio packet ready for emission, if one was completed.
    pub packet: Option<AudioPacket>,
    /// Set when this block determined the audio codec.
    pub latched: Option<AudioCodecId>,
}

/// Accumulates the raw audio blocks of consecutive frame records and cuts codec packets from
/// them once the audio codec has been determined.
pub(crate) struct AudioPacketizer {
    fifo: VecDeque<u8>,
    codec: Option<AudioCodecId>,
    nonpcm_packet_size: usize,
    nonpcm_ts: TimeStamp,
}

impl AudioPacketizer {
    pub fn new() -> Self {
        AudioPacketizer {
            fifo: VecDeque::with_capacity(RAW_AUDIO_BUFFER_SIZE),
            codec: None,
            nonpcm_packet_size: 0,
            nonpcm_ts: 0,
        }
    }

    /// Discard all buffered audio. The latched codec identity is retained.
    pub fn flush(&mut self) {
        self.fifo.clear();
    }

    /// Feed the raw audio block of one frame record to the packetizer. `accum_frames` is the
    /// cumulative audio-frame count up to, but excluding, this block.
    pub fn push_block(&mut self, block: &[u8], accum_frames: u64) -> Result<PacketizerOutput> {
        if self.fifo.len() + block.len() >= RAW_AUDIO_BUFFER_SIZE {
            return limit_error("pv3: raw audio buffer overflow");
        }

        if self.codec == Some(CODEC_ID_PCM_S16BE) {
            // Linear PCM: each raw block is emitted as-is.
            let packet = AudioPacket {
                data: block.into(),
                ts: accum_frames,
                dur: (block.len() / 4) as Duration,
            };

            return Ok(PacketizerOutput { packet: Some(packet), latched: None });
        }

        if self.codec.is_some() {
            // A burst stream. Later preambles re-synchronize the packet boundary and timestamp.
            if let Some(preamble) = find_burst_preamble(block)? {
                self.nonpcm_packet_size = preamble.packet_size;
                self.nonpcm_ts = accum_frames + (preamble.data_offset / 4) as u64;

                if self.fifo.is_empty() {
                    self.fifo.extend(&block[preamble.data_offset..]);
                }
                else {
                    self.fifo.extend(block);
                }
            }
            else {
                self.fifo.extend(block);
            }

            return Ok(PacketizerOutput { packet: self.cut_burst_packet(), latched: None });
        }

        // The codec is not known yet.
        if let Some(preamble) = find_burst_preamble(block)? {
            debug!("iec 61937 burst stream detected ({})", preamble.codec);

            self.codec = Some(preamble.codec);
            self.nonpcm_packet_size = preamble.packet_size;
            self.nonpcm_ts = accum_frames + (preamble.data_offset / 4) as u64;

            // Discard the unsynced bytes buffered so far.
            self.fifo.clear();
            self.fifo.extend(&block[preamble.data_offset..]);

            return Ok(PacketizerOutput {
                packet: self.cut_burst_packet(),
                latched: Some(preamble.codec),
            });
        }

        if self.fifo.len() >= FORCE_PCM_LIMIT {
            // No burst-preamble was found within the probe window: linear PCM. The buffered
            // bytes become the first packet.
            debug!("no iec 61937 burst-preamble found, stream is linear pcm");

            self.codec = Some(CODEC_ID_PCM_S16BE);

            let ts = accum_frames - (self.fifo.len() / 4) as u64;

            let mut data = Vec::with_capacity(self.fifo.len() + block.len());
            data.extend(self.fifo.drain(..));
            data.extend_from_slice(block);

            let dur = (data.len() / 4) as Duration;

            let packet = AudioPacket { data: data.into_boxed_slice(), ts, dur };

            return Ok(PacketizerOutput {
                packet: Some(packet),
                latched: Some(CODEC_ID_PCM_S16BE),
            });
        }

        self.fifo.extend(block);

        Ok(PacketizerOutput { packet: None, latched: None })
    }

    /// Cut one packet of the latched burst stream from the buffer, if enough bytes are available.
    fn cut_burst_packet(&mut self) -> Option<AudioPacket> {
        if self.nonpcm_packet_size == 0 || self.fifo.len() < self.nonpcm_packet_size {
            return None;
        }

        let data: Vec<u8> = self.fifo.drain(..self.nonpcm_packet_size).collect();

        Some(AudioPacket { data: data.into_boxed_slice(), ts: self.nonpcm_ts, dur: 0 })
    }
}

#[cfg(test)]
mod tests {
    use kinema_core::codecs::audio::well_known::{
        CODEC_ID_AAC, CODEC_ID_AC3, CODEC_ID_PCM_S16BE, CODEC_ID_WMA,
    };

    use super::{find_burst_preamble, AudioPacketizer};

    fn burst_block(pc: u16, len: usize) -> Vec<u8> {
        let mut block = vec![0u8; len];
        block[0..4].copy_from_slice(&[0xf8, 0x72, 0x4e, 0x1f]);
        block[4..6].copy_from_slice(&pc.to_be_bytes());
        block
    }

    #[test]
    fn verify_ac3_latch_and_packet_size() {
        let mut packetizer = AudioPacketizer::new();

        // An AC-3 burst (Pc data type 1) at the start of a 1602-frame block.
        let out = packetizer.push_block(&burst_block(0x0001, 1602 * 4), 0).unwrap();

        assert_eq!(out.latched, Some(CODEC_ID_AC3));

        // 6400 post-preamble bytes buffered, one 6144-byte packet cut.
        let packet = out.packet.unwrap();
        assert_eq!(packet.data.len(), 6144);
        assert_eq!(packet.ts, 2);
        assert_eq!(packet.dur, 0);
    }

    #[test]
    fn verify_burst_packet_spans_blocks() {
        let mut packetizer = AudioPacketizer::new();

        // MPEG-4 AAC with subtype bits 01: 2048 * 4 byte packets.
        let out = packetizer.push_block(&burst_block(0x0034, 1500 * 4), 0).unwrap();
        assert_eq!(out.latched, Some(CODEC_ID_AAC));
        assert!(out.packet.is_none());

        // The second block completes the packet.
        let out = packetizer.push_block(&vec![0u8; 1500 * 4], 1500).unwrap();
        let packet = out.packet.unwrap();
        assert_eq!(packet.data.len(), 2048 * 4);
    }

    #[test]
    fn verify_pcm_fallback() {
        let mut packetizer = AudioPacketizer::new();

        // Three silent 1500-frame blocks. The third buffered block crosses the detection limit.
        assert!(packetizer.push_block(&vec![0u8; 1500 * 4], 0).unwrap().packet.is_none());
        assert!(packetizer.push_block(&vec![0u8; 1500 * 4], 1500).unwrap().packet.is_none());

        let out = packetizer.push_block(&vec![0u8; 1500 * 4], 3000).unwrap();

        assert_eq!(out.latched, Some(CODEC_ID_PCM_S16BE));

        let packet = out.packet.unwrap();
        assert_eq!(packet.data.len(), 3 * 1500 * 4);
        assert_eq!(packet.ts, 0);
        assert_eq!(packet.dur, 4500);

        // Thereafter blocks pass through directly.
        let out = packetizer.push_block(&vec![0u8; 1500 * 4], 4500).unwrap();
        let packet = out.packet.unwrap();
        assert_eq!(packet.ts, 4500);
        assert_eq!(packet.dur, 1500);
    }

    #[test]
    fn verify_null_burst_skipped() {
        // A null burst, then a real AC-3 burst later in the same block.
        let mut block = burst_block(0x0000, 64);
        block[16..20].copy_from_slice(&[0xf8, 0x72, 0x4e, 0x1f]);
        block[20..22].copy_from_slice(&0x0001u16.to_be_bytes());

        let preamble = find_burst_preamble(&block).unwrap().unwrap();

        assert_eq!(preamble.codec, CODEC_ID_AC3);
        assert_eq!(preamble.data_offset, 24);
    }

    #[test]
    fn verify_unsupported_burst_type() {
        // DTS type I (data type 0x0b) is not supported.
        assert!(find_burst_preamble(&burst_block(0x000b, 64)).is_err());
    }

    #[test]
    fn verify_wma_subtype_sizes() {
        for (subtype, size) in [(0u16, 2048 * 4), (1, 2048 * 4), (2, 1024 * 4), (3, 512 * 4)] {
            let preamble =
                find_burst_preamble(&burst_block(0x0012 | (subtype << 5), 64)).unwrap().unwrap();

            assert_eq!(preamble.codec, CODEC_ID_WMA);
            assert_eq!(preamble.packet_size, size);
        }
    }

    #[test]
    fn verify_buffer_overflow_detected() {
        let mut packetizer = AudioPacketizer::new();

        // Enhanced AC-3 packets (6144 * 4 bytes) are larger than the reassembly buffer, so the
        // buffered bytes are never drained and the bounded buffer must eventually refuse input.
        let out = packetizer.push_block(&burst_block(0x0015, 6000), 0).unwrap();
        assert!(out.packet.is_none());

        packetizer.push_block(&vec![0u8; 6000], 1500).unwrap();
        packetizer.push_block(&vec![0u8; 6000], 3000).unwrap();

        assert!(packetizer.push_block(&vec![0u8; 6000], 4500).is_err());
    }
}
