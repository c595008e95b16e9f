// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A decoder for the Earthsoft PV3/PV4 DV intra-only video codec.
//!
//! Every frame is a key frame coded as YUV 4:2:2 with 8x8 DCT blocks and the SMPTE 370M
//! variable-length code. A frame is split over two (progressive) or four (interlaced) independent
//! sub-bitstreams that are decoded in parallel.

use kinema_core::codecs::registry::{RegisterableVideoDecoder, SupportedVideoCodec};
use kinema_core::codecs::video::well_known::extra_data::VIDEO_EXTRA_DATA_ID_PV3_HEADER;
use kinema_core::codecs::video::well_known::CODEC_ID_PV3_DV;
use kinema_core::codecs::video::{VideoCodecParameters, VideoDecoder, VideoDecoderOptions};
use kinema_core::codecs::CodecInfo;
use kinema_core::errors::{decode_error, unsupported_error, Result};
use kinema_core::io::{BufReader, ReadBytes};
use kinema_core::packet::Packet;
use kinema_core::support_video_codec;
use kinema_core::video::{GenericVideoBufferRef, PixelFormat, VideoSpec, YuvVideoBuffer};

use log::debug;
#[cfg(feature = "multithreading")]
use log::warn;

mod dct;
mod frame;
mod idct;
mod vlc;

use frame::FrameDecoder;

/// The codec version this decoder supports.
const CODEC_VERSION: u8 = 2;

/// The size of the stream header extra data attached to the video track by the demuxer.
const EXTRA_DATA_SIZE: usize = 262;

/// The size of the fixed header at the start of each video packet.
const PACKET_HEADER_SIZE: usize = 22;

/// The maximum size of one sub-bitstream payload.
const MAX_VIDEO_BLOCK_SIZE: u32 = 72 * 4096;

/// Static video stream parameters, parsed from the stream header extra data.
struct StreamParameters {
    interlaced: bool,
    width: u16,
    height: u16,
    lum_quants: [i16; 64],
    chrom_quants: [i16; 64],
}

impl StreamParameters {
    fn parse(data: &[u8]) -> Result<StreamParameters> {
        if data.len() != EXTRA_DATA_SIZE {
            return decode_error("pv3video: malformed stream header extra data");
        }

        let mut reader = BufReader::new(data);

        let version = reader.read_u8()?;

        if version != CODEC_VERSION {
            return unsupported_error("pv3video: unsupported codec version");
        }

        let flags = reader.read_u8()?;

        let width = reader.read_be_u16()?;
        let height = reader.read_be_u16()?;

        let mut lum_quants = [0i16; 64];
        let mut chrom_quants = [0i16; 64];

        for quant in lum_quants.iter_mut() {
            *quant = reader.read_be_u16()? as i16;
        }
        for quant in chrom_quants.iter_mut() {
            *quant = reader.read_be_u16()? as i16;
        }

        Ok(StreamParameters {
            interlaced: flags & 0x1 == 0,
            width,
            height,
            lum_quants,
            chrom_quants,
        })
    }
}

/// Earthsoft PV3/PV4 DV video decoder.
pub struct Pv3VideoDecoder {
    params: VideoCodecParameters,
    frame_decoder: FrameDecoder,
    buf: YuvVideoBuffer,
    #[cfg(feature = "multithreading")]
    pool: Option<rayon::ThreadPool>,
}

impl Pv3VideoDecoder {
    pub fn try_new(params: &VideoCodecParameters, opts: &VideoDecoderOptions) -> Result<Self> {
        if params.codec != CODEC_ID_PV3_DV {
            return unsupported_error("pv3video: invalid codec");
        }

        let header = params
            .extra_data
            .iter()
            .find(|extra| extra.id == VIDEO_EXTRA_DATA_ID_PV3_HEADER)
            .ok_or_else(|| {
                kinema_core::errors::Error::Unsupported("pv3video: missing stream header")
            })?;

        let stream = StreamParameters::parse(&header.data)?;

        let frame_decoder = FrameDecoder::try_new(
            usize::from(stream.width),
            usize::from(stream.height),
            stream.interlaced,
            &stream.lum_quants,
            &stream.chrom_quants,
        )?;

        let mut spec = VideoSpec::new(
            u32::from(stream.width),
            u32::from(stream.height),
            PixelFormat::Yuv422p,
        );

        spec.interlaced = stream.interlaced;
        // 1080i is top field first, all other interlaced heights are top field second.
        spec.top_field_first = stream.interlaced && stream.height == 1080;

        let mut params = params.clone();
        params.with_width(stream.width).with_height(stream.height);

        #[cfg(feature = "multithreading")]
        let pool = {
            let num_threads =
                if opts.num_threads == 0 { frame_decoder.nb_blocks() } else { opts.num_threads };

            match rayon::ThreadPoolBuilder::new().num_threads(num_threads).build() {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!("worker pool unavailable, decoding serially ({})", err);
                    None
                }
            }
        };

        #[cfg(not(feature = "multithreading"))]
        let _ = opts;

        Ok(Pv3VideoDecoder {
            params,
            frame_decoder,
            buf: YuvVideoBuffer::new(spec),
            #[cfg(feature = "multithreading")]
            pool,
        })
    }

    fn decode_inner(&mut self, packet: &Packet) -> Result<()> {
        let mut reader = packet.as_buf_reader();

        if packet.buf().len() < PACKET_HEADER_SIZE {
            return decode_error("pv3video: video packet too short");
        }

        let dar_num = reader.read_be_u16()?;
        let dar_den = reader.read_be_u16()?;
        let encoding_q = reader.read_u8()?;

        // One reserved byte.
        reader.ignore_bytes(1)?;

        let mut sizes = [0u32; 4];
        for size in sizes.iter_mut() {
            *size = reader.read_be_u32()?;
        }

        debug!("dar = {}:{}, encoding quality = {}", dar_num, dar_den, encoding_q);

        let nb_blocks = self.frame_decoder.nb_blocks();

        let mut total = 0usize;

        for &size in &sizes[..nb_blocks] {
            if size > MAX_VIDEO_BLOCK_SIZE {
                return decode_error("pv3video: video block exceeds maximum size");
            }
            total += size as usize;
        }

        let mut rest = reader.read_buf_bytes_available_ref();

        if rest.len() != total {
            return decode_error("pv3video: video packet size mismatch");
        }

        let mut payloads: [&[u8]; 4] = [&[]; 4];

        for (payload, &size) in payloads.iter_mut().zip(&sizes[..nb_blocks]) {
            let (head, tail) = rest.split_at(size as usize);
            *payload = head;
            rest = tail;
        }

        #[cfg(feature = "multithreading")]
        self.frame_decoder.decode_frame(payloads, &mut self.buf, self.pool.as_ref());

        #[cfg(not(feature = "multithreading"))]
        self.frame_decoder.decode_frame(payloads, &mut self.buf);

        Ok(())
    }
}

impl VideoDecoder for Pv3VideoDecoder {
    fn reset(&mut self) {
        // Every frame is coded independently, therefore do nothing.
    }

    fn codec_info(&self) -> &CodecInfo {
        &Self::supported_codecs()[0].info
    }

    fn codec_params(&self) -> &VideoCodecParameters {
        &self.params
    }

    fn decode(&mut self, packet: &Packet) -> Result<GenericVideoBufferRef<'_>> {
        self.decode_inner(packet)?;

        Ok(GenericVideoBufferRef::Yuv(&self.buf))
    }

    fn last_decoded(&self) -> GenericVideoBufferRef<'_> {
        GenericVideoBufferRef::Yuv(&self.buf)
    }
}

impl RegisterableVideoDecoder for Pv3VideoDecoder {
    fn try_registry_new(
        params: &VideoCodecParameters,
        opts: &VideoDecoderOptions,
    ) -> Result<Box<dyn VideoDecoder>>
    where
        Self: Sized,
    {
        Ok(Box::new(Pv3VideoDecoder::try_new(params, opts)?))
    }

    fn supported_codecs() -> &'static [SupportedVideoCodec] {
        &[support_video_codec!(CODEC_ID_PV3_DV, "pv3dv", "Earthsoft PV3/PV4 DV")]
    }
}

#[cfg(test)]
mod tests {
    use kinema_core::codecs::video::well_known::extra_data::VIDEO_EXTRA_DATA_ID_PV3_HEADER;
    use kinema_core::codecs::video::well_known::CODEC_ID_PV3_DV;
    use kinema_core::codecs::video::{VideoCodecParameters, VideoExtraData};

    use super::StreamParameters;

    pub(crate) fn make_extra_data(
        version: u8,
        progressive: bool,
        width: u16,
        height: u16,
        quant: i16,
    ) -> Vec<u8> {
        let mut data = Vec::new();

        data.push(version);
        data.push(u8::from(progressive));
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());

        for _ in 0..128 {
            data.extend_from_slice(&(quant as u16).to_be_bytes());
        }

        data
    }

    pub(crate) fn make_params(data: Vec<u8>) -> VideoCodecParameters {
        let mut params = VideoCodecParameters::default();

        params.for_codec(CODEC_ID_PV3_DV).add_extra_data(VideoExtraData {
            id: VIDEO_EXTRA_DATA_ID_PV3_HEADER,
            data: data.into_boxed_slice(),
        });

        params
    }

    #[test]
    fn verify_stream_parameters() {
        let stream = StreamParameters::parse(&make_extra_data(2, false, 1920, 544, 32)).unwrap();

        assert!(stream.interlaced);
        assert_eq!(stream.width, 1920);
        assert_eq!(stream.height, 544);
        assert!(stream.lum_quants.iter().all(|&q| q == 32));
        assert!(stream.chrom_quants.iter().all(|&q| q == 32));
    }

    #[test]
    fn verify_unsupported_version() {
        assert!(StreamParameters::parse(&make_extra_data(3, false, 1920, 544, 32)).is_err());
    }

    #[test]
    fn verify_decoder_instantiation() {
        use kinema_core::codecs::video::VideoDecoderOptions;

        let params = make_params(make_extra_data(2, false, 1920, 544, 32));

        let decoder =
            super::Pv3VideoDecoder::try_new(&params, &VideoDecoderOptions::default()).unwrap();

        assert_eq!(decoder.params.width, Some(1920));
        assert_eq!(decoder.params.height, Some(544));
    }
}
