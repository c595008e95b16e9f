// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame reconstruction from the per-frame sub-bitstreams.
//!
//! A frame is carried by two (progressive) or four (interlaced) independently coded
//! sub-bitstreams. Each sub-bitstream covers a disjoint set of macroblock coordinates: block `b`
//! first walks the macroblock rows `b, b + NB, b + 2NB, ...` in raster order, then contributes a
//! share of the residual rows below the last evenly divisible row (the padding region). When the
//! frame height is not a multiple of 16, the bottom-most row is coded as 32x8 macroblocks by the
//! last sub-bitstream.

use kinema_core::errors::{decode_error, unsupported_error, Result};
use kinema_core::io::BitReaderLtr;
use kinema_core::video::YuvVideoBuffer;

use log::{error, warn};

use crate::dct::{decode_dct_block, ZIGZAG_SCAN};
use crate::idct;
use crate::vlc::VLC_TREE;

/// Per sub-bitstream decode parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BlockParams {
    /// The number of macroblocks coded by this sub-bitstream.
    pub nb_mb: usize,
    /// The macroblock coordinates at which this sub-bitstream begins its contribution to the
    /// padding region.
    pub mb_pad_x: usize,
    pub mb_pad_y: usize,
    /// The macroblock row coded as 32x8 macroblocks, if any.
    pub mb_bottom_y: Option<usize>,
}

/// Decodes the video payload of one frame into a picture.
///
/// The decoder is immutable after construction and may be shared by worker threads.
pub(crate) struct FrameDecoder {
    width: usize,
    height: usize,
    interlaced: bool,
    nb_blocks: usize,
    /// Luminance quantizers in zig-zag order.
    lum_quants: [i16; 64],
    /// Chrominance quantizers in zig-zag order.
    chrom_quants: [i16; 64],
    /// The zig-zag scan with the inverse transform's coefficient permutation applied.
    scan: [usize; 64],
    nb_mb_per_line: usize,
    /// The first macroblock row of the padding region.
    mb_pad_start_y: usize,
    blocks: Vec<BlockParams>,
}

/// The destination planes for one macroblock.
struct MbDest<'a> {
    y: &'a mut [u8],
    cb: &'a mut [u8],
    cr: &'a mut [u8],
    y_stride: usize,
    cb_stride: usize,
    cr_stride: usize,
    /// The pixel row within the destination slices at which this macroblock's top row lives.
    y_origin: usize,
}

impl FrameDecoder {
    pub fn try_new(
        width: usize,
        height: usize,
        interlaced: bool,
        lum_quants: &[i16; 64],
        chrom_quants: &[i16; 64],
    ) -> Result<FrameDecoder> {
        if width == 0 || width % 16 != 0 {
            return decode_error("pv3video: frame width must be a non-zero multiple of 16");
        }
        if height == 0 || height % 8 != 0 {
            return decode_error("pv3video: frame height must be a non-zero multiple of 8");
        }

        let nb_blocks = if interlaced { 4 } else { 2 };

        // The 32x8 bottom-row rearrangement is only defined for interlaced scanning.
        if !interlaced && height % 16 != 0 {
            return unsupported_error("pv3video: progressive frame height not a multiple of 16");
        }

        if height < 16 * nb_blocks {
            return unsupported_error("pv3video: frame height too small");
        }

        let permutation = idct::permutation();

        let mut decoder = FrameDecoder {
            width,
            height,
            interlaced,
            nb_blocks,
            lum_quants: [0; 64],
            chrom_quants: [0; 64],
            scan: [0; 64],
            nb_mb_per_line: width / 16,
            mb_pad_start_y: 0,
            blocks: Vec::new(),
        };

        for i in 0..64 {
            decoder.lum_quants[i] = lum_quants[ZIGZAG_SCAN[i]];
            decoder.chrom_quants[i] = chrom_quants[ZIGZAG_SCAN[i]];
            decoder.scan[i] = permutation[ZIGZAG_SCAN[i]];
        }

        // The DC quantizer is fixed to 32 by the codec specification. A differing stored value is
        // advisory only.
        if decoder.lum_quants[0] != 0 && decoder.lum_quants[0] != 32 {
            warn!(
                "luminance DC coef = {}, but it will be ignored (DC coef is fixed to 32)",
                decoder.lum_quants[0]
            );
        }

        if decoder.chrom_quants[0] != 0 && decoder.chrom_quants[0] != 32 {
            warn!(
                "chrominance DC coef = {}, but it will be ignored (DC coef is fixed to 32)",
                decoder.chrom_quants[0]
            );
        }

        // Distribute the macroblocks across the sub-bitstreams. Any remainder is spread over the
        // odd sub-bitstreams first; block 0 never receives an extra macroblock.
        let nb_mb_total = (width * height) / (16 * 16);
        let nb_mb_per_line = decoder.nb_mb_per_line;

        let mut nb_mb = vec![nb_mb_total / nb_blocks; nb_blocks];

        match nb_mb_total % nb_blocks {
            1 => {
                nb_mb[1] += 1;
            }
            2 => {
                nb_mb[1] += 1;
                nb_mb[3] += 1;
            }
            3 => {
                nb_mb[1] += 1;
                nb_mb[2] += 1;
                nb_mb[3] += 1;
            }
            _ => (),
        }

        let mb_pad_start_y = (height / (16 * nb_blocks)) * nb_blocks;

        decoder.mb_pad_start_y = mb_pad_start_y;

        let mut nb_mb_pad = 0;

        for (i, &nb_mb) in nb_mb.iter().enumerate() {
            let (mb_pad_x, mb_pad_y) = if i == 0 {
                (0, mb_pad_start_y)
            }
            else {
                (nb_mb_pad % nb_mb_per_line, nb_mb_pad / nb_mb_per_line + mb_pad_start_y)
            };

            decoder.blocks.push(BlockParams { nb_mb, mb_pad_x, mb_pad_y, mb_bottom_y: None });

            nb_mb_pad += nb_mb - (mb_pad_start_y / nb_blocks) * nb_mb_per_line;
        }

        if height % 16 != 0 {
            // The last sub-bitstream codes the bottom row as 32x8 macroblocks.
            decoder.blocks[nb_blocks - 1].mb_bottom_y = Some(height / 16);
        }

        Ok(decoder)
    }

    pub fn nb_blocks(&self) -> usize {
        self.nb_blocks
    }

    #[cfg(test)]
    pub(crate) fn block_params(&self) -> &[BlockParams] {
        &self.blocks
    }

    /// Decode one frame's sub-bitstream payloads into the picture.
    ///
    /// Macroblock-level bitstream errors are logged and absorbed: decoding continues with the
    /// next macroblock of the affected sub-bitstream and a picture is always produced.
    pub fn decode_frame(
        &self,
        payloads: [&[u8]; 4],
        picture: &mut YuvVideoBuffer,
        #[cfg(feature = "multithreading")] pool: Option<&rayon::ThreadPool>,
    ) {
        let nb = self.nb_blocks;

        let mut readers: Vec<BitReaderLtr<'_>> =
            payloads[..nb].iter().map(|payload| BitReaderLtr::new(payload)).collect();

        // Each sub-bitstream owns the same number of whole macroblock rows above the padding
        // region.
        let stripe_mbs = (self.mb_pad_start_y / nb) * self.nb_mb_per_line;

        let strides = [
            picture.plane(0).stride(),
            picture.plane(1).stride(),
            picture.plane(2).stride(),
        ];

        let [py, pcb, pcr] = picture.planes_mut();

        // Stripe phase. Slice every plane into 16-pixel-row bands; band k belongs to sub-bitstream
        // k mod NB, giving each task exclusive access to its disjoint share of the picture.
        {
            let mut sets: Vec<BandSet<'_>> = (0..nb).map(|_| BandSet::default()).collect();

            let rows = self.mb_pad_start_y;

            for (k, band) in py.data_mut().chunks_mut(16 * strides[0]).take(rows).enumerate() {
                sets[k % nb].y.push(band);
            }
            for (k, band) in pcb.data_mut().chunks_mut(16 * strides[1]).take(rows).enumerate() {
                sets[k % nb].cb.push(band);
            }
            for (k, band) in pcr.data_mut().chunks_mut(16 * strides[2]).take(rows).enumerate() {
                sets[k % nb].cr.push(band);
            }

            let jobs: Vec<(usize, &mut BitReaderLtr<'_>, BandSet<'_>)> = readers
                .iter_mut()
                .zip(sets)
                .enumerate()
                .map(|(block, (reader, bands))| (block, reader, bands))
                .collect();

            #[cfg(feature = "multithreading")]
            {
                if let Some(pool) = pool {
                    pool.scope(|scope| {
                        for (block, reader, mut bands) in jobs {
                            scope.spawn(move |_| {
                                self.decode_stripes(block, reader, &mut bands, strides, stripe_mbs)
                            });
                        }
                    });
                }
                else {
                    for (block, reader, mut bands) in jobs {
                        self.decode_stripes(block, reader, &mut bands, strides, stripe_mbs);
                    }
                }
            }

            #[cfg(not(feature = "multithreading"))]
            for (block, reader, mut bands) in jobs {
                self.decode_stripes(block, reader, &mut bands, strides, stripe_mbs);
            }
        }

        // Padding phase. The residual rows interleave the sub-bitstreams at sub-row granularity,
        // so they are decoded in block order by continuing each sub-bitstream's reader.
        let y_data = py.data_mut();
        let cb_data = pcb.data_mut();
        let cr_data = pcr.data_mut();

        for (block, reader) in readers.iter_mut().enumerate() {
            let params = &self.blocks[block];

            let remaining = params.nb_mb - stripe_mbs;

            let mut mb_x = params.mb_pad_x;
            let mut mb_y = params.mb_pad_y;
            let mut count = 0;

            while count < remaining {
                count += 1;

                let bottom_row = params.mb_bottom_y == Some(mb_y);

                if !bottom_row && (mb_y + 1) * 16 > self.height {
                    error!("macroblock row {} out of bounds, video block {}", mb_y, block);
                    break;
                }

                let dst = MbDest {
                    y: &mut *y_data,
                    cb: &mut *cb_data,
                    cr: &mut *cr_data,
                    y_stride: strides[0],
                    cb_stride: strides[1],
                    cr_stride: strides[2],
                    y_origin: mb_y * 16,
                };

                if self.decode_macroblock(reader, dst, mb_x, bottom_row).is_err() {
                    error!(
                        "error at macroblock ({}, {}), video block {}",
                        mb_x, mb_y, block
                    );
                    continue;
                }

                mb_x += 1;

                if mb_x == self.nb_mb_per_line {
                    mb_x = 0;
                    mb_y += 1;
                }
            }
        }
    }

    /// Decode one sub-bitstream's macroblocks of the stripe region into its band set.
    fn decode_stripes(
        &self,
        block: usize,
        reader: &mut BitReaderLtr<'_>,
        bands: &mut BandSet<'_>,
        strides: [usize; 3],
        stripe_mbs: usize,
    ) {
        let mut band = 0;
        let mut mb_x = 0;
        let mut count = 0;

        while count < stripe_mbs {
            count += 1;

            let dst = MbDest {
                y: &mut *bands.y[band],
                cb: &mut *bands.cb[band],
                cr: &mut *bands.cr[band],
                y_stride: strides[0],
                cb_stride: strides[1],
                cr_stride: strides[2],
                y_origin: 0,
            };

            if self.decode_macroblock(reader, dst, mb_x, false).is_err() {
                error!(
                    "error at macroblock ({}, {}), video block {}",
                    mb_x,
                    block + band * self.nb_blocks,
                    block
                );
                continue;
            }

            mb_x += 1;

            if mb_x == self.nb_mb_per_line {
                mb_x = 0;
                band += 1;
            }
        }
    }

    /// Decode one macroblock: four luminance DCT blocks, then two Cr and two Cb DCT blocks.
    fn decode_macroblock(
        &self,
        reader: &mut BitReaderLtr<'_>,
        dst: MbDest<'_>,
        mb_x: usize,
        bottom_row: bool,
    ) -> Result<()> {
        // Arrangement of the Y0-Y3 DCT blocks:
        //   [Y0] [Y2]
        //   [Y1] [Y3]
        let mut lum_put_x = [0usize, 0, 8, 8];
        let mut lum_put_y = [0usize, 8, 0, 8];

        // Arrangement of the Cr0-Cr1 and Cb0-Cb1 DCT blocks:
        //   [C0]
        //   [C1]
        let mut chrom_put_x = [0usize; 4];
        let mut chrom_put_y = [0usize, 8, 0, 8];

        let mut stride_shift = 0;
        let mut mb_x = mb_x;

        if self.interlaced {
            // 0: frame mode, 1: field mode.
            let field_mode = reader.read_bit()?;

            if field_mode {
                // In field mode each DCT block covers one field: the rows of the first block land
                // on even pixel rows and the rows of the second block on odd pixel rows.
                lum_put_y = [0, 1, 0, 1];
                chrom_put_y = [0, 1, 0, 1];
                stride_shift = 1;
            }
            else if bottom_row {
                // Bottom-most macroblocks have 32x8 pixels:
                //   [Y0] [Y2] [Y1] [Y3]   [C0] [C1]
                mb_x <<= 1;

                lum_put_x = [0, 16, 8, 24];
                lum_put_y = [0; 4];

                chrom_put_x = [0, 8, 0, 8];
                chrom_put_y = [0; 4];
            }
        }

        let px = mb_x << 4;

        let tree = &*VLC_TREE;
        let mut coeffs = [0i16; 64];

        // Luminance (Y0, Y1, Y2, Y3) DCT blocks.
        for i in 0..4 {
            decode_dct_block(reader, tree, &self.lum_quants, &self.scan, &mut coeffs)?;

            let offset = (dst.y_origin + lum_put_y[i]) * dst.y_stride + px + lum_put_x[i];

            idct::idct_put(&mut dst.y[offset..], dst.y_stride << stride_shift, &coeffs);
        }

        // Chrominance (Cr0, Cr1, Cb0, Cb1) DCT blocks.
        let cx = px >> 1;

        for i in 0..4 {
            decode_dct_block(reader, tree, &self.chrom_quants, &self.scan, &mut coeffs)?;

            let (plane, stride) = if i < 2 {
                (&mut *dst.cr, dst.cr_stride)
            }
            else {
                (&mut *dst.cb, dst.cb_stride)
            };

            let offset = (dst.y_origin + chrom_put_y[i]) * stride + cx + chrom_put_x[i];

            idct::idct_put(&mut plane[offset..], stride << stride_shift, &coeffs);
        }

        Ok(())
    }
}

/// The 16-pixel-row bands of all three planes owned by one sub-bitstream during the stripe phase.
#[derive(Default)]
struct BandSet<'p> {
    y: Vec<&'p mut [u8]>,
    cb: Vec<&'p mut [u8]>,
    cr: Vec<&'p mut [u8]>,
}
