// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of a single 8x8 DCT coefficient block.

use kinema_core::errors::{decode_error, Result};
use kinema_core::io::BitReaderLtr;

use crate::vlc::{self, VlcTree};

/// The zig-zag scan order: maps a one-dimensional coefficient position to its position within an
/// 8x8 block in raster order.
pub const ZIGZAG_SCAN: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Decode one DCT block into `coeffs`.
///
/// `quants` is the 64-entry quantizer column in zig-zag order, and `scan` maps a zig-zag position
/// to the coefficient's position as expected by the inverse transform. The DC quantizer entry is
/// never consulted: the DC coefficient is scaled by the fixed factor the codec specifies.
pub fn decode_dct_block(
    reader: &mut BitReaderLtr<'_>,
    tree: &VlcTree,
    quants: &[i16; 64],
    scan: &[usize; 64],
    coeffs: &mut [i16; 64],
) -> Result<()> {
    coeffs.fill(0);

    let dc = reader.read_bits_leq32_signed(9)?;
    let q = reader.read_bits_leq32(1)?;

    let ac_scale = (5 - q) - 2;

    // DC coefficient. Convert to unsigned because 128 is not added per-pixel by the standard
    // IDCT.
    coeffs[0] = ((dc << 2) + 1024) as i16;

    // AC coefficients.
    let mut i = 1;

    loop {
        let symbol = vlc::read_symbol(tree, reader)?;

        if symbol.is_eob() {
            break;
        }

        i += symbol.run as usize;

        if i >= 64 {
            return decode_error("pv3video: run length exceeds block");
        }

        coeffs[scan[i]] = ((symbol.level * i32::from(quants[i])) >> ac_scale) as i16;

        i += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use kinema_core::io::BitReaderLtr;

    use super::{decode_dct_block, ZIGZAG_SCAN};
    use crate::vlc::VLC_TREE;

    fn identity_scan() -> [usize; 64] {
        let mut scan = [0; 64];
        for (i, s) in scan.iter_mut().enumerate() {
            *s = ZIGZAG_SCAN[i];
        }
        scan
    }

    #[test]
    fn verify_dc_only_block() {
        // 9-bit DC = +1, 1-bit q = 0, then end-of-block (0110).
        let data = [0b0000_0000, 0b1001_1000];
        let mut reader = BitReaderLtr::new(&data);

        let quants = [32i16; 64];
        let scan = identity_scan();
        let mut coeffs = [0i16; 64];

        decode_dct_block(&mut reader, &VLC_TREE, &quants, &scan, &mut coeffs).unwrap();

        assert_eq!(coeffs[0], 1028);
        assert!(coeffs[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn verify_ac_coefficient_scaling() {
        // 9-bit DC = 0, q = 1 (ac scale 2), then the 2-bit codeword 00 (run 0, level 1) with a
        // positive sign bit, then end-of-block.
        let data = [0b0000_0000, 0b0100_0011, 0b0000_0000];
        let mut reader = BitReaderLtr::new(&data);

        let mut quants = [32i16; 64];
        quants[1] = 48;

        let scan = identity_scan();
        let mut coeffs = [0i16; 64];

        decode_dct_block(&mut reader, &VLC_TREE, &quants, &scan, &mut coeffs).unwrap();

        assert_eq!(coeffs[0], 1024);
        // Zig-zag position 1 is raster position 1, scaled by (1 * 48) >> 2.
        assert_eq!(coeffs[1], 12);
        assert!(coeffs[2..].iter().all(|&c| c == 0));
    }

    #[test]
    fn verify_run_overflow_fails() {
        // DC, q = 0, then the run-escape prefix 1111110 with run 61 (111101) twice, overflowing
        // the 64 coefficient slots.
        let mut bits = Vec::new();
        bits.extend_from_slice(&[0u8; 9]); // dc
        bits.push(0); // q
        for _ in 0..2 {
            bits.extend_from_slice(&[1, 1, 1, 1, 1, 1, 0]);
            bits.extend_from_slice(&[1, 1, 1, 1, 0, 1]);
        }
        // Pad to a whole number of bytes.
        while bits.len() % 8 != 0 {
            bits.push(0);
        }

        let mut data = vec![0u8; bits.len() / 8];
        for (i, bit) in bits.iter().enumerate() {
            data[i / 8] |= bit << (7 - (i % 8));
        }

        let mut reader = BitReaderLtr::new(&data);

        let quants = [32i16; 64];
        let scan = identity_scan();
        let mut coeffs = [0i16; 64];

        let result = decode_dct_block(&mut reader, &VLC_TREE, &quants, &scan, &mut coeffs);

        assert!(result.is_err());
    }
}
