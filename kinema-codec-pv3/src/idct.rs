// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 8x8 inverse DCT.
//!
//! The transform is the one specified in SMPTE 370M-2006:
//!
//! ```text
//!           7   7                  {v(2y+1)   }    {u(2x+1)   }
//! P(x,y) =  S   S  Cv Cu C(u,v) cos{------- pi} cos{------- pi}
//!          v=0 u=0                 {  16      }    {  16      }
//!
//!     where Cu = 0.5 / sqrt(2) for u = 0, Cu = 0.5 for u = 1 to 7 (likewise for Cv)
//! ```
//!
//! The transform does not add the usual +128 bias per pixel: the caller biases the DC coefficient
//! instead, which is cheaper and exact.

use std::f32::consts::PI;

use once_cell::sync::Lazy;

/// `BASIS[u][x]` is `Cu * cos((2x + 1) * u * pi / 16)`.
static BASIS: Lazy<[[f32; 8]; 8]> = Lazy::new(|| {
    let mut basis = [[0f32; 8]; 8];

    for (u, row) in basis.iter_mut().enumerate() {
        let cu = if u == 0 { 0.5 / 2f32.sqrt() } else { 0.5 };

        for (x, b) in row.iter_mut().enumerate() {
            *b = cu * ((2 * x + 1) as f32 * u as f32 * PI / 16.0).cos();
        }
    }

    basis
});

/// The coefficient permutation this inverse transform expects, applied on top of the zig-zag
/// order when scan tables are built. This implementation consumes coefficients in raster order,
/// so the permutation is the identity.
pub fn permutation() -> [usize; 64] {
    let mut permutation = [0; 64];
    for (i, p) in permutation.iter_mut().enumerate() {
        *p = i;
    }
    permutation
}

/// Inverse transform `coeffs` and write the reconstructed 8x8 pixel block into `dst` at the given
/// row stride. Samples are rounded and clamped to the 8-bit range.
pub fn idct_put(dst: &mut [u8], stride: usize, coeffs: &[i16; 64]) {
    let basis = &*BASIS;

    // First pass: transform each row of coefficients horizontally. tmp[v][x] is the contribution
    // of vertical frequency v to column x.
    let mut tmp = [[0f32; 8]; 8];

    for v in 0..8 {
        for x in 0..8 {
            let mut sum = 0f32;

            for u in 0..8 {
                sum += f32::from(coeffs[8 * v + u]) * basis[u][x];
            }

            tmp[v][x] = sum;
        }
    }

    // Second pass: transform vertically and store.
    for y in 0..8 {
        let row = &mut dst[y * stride..y * stride + 8];

        for (x, sample) in row.iter_mut().enumerate() {
            let mut sum = 0f32;

            for v in 0..8 {
                sum += tmp[v][x] * basis[v][y];
            }

            *sample = sum.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::idct_put;

    #[test]
    fn verify_flat_block() {
        // A biased DC-only block reconstructs to a flat block at dc / 8.
        let mut coeffs = [0i16; 64];
        coeffs[0] = 1024;

        let mut dst = [0u8; 8 * 8];
        idct_put(&mut dst, 8, &coeffs);

        assert!(dst.iter().all(|&s| s == 128));
    }

    #[test]
    fn verify_stride_and_clamp() {
        let mut coeffs = [0i16; 64];
        coeffs[0] = 4096; // Reconstructs to 512 per pixel, clamped to 255.

        let mut dst = [0u8; 16 * 8];
        idct_put(&mut dst, 16, &coeffs);

        for y in 0..8 {
            assert!(dst[16 * y..16 * y + 8].iter().all(|&s| s == 255));
            assert!(dst[16 * y + 8..16 * y + 16].iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn verify_horizontal_frequency() {
        // A single horizontal AC coefficient produces rows that are all identical.
        let mut coeffs = [0i16; 64];
        coeffs[0] = 1024;
        coeffs[1] = 128;

        let mut dst = [0u8; 8 * 8];
        idct_put(&mut dst, 8, &coeffs);

        for y in 1..8 {
            assert_eq!(&dst[8 * y..8 * y + 8], &dst[0..8]);
        }

        // The first half of the row is brighter, the second half darker, by symmetry.
        for x in 0..4 {
            assert_eq!(
                i32::from(dst[x]) - 128,
                -(i32::from(dst[7 - x]) - 128),
            );
        }
    }
}
