// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Variable-length decoding of run/level symbols.
//!
//! The codewords and run lengths are those specified in SMPTE 370M-2006. Two escape classes
//! exist: the 13-bit codes share the 7-bit prefix `1111110` and carry a raw 6-bit run with a zero
//! level, and the 15-bit codes share the 7-bit prefix `1111111` and carry a raw 8-bit level
//! magnitude followed by a sign bit.

use kinema_core::errors::{decode_error, Result};
use kinema_core::io::BitReaderLtr;

use once_cell::sync::Lazy;

pub const NB_VLC: usize = 378;

/// The number of bits of look-ahead required to decode any symbol, including the trailing sign
/// bit of the longest codeword.
pub const LOOKAHEAD_BITS: u32 = 16;

const VLC_RUN: [u8; NB_VLC] = [
     0,  0,  0,  1,  0,  0,  2,  1,
     0,  0,  3,  4,  0,  0,  5,  6,
     2,  1,  1,  0,  0,  0,  7,  8,
     9, 10,  3,  4,  2,  1,  1,  1,
     0,  0,  0,  0,  0,  0, 11, 12,
    13, 14,  5,  6,  3,  4,  2,  2,
     1,  0,  0,  0,  0,  0,  5,  3,
     3,  2,  1,  1,  1,  0,  1,  6,
     4,  3,  1,  1,  1,  2,  3,  4,
     5,  7,  8,  9, 10,  7,  8,  4,
     3,  2,  2,  2,  2,  2,  1,  1,
     1,  6,  7,  8,  9, 10, 11, 12,
    13, 14, 15, 16, 17, 18, 19, 20,
    21, 22, 23, 24, 25, 26, 27, 28,
    29, 30, 31, 32, 33, 34, 35, 36,
    37, 38, 39, 40, 41, 42, 43, 44,
    45, 46, 47, 48, 49, 50, 51, 52,
    53, 54, 55, 56, 57, 58, 59, 60,
    61,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,
];

const VLC_LEVEL: [u8; NB_VLC] = [
      1,   2,   0,   1,   3,   4,   1,   2,
      5,   6,   1,   1,   7,   8,   1,   1,
      2,   3,   4,   9,  10,  11,   1,   1,
      1,   1,   2,   2,   3,   5,   6,   7,
     12,  13,  14,  15,  16,  17,   1,   1,
      1,   1,   2,   2,   3,   3,   4,   5,
      8,  18,  19,  20,  21,  22,   3,   4,
      5,   6,   9,  10,  11,   0,   0,   3,
      4,   6,  12,  13,  14,   0,   0,   0,
      0,   2,   2,   2,   2,   3,   3,   5,
      7,   7,   8,   9,  10,  11,  15,  16,
     17,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,  23,  24,  25,  26,  27,  28,  29,
     30,  31,  32,  33,  34,  35,  36,  37,
     38,  39,  40,  41,  42,  43,  44,  45,
     46,  47,  48,  49,  50,  51,  52,  53,
     54,  55,  56,  57,  58,  59,  60,  61,
     62,  63,  64,  65,  66,  67,  68,  69,
     70,  71,  72,  73,  74,  75,  76,  77,
     78,  79,  80,  81,  82,  83,  84,  85,
     86,  87,  88,  89,  90,  91,  92,  93,
     94,  95,  96,  97,  98,  99, 100, 101,
    102, 103, 104, 105, 106, 107, 108, 109,
    110, 111, 112, 113, 114, 115, 116, 117,
    118, 119, 120, 121, 122, 123, 124, 125,
    126, 127, 128, 129, 130, 131, 132, 133,
    134, 135, 136, 137, 138, 139, 140, 141,
    142, 143, 144, 145, 146, 147, 148, 149,
    150, 151, 152, 153, 154, 155, 156, 157,
    158, 159, 160, 161, 162, 163, 164, 165,
    166, 167, 168, 169, 170, 171, 172, 173,
    174, 175, 176, 177, 178, 179, 180, 181,
    182, 183, 184, 185, 186, 187, 188, 189,
    190, 191, 192, 193, 194, 195, 196, 197,
    198, 199, 200, 201, 202, 203, 204, 205,
    206, 207, 208, 209, 210, 211, 212, 213,
    214, 215, 216, 217, 218, 219, 220, 221,
    222, 223, 224, 225, 226, 227, 228, 229,
    230, 231, 232, 233, 234, 235, 236, 237,
    238, 239, 240, 241, 242, 243, 244, 245,
    246, 247, 248, 249, 250, 251, 252, 253,
    254, 255,
];

const VLC_BITS: [u8; NB_VLC] = [
     2,  3,  4,  4,  4,  4,  5,  5,
     5,  5,  6,  6,  6,  6,  7,  7,
     7,  7,  7,  7,  7,  7,  8,  8,
     8,  8,  8,  8,  8,  8,  8,  8,
     8,  8,  8,  8,  8,  8,  9,  9,
     9,  9,  9,  9,  9,  9,  9,  9,
     9,  9,  9,  9,  9,  9, 10, 10,
    10, 10, 10, 10, 10, 11, 11, 11,
    11, 11, 11, 11, 11, 12, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 12,
    12, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13,
    13, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15,
];

const VLC_CODE: [u16; NB_VLC] = [
    0x0000, 0x0002, 0x0006, 0x0007, 0x0008, 0x0009, 0x0014, 0x0015,
    0x0016, 0x0017, 0x0030, 0x0031, 0x0032, 0x0033, 0x0068, 0x0069,
    0x006a, 0x006b, 0x006c, 0x006d, 0x006e, 0x006f, 0x00e0, 0x00e1,
    0x00e2, 0x00e3, 0x00e4, 0x00e5, 0x00e6, 0x00e7, 0x00e8, 0x00e9,
    0x00ea, 0x00eb, 0x00ec, 0x00ed, 0x00ee, 0x00ef, 0x01e0, 0x01e1,
    0x01e2, 0x01e3, 0x01e4, 0x01e5, 0x01e6, 0x01e7, 0x01e8, 0x01e9,
    0x01ea, 0x01eb, 0x01ec, 0x01ed, 0x01ee, 0x01ef, 0x03e0, 0x03e1,
    0x03e2, 0x03e3, 0x03e4, 0x03e5, 0x03e6, 0x07ce, 0x07cf, 0x07d0,
    0x07d1, 0x07d2, 0x07d3, 0x07d4, 0x07d5, 0x0fac, 0x0fad, 0x0fae,
    0x0faf, 0x0fb0, 0x0fb1, 0x0fb2, 0x0fb3, 0x0fb4, 0x0fb5, 0x0fb6,
    0x0fb7, 0x0fb8, 0x0fb9, 0x0fba, 0x0fbb, 0x0fbc, 0x0fbd, 0x0fbe,
    0x0fbf, 0x1f86, 0x1f87, 0x1f88, 0x1f89, 0x1f8a, 0x1f8b, 0x1f8c,
    0x1f8d, 0x1f8e, 0x1f8f, 0x1f90, 0x1f91, 0x1f92, 0x1f93, 0x1f94,
    0x1f95, 0x1f96, 0x1f97, 0x1f98, 0x1f99, 0x1f9a, 0x1f9b, 0x1f9c,
    0x1f9d, 0x1f9e, 0x1f9f, 0x1fa0, 0x1fa1, 0x1fa2, 0x1fa3, 0x1fa4,
    0x1fa5, 0x1fa6, 0x1fa7, 0x1fa8, 0x1fa9, 0x1faa, 0x1fab, 0x1fac,
    0x1fad, 0x1fae, 0x1faf, 0x1fb0, 0x1fb1, 0x1fb2, 0x1fb3, 0x1fb4,
    0x1fb5, 0x1fb6, 0x1fb7, 0x1fb8, 0x1fb9, 0x1fba, 0x1fbb, 0x1fbc,
    0x1fbd, 0x7f17, 0x7f18, 0x7f19, 0x7f1a, 0x7f1b, 0x7f1c, 0x7f1d,
    0x7f1e, 0x7f1f, 0x7f20, 0x7f21, 0x7f22, 0x7f23, 0x7f24, 0x7f25,
    0x7f26, 0x7f27, 0x7f28, 0x7f29, 0x7f2a, 0x7f2b, 0x7f2c, 0x7f2d,
    0x7f2e, 0x7f2f, 0x7f30, 0x7f31, 0x7f32, 0x7f33, 0x7f34, 0x7f35,
    0x7f36, 0x7f37, 0x7f38, 0x7f39, 0x7f3a, 0x7f3b, 0x7f3c, 0x7f3d,
    0x7f3e, 0x7f3f, 0x7f40, 0x7f41, 0x7f42, 0x7f43, 0x7f44, 0x7f45,
    0x7f46, 0x7f47, 0x7f48, 0x7f49, 0x7f4a, 0x7f4b, 0x7f4c, 0x7f4d,
    0x7f4e, 0x7f4f, 0x7f50, 0x7f51, 0x7f52, 0x7f53, 0x7f54, 0x7f55,
    0x7f56, 0x7f57, 0x7f58, 0x7f59, 0x7f5a, 0x7f5b, 0x7f5c, 0x7f5d,
    0x7f5e, 0x7f5f, 0x7f60, 0x7f61, 0x7f62, 0x7f63, 0x7f64, 0x7f65,
    0x7f66, 0x7f67, 0x7f68, 0x7f69, 0x7f6a, 0x7f6b, 0x7f6c, 0x7f6d,
    0x7f6e, 0x7f6f, 0x7f70, 0x7f71, 0x7f72, 0x7f73, 0x7f74, 0x7f75,
    0x7f76, 0x7f77, 0x7f78, 0x7f79, 0x7f7a, 0x7f7b, 0x7f7c, 0x7f7d,
    0x7f7e, 0x7f7f, 0x7f80, 0x7f81, 0x7f82, 0x7f83, 0x7f84, 0x7f85,
    0x7f86, 0x7f87, 0x7f88, 0x7f89, 0x7f8a, 0x7f8b, 0x7f8c, 0x7f8d,
    0x7f8e, 0x7f8f, 0x7f90, 0x7f91, 0x7f92, 0x7f93, 0x7f94, 0x7f95,
    0x7f96, 0x7f97, 0x7f98, 0x7f99, 0x7f9a, 0x7f9b, 0x7f9c, 0x7f9d,
    0x7f9e, 0x7f9f, 0x7fa0, 0x7fa1, 0x7fa2, 0x7fa3, 0x7fa4, 0x7fa5,
    0x7fa6, 0x7fa7, 0x7fa8, 0x7fa9, 0x7faa, 0x7fab, 0x7fac, 0x7fad,
    0x7fae, 0x7faf, 0x7fb0, 0x7fb1, 0x7fb2, 0x7fb3, 0x7fb4, 0x7fb5,
    0x7fb6, 0x7fb7, 0x7fb8, 0x7fb9, 0x7fba, 0x7fbb, 0x7fbc, 0x7fbd,
    0x7fbe, 0x7fbf, 0x7fc0, 0x7fc1, 0x7fc2, 0x7fc3, 0x7fc4, 0x7fc5,
    0x7fc6, 0x7fc7, 0x7fc8, 0x7fc9, 0x7fca, 0x7fcb, 0x7fcc, 0x7fcd,
    0x7fce, 0x7fcf, 0x7fd0, 0x7fd1, 0x7fd2, 0x7fd3, 0x7fd4, 0x7fd5,
    0x7fd6, 0x7fd7, 0x7fd8, 0x7fd9, 0x7fda, 0x7fdb, 0x7fdc, 0x7fdd,
    0x7fde, 0x7fdf, 0x7fe0, 0x7fe1, 0x7fe2, 0x7fe3, 0x7fe4, 0x7fe5,
    0x7fe6, 0x7fe7, 0x7fe8, 0x7fe9, 0x7fea, 0x7feb, 0x7fec, 0x7fed,
    0x7fee, 0x7fef, 0x7ff0, 0x7ff1, 0x7ff2, 0x7ff3, 0x7ff4, 0x7ff5,
    0x7ff6, 0x7ff7, 0x7ff8, 0x7ff9, 0x7ffa, 0x7ffb, 0x7ffc, 0x7ffd,
    0x7ffe, 0x7fff,
];

/// Codeword length of the 13-bit escape class: the prefix `1111110` followed by a raw 6-bit run.
const ESCAPE_RUN_BITS: u8 = 13;

/// Codeword length of the 15-bit escape class: the prefix `1111111` followed by a raw 8-bit level
/// magnitude. A sign bit follows the magnitude.
const ESCAPE_LEVEL_BITS: u8 = 15;

/// Upper bound on the number of tree nodes.
const NB_VLC_NODES: usize = 190;

/// A decoded run/level symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VlcSymbol {
    /// The number of zero coefficients preceding the non-zero coefficient.
    pub run: u32,
    /// The non-zero coefficient value. Zero only for the end-of-block symbol and the run-only
    /// escape class.
    pub level: i32,
    /// The total number of bits consumed by the symbol, including any raw suffix and sign bit.
    pub len: u32,
}

impl VlcSymbol {
    /// Returns true if this symbol marks the end of the current block.
    pub fn is_eob(&self) -> bool {
        self.len == 4 && self.level == 0
    }
}

#[derive(Copy, Clone, Default)]
struct VlcNode {
    /// Index of the child for a 0 bit, or 0 if absent.
    zero: u16,
    /// Index of the child for a 1 bit, or 0 if absent.
    one: u16,
    run: u8,
    level: u8,
    bits: u8,
}

impl VlcNode {
    #[inline(always)]
    fn is_leaf(&self) -> bool {
        self.zero == 0 && self.one == 0
    }
}

/// A binary code tree over the run/level codewords.
///
/// The tree is immutable once built and is shared read-only by all decoding threads. Both escape
/// classes are collapsed into a single leaf at their shared 7-bit prefix; the raw suffix bits are
/// extracted from the look-ahead window after the walk.
pub struct VlcTree {
    nodes: [VlcNode; NB_VLC_NODES],
}

pub static VLC_TREE: Lazy<VlcTree> = Lazy::new(VlcTree::build);

impl VlcTree {
    fn build() -> VlcTree {
        let mut nodes = [VlcNode::default(); NB_VLC_NODES];
        let mut next = 1;

        let mut done_run = false;
        let mut done_level = false;

        for i in 0..NB_VLC {
            let mut code = VLC_CODE[i];
            let mut bits = VLC_BITS[i];

            if bits == ESCAPE_RUN_BITS {
                // Insert the shared leading 7 bits (1111110) once for the entire class.
                if done_run {
                    continue;
                }

                bits = 7;
                code = 0x7e;
                done_run = true;
            }
            else if bits == ESCAPE_LEVEL_BITS {
                // Insert the shared leading 7 bits (1111111) once for the entire class.
                if done_level {
                    continue;
                }

                bits = 7;
                code = 0x7f;
                done_level = true;
            }

            let mut node = 0;

            for l in (0..u32::from(bits)).rev() {
                let bit = (code >> l) & 0x1;

                let child =
                    if bit == 1 { &mut nodes[node].one } else { &mut nodes[node].zero };

                if *child == 0 {
                    assert!(next < NB_VLC_NODES, "vlc tree overflow");
                    *child = next as u16;
                    next += 1;
                }

                node = usize::from(*child);

                if l == 0 {
                    nodes[node] = VlcNode {
                        zero: 0,
                        one: 0,
                        run: VLC_RUN[i],
                        level: VLC_LEVEL[i],
                        bits: VLC_BITS[i],
                    };
                }
            }
        }

        VlcTree { nodes }
    }

    /// Decode one symbol from a `LOOKAHEAD_BITS` wide look-ahead window. The window's
    /// most-significant bit is the first unread bit of the stream.
    ///
    /// The returned symbol's `len` is the number of bits the caller must consume.
    pub fn decode(&self, window: u32) -> Result<VlcSymbol> {
        let mut node = &self.nodes[0];
        let mut mask = 1u32 << (LOOKAHEAD_BITS - 1);
        let mut len = 0;

        loop {
            let next = if window & mask != 0 { node.one } else { node.zero };

            if next == 0 {
                return decode_error("pv3video: invalid vlc code");
            }

            node = &self.nodes[usize::from(next)];
            mask >>= 1;
            len += 1;

            if node.is_leaf() {
                break;
            }
        }

        if node.bits == ESCAPE_RUN_BITS {
            // A pair of (run, 0). The leading 7 bits were walked above, the following 6 bits are
            // the binary notation of the run (6 to 61).
            let run = (window >> (LOOKAHEAD_BITS - 13)) & 0x3f;

            Ok(VlcSymbol { run, level: 0, len: 13 })
        }
        else if node.bits == ESCAPE_LEVEL_BITS {
            // A pair of (0, level). The leading 7 bits were walked above, the following 8 bits
            // are the binary notation of the level magnitude (23 to 255), then the sign bit.
            let raw = window & 0x1ff;

            let magnitude = (raw >> 1) as i32;
            let level = if raw & 1 != 0 { -magnitude } else { magnitude };

            Ok(VlcSymbol { run: 0, level, len: 16 })
        }
        else {
            let run = u32::from(node.run);

            if node.level != 0 {
                // The sign bit trails the codeword.
                let magnitude = i32::from(node.level);
                let level = if window & mask != 0 { -magnitude } else { magnitude };

                Ok(VlcSymbol { run, level, len: len + 1 })
            }
            else {
                Ok(VlcSymbol { run, level: 0, len })
            }
        }
    }
}

/// Decode the next run/level symbol from the bit reader, consuming exactly the symbol's bits.
pub fn read_symbol(tree: &VlcTree, reader: &mut BitReaderLtr<'_>) -> Result<VlcSymbol> {
    let window = reader.peek_bits_leq32(LOOKAHEAD_BITS);

    let symbol = tree.decode(window)?;

    reader.ignore_bits(symbol.len)?;

    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds the look-ahead window with `code` of length `bits` placed at the most-significant
    /// end, followed by `suffix` of length `suffix_bits`.
    fn window(code: u16, bits: u8, suffix: u32, suffix_bits: u32) -> u32 {
        let used = u32::from(bits) + suffix_bits;
        assert!(used <= LOOKAHEAD_BITS);

        ((u32::from(code) << suffix_bits) | suffix) << (LOOKAHEAD_BITS - used)
    }

    #[test]
    fn verify_canonical_codes() {
        let tree = VlcTree::build();

        for i in 0..NB_VLC {
            let run = u32::from(VLC_RUN[i]);
            let level = i32::from(VLC_LEVEL[i]);
            let bits = VLC_BITS[i];

            if bits == 13 {
                // The raw run suffix is part of the tabulated codeword.
                let sym = tree.decode(window(VLC_CODE[i], 13, 0, 0)).unwrap();
                assert_eq!(sym, VlcSymbol { run, level: 0, len: 13 });
            }
            else if bits == 15 {
                // The raw magnitude suffix is part of the tabulated codeword; append a sign bit.
                let pos = tree.decode(window(VLC_CODE[i], 15, 0, 1)).unwrap();
                assert_eq!(pos, VlcSymbol { run: 0, level, len: 16 });

                let neg = tree.decode(window(VLC_CODE[i], 15, 1, 1)).unwrap();
                assert_eq!(neg, VlcSymbol { run: 0, level: -level, len: 16 });
            }
            else if level != 0 {
                let pos = tree.decode(window(VLC_CODE[i], bits, 0, 1)).unwrap();
                assert_eq!(pos, VlcSymbol { run, level, len: u32::from(bits) + 1 });

                let neg = tree.decode(window(VLC_CODE[i], bits, 1, 1)).unwrap();
                assert_eq!(neg, VlcSymbol { run, level: -level, len: u32::from(bits) + 1 });
            }
            else {
                let sym = tree.decode(window(VLC_CODE[i], bits, 0, 0)).unwrap();
                assert_eq!(sym, VlcSymbol { run, level: 0, len: u32::from(bits) });
            }
        }
    }

    #[test]
    fn verify_end_of_block() {
        // The (0, 0) entry is the 4-bit codeword 0110.
        let sym = VLC_TREE.decode(0b0110_0000_0000_0000).unwrap();

        assert!(sym.is_eob());
        assert_eq!(sym.len, 4);
    }

    #[test]
    fn verify_escape_run() {
        // Prefix 1111110 followed by the 6-bit run 000110 (6).
        let mut reader = BitReaderLtr::new(&[0b1111_1100, 0b0011_0000]);

        let sym = read_symbol(&VLC_TREE, &mut reader).unwrap();

        assert_eq!(sym, VlcSymbol { run: 6, level: 0, len: 13 });
        assert_eq!(reader.bits_left(), 3);
    }

    #[test]
    fn verify_escape_level() {
        // Prefix 1111111 followed by the 8-bit magnitude 00010111 (23) and a negative sign bit.
        let mut reader = BitReaderLtr::new(&[0b1111_1110, 0b0010_1111]);

        let sym = read_symbol(&VLC_TREE, &mut reader).unwrap();

        assert_eq!(sym, VlcSymbol { run: 0, level: -23, len: 16 });
        assert_eq!(reader.bits_left(), 0);
    }

    #[test]
    fn verify_sign_bit() {
        // The 2-bit codeword 00 is (0, 1); a set sign bit negates the level.
        let pos = VLC_TREE.decode(0b0000_0000_0000_0000).unwrap();
        assert_eq!(pos, VlcSymbol { run: 0, level: 1, len: 3 });

        let neg = VLC_TREE.decode(0b0010_0000_0000_0000).unwrap();
        assert_eq!(neg, VlcSymbol { run: 0, level: -1, len: 3 });
    }
}
