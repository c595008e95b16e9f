// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `video` module provides primitives for working with decoded video frames.

/// The pixel format of a decoded video frame.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar YUV with 4:2:2 chroma subsampling: the chroma planes are half the width of the
    /// luminance plane, at full vertical resolution. 8 bits per sample.
    Yuv422p,
}

/// `VideoSpec` describes the geometry and layout of a video frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VideoSpec {
    /// The width of the frame in pixels.
    pub width: u32,
    /// The height of the frame in pixels.
    pub height: u32,
    /// The pixel format of the frame.
    pub format: PixelFormat,
    /// The frame contains two interleaved fields.
    pub interlaced: bool,
    /// For an interlaced frame, the top field is the first field in presentation order.
    pub top_field_first: bool,
}

impl VideoSpec {
    /// Create a new progressive `VideoSpec`.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        VideoSpec { width, height, format, interlaced: false, top_field_first: false }
    }
}

/// A single plane of a planar video frame.
///
/// Rows are stored at a fixed stride that may exceed the plane width.
pub struct VideoPlane {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<u8>,
}

impl VideoPlane {
    /// The byte alignment of each row of a plane.
    const ROW_ALIGN: usize = 16;

    fn new(width: usize, height: usize) -> Self {
        let stride = (width + Self::ROW_ALIGN - 1) & !(Self::ROW_ALIGN - 1);

        VideoPlane { width, height, stride, data: vec![0; stride * height] }
    }

    /// Get the width of the plane in samples.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get the height of the plane in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the distance in bytes between the starts of two consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Get an immutable slice of the entire plane.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable slice of the entire plane.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get an immutable slice of the samples of row `y`.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..y * self.stride + self.width]
    }

    /// Get a mutable slice of the samples of row `y`.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.stride..y * self.stride + self.width]
    }
}

/// A planar YUV video frame buffer.
///
/// Planes are indexed in the conventional order: 0 is luminance (Y), 1 is the blue-difference
/// chrominance (Cb), and 2 is the red-difference chrominance (Cr).
pub struct YuvVideoBuffer {
    spec: VideoSpec,
    planes: [VideoPlane; 3],
}

impl YuvVideoBuffer {
    /// Instantiate a new `YuvVideoBuffer` with the given specification. All samples are
    /// initialized to zero.
    pub fn new(spec: VideoSpec) -> Self {
        let width = spec.width as usize;
        let height = spec.height as usize;

        let planes = match spec.format {
            PixelFormat::Yuv422p => {
                assert!(width % 2 == 0, "4:2:2 frame width must be even");

                [
                    VideoPlane::new(width, height),
                    VideoPlane::new(width / 2, height),
                    VideoPlane::new(width / 2, height),
                ]
            }
        };

        YuvVideoBuffer { spec, planes }
    }

    /// Get the specification of the frame.
    pub fn spec(&self) -> &VideoSpec {
        &self.spec
    }

    /// Get a mutable reference to the specification of the frame.
    pub fn spec_mut(&mut self) -> &mut VideoSpec {
        &mut self.spec
    }

    /// Get an immutable reference to the plane at `idx`.
    pub fn plane(&self, idx: usize) -> &VideoPlane {
        &self.planes[idx]
    }

    /// Get a mutable reference to the plane at `idx`.
    pub fn plane_mut(&mut self, idx: usize) -> &mut VideoPlane {
        &mut self.planes[idx]
    }

    /// Get mutable references to all three planes simultaneously.
    pub fn planes_mut(&mut self) -> &mut [VideoPlane; 3] {
        &mut self.planes
    }
}

/// An immutable reference to a video frame buffer of any type.
#[non_exhaustive]
pub enum GenericVideoBufferRef<'a> {
    /// A YUV encoded video frame.
    Yuv(&'a YuvVideoBuffer),
}

impl GenericVideoBufferRef<'_> {
    /// Get the specification of the referenced frame.
    pub fn spec(&self) -> &VideoSpec {
        match self {
            GenericVideoBufferRef::Yuv(buf) => buf.spec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PixelFormat, VideoSpec, YuvVideoBuffer};

    #[test]
    fn verify_yuv422_buffer_geometry() {
        let buf = YuvVideoBuffer::new(VideoSpec::new(1920, 544, PixelFormat::Yuv422p));

        assert_eq!(buf.plane(0).width(), 1920);
        assert_eq!(buf.plane(0).height(), 544);
        assert_eq!(buf.plane(1).width(), 960);
        assert_eq!(buf.plane(1).height(), 544);
        assert_eq!(buf.plane(2).width(), 960);
        assert_eq!(buf.plane(2).height(), 544);

        // Strides are aligned and at least the plane width.
        for i in 0..3 {
            assert!(buf.plane(i).stride() >= buf.plane(i).width());
            assert_eq!(buf.plane(i).stride() % 16, 0);
            assert_eq!(buf.plane(i).data().len(), buf.plane(i).stride() * buf.plane(i).height());
        }
    }

    #[test]
    fn verify_plane_rows() {
        let mut buf = YuvVideoBuffer::new(VideoSpec::new(32, 4, PixelFormat::Yuv422p));

        buf.plane_mut(0).row_mut(2).fill(0xab);

        assert!(buf.plane(0).row(1).iter().all(|&s| s == 0));
        assert!(buf.plane(0).row(2).iter().all(|&s| s == 0xab));
        assert_eq!(buf.plane(0).row(2).len(), 32);
    }
}
