// Kinema
// Copyright (c) 2026 The Project Kinema Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;

use crate::errors::{end_of_stream_error, Result};

use super::{FiniteStream, ReadBytes};

/// A `ScopedStream` restricts the number of bytes that may be read to an upper limit.
pub struct ScopedStream<B: ReadBytes> {
    inner: B,
    start: u64,
    len: u64,
}

impl<B: ReadBytes> ScopedStream<B> {
    /// Instantiates a new `ScopedStream` with an upper limit on the number of bytes that can be
    /// read from the inner source.
    pub fn new(inner: B, len: u64) -> Self {
        let start = inner.pos();
        ScopedStream { inner, start, len }
    }

    /// Returns an immutable reference to the inner stream.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Returns a mutable reference to the inner stream.
    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    /// Ignores the remainder of the `ScopedStream`.
    pub fn ignore(&mut self) -> Result<()> {
        let remaining = self.bytes_available();
        self.inner.ignore_bytes(remaining)
    }

    /// Convert the `ScopedStream` to the inner stream.
    pub fn into_inner(self) -> B {
        self.inner
    }

    #[inline(always)]
    fn check_bounds(&self, len: u64) -> Result<()> {
        if self.bytes_available() < len {
            return end_of_stream_error();
        }
        Ok(())
    }
}

impl<B: ReadBytes> ReadBytes for ScopedStream<B> {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        self.check_bounds(1)?;
        self.inner.read_byte()
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        self.check_bounds(2)?;
        self.inner.read_double_bytes()
    }

    #[inline(always)]
    fn read_triple_bytes(&mut self) -> Result<[u8; 3]> {
        self.check_bounds(3)?;
        self.inner.read_triple_bytes()
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        self.check_bounds(4)?;
        self.inner.read_quad_bytes()
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let max_len = cmp::min(self.bytes_available(), buf.len() as u64) as usize;
        self.inner.read_buf(&mut buf[..max_len])
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_bounds(buf.len() as u64)?;
        self.inner.read_buf_exact(buf)
    }

    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        self.check_bounds(count)?;
        self.inner.ignore_bytes(count)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.inner.pos()
    }
}

impl<B: ReadBytes> FiniteStream for ScopedStream<B> {
    #[inline(always)]
    fn byte_len(&self) -> u64 {
        self.len
    }

    #[inline(always)]
    fn bytes_read(&self) -> u64 {
        self.inner.pos() - self.start
    }

    #[inline(always)]
    fn bytes_available(&self) -> u64 {
        self.len - self.bytes_read()
    }
}
