//! Bit-packed binary frames.
//!
//! A binary segmentation frame holds one bit per pixel,
//! in row-major order, starting at the least significant bit of each byte.
//! An _unpacked_ frame holds one byte per pixel instead (0 or 1).
//!
//! In _Pixel Data_, frames follow each other bit by bit:
//! a frame only starts on a byte boundary
//! if the number of pixels of the previous frames is a multiple of 8.

use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::collections::TryReserveError;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Invalid frame dimensions {}x{}", rows, columns))]
    InvalidDimensions {
        rows: u16,
        columns: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("Buffer has {} bytes but {} were expected", actual, expected))]
    BufferLength {
        expected: usize,
        actual: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Frame #{} has {} bytes but {} were expected", index, actual, expected))]
    FrameLength {
        index: usize,
        expected: usize,
        actual: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "{} frames of {}x{} pixels require too many bytes",
        frames,
        rows,
        columns
    ))]
    TooManyBytesRequested {
        rows: u16,
        columns: u16,
        frames: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not allocate {} bytes", bytes))]
    MemoryExhausted {
        bytes: usize,
        source: TryReserveError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The number of pixels in a frame.
#[inline]
pub fn pixels_per_frame(rows: u16, columns: u16) -> usize {
    usize::from(rows) * usize::from(columns)
}

/// The number of bytes of a single packed frame.
#[inline]
pub fn bytes_per_frame(rows: u16, columns: u16) -> usize {
    (pixels_per_frame(rows, columns) + 7) / 8
}

/// The number of bytes needed to hold `frames` packed frames
/// concatenated without padding.
pub fn total_bytes_required(rows: u16, columns: u16, frames: usize) -> Result<usize> {
    pixels_per_frame(rows, columns)
        .checked_mul(frames)
        .and_then(|bits| bits.checked_add(7))
        .map(|bits| bits / 8)
        .context(TooManyBytesRequestedSnafu {
            rows,
            columns,
            frames,
        })
}

/// Pack a frame of one byte per pixel into one bit per pixel.
/// Any non-zero byte is a set pixel.
pub fn pack(unpacked: &[u8], rows: u16, columns: u16) -> Result<Vec<u8>> {
    check_dimensions(rows, columns)?;
    let pixels = pixels_per_frame(rows, columns);
    ensure!(
        unpacked.len() == pixels,
        BufferLengthSnafu {
            expected: pixels,
            actual: unpacked.len(),
        }
    );

    let mut packed = zeroed(bytes_per_frame(rows, columns))?;
    for (i, _) in unpacked.iter().enumerate().filter(|(_, v)| **v != 0) {
        packed[i / 8] |= 1 << (i % 8);
    }
    Ok(packed)
}

/// Unpack a frame of one bit per pixel into one byte per pixel,
/// each byte being either 0 or 1.
pub fn unpack(packed: &[u8], rows: u16, columns: u16) -> Result<Vec<u8>> {
    check_dimensions(rows, columns)?;
    check_packed_length(packed, rows, columns)?;

    let pixels = pixels_per_frame(rows, columns);
    let mut unpacked = zeroed(pixels)?;
    for (i, v) in unpacked.iter_mut().enumerate() {
        *v = (packed[i / 8] >> (i % 8)) & 1;
    }
    Ok(unpacked)
}

/// Concatenate packed frames into a single bit stream,
/// without padding between frames.
/// The result is only padded to a whole number of bytes.
pub fn concat<F>(frames: &[F], rows: u16, columns: u16) -> Result<Vec<u8>>
where
    F: AsRef<[u8]>,
{
    check_dimensions(rows, columns)?;
    let frame_bytes = bytes_per_frame(rows, columns);
    let bits = pixels_per_frame(rows, columns);
    let mut out = zeroed(total_bytes_required(rows, columns, frames.len())?)?;

    for (index, frame) in frames.iter().enumerate() {
        let frame = frame.as_ref();
        ensure!(
            frame.len() == frame_bytes,
            FrameLengthSnafu {
                index,
                expected: frame_bytes,
                actual: frame.len(),
            }
        );
        if bits % 8 == 0 {
            let start = index * frame_bytes;
            out[start..start + frame_bytes].copy_from_slice(frame);
        } else {
            let offset = index * bits;
            for bit in (0..bits).filter(|&b| frame[b / 8] & (1 << (b % 8)) != 0) {
                let pos = offset + bit;
                out[pos / 8] |= 1 << (pos % 8);
            }
        }
    }
    Ok(out)
}

/// Split a bit stream of concatenated frames into packed frames.
///
/// The data must hold at least `frames` frames.
/// Bits of the last byte of a frame which do not belong to it are cleared.
pub fn extract(data: &[u8], frames: usize, rows: u16, columns: u16) -> Result<Vec<Vec<u8>>> {
    check_dimensions(rows, columns)?;
    let required = total_bytes_required(rows, columns, frames)?;
    ensure!(
        data.len() >= required,
        BufferLengthSnafu {
            expected: required,
            actual: data.len(),
        }
    );

    let frame_bytes = bytes_per_frame(rows, columns);
    let bits = pixels_per_frame(rows, columns);
    let mut out = Vec::new();
    out.try_reserve_exact(frames)
        .context(MemoryExhaustedSnafu {
            bytes: frames.saturating_mul(std::mem::size_of::<Vec<u8>>()),
        })?;

    for index in 0..frames {
        let mut frame = zeroed(frame_bytes)?;
        if bits % 8 == 0 {
            let start = index * frame_bytes;
            frame.copy_from_slice(&data[start..start + frame_bytes]);
        } else {
            let offset = index * bits;
            for bit in 0..bits {
                let pos = offset + bit;
                if data[pos / 8] & (1 << (pos % 8)) != 0 {
                    frame[bit / 8] |= 1 << (bit % 8);
                }
            }
        }
        out.push(frame);
    }
    Ok(out)
}

/// Whether two packed frames have at least one set pixel in common.
///
/// When the number of pixels is a multiple of 8,
/// the frames are compared byte by byte.
/// Otherwise both are unpacked first,
/// so that unused trailing bits are never compared.
pub fn frames_overlap(a: &[u8], b: &[u8], rows: u16, columns: u16) -> Result<bool> {
    check_dimensions(rows, columns)?;
    check_packed_length(a, rows, columns)?;
    check_packed_length(b, rows, columns)?;

    if pixels_per_frame(rows, columns) % 8 == 0 {
        return Ok(a.iter().zip(b).any(|(x, y)| x & y != 0));
    }

    let a = unpack(a, rows, columns)?;
    let b = unpack(b, rows, columns)?;
    Ok(a.iter().zip(&b).any(|(x, y)| *x != 0 && *y != 0))
}

fn check_dimensions(rows: u16, columns: u16) -> Result<()> {
    ensure!(
        rows > 0 && columns > 0,
        InvalidDimensionsSnafu { rows, columns }
    );
    Ok(())
}

fn check_packed_length(packed: &[u8], rows: u16, columns: u16) -> Result<()> {
    let expected = bytes_per_frame(rows, columns);
    ensure!(
        packed.len() == expected,
        BufferLengthSnafu {
            expected,
            actual: packed.len(),
        }
    );
    Ok(())
}

/// Allocate a zero-filled buffer, reporting allocation failure.
pub(crate) fn zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .context(MemoryExhaustedSnafu { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}
