// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RGB565 image preparation: box-filter downsampling and region cropping.
//!
//! Pixels are little-endian `u16`s laid out row-major without padding.
//! Neither function allocates; both write into caller-provided buffers.

use crate::PipelineError;
use accelerator::RegionRecord;

/// Bytes for a `width × height` RGB565 image.
pub const fn rgb565_len(width: usize, height: usize) -> usize {
    width * height * 2
}

fn check_len(what: &str, buf: usize, width: usize, height: usize) -> Result<(), PipelineError> {
    let expected = rgb565_len(width, height);
    if buf != expected {
        return Err(PipelineError::InvalidInput(format!(
            "{what} is {buf} bytes, expected {expected} for {width}x{height}"
        )));
    }
    Ok(())
}

fn pixel(buf: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([buf[index * 2], buf[index * 2 + 1]])
}

/// Shrinks `src` into `dst`, averaging each channel over the source block
/// that maps onto every destination pixel.
///
/// With a 2:1 ratio in both axes this is the classic 2×2 average.
pub fn downsample_rgb565(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst: &mut [u8],
    dst_width: usize,
    dst_height: usize,
) -> Result<(), PipelineError> {
    check_len("frame", src.len(), src_width, src_height)?;
    check_len("preprocessed buffer", dst.len(), dst_width, dst_height)?;
    if dst_width == 0 || dst_height == 0 || src_width < dst_width || src_height < dst_height {
        return Err(PipelineError::InvalidInput(format!(
            "cannot downsample {src_width}x{src_height} to {dst_width}x{dst_height}"
        )));
    }

    for dy in 0..dst_height {
        let y0 = dy * src_height / dst_height;
        let y1 = ((dy + 1) * src_height / dst_height).max(y0 + 1);
        for dx in 0..dst_width {
            let x0 = dx * src_width / dst_width;
            let x1 = ((dx + 1) * src_width / dst_width).max(x0 + 1);

            let (mut r, mut g, mut b, mut n) = (0u32, 0u32, 0u32, 0u32);
            for sy in y0..y1 {
                for sx in x0..x1 {
                    let p = pixel(src, sy * src_width + sx) as u32;
                    r += p >> 11;
                    g += (p >> 5) & 0x3F;
                    b += p & 0x1F;
                    n += 1;
                }
            }

            let out = ((r / n) << 11 | (g / n) << 5 | (b / n)) as u16;
            let at = (dy * dst_width + dx) * 2;
            dst[at..at + 2].copy_from_slice(&out.to_le_bytes());
        }
    }
    Ok(())
}

/// `region` clamped to a `width × height` image, as `(x, y, w, h)`.
pub fn clamp_region(region: &RegionRecord, width: usize, height: usize) -> (usize, usize, usize, usize) {
    let x = (region.x as usize).min(width);
    let y = (region.y as usize).min(height);
    let w = (region.width as usize).min(width - x);
    let h = (region.height as usize).min(height - y);
    (x, y, w, h)
}

/// Bytes the crop of `region` will occupy; 0 if it lies outside the image.
pub fn crop_len(region: &RegionRecord, width: usize, height: usize) -> usize {
    let (_, _, w, h) = clamp_region(region, width, height);
    rgb565_len(w, h)
}

/// Copies the clamped `region` of `src` into `dst`; returns bytes written.
pub fn crop_rgb565(
    src: &[u8],
    width: usize,
    height: usize,
    region: &RegionRecord,
    dst: &mut [u8],
) -> Result<usize, PipelineError> {
    check_len("image", src.len(), width, height)?;
    let (x, y, w, h) = clamp_region(region, width, height);
    let needed = rgb565_len(w, h);
    if dst.len() < needed {
        return Err(PipelineError::InvalidInput(format!(
            "crop buffer is {} bytes, need {needed}",
            dst.len()
        )));
    }

    let row = w * 2;
    for r in 0..h {
        let from = ((y + r) * width + x) * 2;
        dst[r * row..(r + 1) * row].copy_from_slice(&src[from..from + row]);
    }
    Ok(needed)
}
