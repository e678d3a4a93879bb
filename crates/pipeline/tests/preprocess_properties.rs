// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Property tests for downsampling and region cropping.

use accelerator::{Orientation, RegionRecord};
use ocr_pipeline::preprocess::{clamp_region, crop_len, crop_rgb565, downsample_rgb565, rgb565_len};
use proptest::prelude::*;

fn gradient(width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb565_len(width, height));
    for y in 0..height {
        for x in 0..width {
            out.extend_from_slice(&(((y * width + x) % 0xFFFF) as u16).to_le_bytes());
        }
    }
    out
}

fn region(x: u16, y: u16, width: u16, height: u16) -> RegionRecord {
    RegionRecord {
        x,
        y,
        width,
        height,
        confidence: 0.9,
        orientation: Orientation::Horizontal,
    }
}

proptest! {
    /// A flat image stays flat at any output size.
    #[test]
    fn prop_uniform_image_survives_downsampling(
        src_w in 1usize..80,
        src_h in 1usize..60,
        div_w in 1usize..5,
        div_h in 1usize..5,
        colour in any::<u16>(),
    ) {
        let dst_w = (src_w / div_w).max(1);
        let dst_h = (src_h / div_h).max(1);
        let src: Vec<u8> = std::iter::repeat(colour.to_le_bytes())
            .take(src_w * src_h)
            .flatten()
            .collect();
        let mut dst = vec![0u8; rgb565_len(dst_w, dst_h)];

        downsample_rgb565(&src, src_w, src_h, &mut dst, dst_w, dst_h).unwrap();

        for px in dst.chunks_exact(2) {
            prop_assert_eq!(u16::from_le_bytes([px[0], px[1]]), colour);
        }
    }

    /// Upscaling is rejected rather than partially written.
    #[test]
    fn prop_upscaling_rejected(w in 1usize..32, h in 1usize..32, extra in 1usize..8) {
        let src = vec![0u8; rgb565_len(w, h)];
        let mut dst = vec![0xAAu8; rgb565_len(w + extra, h)];
        prop_assert!(downsample_rgb565(&src, w, h, &mut dst, w + extra, h).is_err());
        prop_assert!(dst.iter().all(|&b| b == 0xAA));
    }

    /// Clamped regions stay inside the image and crops copy exactly them.
    #[test]
    fn prop_crop_stays_in_bounds(
        width in 1usize..64,
        height in 1usize..48,
        x in 0u16..96,
        y in 0u16..72,
        w in 0u16..96,
        h in 0u16..72,
    ) {
        let image = gradient(width, height);
        let r = region(x, y, w, h);
        let (cx, cy, cw, ch) = clamp_region(&r, width, height);
        prop_assert!(cx + cw <= width);
        prop_assert!(cy + ch <= height);

        let len = crop_len(&r, width, height);
        prop_assert_eq!(len, rgb565_len(cw, ch));

        let mut dst = vec![0u8; len];
        let written = crop_rgb565(&image, width, height, &r, &mut dst).unwrap();
        prop_assert_eq!(written, len);
        for row in 0..ch {
            let from = ((cy + row) * width + cx) * 2;
            prop_assert_eq!(&dst[row * cw * 2..(row + 1) * cw * 2], &image[from..from + cw * 2]);
        }
    }
}
