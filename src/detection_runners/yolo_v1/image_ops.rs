//! Image preparation: exact resize to the network input, RGB channel order, `[0, 1]` scaling.

use std::path::Path;
use fast_image_resize::images::Image as FirImage;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbImage;
use ndarray::Array3;
use rayon::prelude::*;
use crate::error::YoloError;
use crate::Result;

/// Byte order of interleaved 3-channel pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    /// OpenCV style buffers; darknet expects red first, so these are swapped.
    Bgr,
}

/// Loads `path` and returns a `[size, size, 3]` RGB tensor scaled to `[0, 1]`.
///
/// The image is stretched to the square input without letterboxing, as darknet does.
pub fn process_image(path: &Path, size: u32) -> Result<Array3<f32>> {
    let image = image::open(path).map_err(|e| YoloError::InvalidImage {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    log::debug!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color()
    );
    prepare_rgb(image.to_rgb8(), size)
}

pub fn prepare_rgb(image: RgbImage, size: u32) -> Result<Array3<f32>> {
    let (width, height) = image.dimensions();
    prepare_pixels(width, height, image.into_raw(), ChannelOrder::Rgb, size)
}

/// Prepares a raw interleaved 8-bit buffer of `width * height * 3` bytes.
pub fn prepare_pixels(
    width: u32,
    height: u32,
    mut pixels: Vec<u8>,
    order: ChannelOrder,
    size: u32,
) -> Result<Array3<f32>> {
    if order == ChannelOrder::Bgr {
        pixels.par_chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
    }
    let src = FirImage::from_vec_u8(width, height, pixels, PixelType::U8x3)
        .map_err(YoloError::preprocess)?;
    let resized = resize_exact(&src, size, size)?;
    normalize_image(&resized)
}

fn resize_exact<'a>(img: &FirImage, target_w: u32, target_h: u32) -> Result<FirImage<'a>> {
    let mut dst = FirImage::new(target_w, target_h, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Interpolation(FilterType::Bilinear));
    Resizer::new()
        .resize(img, &mut dst, &options)
        .map_err(YoloError::preprocess)?;
    Ok(dst)
}

/// HWC float tensor, every byte divided by 255.
fn normalize_image(img: &FirImage) -> Result<Array3<f32>> {
    let buf = img.buffer();
    let (w, h) = (img.width() as usize, img.height() as usize);
    if buf.len() != w * h * 3 {
        return Err(YoloError::preprocess(format!(
            "unexpected buffer size: got {}, expected {}",
            buf.len(),
            w * h * 3
        )));
    }

    let float_data: Vec<f32> = buf.par_iter().map(|&v| v as f32 / 255.0).collect();
    Ok(Array3::from_shape_vec((h, w, 3), float_data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    #[test]
    fn bgr_buffers_come_out_red_first() {
        // a 2x2 pure blue image in BGR byte order
        let pixels = [255u8, 0, 0].repeat(4);
        let t = prepare_pixels(2, 2, pixels, ChannelOrder::Bgr, 4).unwrap();
        assert_eq!(t.shape(), &[4, 4, 3]);
        for px in t.rows() {
            assert!(px[0] < 0.01 && px[1] < 0.01 && px[2] > 0.99, "{px:?}");
        }
    }

    #[test]
    fn downscale_samples_instead_of_averaging() {
        // 1-px stripes shrunk by 3: every output column lands on a single source pixel, so a
        // fixed 2-tap filter keeps full contrast where a scaled kernel blurs to grey.
        let (w, h) = (1344u32, 8u32);
        let pixels: Vec<u8> = (0..w * h)
            .flat_map(|i| {
                let v = if (i % w) % 2 == 0 { 255 } else { 0 };
                [v, v, v]
            })
            .collect();
        let t = prepare_pixels(w, h, pixels, ChannelOrder::Rgb, 448).unwrap();
        let row: ndarray::ArrayView1<f32> = t.slice(s![0, .., 0]);
        let (lo, hi) = row.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        assert!(hi - lo > 0.9, "range {lo}..{hi}");
        assert!((row[0] - row[1]).abs() > 0.9);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = prepare_pixels(2, 2, vec![0; 5], ChannelOrder::Rgb, 4).unwrap_err();
        assert!(matches!(err, YoloError::Preprocess { .. }));
    }
}
