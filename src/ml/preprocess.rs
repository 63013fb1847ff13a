//! 画像前処理
//!
//! 学習・検証・推論のすべてがこのモジュールの関数だけを通して画像をテンソル化する。
//! 出力は (H, W, C) の順で平坦化した f32 列で、値は [0, 1]。

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

use crate::error::Result;
use crate::layout::IMAGE_SIZE;

/// 生のピクセル配列（行優先、チャンネル交互配置）
#[derive(Debug, Clone)]
pub struct PixelArray {
    pub width: u32,
    pub height: u32,
    /// 1=グレースケール, 2=グレースケール+α, 3=RGB, 4=RGBA
    pub channels: u8,
    pub data: Vec<u8>,
}

impl PixelArray {
    /// DynamicImage に変換（サイズ不整合・未対応チャンネル数なら None）
    pub fn to_image(&self) -> Option<DynamicImage> {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return None;
        }
        let (w, h, data) = (self.width, self.height, self.data.clone());
        match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            _ => None,
        }
    }
}

/// 推論入力（ピクセル配列またはデコード済み画像）
#[derive(Debug, Clone)]
pub enum ImageInput {
    Pixels(PixelArray),
    Decoded(DynamicImage),
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        ImageInput::Decoded(image)
    }
}

impl From<PixelArray> for ImageInput {
    fn from(pixels: PixelArray) -> Self {
        ImageInput::Pixels(pixels)
    }
}

/// RGB化 → バイリニア縮小 → [0,1] 正規化
///
/// グレースケールは3チャンネルに複製され、αチャンネルは捨てられる。
pub fn normalize_image(image: &DynamicImage, size: usize) -> Vec<f32> {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, size as u32, size as u32, FilterType::Triangle);

    let mut data = Vec::with_capacity(size * size * 3);
    for pixel in resized.pixels() {
        for channel in pixel.0 {
            data.push(channel as f32 / 255.0);
        }
    }
    data
}

/// 画像ファイルを読み込んで正規化（サイズ指定版）
pub fn load_image_with_size(path: &Path, size: usize) -> Result<Vec<f32>> {
    let image = image::open(path)?;
    Ok(normalize_image(&image, size))
}

/// 画像ファイルを読み込んで正規化（224x224）
pub fn load_image(path: &Path) -> Result<Vec<f32>> {
    load_image_with_size(path, IMAGE_SIZE)
}

/// 推論入力の前処理
///
/// 空・不正な入力は None（呼び出し側で "Invalid image" として扱う）。
pub fn preprocess_input(input: &ImageInput, size: usize) -> Option<Vec<f32>> {
    match input {
        ImageInput::Pixels(pixels) => pixels.to_image().map(|image| normalize_image(&image, size)),
        ImageInput::Decoded(image) => {
            if image.width() == 0 || image.height() == 0 {
                return None;
            }
            Some(normalize_image(image, size))
        }
    }
}

/// エンコード済みバイト列（PNG/JPEG/WebP等）をデコード
pub fn decode_bytes(bytes: &[u8]) -> Option<DynamicImage> {
    if bytes.is_empty() {
        return None;
    }
    image::load_from_memory(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, Rgba};

    fn assert_unit_range(data: &[f32]) {
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn any_size_becomes_224_rgb() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(37, 500, Rgb([255, 0, 128])));
        let data = normalize_image(&image, IMAGE_SIZE);
        assert_eq!(data.len(), 224 * 224 * 3);
        assert_unit_range(&data);
        assert_eq!(&data[..3], &[1.0, 0.0, 128.0 / 255.0]);
    }

    #[test]
    fn grayscale_is_replicated_across_channels() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([51])));
        let data = normalize_image(&image, 4);
        assert_eq!(data.len(), 4 * 4 * 3);
        for px in data.chunks(3) {
            assert_eq!(px, &[0.2, 0.2, 0.2]);
        }
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let pixels = PixelArray {
            width: 2,
            height: 2,
            channels: 4,
            data: [0u8, 255, 0, 10].repeat(4),
        };
        let data = preprocess_input(&pixels.into(), 2).unwrap();
        assert_eq!(data.len(), 2 * 2 * 3);
        for px in data.chunks(3) {
            assert_eq!(px, &[0.0, 1.0, 0.0]);
        }

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 0])));
        let data = preprocess_input(&rgba.into(), 3).unwrap();
        assert!(data.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn grayscale_pixel_array_matches_decoded_grayscale() {
        let raw = (0..64u8).map(|v| v * 4).collect::<Vec<_>>();
        let pixels = PixelArray { width: 8, height: 8, channels: 1, data: raw.clone() };
        let decoded = DynamicImage::ImageLuma8(GrayImage::from_raw(8, 8, raw).unwrap());

        let a = preprocess_input(&pixels.into(), 16).unwrap();
        let b = preprocess_input(&decoded.into(), 16).unwrap();
        assert_eq!(a, b);
        assert_unit_range(&a);
    }

    #[test]
    fn empty_or_malformed_input_is_rejected() {
        let empty = PixelArray { width: 0, height: 0, channels: 3, data: vec![] };
        assert!(preprocess_input(&empty.into(), IMAGE_SIZE).is_none());

        let short = PixelArray { width: 4, height: 4, channels: 3, data: vec![0; 5] };
        assert!(preprocess_input(&short.into(), IMAGE_SIZE).is_none());

        let odd = PixelArray { width: 1, height: 1, channels: 5, data: vec![0; 5] };
        assert!(preprocess_input(&odd.into(), IMAGE_SIZE).is_none());

        let zero = DynamicImage::new_rgb8(0, 0);
        assert!(preprocess_input(&zero.into(), IMAGE_SIZE).is_none());

        assert!(decode_bytes(&[]).is_none());
        assert!(decode_bytes(b"not an image").is_none());
    }

    #[test]
    fn load_image_reads_png_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.png");
        RgbImage::from_pixel(300, 200, Rgb([10, 20, 30])).save(&path).unwrap();

        let data = load_image(&path).unwrap();
        assert_eq!(data.len(), IMAGE_SIZE * IMAGE_SIZE * 3);
        assert_unit_range(&data);
    }
}
