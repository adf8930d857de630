//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG is lossless, so text in page renders and figure crops stays crisp for
//! the model. Inputs with an alpha channel are flattened to RGB first; some
//! providers reject RGBA PNGs and transparency carries no content here.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as a base64 PNG ready for the VLM API.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_rgba_image_as_rgb_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 128])));
        let data = encode_image(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        let back = image::load_from_memory(&decoded).expect("valid png");
        assert_eq!(back.color(), image::ColorType::Rgb8);
        assert_eq!((back.width(), back.height()), (10, 10));
    }
}
