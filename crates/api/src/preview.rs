//! Task render previews.
//!
//! A preview request resolves the task's EXR output on the farm's shared
//! storage, tone-maps the linear pixels to sRGB, and ships the result to
//! the client as a base64 JPEG. Conversion runs on the blocking pool; the
//! source frames can be large.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, Rgb32FImage, RgbImage};
use tokio::sync::mpsc;

use farmview_deadline::api::DeadlineError;
use farmview_deadline::FarmSource;

use crate::ws::messages::ServerMessage;

/// JPEG quality for previews. Low on purpose, these are thumbnails.
const JPEG_QUALITY: u8 = 50;

const MISSING_OUTPUT_MESSAGE: &str = "Error: Could not find the output folder on deadline.";
const MISSING_IMAGE_MESSAGE: &str = "Error: Could not find image file.";
const DECODE_FAILED_MESSAGE: &str = "Error: Could not extract RGB channels from EXR.";

#[derive(Debug, thiserror::Error)]
enum PreviewError {
    #[error("image file does not exist")]
    NotFound,
    #[error("image conversion failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Resolve, convert, and push one task's preview image.
pub async fn send_image_preview(
    farm: Arc<dyn FarmSource>,
    tx: mpsc::UnboundedSender<ServerMessage>,
    job_id: String,
    task_id: String,
) {
    let Ok(task_number) = task_id.parse::<i64>() else {
        tracing::warn!(%job_id, %task_id, "Ignoring preview request with non-numeric task id");
        return;
    };

    let path = match farm.task_image_path(&job_id, task_number).await {
        Ok(path) => path,
        Err(DeadlineError::InvalidJobId(_)) => return,
        Err(DeadlineError::MissingOutput) => {
            let _ = tx.send(preview_error(task_id, MISSING_OUTPUT_MESSAGE));
            return;
        }
        Err(e) => {
            tracing::warn!(%job_id, %task_id, error = %e, "Preview path lookup failed");
            let _ = tx.send(preview_error(task_id, MISSING_OUTPUT_MESSAGE));
            return;
        }
    };

    let converted = tokio::task::spawn_blocking(move || encode_preview(&path)).await;
    let message = match converted {
        Ok(Ok(image)) => ServerMessage::ImagePreview {
            task_id,
            error: false,
            image: Some(image),
            message: None,
        },
        Ok(Err(PreviewError::NotFound)) => preview_error(task_id, MISSING_IMAGE_MESSAGE),
        Ok(Err(PreviewError::Image(e))) => {
            tracing::warn!(%job_id, error = %e, "EXR conversion failed");
            preview_error(task_id, DECODE_FAILED_MESSAGE)
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "Preview conversion task panicked");
            preview_error(task_id, DECODE_FAILED_MESSAGE)
        }
    };
    let _ = tx.send(message);
}

fn preview_error(task_id: String, message: &str) -> ServerMessage {
    ServerMessage::ImagePreview {
        task_id,
        error: true,
        image: None,
        message: Some(message.to_string()),
    }
}

fn encode_preview(path: &Path) -> Result<String, PreviewError> {
    if !path.is_file() {
        return Err(PreviewError::NotFound);
    }
    let decoded = image::open(path)?;
    Ok(jpeg_base64(&decoded.to_rgb32f())?)
}

/// Tone-map linear pixels to sRGB and encode as a base64 JPEG.
fn jpeg_base64(linear: &Rgb32FImage) -> Result<String, image::ImageError> {
    let (width, height) = linear.dimensions();
    let srgb = RgbImage::from_fn(width, height, |x, y| {
        let pixel = linear.get_pixel(x, y);
        image::Rgb([
            encode_component(pixel.0[0]),
            encode_component(pixel.0[1]),
            encode_component(pixel.0[2]),
        ])
    });

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode(
        srgb.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(BASE64.encode(bytes))
}

/// The sRGB transfer function, linear 0..1 in, 8-bit out.
fn encode_component(value: f32) -> u8 {
    let value = value.clamp(0.0, 1.0);
    let encoded = if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_endpoints() {
        assert_eq!(encode_component(0.0), 0);
        assert_eq!(encode_component(1.0), 255);
        // Out-of-range HDR values clamp instead of wrapping.
        assert_eq!(encode_component(4.5), 255);
        assert_eq!(encode_component(-0.2), 0);
    }

    #[test]
    fn transfer_linear_segment() {
        // Below the knee the curve is a straight 12.92x line.
        assert_eq!(encode_component(0.001), (0.001f32 * 12.92 * 255.0).round() as u8);
    }

    #[test]
    fn transfer_midtone_is_brightened() {
        // Gamma encoding lifts linear midtones well above value * 255.
        let mid = encode_component(0.18);
        assert!(mid > 100, "18% grey encoded to {mid}");
        assert!(mid < 150, "18% grey encoded to {mid}");
    }

    #[test]
    fn jpeg_output_is_base64_jpeg() {
        let linear = Rgb32FImage::from_pixel(8, 8, image::Rgb([0.18, 0.18, 0.18]));
        let encoded = jpeg_base64(&linear).unwrap();

        let bytes = BASE64.decode(encoded).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "missing JPEG magic");
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let result = encode_preview(Path::new("/nonexistent/frame_0001.exr"));
        assert!(matches!(result, Err(PreviewError::NotFound)));
    }
}
