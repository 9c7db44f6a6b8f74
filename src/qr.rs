//! QR rendering for the /qr command.
//!
//! The channel URL is rendered to a PNG in a named temporary file. The file
//! handle owns the path: dropping it removes the file on every exit path,
//! including a failed Telegram upload.

use anyhow::{Context, Result};
use image::Luma;
use qrcode::QrCode;
use tempfile::NamedTempFile;

/// Render `url` as a QR code PNG and return the temp file holding it.
pub fn write_qr_png(url: &str) -> Result<NamedTempFile> {
    let code = QrCode::new(url.as_bytes()).context("QR encoding failed")?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(256, 256)
        .build();

    let file = tempfile::Builder::new()
        .prefix("meshgram-qr-")
        .suffix(".png")
        .tempfile()
        .context("failed to create temp file for QR image")?;
    image
        .save(file.path())
        .context("failed to write QR PNG")?;
    Ok(file)
}
