//! `generateQR` — render a download URL as a QR image.

use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use booth_core::types::CapabilityOutput;

use crate::{Capability, CapabilityContext};

const MIN_IMAGE_SIZE: u32 = 256;

/// Encode `data` as a QR PNG at the fixed module size.
pub fn render_qr_png(data: &str) -> anyhow::Result<Vec<u8>> {
    let code = qrcode::QrCode::new(data.as_bytes())?;
    let img: image::ImageBuffer<image::Luma<u8>, Vec<u8>> = code
        .render::<image::Luma<u8>>()
        .min_dimensions(MIN_IMAGE_SIZE, MIN_IMAGE_SIZE)
        .build();

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

pub struct QrCodeCapability;

#[async_trait]
impl Capability for QrCodeCapability {
    fn name(&self) -> &str {
        "generateQR"
    }

    fn description(&self) -> &str {
        "Generate a QR code image for a URL"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Destination URL to encode"
                }
            },
            "required": ["url"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        _context: &CapabilityContext,
    ) -> anyhow::Result<CapabilityOutput> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'url' parameter"))?;

        let png = render_qr_png(url)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        Ok(CapabilityOutput::ok([("qr_b64", encoded)]))
    }
}
