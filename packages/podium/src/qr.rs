//! QR encoding of join links.
//!
//! The presenter's page shows two QR codes (remote control and multiplex).
//! They are rendered as SVG and delivered as `data:` URLs that can be dropped
//! straight into an `<img src>`.

use std::sync::Arc;

use podium_auth::encoding::base64_encode;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::error::BrokerError;

/// Turns a URL into an image payload.
pub trait ImageEncoder: Send + Sync + 'static {
    fn encode(&self, content: &str) -> Result<String, BrokerError>;
}

/// Error correction level Q, SVG output.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrEncoder;

impl ImageEncoder for QrEncoder {
    fn encode(&self, content: &str) -> Result<String, BrokerError> {
        let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::Q)
            .map_err(|e| BrokerError::ImageEncoding(e.to_string()))?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .quiet_zone(true)
            .build();
        Ok(format!(
            "data:image/svg+xml;base64,{}",
            base64_encode(image.as_bytes())
        ))
    }
}

/// Encode two URLs concurrently on the blocking pool. Both must succeed.
pub async fn encode_pair(
    encoder: Arc<dyn ImageEncoder>,
    first: String,
    second: String,
) -> Result<(String, String), BrokerError> {
    let enc_first = encoder.clone();
    let first = tokio::task::spawn_blocking(move || enc_first.encode(&first));
    let second = tokio::task::spawn_blocking(move || encoder.encode(&second));
    let (first, second) = tokio::try_join!(first, second)?;
    Ok((first?, second?))
}
