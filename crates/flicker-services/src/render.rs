//! Frame rendering seams for the transmitter.
//!
//! `FrameRenderer` turns frame text into something displayable and is run on
//! the blocking pool, so implementations may be CPU-heavy. `FrameDisplay`
//! puts a rendered frame in front of the camera.

use qrcode::{EcLevel, QrCode};

use flicker_core::config::RenderConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("frame does not fit in a QR code: {0}")]
    Encode(String),
}

pub trait FrameRenderer: Send + Sync + 'static {
    type Output: Send + 'static;

    fn render(&self, text: &str) -> Result<Self::Output, RenderError>;
}

pub trait FrameDisplay<T>: Send + Sync + 'static {
    /// Show frame `index` of `total`. Called only for the current frame.
    fn show(&self, rendered: T, index: usize, total: usize);
}

/// Renders frames as QR codes drawn with text characters, for terminals.
///
/// Error correction level M, matching what deployed scanners are tuned for.
#[derive(Debug, Clone)]
pub struct QrTextRenderer {
    quiet_zone: bool,
    module_width: u32,
}

impl Default for QrTextRenderer {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl QrTextRenderer {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            quiet_zone: config.quiet_zone,
            module_width: config.module_width.max(1),
        }
    }
}

impl FrameRenderer for QrTextRenderer {
    type Output = String;

    fn render(&self, text: &str) -> Result<String, RenderError> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(code
            .render::<char>()
            .quiet_zone(self.quiet_zone)
            .module_dimensions(self.module_width, 1)
            .build())
    }
}
