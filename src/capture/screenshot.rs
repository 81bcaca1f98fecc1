//! Full-screen capture using the `xcap` crate.
//!
//! This is the infrastructure layer — it talks to the OS. Everything
//! downstream works on the `DynamicImage` it returns and never touches
//! the windowing system.

use super::ScreenSource;
use crate::region::Rect;
use image::DynamicImage;
use xcap::Monitor;

#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("no primary monitor found")]
    NoPrimaryMonitor,

    #[error("screen capture failed: {0}")]
    CaptureFailed(String),
}

/// Captures the primary monitor. Falls back to the first monitor if none
/// reports as primary (some Wayland compositors).
#[derive(Debug, Default)]
pub struct PrimaryMonitor;

impl PrimaryMonitor {
    fn monitor() -> Result<Monitor, ScreenshotError> {
        let monitors =
            Monitor::all().map_err(|e| ScreenshotError::MonitorEnumeration(e.to_string()))?;
        monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| Monitor::all().ok()?.into_iter().next())
            .ok_or(ScreenshotError::NoPrimaryMonitor)
    }
}

impl ScreenSource for PrimaryMonitor {
    fn capture(&self) -> Result<DynamicImage, ScreenshotError> {
        let monitor = Self::monitor()?;
        let image = monitor
            .capture_image()
            .map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))?;
        Ok(DynamicImage::ImageRgba8(image))
    }

    fn bounds(&self) -> Rect {
        match Self::monitor() {
            Ok(m) => Rect::new(
                m.x().unwrap_or(0),
                m.y().unwrap_or(0),
                m.width().unwrap_or(0),
                m.height().unwrap_or(0),
            ),
            Err(_) => Rect::new(0, 0, 0, 0),
        }
    }
}
