//! Screen capture domain — public API.
//!
//! The OS-facing grab lives in `screenshot.rs` behind the [`ScreenSource`]
//! trait; cropping and exclude masking are pure pixel functions in
//! `crop.rs`; trigger timing lives in `scheduler.rs`.

mod crop;
mod screenshot;

pub mod scheduler;

pub use crop::{crop_region, encode_png, CropError};
pub use screenshot::{PrimaryMonitor, ScreenshotError};

use image::DynamicImage;

/// Source of full-screen frames. Production uses [`PrimaryMonitor`];
/// tests substitute a synthetic frame so pipeline behavior can be
/// asserted pixel-for-pixel.
pub trait ScreenSource: Send + Sync {
    fn capture(&self) -> Result<DynamicImage, ScreenshotError>;

    /// Bounds of the captured surface in screen coordinates.
    fn bounds(&self) -> crate::region::Rect;
}
