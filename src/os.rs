//! Platform abstraction layer.
//!
//! Defines the traits the platform layer implements for the application
//! shell. The positioning core has its own, narrower seams (see
//! `taskbar`, `notify_icon` and `work_area`); the traits here cover the
//! collaborators around it: the popup window, display brightness and
//! power state.

use raw_window_handle::RawWindowHandle;

use crate::brightness::Brightness;
use crate::geometry::{DpiScale, LogicalPoint};

// ---------------------------------------------------------------------------
// Popup window
// ---------------------------------------------------------------------------

/// Controls the popup window created by eframe.
pub trait WindowController: Send + Sync + 'static {
    /// Attempt to initialise from the raw handle provided by eframe.
    /// Returns `None` if the handle variant doesn't match this platform.
    fn from_raw_handle(handle: RawWindowHandle) -> Option<Self>
    where
        Self: Sized;

    /// Moves the window to `point` (logical units at `dpi`) and shows it
    /// in the foreground.
    fn show_at(&self, point: LogicalPoint, dpi: DpiScale);
    /// Moves the window without showing it or taking focus.
    fn move_to(&self, point: LogicalPoint, dpi: DpiScale);
    fn hide(&self);
    fn is_visible(&self) -> bool;

    /// Current outer size in physical pixels.
    fn outer_size(&self) -> Option<(f64, f64)>;
    /// Scale of the monitor the window is currently on.
    fn dpi(&self) -> DpiScale;
}

// ---------------------------------------------------------------------------
// Brightness
// ---------------------------------------------------------------------------

/// Reads and writes the built-in display's brightness.
pub trait BrightnessControl {
    fn brightness(&self) -> anyhow::Result<Brightness>;
    fn set_brightness(&self, value: Brightness) -> anyhow::Result<()>;

    /// Calls `on_change` for every change the display reports until the
    /// subscription ends. Blocks the calling thread.
    fn watch(&self, on_change: impl FnMut(Brightness)) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Power
// ---------------------------------------------------------------------------

pub trait PowerControl {
    fn monitor_off(&self);
    fn sleep(&self) -> anyhow::Result<()>;
    /// Keeps the display from idling off while `enabled`.
    fn set_keep_awake(&self, enabled: bool) -> anyhow::Result<()>;
    fn keep_awake(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Platform selection: type aliases resolve to the concrete types for the
// current OS so the rest of the codebase never names a platform directly.
// ---------------------------------------------------------------------------

#[cfg(target_os = "windows")]
mod aliases {
    pub type PlatformWindow = crate::platform::windows::WinWindowController;
    pub type PlatformBrightness = crate::platform::windows::WmiBrightness;
    pub type PlatformPower = crate::platform::windows::WinPower;
}

pub use aliases::*;
