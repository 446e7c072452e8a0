//! Windows platform implementation.
//!
//! All Windows-specific code lives here: app-bar and notify-icon queries for
//! popup placement, monitor enumeration, WMI brightness, power requests and
//! HWND window control.

mod tray;
mod tray_toolbar;

pub use tray::{ContextMenu, MenuCommand, NotifyIconHost, TrayEvent};

use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail};
use raw_window_handle::RawWindowHandle;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use windows::Win32::Foundation::{HWND, LPARAM, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Dwm::DwmIsCompositionEnabled;
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITOR_DEFAULTTOPRIMARY, MONITORINFO,
    MonitorFromPoint,
};
use windows::Win32::System::Power::{
    ES_CONTINUOUS, ES_DISPLAY_REQUIRED, SetSuspendState, SetThreadExecutionState,
};
use windows::Win32::System::SystemInformation::{GetVersionExW, OSVERSIONINFOW};
use windows::Win32::UI::HiDpi::GetDpiForWindow;
use windows::Win32::UI::Shell::{
    ABM_GETTASKBARPOS, APPBARDATA, NOTIFYICONIDENTIFIER, SHAppBarMessage, Shell_NotifyIconGetRect,
};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowW, GetCursorPos, GetForegroundWindow, GetWindowRect, HWND_TOPMOST, SC_MONITORPOWER,
    SW_HIDE, SWP_NOACTIVATE, SWP_NOSIZE, SWP_NOZORDER, SWP_SHOWWINDOW, SendMessageW,
    SetForegroundWindow, SetWindowPos, ShowWindow, WM_SYSCOMMAND,
};
use windows::core::{BOOL, PCWSTR, w};
use wmi::WMIConnection;

use crate::brightness::Brightness;
use crate::compat::{IconLookupStrategy, PositioningContext, WindowsVersion};
use crate::error::PlatformQueryError;
use crate::geometry::{DpiScale, LogicalPoint, ScreenRect};
use crate::notify_icon::{IconIdentity, NotifyIconLocator};
use crate::os::{BrightnessControl, PowerControl, WindowController};
use crate::positioning::PopupPositioner;
use crate::taskbar::{TaskbarAlignment, TaskbarInfo, TaskbarLocator};
use crate::work_area::{MonitorArea, WorkAreaResolver};

fn to_screen_rect(rect: RECT) -> ScreenRect {
    ScreenRect::new(rect.left, rect.top, rect.right, rect.bottom)
}

fn hwnd_from(raw: isize) -> HWND {
    HWND(raw as *mut core::ffi::c_void)
}

// =========================================================================
// Shell capabilities
// =========================================================================

pub fn windows_version() -> WindowsVersion {
    let mut info = OSVERSIONINFOW {
        dwOSVersionInfoSize: size_of::<OSVERSIONINFOW>() as u32,
        ..Default::default()
    };
    match unsafe { GetVersionExW(&mut info) } {
        Ok(()) => WindowsVersion::from_os_version(info.dwMajorVersion, info.dwMinorVersion),
        Err(e) => {
            warn!("GetVersionExW failed, assuming a current shell: {e}");
            WindowsVersion::Modern
        }
    }
}

/// Desktop composition can be toggled while we run, so this is queried per
/// placement rather than cached.
pub fn composition_enabled(version: WindowsVersion) -> bool {
    if version == WindowsVersion::PreVista {
        return false;
    }
    unsafe { DwmIsCompositionEnabled() }
        .map(|enabled| enabled.as_bool())
        .unwrap_or(false)
}

pub fn positioning_context(version: WindowsVersion) -> PositioningContext {
    PositioningContext {
        version,
        composition_enabled: composition_enabled(version),
    }
}

pub type WinPositioner = PopupPositioner<WinTaskbarLocator, WinNotifyIconLocator, WinWorkAreaResolver>;

pub fn positioner(version: WindowsVersion) -> WinPositioner {
    PopupPositioner::new(
        WinTaskbarLocator,
        WinNotifyIconLocator::new(version),
        WinWorkAreaResolver,
    )
}

pub fn cursor_position() -> (i32, i32) {
    let mut point = POINT::default();
    match unsafe { GetCursorPos(&mut point) } {
        Ok(()) => (point.x, point.y),
        Err(e) => {
            debug!("GetCursorPos failed: {e}");
            (0, 0)
        }
    }
}

/// Whether the taskbar or the overflow fly-out currently has the foreground.
pub fn is_notification_area_active() -> bool {
    unsafe {
        let active = GetForegroundWindow();
        if active.is_invalid() {
            return false;
        }
        [w!("Shell_TrayWnd"), w!("NotifyIconOverflowWindow")]
            .into_iter()
            .filter_map(|class| FindWindowW(class, PCWSTR::null()).ok())
            .any(|hwnd| hwnd == active)
    }
}

// =========================================================================
// Taskbar
// =========================================================================

pub struct WinTaskbarLocator;

impl TaskbarLocator for WinTaskbarLocator {
    fn taskbar_info(&self) -> Result<TaskbarInfo, PlatformQueryError> {
        let mut data = APPBARDATA {
            cbSize: size_of::<APPBARDATA>() as u32,
            ..Default::default()
        };
        if unsafe { SHAppBarMessage(ABM_GETTASKBARPOS, &mut data) } == 0 {
            warn!("SHAppBarMessage(ABM_GETTASKBARPOS) failed");
            return Err(PlatformQueryError::TaskbarUnavailable);
        }

        Ok(TaskbarInfo {
            position: to_screen_rect(data.rc),
            alignment: TaskbarAlignment::from_edge(data.uEdge)?,
        })
    }
}

// =========================================================================
// Notify icon
// =========================================================================

pub struct WinNotifyIconLocator {
    strategy: IconLookupStrategy,
}

impl WinNotifyIconLocator {
    pub fn new(version: WindowsVersion) -> Self {
        Self {
            strategy: version.into(),
        }
    }
}

impl NotifyIconLocator for WinNotifyIconLocator {
    fn notify_icon_rect(&self, icon: &IconIdentity) -> Option<ScreenRect> {
        if icon.owner == 0 {
            return None;
        }
        match self.strategy {
            IconLookupStrategy::ShellQuery => shell_icon_rect(icon),
            IconLookupStrategy::ToolbarScan => tray_toolbar::locate_icon(icon),
        }
    }
}

fn shell_icon_rect(icon: &IconIdentity) -> Option<ScreenRect> {
    let identifier = NOTIFYICONIDENTIFIER {
        cbSize: size_of::<NOTIFYICONIDENTIFIER>() as u32,
        hWnd: hwnd_from(icon.owner),
        uID: icon.id,
        ..Default::default()
    };
    // S_FALSE (icon sitting in the fly-out) still maps to Ok
    match unsafe { Shell_NotifyIconGetRect(&identifier) } {
        Ok(rect) => Some(to_screen_rect(rect)),
        Err(e) => {
            debug!("Shell_NotifyIconGetRect failed: {e}");
            None
        }
    }
}

// =========================================================================
// Monitors
// =========================================================================

unsafe extern "system" fn enum_display_monitors_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _lprc: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let hmons = lparam.0 as *mut Vec<HMONITOR>;
    unsafe {
        (*hmons).push(hmonitor);
    }
    BOOL(1)
}

fn monitor_area(hmonitor: HMONITOR) -> Option<MonitorArea> {
    let mut info = MONITORINFO {
        cbSize: size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if !unsafe { GetMonitorInfoW(hmonitor, &mut info) }.as_bool() {
        warn!(?hmonitor, "GetMonitorInfoW failed");
        return None;
    }
    Some(MonitorArea {
        bounds: to_screen_rect(info.rcMonitor),
        work: to_screen_rect(info.rcWork),
    })
}

fn enumerate_monitors() -> Result<Vec<MonitorArea>, PlatformQueryError> {
    let mut hmons: Vec<HMONITOR> = Vec::new();
    let lparam = LPARAM((&mut hmons as *mut Vec<HMONITOR>) as isize);
    let success = unsafe { EnumDisplayMonitors(None, None, Some(enum_display_monitors_callback), lparam) };
    if !success.as_bool() {
        return Err(PlatformQueryError::MonitorInfoUnavailable);
    }
    Ok(hmons.into_iter().filter_map(monitor_area).collect())
}

pub struct WinWorkAreaResolver;

impl WorkAreaResolver for WinWorkAreaResolver {
    fn working_area(&self, rect: &ScreenRect) -> Result<ScreenRect, PlatformQueryError> {
        let monitors = enumerate_monitors()?;
        monitors.as_slice().working_area(rect)
    }
}

pub fn primary_work_area() -> Result<ScreenRect, PlatformQueryError> {
    let hmonitor = unsafe { MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY) };
    monitor_area(hmonitor)
        .map(|area| area.work)
        .ok_or(PlatformQueryError::MonitorInfoUnavailable)
}

// =========================================================================
// Popup window
// =========================================================================

/// `visible` is only touched outside Win32 calls: showing or hiding sends
/// messages that re-enter the event loop on this thread.
pub struct WinWindowController {
    hwnd: isize,
    visible: AtomicBool,
}

impl WinWindowController {
    fn hwnd(&self) -> HWND {
        hwnd_from(self.hwnd)
    }
}

impl WindowController for WinWindowController {
    fn from_raw_handle(handle: RawWindowHandle) -> Option<Self> {
        if let RawWindowHandle::Win32(h) = handle {
            let hwnd: isize = h.hwnd.into();
            Some(Self {
                hwnd,
                visible: AtomicBool::new(true),
            })
        } else {
            None
        }
    }

    fn show_at(&self, point: LogicalPoint, dpi: DpiScale) {
        let x = (point.x * dpi.x).round() as i32;
        let y = (point.y * dpi.y).round() as i32;
        unsafe {
            if let Err(e) = SetWindowPos(self.hwnd(), Some(HWND_TOPMOST), x, y, 0, 0, SWP_NOSIZE | SWP_SHOWWINDOW) {
                warn!(x, y, "SetWindowPos failed: {e}");
                return;
            }
            let _ = SetForegroundWindow(self.hwnd());
        }
        self.visible.store(true, Ordering::Relaxed);
    }

    fn move_to(&self, point: LogicalPoint, dpi: DpiScale) {
        let x = (point.x * dpi.x).round() as i32;
        let y = (point.y * dpi.y).round() as i32;
        let flags = SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE;
        if let Err(e) = unsafe { SetWindowPos(self.hwnd(), None, x, y, 0, 0, flags) } {
            warn!(x, y, "SetWindowPos failed: {e}");
        }
    }

    fn hide(&self) {
        if self.visible.swap(false, Ordering::Relaxed) {
            unsafe {
                let _ = ShowWindow(self.hwnd(), SW_HIDE);
            }
        }
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    fn outer_size(&self) -> Option<(f64, f64)> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(self.hwnd(), &mut rect) }.ok()?;
        Some(((rect.right - rect.left) as f64, (rect.bottom - rect.top) as f64))
    }

    fn dpi(&self) -> DpiScale {
        match unsafe { GetDpiForWindow(self.hwnd()) } {
            0 => DpiScale::IDENTITY,
            dpi => DpiScale::from_dpi(dpi),
        }
    }
}

// =========================================================================
// Brightness (WMI)
// =========================================================================

#[derive(Deserialize, Debug)]
#[serde(rename = "WmiMonitorBrightness")]
#[serde(rename_all = "PascalCase")]
struct WmiMonitorBrightness {
    current_brightness: u8,
}

#[derive(Deserialize, Debug)]
#[serde(rename = "WmiMonitorBrightnessEvent")]
#[serde(rename_all = "PascalCase")]
struct WmiMonitorBrightnessEvent {
    brightness: u8,
}

#[derive(Deserialize, Debug)]
#[serde(rename = "WmiMonitorBrightnessMethods")]
struct WmiMonitorBrightnessMethods {
    #[serde(rename = "__Path")]
    path: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct WmiSetBrightness {
    timeout: u32,
    brightness: u8,
}

/// Brightness of displays exposing the `WmiMonitorBrightness` classes,
/// which in practice means laptop panels. External monitors are not
/// covered. The connection is COM-bound, so create this on the thread
/// that uses it.
pub struct WmiBrightness {
    connection: WMIConnection,
}

impl WmiBrightness {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            connection: WMIConnection::with_namespace_path("ROOT\\WMI")?,
        })
    }
}

impl BrightnessControl for WmiBrightness {
    fn brightness(&self) -> anyhow::Result<Brightness> {
        let results: Vec<WmiMonitorBrightness> = self.connection.query()?;
        let first = results
            .first()
            .ok_or_else(|| anyhow!("no display reports WMI brightness"))?;
        Ok(Brightness::try_from(first.current_brightness as u32)?)
    }

    fn set_brightness(&self, value: Brightness) -> anyhow::Result<()> {
        let instances: Vec<WmiMonitorBrightnessMethods> = self.connection.query()?;
        if instances.is_empty() {
            bail!("no display accepts WMI brightness changes");
        }
        for instance in &instances {
            self.connection.exec_instance_method::<WmiMonitorBrightnessMethods, ()>(
                &instance.path,
                "WmiSetBrightness",
                WmiSetBrightness {
                    timeout: u32::MAX,
                    brightness: value.percent(),
                },
            )?;
        }
        Ok(())
    }

    fn watch(&self, mut on_change: impl FnMut(Brightness)) -> anyhow::Result<()> {
        let events = self.connection.notification::<WmiMonitorBrightnessEvent>()?;
        for event in events {
            let event = event?;
            match Brightness::try_from(event.brightness as u32) {
                Ok(value) => on_change(value),
                Err(e) => debug!("ignoring brightness event: {e}"),
            }
        }
        Ok(())
    }
}

// =========================================================================
// Power
// =========================================================================

const MONITOR_POWER_OFF: isize = 2;

/// Power requests. `owner` is a top-level window whose default procedure
/// handles `SC_MONITORPOWER`.
pub struct WinPower {
    owner: isize,
    keep_awake: AtomicBool,
}

impl WinPower {
    pub fn new(owner: isize) -> Self {
        Self {
            owner,
            keep_awake: AtomicBool::new(false),
        }
    }
}

impl PowerControl for WinPower {
    fn monitor_off(&self) {
        unsafe {
            SendMessageW(
                hwnd_from(self.owner),
                WM_SYSCOMMAND,
                Some(WPARAM(SC_MONITORPOWER as usize)),
                Some(LPARAM(MONITOR_POWER_OFF)),
            );
        }
    }

    fn sleep(&self) -> anyhow::Result<()> {
        let suspended = unsafe { SetSuspendState(false, true, true) };
        if !bool::from(suspended) {
            bail!("SetSuspendState failed");
        }
        Ok(())
    }

    fn set_keep_awake(&self, enabled: bool) -> anyhow::Result<()> {
        let flags = if enabled {
            ES_CONTINUOUS | ES_DISPLAY_REQUIRED
        } else {
            ES_CONTINUOUS
        };
        if unsafe { SetThreadExecutionState(flags) }.0 == 0 {
            bail!("SetThreadExecutionState failed");
        }
        self.keep_awake.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn keep_awake(&self) -> bool {
        self.keep_awake.load(Ordering::Relaxed)
    }
}
