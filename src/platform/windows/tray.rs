//! Notify icon owned by a hidden window.
//!
//! The icon is registered with `Shell_NotifyIconW` directly so that its
//! identity (owner window plus id) is known; popup placement needs both to
//! find the icon on screen.

use std::sync::OnceLock;

use anyhow::bail;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY, NOTIFYICONDATAW,
    Shell_NotifyIconW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
    GetCursorPos, HMENU, IDI_APPLICATION, LoadIconW, MENU_ITEM_FLAGS, MF_CHECKED, MF_GRAYED,
    MF_SEPARATOR, MF_STRING, MF_UNCHECKED, RegisterClassW, SetForegroundWindow, TPM_BOTTOMALIGN,
    SPI_SETWORKAREA, TPM_RETURNCMD, TPM_RIGHTALIGN, TPM_RIGHTBUTTON, TrackPopupMenu,
    WINDOW_EX_STYLE, WM_APP, WM_DISPLAYCHANGE, WM_DWMCOMPOSITIONCHANGED, WM_LBUTTONDBLCLK,
    WM_LBUTTONUP, WM_RBUTTONUP, WM_SETTINGCHANGE, WNDCLASSW, WS_OVERLAPPED,
};
use windows::core::{PCWSTR, w};

use crate::notify_icon::IconIdentity;

use super::hwnd_from;

const WM_TRAY_ICON: u32 = WM_APP + 1;
const TRAY_ICON_ID: u32 = 1;
const CLASS_NAME: PCWSTR = w!("BrightnessTrayIconOwner");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    LeftClick,
    RightClick,
    /// The work area, the display mode or composition changed, so a popup
    /// placed earlier may now sit in the wrong spot.
    LayoutChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    MonitorOff = 1001,
    Sleep,
    KeepAwake,
    Close,
}

impl MenuCommand {
    fn from_id(id: i32) -> Option<Self> {
        [Self::MonitorOff, Self::Sleep, Self::KeepAwake, Self::Close]
            .into_iter()
            .find(|cmd| *cmd as i32 == id)
    }
}

/// What the right-click menu shows.
pub struct ContextMenu {
    /// Disabled header line, e.g. the current brightness
    pub label: String,
    pub keep_awake: bool,
}

type EventHandler = Box<dyn Fn(TrayEvent) + Send + Sync>;

static EVENT_HANDLER: OnceLock<EventHandler> = OnceLock::new();

fn to_wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Maps a message sent to the owner window to the event it stands for.
/// Top-level windows get the layout broadcasts, so the hidden owner hears
/// them too.
fn classify(msg: u32, wparam: usize, lparam: isize) -> Option<TrayEvent> {
    match msg {
        WM_TRAY_ICON => match lparam as u32 & 0xFFFF {
            WM_LBUTTONUP | WM_LBUTTONDBLCLK => Some(TrayEvent::LeftClick),
            WM_RBUTTONUP => Some(TrayEvent::RightClick),
            _ => None,
        },
        WM_SETTINGCHANGE if wparam == SPI_SETWORKAREA.0 as usize => Some(TrayEvent::LayoutChanged),
        WM_DISPLAYCHANGE | WM_DWMCOMPOSITIONCHANGED => Some(TrayEvent::LayoutChanged),
        _ => None,
    }
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if let (Some(event), Some(handler)) = (classify(msg, wparam.0, lparam.0), EVENT_HANDLER.get()) {
        handler(event);
    }
    if msg == WM_TRAY_ICON {
        return LRESULT(0);
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

/// The notify icon and the hidden window receiving its callbacks. Must be
/// created on the thread that pumps messages. Removes the icon on drop.
pub struct NotifyIconHost {
    hwnd: isize,
}

impl NotifyIconHost {
    /// Installs the callback for icon clicks and layout changes. Only the
    /// first call wins.
    pub fn set_event_handler<F>(handler: F)
    where
        F: Fn(TrayEvent) + Send + Sync + 'static,
    {
        let _ = EVENT_HANDLER.set(Box::new(handler));
    }

    pub fn create(tooltip: &str) -> anyhow::Result<Self> {
        unsafe {
            let instance: HINSTANCE = GetModuleHandleW(PCWSTR::null())?.into();
            let class = WNDCLASSW {
                lpfnWndProc: Some(wndproc),
                hInstance: instance,
                lpszClassName: CLASS_NAME,
                ..Default::default()
            };
            if RegisterClassW(&class) == 0 {
                bail!("RegisterClassW failed for the tray owner window");
            }

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                CLASS_NAME,
                w!("Brightness Tray"),
                WS_OVERLAPPED,
                0,
                0,
                0,
                0,
                None,
                None,
                Some(instance),
                None,
            )?;
            let host = Self {
                hwnd: hwnd.0 as isize,
            };

            let mut data = host.notify_data();
            data.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
            data.uCallbackMessage = WM_TRAY_ICON;
            data.hIcon = LoadIconW(None, IDI_APPLICATION)?;
            copy_tip(&mut data, tooltip);
            if !Shell_NotifyIconW(NIM_ADD, &data).as_bool() {
                bail!("Shell_NotifyIconW(NIM_ADD) failed");
            }
            Ok(host)
        }
    }

    pub fn identity(&self) -> IconIdentity {
        IconIdentity {
            owner: self.hwnd,
            id: TRAY_ICON_ID,
        }
    }

    /// Raw handle of the owner window.
    pub fn owner(&self) -> isize {
        self.hwnd
    }

    pub fn set_tooltip(&self, tooltip: &str) {
        let mut data = self.notify_data();
        data.uFlags = NIF_TIP;
        copy_tip(&mut data, tooltip);
        unsafe {
            let _ = Shell_NotifyIconW(NIM_MODIFY, &data);
        }
    }

    /// Shows the right-click menu at the cursor and blocks until it closes.
    pub fn show_context_menu(&self, menu: &ContextMenu) -> Option<MenuCommand> {
        let hwnd = hwnd_from(self.hwnd);
        unsafe {
            let hmenu = CreatePopupMenu().ok()?;
            let label = to_wide_string(&menu.label);
            let _ = AppendMenuW(hmenu, MF_STRING | MF_GRAYED, 0, PCWSTR(label.as_ptr()));
            let _ = AppendMenuW(hmenu, MF_SEPARATOR, 0, PCWSTR::null());
            append_item(hmenu, MenuCommand::MonitorOff, "Power off display", MF_STRING);
            append_item(hmenu, MenuCommand::Sleep, "Enter sleep mode", MF_STRING);
            let keep_awake_state = if menu.keep_awake { MF_CHECKED } else { MF_UNCHECKED };
            append_item(hmenu, MenuCommand::KeepAwake, "Keep awake", MF_STRING | keep_awake_state);
            let _ = AppendMenuW(hmenu, MF_SEPARATOR, 0, PCWSTR::null());
            append_item(hmenu, MenuCommand::Close, "Close", MF_STRING);

            let mut cursor = POINT::default();
            let _ = GetCursorPos(&mut cursor);
            // without this the menu does not close when clicking elsewhere
            let _ = SetForegroundWindow(hwnd);
            let picked = TrackPopupMenu(
                hmenu,
                TPM_RETURNCMD | TPM_RIGHTBUTTON | TPM_BOTTOMALIGN | TPM_RIGHTALIGN,
                cursor.x,
                cursor.y,
                Some(0),
                hwnd,
                None,
            );
            let _ = DestroyMenu(hmenu);
            MenuCommand::from_id(picked.0)
        }
    }

    /// Takes the icon off the taskbar. Also done on drop, which never runs
    /// for a host kept in a static.
    pub fn remove(&self) {
        let data = self.notify_data();
        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &data);
        }
    }

    fn notify_data(&self) -> NOTIFYICONDATAW {
        NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: hwnd_from(self.hwnd),
            uID: TRAY_ICON_ID,
            ..Default::default()
        }
    }
}

impl Drop for NotifyIconHost {
    fn drop(&mut self) {
        self.remove();
        unsafe {
            let _ = DestroyWindow(hwnd_from(self.hwnd));
        }
    }
}

unsafe fn append_item(menu: HMENU, command: MenuCommand, text: &str, flags: MENU_ITEM_FLAGS) {
    let text = to_wide_string(text);
    unsafe {
        let _ = AppendMenuW(menu, flags, command as usize, PCWSTR(text.as_ptr()));
    }
}

/// Copies `text` into the fixed tooltip buffer, truncating and keeping the
/// terminating nul.
fn copy_tip(data: &mut NOTIFYICONDATAW, text: &str) {
    let capacity = data.szTip.len() - 1;
    let wide: Vec<u16> = text.encode_utf16().take(capacity).collect();
    data.szTip[..wide.len()].copy_from_slice(&wide);
    data.szTip[wide.len()] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_ids_map_back_to_commands() {
        assert_eq!(MenuCommand::from_id(1001), Some(MenuCommand::MonitorOff));
        assert_eq!(MenuCommand::from_id(MenuCommand::Close as i32), Some(MenuCommand::Close));
        assert_eq!(MenuCommand::from_id(0), None);
    }

    #[test]
    fn icon_clicks_are_classified() {
        let up = WM_LBUTTONUP as isize;
        assert_eq!(classify(WM_TRAY_ICON, 0, up), Some(TrayEvent::LeftClick));
        assert_eq!(classify(WM_TRAY_ICON, 0, WM_LBUTTONDBLCLK as isize), Some(TrayEvent::LeftClick));
        assert_eq!(classify(WM_TRAY_ICON, 0, WM_RBUTTONUP as isize), Some(TrayEvent::RightClick));
        // the high word carries the icon id on newer shells
        assert_eq!(classify(WM_TRAY_ICON, 0, up | (1 << 16)), Some(TrayEvent::LeftClick));
        // mouse moves over the icon
        assert_eq!(classify(WM_TRAY_ICON, 0, 0x0200), None);
        assert_eq!(classify(WM_LBUTTONUP, 0, 0), None);
    }

    #[test]
    fn layout_broadcasts_are_classified() {
        let work_area = SPI_SETWORKAREA.0 as usize;
        assert_eq!(classify(WM_SETTINGCHANGE, work_area, 0), Some(TrayEvent::LayoutChanged));
        assert_eq!(classify(WM_DISPLAYCHANGE, 32, 0), Some(TrayEvent::LayoutChanged));
        assert_eq!(classify(WM_DWMCOMPOSITIONCHANGED, 0, 0), Some(TrayEvent::LayoutChanged));
    }

    #[test]
    fn unrelated_setting_changes_are_ignored() {
        // SPI_SETDESKWALLPAPER
        assert_eq!(classify(WM_SETTINGCHANGE, 0x0014, 0), None);
        assert_eq!(classify(WM_SETTINGCHANGE, 0, 0), None);
    }

    #[test]
    fn long_tooltips_are_truncated() {
        let mut data = NOTIFYICONDATAW::default();
        copy_tip(&mut data, &"x".repeat(500));
        let last = data.szTip.len() - 1;
        assert_eq!(data.szTip[last], 0);
        assert_eq!(data.szTip[last - 1], u16::from(b'x'));
    }
}
