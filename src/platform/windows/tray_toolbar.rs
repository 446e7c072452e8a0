//! Notify-icon lookup for shells without `Shell_NotifyIconGetRect`.
//!
//! The notification area is a set of toolbar controls owned by the shell
//! process. Toolbar messages that return data write into the caller-supplied
//! buffer *inside that process*, so each toolbar gets a small block of
//! memory allocated in the shell and copied back with `ReadProcessMemory`.
//! Nothing here hands out raw pointers: callers only see validated
//! `ToolbarButton`s and `ScreenRect`s.

use std::ffi::c_void;
use std::mem::size_of;

use tracing::{debug, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::MapWindowPoints;
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, PAGE_READWRITE, VirtualAllocEx, VirtualFreeEx,
};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ,
    PROCESS_VM_WRITE,
};
use windows::Win32::UI::Controls::TBBUTTON;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, FindWindowExW, FindWindowW, GetClassNameW, GetWindowRect,
    GetWindowThreadProcessId, SendMessageW,
};
use windows::core::{BOOL, PCWSTR, w};

use crate::geometry::ScreenRect;
use crate::notify_icon::{IconIdentity, ToolbarButton, TrayToolbar, scan_toolbars};

use super::to_screen_rect;

// commctrl.h
const TB_GETBUTTON: u32 = 0x0417;
const TB_BUTTONCOUNT: u32 = 0x0418;
const TB_GETITEMRECT: u32 = 0x041D;
const TBSTATE_HIDDEN: u8 = 0x08;

const REMOTE_BUFFER_SIZE: usize = if size_of::<TBBUTTON>() > size_of::<RECT>() {
    size_of::<TBBUTTON>()
} else {
    size_of::<RECT>()
};

/// Finds `icon` by walking the notification-area toolbars.
pub fn locate_icon(icon: &IconIdentity) -> Option<ScreenRect> {
    let notify_area = notification_area()?;
    let toolbars = child_windows(notify_area, "ToolbarWindow32");
    debug!(count = toolbars.len(), "scanning notification toolbars");

    scan_toolbars(
        toolbars.into_iter().map(RemoteToolbar::open),
        icon,
        || overflow_button_rect(notify_area),
    )
}

/// Screen rectangle of the "show hidden icons" toggle: the first button
/// control inside the notification area.
fn overflow_button_rect(notify_area: HWND) -> Option<ScreenRect> {
    let button = *child_windows(notify_area, "Button").first()?;
    let mut rect = RECT::default();
    unsafe { GetWindowRect(button, &mut rect) }.ok()?;
    Some(to_screen_rect(rect))
}

fn notification_area() -> Option<HWND> {
    unsafe {
        let taskbar = FindWindowW(w!("Shell_TrayWnd"), PCWSTR::null()).ok()?;
        FindWindowExW(Some(taskbar), None, w!("TrayNotifyWnd"), PCWSTR::null()).ok()
    }
}

struct ChildSearch {
    class: &'static str,
    found: Vec<HWND>,
}

unsafe extern "system" fn collect_child(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = lparam.0 as *mut ChildSearch;
    let mut buf = [0u16; 64];
    unsafe {
        let len = GetClassNameW(hwnd, &mut buf);
        if len > 0 && String::from_utf16_lossy(&buf[..len as usize]) == (*search).class {
            (*search).found.push(hwnd);
        }
    }
    BOOL(1)
}

/// All descendants of `parent` with window class `class`, in z-order.
fn child_windows(parent: HWND, class: &'static str) -> Vec<HWND> {
    let mut search = ChildSearch {
        class,
        found: Vec::new(),
    };
    let lparam = LPARAM((&mut search as *mut ChildSearch) as isize);
    unsafe {
        let _ = EnumChildWindows(Some(parent), Some(collect_child), lparam);
    }
    search.found
}

/// A toolbar in the shell process plus the scratch buffer allocated there.
/// Dropping it releases the buffer and the process handle.
struct RemoteToolbar {
    hwnd: HWND,
    process: HANDLE,
    buffer: *mut c_void,
}

impl RemoteToolbar {
    fn open(hwnd: HWND) -> Option<Self> {
        let mut pid = 0u32;
        unsafe {
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            let process = OpenProcess(
                PROCESS_VM_OPERATION | PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_QUERY_INFORMATION,
                false,
                pid,
            )
            .inspect_err(|e| debug!(pid, "OpenProcess on the shell failed: {e}"))
            .ok()?;

            let buffer = VirtualAllocEx(process, None, REMOTE_BUFFER_SIZE, MEM_COMMIT, PAGE_READWRITE);
            if buffer.is_null() {
                debug!(pid, "VirtualAllocEx in the shell failed");
                let _ = CloseHandle(process);
                return None;
            }

            Some(Self {
                hwnd,
                process,
                buffer,
            })
        }
    }

    /// Copies a `T` out of the shell process; a short read is a failure.
    fn read<T: Copy + Default>(&self, address: *const c_void) -> Option<T> {
        let mut value = T::default();
        let mut bytes_read = 0usize;
        unsafe {
            ReadProcessMemory(
                self.process,
                address,
                &mut value as *mut T as *mut c_void,
                size_of::<T>(),
                Some(&mut bytes_read),
            )
            .ok()?;
        }
        (bytes_read == size_of::<T>()).then_some(value)
    }

    fn send(&self, msg: u32, index: usize) {
        unsafe {
            SendMessageW(
                self.hwnd,
                msg,
                Some(WPARAM(index)),
                Some(LPARAM(self.buffer as isize)),
            );
        }
    }
}

impl TrayToolbar for RemoteToolbar {
    fn button_count(&self) -> usize {
        let count = unsafe { SendMessageW(self.hwnd, TB_BUTTONCOUNT, None, None) };
        count.0.max(0) as usize
    }

    fn button(&mut self, index: usize) -> Option<ToolbarButton> {
        self.send(TB_GETBUTTON, index);
        let info: TBBUTTON = self.read(self.buffer)?;
        if info.dwData == 0 {
            return None;
        }

        // dwData points at the shell's record for the icon: the owner
        // window handle followed by the icon id
        let owner: isize = self.read(info.dwData as *const c_void)?;
        let id: u32 = self.read((info.dwData + size_of::<isize>()) as *const c_void)?;

        Some(ToolbarButton {
            owner,
            id,
            hidden: info.fsState & TBSTATE_HIDDEN != 0,
        })
    }

    fn button_rect(&mut self, index: usize) -> Option<ScreenRect> {
        self.send(TB_GETITEMRECT, index);
        let mut rect: RECT = self.read(self.buffer)?;

        unsafe {
            let points = std::slice::from_raw_parts_mut(&mut rect as *mut RECT as *mut POINT, 2);
            MapWindowPoints(Some(self.hwnd), None, points);
        }
        Some(to_screen_rect(rect))
    }
}

impl Drop for RemoteToolbar {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = VirtualFreeEx(self.process, self.buffer, 0, MEM_RELEASE) {
                warn!("failed to free scratch memory in the shell process: {e}");
            }
            let _ = CloseHandle(self.process);
        }
    }
}
