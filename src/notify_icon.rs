//! Locating a notify icon on screen.
//!
//! Modern shells answer a structured rectangle request. Older shells only
//! expose the notification area as toolbar controls living in the shell
//! process, so the lookup walks their buttons looking for our
//! (owner window, icon id) pair. Either way the answer is all-or-nothing:
//! a half-resolved rectangle is never returned.

use tracing::debug;

use crate::compat::WindowsVersion;
use crate::geometry::ScreenRect;

/// Stable identity of a notify icon, recorded by whoever registered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconIdentity {
    /// Raw handle of the window that receives the icon's callbacks.
    pub owner: isize,
    pub id: u32,
}

pub trait NotifyIconLocator {
    /// Screen rectangle of `icon`, or `None` when no mechanism could find it.
    fn notify_icon_rect(&self, icon: &IconIdentity) -> Option<ScreenRect>;
}

/// True when the icon sits in the overflow fly-out rather than on the
/// taskbar strip, i.e. its rectangle is entirely clear of the taskbar.
/// Touching edges count as overlapping. Always false on shells without a
/// fly-out.
pub fn is_in_flyout(icon: &ScreenRect, taskbar: &ScreenRect, version: WindowsVersion) -> bool {
    if !version.has_overflow_flyout() {
        return false;
    }

    icon.left > taskbar.right
        || icon.right < taskbar.left
        || icon.bottom < taskbar.top
        || icon.top > taskbar.bottom
}

/// One button read out of a notification-area toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolbarButton {
    pub owner: isize,
    pub id: u32,
    /// The button is collapsed into the overflow area.
    pub hidden: bool,
}

/// A notification-area toolbar whose buttons can be inspected.
///
/// Every `None` means the read failed and the whole lookup must stop.
pub trait TrayToolbar {
    fn button_count(&self) -> usize;
    fn button(&mut self, index: usize) -> Option<ToolbarButton>;
    /// Button rectangle already mapped to screen coordinates.
    fn button_rect(&mut self, index: usize) -> Option<ScreenRect>;
}

/// Walks `toolbars` in order until the button owned by `icon` is found.
///
/// A `None` toolbar (it could not be opened) aborts the scan, as does any
/// failed button read. A hidden match resolves to `overflow_button`, the
/// rectangle of the "show hidden icons" toggle, since a hidden button's own
/// rectangle is empty or stale.
pub fn scan_toolbars<T, I, F>(toolbars: I, icon: &IconIdentity, overflow_button: F) -> Option<ScreenRect>
where
    T: TrayToolbar,
    I: IntoIterator<Item = Option<T>>,
    F: FnOnce() -> Option<ScreenRect>,
{
    for (toolbar_index, toolbar) in toolbars.into_iter().enumerate() {
        let Some(mut toolbar) = toolbar else {
            debug!(toolbar_index, "notification toolbar could not be opened");
            return None;
        };

        for index in 0..toolbar.button_count() {
            let Some(button) = toolbar.button(index) else {
                debug!(toolbar_index, index, "toolbar button read failed");
                return None;
            };

            if button.owner != icon.owner || button.id != icon.id {
                continue;
            }

            return if button.hidden {
                debug!("icon is collapsed into the overflow area");
                overflow_button()
            } else {
                toolbar.button_rect(index)
            };
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeToolbar {
        buttons: Vec<Option<ToolbarButton>>,
        rects: Vec<Option<ScreenRect>>,
    }

    impl FakeToolbar {
        fn new(buttons: Vec<ToolbarButton>) -> Self {
            let rects = (0..buttons.len())
                .map(|i| Some(ScreenRect::from_size(1800 + 24 * i as i32, 1050, 16, 16)))
                .collect();
            Self {
                buttons: buttons.into_iter().map(Some).collect(),
                rects,
            }
        }
    }

    impl TrayToolbar for FakeToolbar {
        fn button_count(&self) -> usize {
            self.buttons.len()
        }

        fn button(&mut self, index: usize) -> Option<ToolbarButton> {
            self.buttons[index]
        }

        fn button_rect(&mut self, index: usize) -> Option<ScreenRect> {
            self.rects[index]
        }
    }

    const ICON: IconIdentity = IconIdentity { owner: 0x1234, id: 1 };

    fn button(owner: isize, id: u32, hidden: bool) -> ToolbarButton {
        ToolbarButton { owner, id, hidden }
    }

    fn overflow() -> Option<ScreenRect> {
        Some(ScreenRect::from_size(1700, 1045, 24, 30))
    }

    #[test]
    fn flyout_requires_full_separation() {
        let taskbar = ScreenRect::from_size(0, 1040, 1920, 40);
        let on_bar = ScreenRect::from_size(1890, 1050, 16, 16);
        let above = ScreenRect::from_size(1700, 900, 16, 16);
        let touching = ScreenRect::from_size(1700, 1024, 16, 16);

        assert!(!is_in_flyout(&on_bar, &taskbar, WindowsVersion::Modern));
        assert!(is_in_flyout(&above, &taskbar, WindowsVersion::Modern));
        assert!(!is_in_flyout(&touching, &taskbar, WindowsVersion::Modern));
    }

    #[test]
    fn flyout_never_reported_on_older_shells() {
        let taskbar = ScreenRect::from_size(0, 1040, 1920, 40);
        let above = ScreenRect::from_size(1700, 900, 16, 16);
        assert!(!is_in_flyout(&above, &taskbar, WindowsVersion::Vista));
        assert!(!is_in_flyout(&above, &taskbar, WindowsVersion::PreVista));
    }

    #[test]
    fn finds_matching_button_in_second_toolbar() {
        let first = FakeToolbar::new(vec![button(0x9999, 1, false)]);
        let second = FakeToolbar::new(vec![button(0x1234, 7, false), button(0x1234, 1, false)]);

        let rect = scan_toolbars([Some(first), Some(second)], &ICON, overflow);
        assert_eq!(rect, Some(ScreenRect::from_size(1824, 1050, 16, 16)));
    }

    #[test]
    fn hidden_button_resolves_to_overflow_toggle() {
        let toolbar = FakeToolbar::new(vec![button(0x1234, 1, true)]);
        assert_eq!(scan_toolbars([Some(toolbar)], &ICON, overflow), overflow());
    }

    #[test]
    fn failed_read_aborts_instead_of_skipping() {
        let mut toolbar = FakeToolbar::new(vec![button(1, 1, false), button(0x1234, 1, false)]);
        toolbar.buttons[0] = None;
        assert_eq!(scan_toolbars([Some(toolbar)], &ICON, overflow), None);
    }

    #[test]
    fn unopenable_toolbar_aborts() {
        let later = FakeToolbar::new(vec![button(0x1234, 1, false)]);
        assert_eq!(scan_toolbars([None, Some(later)], &ICON, overflow), None);
    }

    #[test]
    fn matched_button_without_rect_is_unknown() {
        let mut toolbar = FakeToolbar::new(vec![button(0x1234, 1, false)]);
        toolbar.rects[0] = None;
        assert_eq!(scan_toolbars([Some(toolbar)], &ICON, overflow), None);
    }

    #[test]
    fn missing_icon_is_unknown() {
        let toolbar = FakeToolbar::new(vec![button(0x5555, 1, false)]);
        assert_eq!(scan_toolbars([Some(toolbar)], &ICON, overflow), None);
    }
}
