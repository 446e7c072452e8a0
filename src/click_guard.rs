/// Tracks the click that dismissed the popup.
///
/// Clicking the notify icon while the popup is open first deactivates the
/// popup (hiding it) and then delivers the click to the icon, which would
/// immediately reopen it. When the popup hides with the cursor over the
/// icon and the notification area in the foreground, the cursor position is
/// remembered and the next click at exactly that point is swallowed.
#[derive(Debug, Default)]
pub struct ClickToHideGuard {
    dismissed_at: Option<(i32, i32)>,
}

impl ClickToHideGuard {
    pub const fn new() -> Self {
        Self { dismissed_at: None }
    }

    pub fn record_hide(&mut self, cursor: (i32, i32), over_icon: bool, notification_area_active: bool) {
        self.dismissed_at = (over_icon && notification_area_active).then_some(cursor);
    }

    /// Whether an icon click at `cursor` should open the popup. Consumes the
    /// remembered dismissal either way.
    pub fn should_open(&mut self, cursor: (i32, i32)) -> bool {
        self.dismissed_at.take() != Some(cursor)
    }

    pub fn is_armed(&self) -> bool {
        self.dismissed_at.is_some()
    }
}
