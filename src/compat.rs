//! Host capability detection inputs.
//!
//! The shell exposes different notification-area internals per Windows
//! generation. The running generation is classified once at startup and
//! then travels with every positioning request inside a
//! [`PositioningContext`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsVersion {
    /// Windows 7 / Server 2008 R2 and everything newer.
    Modern,
    /// Windows Vista / Server 2008.
    Vista,
    /// Anything before Vista.
    PreVista,
}

impl WindowsVersion {
    pub fn from_os_version(major: u32, minor: u32) -> Self {
        match (major, minor) {
            (0..=5, _) => WindowsVersion::PreVista,
            (6, 0) => WindowsVersion::Vista,
            _ => WindowsVersion::Modern,
        }
    }

    /// Whether the shell answers structured notify-icon rectangle requests.
    pub fn has_icon_rect_query(self) -> bool {
        self == WindowsVersion::Modern
    }

    /// Whether hidden icons live in a separate fly-out panel.
    pub fn has_overflow_flyout(self) -> bool {
        self == WindowsVersion::Modern
    }
}

/// How a notify icon's rectangle is looked up on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconLookupStrategy {
    /// Ask the shell directly.
    ShellQuery,
    /// Walk the notification-area toolbars in the shell process.
    ToolbarScan,
}

impl From<WindowsVersion> for IconLookupStrategy {
    fn from(version: WindowsVersion) -> Self {
        if version.has_icon_rect_query() {
            IconLookupStrategy::ShellQuery
        } else {
            IconLookupStrategy::ToolbarScan
        }
    }
}

/// Per-call environment for a positioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositioningContext {
    pub version: WindowsVersion,
    pub composition_enabled: bool,
}

impl PositioningContext {
    /// Gap in logical pixels kept between the popup and the taskbar edge.
    pub fn edge_offset(&self) -> f64 {
        match (self.composition_enabled, self.version) {
            (false, _) => 0.0,
            (true, WindowsVersion::Vista) => 1.0,
            (true, WindowsVersion::Modern) => 8.0,
            // composition does not exist before Vista
            (true, WindowsVersion::PreVista) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_os_versions() {
        assert_eq!(WindowsVersion::from_os_version(5, 1), WindowsVersion::PreVista);
        assert_eq!(WindowsVersion::from_os_version(6, 0), WindowsVersion::Vista);
        assert_eq!(WindowsVersion::from_os_version(6, 1), WindowsVersion::Modern);
        assert_eq!(WindowsVersion::from_os_version(10, 0), WindowsVersion::Modern);
    }

    #[test]
    fn strategy_follows_version() {
        assert_eq!(
            IconLookupStrategy::from(WindowsVersion::Modern),
            IconLookupStrategy::ShellQuery
        );
        assert_eq!(
            IconLookupStrategy::from(WindowsVersion::Vista),
            IconLookupStrategy::ToolbarScan
        );
    }

    #[test]
    fn edge_offset_per_generation() {
        let ctx = |version, composition_enabled| PositioningContext {
            version,
            composition_enabled,
        };
        assert_eq!(ctx(WindowsVersion::Modern, true).edge_offset(), 8.0);
        assert_eq!(ctx(WindowsVersion::Vista, true).edge_offset(), 1.0);
        assert_eq!(ctx(WindowsVersion::Modern, false).edge_offset(), 0.0);
        assert_eq!(ctx(WindowsVersion::PreVista, true).edge_offset(), 0.0);
    }
}
