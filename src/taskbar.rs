//! Taskbar geometry as reported by the shell's app-bar interface.

use crate::error::PlatformQueryError;
use crate::geometry::ScreenRect;

/// Screen edge the taskbar is docked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskbarAlignment {
    Top,
    Bottom,
    Left,
    Right,
}

impl TaskbarAlignment {
    /// Maps an app-bar edge code (`ABE_LEFT` = 0 ... `ABE_BOTTOM` = 3).
    pub fn from_edge(edge: u32) -> Result<Self, PlatformQueryError> {
        match edge {
            0 => Ok(TaskbarAlignment::Left),
            1 => Ok(TaskbarAlignment::Top),
            2 => Ok(TaskbarAlignment::Right),
            3 => Ok(TaskbarAlignment::Bottom),
            other => Err(PlatformQueryError::UnknownTaskbarEdge(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskbarInfo {
    pub position: ScreenRect,
    pub alignment: TaskbarAlignment,
}

impl TaskbarInfo {
    /// A single-pixel anchor in the taskbar corner where the notification
    /// area normally sits, used when the icon itself cannot be located.
    pub fn fallback_anchor(&self) -> ScreenRect {
        let tb = &self.position;
        match self.alignment {
            TaskbarAlignment::Bottom | TaskbarAlignment::Right => {
                ScreenRect::point(tb.right - 1, tb.bottom - 1)
            }
            TaskbarAlignment::Top => ScreenRect::point(tb.right - 1, tb.top),
            TaskbarAlignment::Left => ScreenRect::point(tb.left, tb.bottom - 1),
        }
    }
}

/// Source of the current taskbar snapshot. Implementations must query the
/// shell on every call; the taskbar can move or auto-hide at any time.
pub trait TaskbarLocator {
    fn taskbar_info(&self) -> Result<TaskbarInfo, PlatformQueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(alignment: TaskbarAlignment, rect: ScreenRect) -> TaskbarInfo {
        TaskbarInfo {
            position: rect,
            alignment,
        }
    }

    #[test]
    fn edge_codes() {
        assert_eq!(TaskbarAlignment::from_edge(3), Ok(TaskbarAlignment::Bottom));
        assert_eq!(TaskbarAlignment::from_edge(0), Ok(TaskbarAlignment::Left));
        assert_eq!(
            TaskbarAlignment::from_edge(7),
            Err(PlatformQueryError::UnknownTaskbarEdge(7))
        );
    }

    #[test]
    fn fallback_sits_on_taskbar_corner() {
        let bottom = info(TaskbarAlignment::Bottom, ScreenRect::from_size(0, 1040, 1920, 40));
        assert_eq!(bottom.fallback_anchor(), ScreenRect::from_size(1919, 1079, 1, 1));

        let top = info(TaskbarAlignment::Top, ScreenRect::from_size(0, 0, 1920, 40));
        assert_eq!(top.fallback_anchor(), ScreenRect::from_size(1919, 0, 1, 1));

        let right = info(TaskbarAlignment::Right, ScreenRect::from_size(1880, 0, 40, 1040));
        assert_eq!(right.fallback_anchor(), ScreenRect::from_size(1880 + 39, 1039, 1, 1));

        let left = info(TaskbarAlignment::Left, ScreenRect::from_size(0, 0, 40, 1080));
        assert_eq!(left.fallback_anchor(), ScreenRect::from_size(0, 1079, 1, 1));
    }
}
