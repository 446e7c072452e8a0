//! Usable monitor area lookup.

use crate::error::PlatformQueryError;
use crate::geometry::ScreenRect;

/// Bounds of one display and the part of it not reserved by app bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorArea {
    pub bounds: ScreenRect,
    pub work: ScreenRect,
}

pub trait WorkAreaResolver {
    /// Working area of the monitor `rect` lies on.
    fn working_area(&self, rect: &ScreenRect) -> Result<ScreenRect, PlatformQueryError>;
}

impl<R: WorkAreaResolver + ?Sized> WorkAreaResolver for &R {
    fn working_area(&self, rect: &ScreenRect) -> Result<ScreenRect, PlatformQueryError> {
        (**self).working_area(rect)
    }
}

/// Picks the monitor that overlaps `rect` the most, or failing that the
/// one nearest to it. Ties keep the first monitor in enumeration order.
pub fn pick_monitor<'a>(rect: &ScreenRect, monitors: &'a [MonitorArea]) -> Option<&'a MonitorArea> {
    let mut best: Option<(&MonitorArea, i64)> = None;
    for monitor in monitors {
        let overlap = monitor.bounds.overlap_area(rect);
        if overlap > 0 && best.is_none_or(|(_, area)| overlap > area) {
            best = Some((monitor, overlap));
        }
    }
    if let Some((monitor, _)) = best {
        return Some(monitor);
    }

    monitors
        .iter()
        .enumerate()
        .min_by_key(|(index, m)| (m.bounds.distance_sq(rect), *index))
        .map(|(_, m)| m)
}

/// Resolves against a fixed monitor list. The platform layer builds one of
/// these from a fresh enumeration for every request.
impl WorkAreaResolver for [MonitorArea] {
    fn working_area(&self, rect: &ScreenRect) -> Result<ScreenRect, PlatformQueryError> {
        pick_monitor(rect, self)
            .map(|m| m.work)
            .ok_or(PlatformQueryError::NoMonitors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_monitors() -> Vec<MonitorArea> {
        vec![
            MonitorArea {
                bounds: ScreenRect::from_size(0, 0, 1920, 1080),
                work: ScreenRect::from_size(0, 0, 1920, 1040),
            },
            MonitorArea {
                bounds: ScreenRect::from_size(1920, 0, 2560, 1440),
                work: ScreenRect::from_size(1920, 0, 2560, 1400),
            },
        ]
    }

    #[test]
    fn most_overlap_wins() {
        let monitors = dual_monitors();
        let straddling = ScreenRect::from_size(1900, 500, 100, 10);
        assert_eq!(
            monitors.working_area(&straddling),
            Ok(ScreenRect::from_size(1920, 0, 2560, 1400))
        );
    }

    #[test]
    fn nearest_when_off_screen() {
        let monitors = dual_monitors();
        let below_first = ScreenRect::point(100, 1200);
        assert_eq!(pick_monitor(&below_first, &monitors), Some(&monitors[0]));

        let right_of_second = ScreenRect::point(5000, 100);
        assert_eq!(pick_monitor(&right_of_second, &monitors), Some(&monitors[1]));
    }

    #[test]
    fn no_monitors_is_an_error() {
        let monitors: Vec<MonitorArea> = Vec::new();
        assert_eq!(
            monitors.working_area(&ScreenRect::point(0, 0)),
            Err(PlatformQueryError::NoMonitors)
        );
    }
}
