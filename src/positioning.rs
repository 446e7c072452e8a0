//! Popup placement relative to the notify icon.
//!
//! All arithmetic happens in physical pixels; only the final point is
//! divided by the DPI scale. Every request re-queries the taskbar, the icon
//! and the monitor layout because any of them can change between clicks.

use tracing::debug;

use crate::compat::PositioningContext;
use crate::error::PlatformQueryError;
use crate::geometry::{DpiScale, LogicalPoint, ScreenRect};
use crate::notify_icon::{IconIdentity, NotifyIconLocator, is_in_flyout};
use crate::taskbar::{TaskbarAlignment, TaskbarInfo, TaskbarLocator};
use crate::work_area::WorkAreaResolver;

/// Size of the popup to place, in physical pixels, plus the scale used to
/// turn the result back into logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupRequest {
    pub width: f64,
    pub height: f64,
    pub dpi: DpiScale,
}

impl PopupRequest {
    /// A window already measured in physical pixels.
    pub fn physical(width: f64, height: f64, dpi: DpiScale) -> Self {
        Self { width, height, dpi }
    }

    /// A window sized in logical units.
    pub fn from_logical(width: f64, height: f64, dpi: DpiScale) -> Self {
        Self {
            width: width * dpi.x,
            height: height * dpi.y,
            dpi,
        }
    }
}

/// Physical-pixel gap kept around the popup on each axis.
fn scaled_offset(request: &PopupRequest, ctx: &PositioningContext) -> (f64, f64) {
    let offset = ctx.edge_offset();
    (offset * request.dpi.x, offset * request.dpi.y)
}

/// Top-left corner, in physical pixels, that anchors the popup to `icon`
/// before any work-area correction.
pub fn anchor_point(
    taskbar: &TaskbarInfo,
    icon: &ScreenRect,
    request: &PopupRequest,
    ctx: &PositioningContext,
) -> (f64, f64) {
    let tb = &taskbar.position;
    let in_flyout = is_in_flyout(icon, tb, ctx.version);
    let (center_x, center_y) = icon.center();
    let (off_x, off_y) = scaled_offset(request, ctx);
    let (w, h) = (request.width, request.height);

    // centred above the icon, used by the fly-out on every alignment except Top
    let above_icon = (center_x - w / 2.0, icon.top as f64 - h - off_y);

    match (taskbar.alignment, in_flyout) {
        (TaskbarAlignment::Bottom, false) => (center_x - w / 2.0, tb.top as f64 - h - off_y),
        (TaskbarAlignment::Top, false) => (center_x - w / 2.0, tb.bottom as f64 + off_y),
        (TaskbarAlignment::Top, true) => (center_x - w / 2.0, icon.bottom as f64 + off_y),
        (TaskbarAlignment::Left, false) => (tb.right as f64 + off_x, center_y - h / 2.0),
        (TaskbarAlignment::Right, false) => (tb.left as f64 - w - off_x, center_y - h / 2.0),
        (TaskbarAlignment::Bottom | TaskbarAlignment::Left | TaskbarAlignment::Right, true) => {
            above_icon
        }
    }
}

/// Pushes a physical top-left point back inside `work`, keeping the edge
/// offset as a margin. When the popup is larger than the working area the
/// left and top edges win.
pub fn clamp_to_work_area(
    (mut left, mut top): (f64, f64),
    work: &ScreenRect,
    request: &PopupRequest,
    ctx: &PositioningContext,
) -> (f64, f64) {
    let (off_x, off_y) = scaled_offset(request, ctx);

    if left + request.width + off_x > work.right as f64 {
        left = work.right as f64 - request.width - off_x;
    }
    if left < work.left as f64 {
        left = work.left as f64 + off_x;
    }

    if top + request.height + off_y > work.bottom as f64 {
        top = work.bottom as f64 - request.height - off_y;
    }
    if top < work.top as f64 {
        top = work.top as f64 + off_y;
    }

    (left, top)
}

fn to_logical((x, y): (f64, f64), dpi: DpiScale) -> LogicalPoint {
    LogicalPoint {
        x: x / dpi.x,
        y: y / dpi.y,
    }
}

/// Final logical position for a popup anchored to `icon`, or to the taskbar
/// corner when the icon rectangle is unknown.
pub fn place_popup(
    taskbar: &TaskbarInfo,
    icon: &ScreenRect,
    work: &ScreenRect,
    request: &PopupRequest,
    ctx: &PositioningContext,
) -> LogicalPoint {
    let anchor = anchor_point(taskbar, icon, request, ctx);
    let clamped = clamp_to_work_area(anchor, work, request, ctx);
    to_logical(clamped, request.dpi)
}

/// Bottom-right corner of `work`, for when positioning failed outright.
pub fn corner_placement(work: &ScreenRect, request: &PopupRequest, ctx: &PositioningContext) -> LogicalPoint {
    let (off_x, off_y) = scaled_offset(request, ctx);
    let corner = (
        work.right as f64 - request.width - off_x,
        work.bottom as f64 - request.height - off_y,
    );
    to_logical(clamp_to_work_area(corner, work, request, ctx), request.dpi)
}

/// Combines the taskbar, notify-icon and work-area collaborators into a
/// single popup position.
pub struct PopupPositioner<T, N, W> {
    taskbar: T,
    icons: N,
    work_areas: W,
}

impl<T, N, W> PopupPositioner<T, N, W>
where
    T: TaskbarLocator,
    N: NotifyIconLocator,
    W: WorkAreaResolver,
{
    pub fn new(taskbar: T, icons: N, work_areas: W) -> Self {
        Self {
            taskbar,
            icons,
            work_areas,
        }
    }

    /// Rectangle the popup anchors to: the icon when it can be found, the
    /// taskbar corner otherwise.
    pub fn anchor_rect(&self, icon: &IconIdentity, taskbar: &TaskbarInfo) -> ScreenRect {
        match self.icons.notify_icon_rect(icon) {
            Some(rect) => rect.non_degenerate(),
            None => {
                let fallback = taskbar.fallback_anchor();
                debug!(?fallback, alignment = ?taskbar.alignment, "icon location unknown, using taskbar corner");
                fallback
            }
        }
    }

    pub fn compute_position(
        &self,
        icon: &IconIdentity,
        request: &PopupRequest,
        ctx: &PositioningContext,
    ) -> Result<LogicalPoint, PlatformQueryError> {
        let taskbar = self.taskbar.taskbar_info()?;
        let icon_rect = self.anchor_rect(icon, &taskbar);
        let work = self.work_areas.working_area(&icon_rect)?;

        let point = place_popup(&taskbar, &icon_rect, &work, request, ctx);
        debug!(?taskbar, ?icon_rect, ?work, x = point.x, y = point.y, "popup placed");
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::compat::WindowsVersion;
    use crate::work_area::MonitorArea;

    struct FixedTaskbar(Result<TaskbarInfo, PlatformQueryError>);

    impl TaskbarLocator for FixedTaskbar {
        fn taskbar_info(&self) -> Result<TaskbarInfo, PlatformQueryError> {
            self.0.clone()
        }
    }

    struct FixedIcon {
        rect: Option<ScreenRect>,
        queries: Cell<usize>,
    }

    impl FixedIcon {
        fn new(rect: Option<ScreenRect>) -> Self {
            Self {
                rect,
                queries: Cell::new(0),
            }
        }
    }

    impl NotifyIconLocator for FixedIcon {
        fn notify_icon_rect(&self, _icon: &IconIdentity) -> Option<ScreenRect> {
            self.queries.set(self.queries.get() + 1);
            self.rect
        }
    }

    struct FixedWorkArea(ScreenRect);

    impl WorkAreaResolver for FixedWorkArea {
        fn working_area(&self, _rect: &ScreenRect) -> Result<ScreenRect, PlatformQueryError> {
            Ok(self.0)
        }
    }

    const ICON: IconIdentity = IconIdentity { owner: 42, id: 1 };

    const MODERN: PositioningContext = PositioningContext {
        version: WindowsVersion::Modern,
        composition_enabled: true,
    };

    const FLAT: PositioningContext = PositioningContext {
        version: WindowsVersion::Modern,
        composition_enabled: false,
    };

    fn taskbar(alignment: TaskbarAlignment) -> TaskbarInfo {
        let position = match alignment {
            TaskbarAlignment::Bottom => ScreenRect::from_size(0, 1040, 1920, 40),
            TaskbarAlignment::Top => ScreenRect::from_size(0, 0, 1920, 40),
            TaskbarAlignment::Left => ScreenRect::from_size(0, 0, 40, 1080),
            TaskbarAlignment::Right => ScreenRect::from_size(1880, 0, 40, 1080),
        };
        TaskbarInfo { position, alignment }
    }

    fn work_area(alignment: TaskbarAlignment) -> ScreenRect {
        match alignment {
            TaskbarAlignment::Bottom => ScreenRect::from_size(0, 0, 1920, 1040),
            TaskbarAlignment::Top => ScreenRect::from_size(0, 40, 1920, 1040),
            TaskbarAlignment::Left => ScreenRect::from_size(40, 0, 1880, 1080),
            TaskbarAlignment::Right => ScreenRect::from_size(0, 0, 1880, 1080),
        }
    }

    fn positioner(
        alignment: TaskbarAlignment,
        icon: Option<ScreenRect>,
    ) -> PopupPositioner<FixedTaskbar, FixedIcon, FixedWorkArea> {
        PopupPositioner::new(
            FixedTaskbar(Ok(taskbar(alignment))),
            FixedIcon::new(icon),
            FixedWorkArea(work_area(alignment)),
        )
    }

    fn assert_inside(point: LogicalPoint, request: &PopupRequest, work: &ScreenRect) {
        let left = point.x * request.dpi.x;
        let top = point.y * request.dpi.y;
        assert!(left >= work.left as f64, "left {left} outside {work:?}");
        assert!(top >= work.top as f64, "top {top} outside {work:?}");
        assert!(left + request.width <= work.right as f64, "right edge outside {work:?}");
        assert!(top + request.height <= work.bottom as f64, "bottom edge outside {work:?}");
    }

    #[test]
    fn bottom_taskbar_scenario() {
        let tb = taskbar(TaskbarAlignment::Bottom);
        let icon = ScreenRect::from_size(1890, 1050, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);

        // centred on x = 1898, resting on the taskbar
        assert_eq!(anchor_point(&tb, &icon, &request, &FLAT), (1748.0, 840.0));

        // 1748 + 300 runs past the right edge of the 1920 wide work area
        let point = place_popup(&tb, &icon, &work_area(TaskbarAlignment::Bottom), &request, &FLAT);
        assert_eq!(point, LogicalPoint { x: 1620.0, y: 840.0 });

        let point = place_popup(&tb, &icon, &work_area(TaskbarAlignment::Bottom), &request, &MODERN);
        assert_eq!(point, LogicalPoint { x: 1612.0, y: 832.0 });
    }

    #[test]
    fn centred_placement_when_room_allows() {
        let tb = taskbar(TaskbarAlignment::Bottom);
        let icon = ScreenRect::from_size(992, 1052, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        let point = place_popup(&tb, &icon, &work_area(TaskbarAlignment::Bottom), &request, &MODERN);
        assert_eq!(point, LogicalPoint { x: 850.0, y: 832.0 });
    }

    #[test]
    fn top_taskbar_places_below() {
        let tb = taskbar(TaskbarAlignment::Top);
        let icon = ScreenRect::from_size(992, 12, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        let point = place_popup(&tb, &icon, &work_area(TaskbarAlignment::Top), &request, &MODERN);
        assert_eq!(point, LogicalPoint { x: 850.0, y: 48.0 });
    }

    #[test]
    fn side_taskbars_centre_vertically() {
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);

        let left = taskbar(TaskbarAlignment::Left);
        let icon = ScreenRect::from_size(12, 492, 16, 16);
        let point = place_popup(&left, &icon, &work_area(TaskbarAlignment::Left), &request, &MODERN);
        assert_eq!(point, LogicalPoint { x: 48.0, y: 400.0 });

        let right = taskbar(TaskbarAlignment::Right);
        let icon = ScreenRect::from_size(1892, 492, 16, 16);
        let point = place_popup(&right, &icon, &work_area(TaskbarAlignment::Right), &request, &MODERN);
        assert_eq!(point, LogicalPoint { x: 1572.0, y: 400.0 });
    }

    #[test]
    fn flyout_icon_on_side_taskbar_sits_above_icon() {
        let right = taskbar(TaskbarAlignment::Right);
        // overflow panel opened to the left of the right-hand taskbar
        let icon = ScreenRect::from_size(1700, 900, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);

        let anchor = anchor_point(&right, &icon, &request, &MODERN);
        assert_eq!(anchor, (1558.0, 692.0));
    }

    #[test]
    fn flyout_icon_on_top_taskbar_hangs_below_icon() {
        let top = taskbar(TaskbarAlignment::Top);
        // overflow panel dropped down beneath the taskbar
        let icon = ScreenRect::from_size(1000, 100, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);

        assert_eq!(anchor_point(&top, &icon, &request, &MODERN), (858.0, 124.0));
        assert_eq!(anchor_point(&top, &icon, &request, &FLAT), (858.0, 116.0));
    }

    #[test]
    fn flyout_icon_on_left_taskbar_sits_above_icon() {
        let left = taskbar(TaskbarAlignment::Left);
        let icon = ScreenRect::from_size(200, 900, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);

        assert_eq!(anchor_point(&left, &icon, &request, &MODERN), (58.0, 692.0));
    }

    #[test]
    fn left_overflow_snaps_to_work_area_plus_offset() {
        let work = work_area(TaskbarAlignment::Left);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        assert_eq!(clamp_to_work_area((-50.0, 300.0), &work, &request, &MODERN), (48.0, 300.0));
        assert_eq!(clamp_to_work_area((-50.0, 300.0), &work, &request, &FLAT), (40.0, 300.0));

        // the margin scales with DPI
        let scaled = PopupRequest::physical(300.0, 200.0, DpiScale::uniform(2.0));
        assert_eq!(clamp_to_work_area((-50.0, 300.0), &work, &scaled, &MODERN), (56.0, 300.0));
    }

    #[test]
    fn flyout_icon_on_bottom_taskbar_uses_icon_top() {
        let tb = taskbar(TaskbarAlignment::Bottom);
        let icon = ScreenRect::from_size(1000, 900, 16, 16);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        assert_eq!(anchor_point(&tb, &icon, &request, &FLAT), (858.0, 700.0));

        // without fly-out support the taskbar edge is used instead
        let vista = PositioningContext {
            version: WindowsVersion::Vista,
            composition_enabled: false,
        };
        assert_eq!(anchor_point(&tb, &icon, &request, &vista), (858.0, 840.0));
    }

    #[test]
    fn every_alignment_stays_inside_work_area() {
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        let alignments = [
            TaskbarAlignment::Bottom,
            TaskbarAlignment::Top,
            TaskbarAlignment::Left,
            TaskbarAlignment::Right,
        ];

        for alignment in alignments {
            let tb = taskbar(alignment);
            let work = work_area(alignment);
            let corners = [
                tb.position.left,
                tb.position.right - 16,
            ];
            for x in corners {
                for y in [tb.position.top, tb.position.bottom - 16] {
                    let icon = ScreenRect::from_size(x, y, 16, 16);
                    let point = place_popup(&tb, &icon, &work, &request, &MODERN);
                    assert_inside(point, &request, &work);
                }
            }
        }
    }

    #[test]
    fn unknown_icon_falls_back_to_taskbar_corner() {
        let p = positioner(TaskbarAlignment::Right, None);
        let tb = taskbar(TaskbarAlignment::Right);
        assert_eq!(p.anchor_rect(&ICON, &tb), ScreenRect::from_size(1919, 1079, 1, 1));

        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        let point = p.compute_position(&ICON, &request, &MODERN).unwrap();
        assert_inside(point, &request, &work_area(TaskbarAlignment::Right));
        assert_eq!(point, LogicalPoint { x: 1572.0, y: 872.0 });
    }

    #[test]
    fn degenerate_icon_treated_as_point() {
        let p = positioner(TaskbarAlignment::Bottom, Some(ScreenRect::from_size(1000, 1050, 0, 0)));
        let tb = taskbar(TaskbarAlignment::Bottom);
        assert_eq!(p.anchor_rect(&ICON, &tb), ScreenRect::point(1000, 1050));
    }

    #[test]
    fn repeated_requests_requery_and_agree() {
        let p = positioner(TaskbarAlignment::Bottom, Some(ScreenRect::from_size(992, 1052, 16, 16)));
        let request = PopupRequest::from_logical(300.0, 200.0, DpiScale::uniform(1.25));

        let first = p.compute_position(&ICON, &request, &MODERN).unwrap();
        let second = p.compute_position(&ICON, &request, &MODERN).unwrap();
        assert_eq!(first, second);
        assert_eq!(p.icons.queries.get(), 2);
    }

    #[test]
    fn doubling_dpi_halves_logical_point() {
        let p = positioner(TaskbarAlignment::Bottom, Some(ScreenRect::from_size(992, 1052, 16, 16)));
        let single = PopupRequest::physical(300.0, 200.0, DpiScale::uniform(1.0));
        let double = PopupRequest::physical(300.0, 200.0, DpiScale::uniform(2.0));

        let a = p.compute_position(&ICON, &single, &FLAT).unwrap();
        let b = p.compute_position(&ICON, &double, &FLAT).unwrap();
        assert_eq!(b.x * 2.0, a.x);
        assert_eq!(b.y * 2.0, a.y);
    }

    #[test]
    fn taskbar_failure_propagates() {
        let p = PopupPositioner::new(
            FixedTaskbar(Err(PlatformQueryError::TaskbarUnavailable)),
            FixedIcon::new(None),
            FixedWorkArea(work_area(TaskbarAlignment::Bottom)),
        );
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        assert_eq!(
            p.compute_position(&ICON, &request, &MODERN),
            Err(PlatformQueryError::TaskbarUnavailable)
        );
    }

    #[test]
    fn resolves_monitor_from_icon_rect() {
        let monitors = vec![
            MonitorArea {
                bounds: ScreenRect::from_size(-1920, 0, 1920, 1080),
                work: ScreenRect::from_size(-1920, 0, 1920, 1080),
            },
            MonitorArea {
                bounds: ScreenRect::from_size(0, 0, 1920, 1080),
                work: ScreenRect::from_size(0, 0, 1920, 1040),
            },
        ];
        let p = PopupPositioner::new(
            FixedTaskbar(Ok(taskbar(TaskbarAlignment::Bottom))),
            FixedIcon::new(Some(ScreenRect::from_size(1890, 1050, 16, 16))),
            monitors.as_slice(),
        );
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::IDENTITY);
        let point = p.compute_position(&ICON, &request, &FLAT).unwrap();
        assert_eq!(point, LogicalPoint { x: 1620.0, y: 840.0 });
    }

    #[test]
    fn overtall_popup_keeps_top_visible() {
        let tb = taskbar(TaskbarAlignment::Bottom);
        let icon = ScreenRect::from_size(992, 1052, 16, 16);
        let request = PopupRequest::physical(300.0, 1200.0, DpiScale::IDENTITY);
        let point = place_popup(&tb, &icon, &work_area(TaskbarAlignment::Bottom), &request, &MODERN);
        assert_eq!(point.y, 8.0);
    }

    #[test]
    fn corner_placement_hugs_bottom_right() {
        let work = ScreenRect::from_size(0, 0, 1920, 1040);
        let request = PopupRequest::physical(300.0, 200.0, DpiScale::uniform(2.0));
        let point = corner_placement(&work, &request, &MODERN);
        assert_eq!(point, LogicalPoint { x: (1920.0 - 300.0 - 16.0) / 2.0, y: (1040.0 - 200.0 - 16.0) / 2.0 });
    }
}
