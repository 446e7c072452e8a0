#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
#![cfg_attr(not(windows), allow(dead_code))]

mod brightness;
mod click_guard;
mod compat;
mod config;
mod error;
mod geometry;
mod notify_icon;
#[cfg(windows)]
mod os;
mod platform;
mod positioning;
mod taskbar;
#[cfg(windows)]
mod ui;
mod work_area;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "info";

/// RUST_LOG wins over the configured level; a bad directive falls back to
/// the default rather than failing startup.
fn init_logging(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config() -> AppConfig {
    let loaded = AppConfig::load();
    init_logging(loaded.as_ref().ok().and_then(|c| c.log_level.as_deref()));

    loaded.unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        AppConfig::default()
    })
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    let _config = load_config();
    anyhow::bail!("brightness-tray needs the Windows shell")
}

#[cfg(windows)]
pub use app::{brightness_changed, enter_sleep, popup_deactivated, power_off_display};

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run(load_config())
}

#[cfg(windows)]
mod app {
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::{Mutex, OnceLock};

    use anyhow::anyhow;
    use eframe::egui;
    use raw_window_handle::HasWindowHandle;
    use tracing::{debug, error, info, warn};

    use crate::brightness::Brightness;
    use crate::click_guard::ClickToHideGuard;
    use crate::compat::WindowsVersion;
    use crate::config::AppConfig;
    use crate::notify_icon::{IconIdentity, NotifyIconLocator};
    use crate::os::{PlatformPower, PlatformWindow, PowerControl, WindowController};
    use crate::platform::windows::{
        ContextMenu, MenuCommand, NotifyIconHost, TrayEvent, WinNotifyIconLocator, WinPositioner,
        cursor_position, is_notification_area_active, positioner, positioning_context,
        primary_work_area, windows_version,
    };
    use crate::geometry::{DpiScale, LogicalPoint};
    use crate::positioning::{PopupRequest, corner_placement};
    use crate::ui::{PopupUI, get_app_options};

    /// Everything needed to place the popup, fixed at startup.
    struct Shell {
        version: WindowsVersion,
        icon: IconIdentity,
        positioner: WinPositioner,
        icons: WinNotifyIconLocator,
        popup_size: (f32, f32),
    }

    static SHELL: OnceLock<Shell> = OnceLock::new();
    static TRAY: OnceLock<NotifyIconHost> = OnceLock::new();
    static POWER: OnceLock<PlatformPower> = OnceLock::new();
    static WINDOW: OnceLock<PlatformWindow> = OnceLock::new();
    static EGUI_CTX: OnceLock<egui::Context> = OnceLock::new();
    static GUARD: Mutex<ClickToHideGuard> = Mutex::new(ClickToHideGuard::new());
    /// Stored until the first reading arrives.
    const UNKNOWN_BRIGHTNESS: u8 = u8::MAX;
    static BRIGHTNESS: AtomicU8 = AtomicU8::new(UNKNOWN_BRIGHTNESS);

    fn on_tray_event(event: TrayEvent) {
        match event {
            TrayEvent::LeftClick => {
                let cursor = cursor_position();
                if GUARD.lock().unwrap().should_open(cursor) {
                    show_popup();
                } else {
                    debug!(?cursor, "click closed the popup, not reopening");
                }
            }
            TrayEvent::RightClick => show_menu(),
            TrayEvent::LayoutChanged => follow_layout(),
        }
    }

    /// Where the popup belongs right now, falling back to the corner of the
    /// primary work area when the icon cannot be placed against.
    fn placement(shell: &Shell, window: &PlatformWindow) -> Option<(LogicalPoint, DpiScale)> {
        let dpi = window.dpi();
        let request = match window.outer_size() {
            Some((width, height)) => PopupRequest::physical(width, height, dpi),
            None => {
                let (width, height) = shell.popup_size;
                PopupRequest::from_logical(width as f64, height as f64, dpi)
            }
        };
        let ctx = positioning_context(shell.version);

        let point = match shell.positioner.compute_position(&shell.icon, &request, &ctx) {
            Ok(point) => point,
            Err(e) => {
                warn!("popup placement failed, using the primary work area: {e}");
                match primary_work_area() {
                    Ok(work) => corner_placement(&work, &request, &ctx),
                    Err(e) => {
                        error!("no work area to place the popup in: {e}");
                        return None;
                    }
                }
            }
        };
        Some((point, dpi))
    }

    fn show_popup() {
        let (Some(shell), Some(window)) = (SHELL.get(), WINDOW.get()) else {
            return;
        };
        let Some((point, dpi)) = placement(shell, window) else {
            return;
        };

        window.show_at(point, dpi);
        if let Some(ctx) = EGUI_CTX.get() {
            ctx.request_repaint();
        }
    }

    /// Keeps an open popup against the taskbar after the taskbar moved or
    /// the display changed. Focus stays where it is.
    fn follow_layout() {
        let (Some(shell), Some(window)) = (SHELL.get(), WINDOW.get()) else {
            return;
        };
        if !window.is_visible() {
            return;
        }
        if let Some((point, dpi)) = placement(shell, window) {
            debug!(?point, "layout changed, moving the popup");
            window.move_to(point, dpi);
        }
    }

    fn show_menu() {
        let (Some(tray), Some(power)) = (TRAY.get(), POWER.get()) else {
            return;
        };
        let menu = ContextMenu {
            label: brightness_label(),
            keep_awake: power.keep_awake(),
        };

        match tray.show_context_menu(&menu) {
            Some(MenuCommand::MonitorOff) => power_off_display(),
            Some(MenuCommand::Sleep) => enter_sleep(),
            Some(MenuCommand::KeepAwake) => {
                let enabled = !power.keep_awake();
                match power.set_keep_awake(enabled) {
                    Ok(()) => {
                        info!(enabled, "keep awake toggled");
                        remember_keep_awake(enabled);
                    }
                    Err(e) => warn!("failed to change keep awake: {e:#}"),
                }
            }
            Some(MenuCommand::Close) => {
                info!("closing");
                tray.remove();
                // the event loop may be parked behind a hidden window
                std::process::exit(0);
            }
            None => {}
        }
    }

    /// The menu toggle carries over to the next launch.
    fn remember_keep_awake(enabled: bool) {
        if let Err(e) = AppConfig::update(|config| config.keep_awake_on_start = enabled) {
            warn!("keep awake not saved, config file left as is: {e}");
        }
    }

    fn current_brightness() -> Option<Brightness> {
        match BRIGHTNESS.load(Ordering::Relaxed) {
            UNKNOWN_BRIGHTNESS => None,
            percent => Brightness::try_from(percent as u32).ok(),
        }
    }

    fn brightness_label() -> String {
        current_brightness().map_or_else(|| "Brightness".to_string(), Brightness::tooltip)
    }

    pub fn brightness_changed(value: Brightness) {
        if BRIGHTNESS.swap(value.percent(), Ordering::Relaxed) != value.percent() {
            if let Some(tray) = TRAY.get() {
                tray.set_tooltip(&value.tooltip());
            }
        }
    }

    /// Hides the popup after it lost focus, remembering whether the click
    /// that caused it landed on our icon.
    pub fn popup_deactivated() {
        let Some(window) = WINDOW.get() else {
            return;
        };
        if !window.is_visible() {
            return;
        }

        let cursor = cursor_position();
        let over_icon = SHELL
            .get()
            .and_then(|shell| shell.icons.notify_icon_rect(&shell.icon))
            .is_some_and(|rect| rect.contains(cursor.0, cursor.1));
        let mut guard = GUARD.lock().unwrap();
        guard.record_hide(cursor, over_icon, is_notification_area_active());
        debug!(?cursor, armed = guard.is_armed(), "popup lost focus");
        drop(guard);
        window.hide();
    }

    pub fn power_off_display() {
        if let Some(window) = WINDOW.get() {
            window.hide();
        }
        if let Some(power) = POWER.get() {
            power.monitor_off();
        }
    }

    pub fn enter_sleep() {
        if let Some(window) = WINDOW.get() {
            window.hide();
        }
        if let Some(power) = POWER.get() {
            if let Err(e) = power.sleep() {
                warn!("failed to enter sleep: {e:#}");
            }
        }
    }

    pub fn run(config: AppConfig) -> anyhow::Result<()> {
        let version = windows_version();
        info!(?version, "starting");

        NotifyIconHost::set_event_handler(on_tray_event);
        let tray = NotifyIconHost::create(&brightness_label())?;

        let power = PlatformPower::new(tray.owner());
        if config.keep_awake_on_start {
            if let Err(e) = power.set_keep_awake(true) {
                warn!("failed to keep the display awake: {e:#}");
            }
        }

        let _ = SHELL.set(Shell {
            version,
            icon: tray.identity(),
            positioner: positioner(version),
            icons: WinNotifyIconLocator::new(version),
            popup_size: (config.popup_width, config.popup_height),
        });
        let _ = POWER.set(power);
        let _ = TRAY.set(tray);

        eframe::run_native(
            "Brightness Tray",
            get_app_options(&config),
            Box::new(move |cc| {
                let raw_handle = cc.window_handle()?.as_raw();
                let ctrl = PlatformWindow::from_raw_handle(raw_handle)
                    .ok_or("unsupported platform window handle")?;

                // tray-first: the popup only appears on an icon click
                ctrl.hide();
                let _ = WINDOW.set(ctrl);
                let _ = EGUI_CTX.set(cc.egui_ctx.clone());

                Ok(Box::new(PopupUI::new(&config, &cc.egui_ctx)))
            }),
        )
        .map_err(|e| anyhow!("event loop failed: {e}"))
    }
}
