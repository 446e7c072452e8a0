use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, Sender, channel},
    },
    time::Duration,
};

use eframe::egui;
use tracing::{debug, warn};

use crate::brightness::{Brightness, SliderState, WheelAccumulator};
use crate::config::AppConfig;
use crate::os::{BrightnessControl, PlatformBrightness};

/// How often the worker re-reads the display brightness when change events
/// are unavailable.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

enum BrightnessCmd {
    Set(Brightness),
}

fn publish(value: Brightness, tx_update: &Sender<Brightness>, ctx: &egui::Context) {
    crate::brightness_changed(value);
    let _ = tx_update.send(value);
    ctx.request_repaint();
}

/// Forwards brightness changes reported by the display (hotkeys, OS
/// settings). Runs on its own thread since the subscription blocks.
fn spawn_watcher(tx_update: Sender<Brightness>, ctx: egui::Context, watching: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let backend = match PlatformBrightness::new() {
            Ok(backend) => backend,
            Err(e) => {
                debug!("brightness events unavailable: {e:#}");
                return;
            }
        };

        watching.store(true, Ordering::Relaxed);
        let result = backend.watch(|value| publish(value, &tx_update, &ctx));
        watching.store(false, Ordering::Relaxed);

        if let Err(e) = result {
            debug!("brightness events stopped, polling instead: {e:#}");
        }
    });
}

/// Owns the brightness backend on its own thread. Sets are coalesced so a
/// fast slider drag only issues the latest value.
fn spawn_worker(rx_cmd: Receiver<BrightnessCmd>, tx_update: Sender<Brightness>, ctx: egui::Context) {
    let watching = Arc::new(AtomicBool::new(false));
    spawn_watcher(tx_update.clone(), ctx.clone(), watching.clone());

    std::thread::spawn(move || {
        let backend = match PlatformBrightness::new() {
            Ok(backend) => backend,
            Err(e) => {
                warn!("brightness control unavailable: {e:#}");
                return;
            }
        };

        let mut last_reported = None;
        let mut report = |value: Brightness| {
            if last_reported != Some(value) {
                last_reported = Some(value);
                publish(value, &tx_update, &ctx);
            }
        };

        match backend.brightness() {
            Ok(value) => report(value),
            Err(e) => warn!("failed to read brightness: {e:#}"),
        }

        loop {
            match rx_cmd.recv_timeout(POLL_INTERVAL) {
                Ok(BrightnessCmd::Set(mut value)) => {
                    while let Ok(BrightnessCmd::Set(newer)) = rx_cmd.try_recv() {
                        value = newer;
                    }
                    match backend.set_brightness(value) {
                        Ok(()) => debug!(%value, "brightness set"),
                        Err(e) => warn!(%value, "failed to set brightness: {e:#}"),
                    }
                }
                Err(RecvTimeoutError::Timeout) if watching.load(Ordering::Relaxed) => {}
                Err(RecvTimeoutError::Timeout) => match backend.brightness() {
                    Ok(value) => report(value),
                    Err(e) => debug!("brightness poll failed: {e:#}"),
                },
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}

pub struct PopupUI {
    slider: SliderState,
    wheel: WheelAccumulator,
    show_percentage_text: bool,
    scroll_step: u32,
    was_focused: bool,
    tx_cmd: Sender<BrightnessCmd>,
    rx_update: Receiver<Brightness>,
}

impl PopupUI {
    pub fn new(config: &AppConfig, ctx: &egui::Context) -> Self {
        let (tx_cmd, rx_cmd) = channel::<BrightnessCmd>();
        let (tx_update, rx_update) = channel::<Brightness>();
        spawn_worker(rx_cmd, tx_update, ctx.clone());

        Self {
            slider: SliderState::default(),
            wheel: WheelAccumulator::default(),
            show_percentage_text: config.show_percentage_text,
            scroll_step: config.scroll_step,
            was_focused: false,
            tx_cmd,
            rx_update,
        }
    }

    fn apply(&self, value: Brightness) {
        let _ = self.tx_cmd.send(BrightnessCmd::Set(value));
        crate::brightness_changed(value);
    }

    fn wheel_notches(&mut self, ctx: &egui::Context) -> i32 {
        let points_per_line = ctx.options(|o| o.input_options.line_scroll_speed);
        let delta = ctx.input(|i| i.raw_scroll_delta.y);
        self.wheel.push(delta, points_per_line)
    }

    /// Returns whether the slider is being dragged.
    fn build_ui(&mut self, ui: &mut egui::Ui, gained_focus: bool) -> bool {
        ui.horizontal(|ui| {
            ui.label("Brightness");
            if self.show_percentage_text {
                let text = self
                    .slider
                    .value()
                    .map_or_else(|| "--".to_string(), |value| value.to_string());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(text);
                });
            }
        });

        let ready = self.slider.is_ready();
        let mut value = self.slider.value().map_or(0, |b| b.percent() as u32);
        let slider = ui.add_enabled(ready, egui::Slider::new(&mut value, 0..=100).show_value(false));
        if gained_focus && ready {
            // arrow keys work straight away
            slider.request_focus();
        }
        if slider.changed() {
            if let Some(value) = Brightness::try_from(value).ok().and_then(|v| self.slider.set(v)) {
                self.apply(value);
            }
        }

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            if ui.link("Power off display").clicked() {
                crate::power_off_display();
            }
            if ui.link("Enter sleep mode").clicked() {
                crate::enter_sleep();
            }
        });

        slider.dragged()
    }
}

impl eframe::App for PopupUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let focused = ctx.input(|i| i.viewport().focused).unwrap_or(false);
        let gained_focus = focused && !self.was_focused;

        let notches = self.wheel_notches(ctx);
        if notches != 0 {
            if let Some(value) = self.slider.step(notches, self.scroll_step) {
                self.apply(value);
            }
        }

        let mut dragging = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            dragging = self.build_ui(ui, gained_focus);
        });

        while let Ok(update) = self.rx_update.try_recv() {
            self.slider.reading(update, dragging);
        }

        if self.was_focused && !focused {
            crate::popup_deactivated();
        }
        self.was_focused = focused;
    }
}

pub fn get_app_options(config: &AppConfig) -> eframe::NativeOptions {
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Brightness")
            .with_inner_size([config.popup_width, config.popup_height])
            .with_decorations(false)
            .with_resizable(false)
            .with_always_on_top()
            .with_taskbar(false),
        ..Default::default()
    }
}
