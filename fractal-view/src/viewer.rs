//! Interactive fractal tree viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns a live [`Fractal`] and acts as
//! its renderer: every frame the per-level instance buffers are captured,
//! projected orthographically and painted as shaded discs.

use std::f32::consts::PI;

use eframe::App;
use fractal_core::{
    DrawRequest, ExecutionStrategy, Fractal, FractalConfig, MeshKind, Renderer, RootTransform,
    ShadingParams,
};
use glam::{Quat, Vec2, Vec3};
use rand::{SeedableRng, rngs::StdRng};

/// Pixels per world unit at zoom 1.
const PIXELS_PER_UNIT: f32 = 120.0;

/// Startup settings for a [`Viewer`].
#[derive(Clone, Debug)]
pub struct ViewerOptions {
    pub config: FractalConfig,
    pub seed: u64,
    pub strategy: ExecutionStrategy,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            config: FractalConfig::default(),
            seed: 0,
            strategy: ExecutionStrategy::Parallel,
        }
    }
}

/// One level's instances as captured from a [`DrawRequest`].
#[derive(Debug, Default)]
pub struct CapturedLevel {
    pub mesh: Option<MeshKind>,
    pub shading: Option<ShadingParams>,
    /// World position and uniform scale of every instance.
    pub instances: Vec<(Vec3, f32)>,
}

/// Software stand-in for the instanced GPU draw: keeps the most recent
/// frame's instances so they can be painted with egui.
#[derive(Debug, Default)]
pub struct FrameCapture {
    pub levels: Vec<CapturedLevel>,
}

impl FrameCapture {
    pub fn instance_count(&self) -> usize {
        self.levels.iter().map(|l| l.instances.len()).sum()
    }
}

impl Renderer for FrameCapture {
    fn draw_instanced(&mut self, request: DrawRequest<'_>) {
        if request.level == 0 {
            self.levels.clear();
        }
        let instances = request
            .transforms
            .iter()
            .map(|t| (t.translation(), t.basis().y_axis.length()))
            .collect();
        self.levels.push(CapturedLevel {
            mesh: Some(request.mesh),
            shading: Some(request.shading),
            instances,
        });
    }
}

/// Main application state for the interactive viewer.
///
/// ### Fields
/// - `fractal` - The live tree; its frames are driven from [`Viewer::step_once`].
/// - `cfg` - Configuration being edited in the side panel; applied with
///   [`Viewer::apply_config`].
/// - `rng` - Seeded generator for construction-time draws.
/// - `root` - World transform of the tree's root.
/// - `frame` - Instances of the most recent frame.
///
/// - `running` - Whether frames advance automatically.
/// - `time_scale` - Multiplier applied to the wall-clock frame time.
/// - `zoom`, `pan`, `yaw` - Camera.
///
/// - `last_dt` - Simulated time of the last step (for display only).
/// - `last_error` - Message of the last failed lifecycle call.
pub struct Viewer {
    fractal: Fractal,
    cfg: FractalConfig,
    rng: StdRng,
    root: RootTransform,
    frame: FrameCapture,

    running: bool,
    time_scale: f32,
    zoom: f32,
    pan: egui::Vec2,
    yaw: f32,

    last_dt: f32,
    last_error: Option<String>,
}

impl Viewer {
    /// Creates a viewer with an active fractal built from `options`.
    ///
    /// ### Errors
    /// Any error from building the scheduler or activating the fractal.
    pub fn new(options: ViewerOptions) -> fractal_core::Result<Self> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut fractal = Fractal::new(options.strategy)?;
        fractal.activate(options.config.clone(), &mut rng)?;

        let mut viewer = Self {
            fractal,
            cfg: options.config,
            rng,
            root: RootTransform {
                position: Vec3::new(0.0, -1.0, 0.0),
                ..RootTransform::default()
            },
            frame: FrameCapture::default(),
            running: true,
            time_scale: 1.0,
            zoom: 1.0,
            pan: egui::vec2(0.0, 0.0),
            yaw: 0.0,
            last_dt: 0.0,
            last_error: None,
        };
        viewer.step_once(0.0);
        Ok(viewer)
    }

    /// Advances the fractal by `dt` seconds and captures the new frame.
    fn step_once(&mut self, dt: f32) {
        match self.fractal.frame_update(dt, &self.root, &mut self.frame) {
            Ok(()) => self.last_dt = dt,
            Err(e) => self.report(e),
        }
    }

    /// Rebuilds the fractal from the edited configuration.
    ///
    /// On failure the previous tree stays live and the error is kept for
    /// the status bar.
    fn apply_config(&mut self) {
        match self.fractal.reconfigure(self.cfg.clone(), &mut self.rng) {
            Ok(()) => {
                self.last_error = None;
                self.step_once(0.0);
            }
            Err(e) => self.report(e),
        }
    }

    /// Rebuilds the tree with fresh random draws from the live config and
    /// stops auto-running.
    fn reset(&mut self) {
        if let Some(cfg) = self.fractal.config().cloned() {
            self.cfg = cfg;
        }
        self.apply_config();
        self.running = false;
    }

    fn report(&mut self, e: fractal_core::FractalError) {
        tracing::error!(error = %e, "fractal update failed");
        self.last_error = Some(e.to_string());
    }

    /// Orthographic projection of a world position after rotating the
    /// view by `yaw` around the vertical axis. Returns the 2D position and
    /// the depth (larger is closer to the viewer).
    fn project(&self, p: Vec3) -> (Vec2, f32) {
        let v = Quat::from_rotation_y(-self.yaw) * p;
        (Vec2::new(v.x, v.y), v.z)
    }

    /// Converts a projected position to screen-space.
    ///
    /// The y-axis is flipped so that positive y goes up.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        let s = self.zoom * PIXELS_PER_UNIT;
        egui::pos2(
            center.x + p.x * s + self.pan.x,
            center.y - p.y * s + self.pan.y,
        )
    }

    /// Inverse of [`Viewer::world_to_screen`].
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let s = self.zoom * PIXELS_PER_UNIT;
        let x = (p.x - center.x - self.pan.x) / s;
        let y = (center.y - p.y + self.pan.y) / s;
        Vec2::new(x, y)
    }

    /// Helper to draw a labeled `usize` [`egui::DragValue`].
    fn labeled_drag_usize(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut usize,
        range: std::ops::RangeInclusive<usize>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Helper to draw a labeled `f32` [`egui::DragValue`].
    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (run controls, stepping, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                ui.add(
                    egui::DragValue::new(&mut self.time_scale)
                        .prefix("time scale = ")
                        .range(0.0..=10.0)
                        .speed(0.05),
                );

                if ui.button("Step").clicked() {
                    self.step_once(self.time_scale / 60.0);
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 0.1..=10.0).text("Zoom"));
                ui.add(egui::Slider::new(&mut self.yaw, -PI..=PI).text("Yaw"));
            });
        });
    }

    /// Builds the bottom status bar (frame time, instance count, errors).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("dt last = {:.4} s", self.last_dt));
                ui.separator();
                ui.label(format!("instances = {}", self.frame.instance_count()));
                if let Some(table) = self.fractal.table() {
                    ui.label(format!("depth = {}", table.depth()));
                }
                if let Some(err) = &self.last_error {
                    ui.separator();
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                }
            });
        });
    }

    /// Builds the right-hand configuration panel.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Config");

                ui.separator();
                Self::labeled_drag_usize(ui, "depth:", &mut self.cfg.depth, 1..=10, 0.05);

                ui.separator();
                ui.label("Sag angle (deg)");
                Self::labeled_drag_f32(ui, "low:", &mut self.cfg.sag_angle.low, 0.0..=90.0, 0.5);
                Self::labeled_drag_f32(ui, "high:", &mut self.cfg.sag_angle.high, 0.0..=90.0, 0.5);

                ui.separator();
                ui.label("Spin speed (deg/s)");
                Self::labeled_drag_f32(ui, "low:", &mut self.cfg.spin_speed.low, 0.0..=90.0, 0.5);
                Self::labeled_drag_f32(ui, "high:", &mut self.cfg.spin_speed.high, 0.0..=90.0, 0.5);
                Self::labeled_drag_f32(
                    ui,
                    "reverse chance:",
                    &mut self.cfg.reverse_spin_chance,
                    0.0..=1.0,
                    0.01,
                );

                ui.separator();
                ui.label("Root");
                Self::labeled_drag_f32(ui, "scale:", &mut self.root.scale, 0.05..=10.0, 0.01);

                ui.separator();
                if ui.button("Apply").clicked() {
                    self.apply_config();
                }
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = FractalConfig::default();
                }
            });
    }

    /// Builds the central panel where the captured frame is painted.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Secondary drag orbits, primary drag pans.
            if response.dragged_by(egui::PointerButton::Secondary) {
                self.yaw += response.drag_delta().x * 0.01;
            } else if response.dragged() {
                self.pan += response.drag_delta();
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let world_before = self.screen_to_world(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(0.1, 10.0);

                let screen_after = self.world_to_screen(world_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            // Far instances first so near ones paint over them.
            let mut discs = Vec::with_capacity(self.frame.instance_count());
            for level in &self.frame.levels {
                let shading = level.shading;
                for (i, &(pos, scale)) in level.instances.iter().enumerate() {
                    let (p, depth) = self.project(pos);
                    let rgba = shading.map_or([1.0; 4], |s| s.instance_color(i));
                    discs.push((depth, p, scale, rgba));
                }
            }
            discs.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (_, p, scale, rgba) in discs {
                let center = self.world_to_screen(p, rect);
                let r = (0.5 * scale * self.zoom * PIXELS_PER_UNIT).max(1.0);
                let [cr, cg, cb, _] = rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
                painter.circle_filled(center, r, egui::Color32::from_rgb(cr, cg, cb));
            }

            if self.running {
                let dt = ctx.input(|i| i.stable_dt);
                self.step_once(dt * self.time_scale);
                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}
