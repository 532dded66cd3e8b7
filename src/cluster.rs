// ============================================================================
// CLUSTER SHELL
// ============================================================================
//
// Binds telemetry channels to gauges, lays the gauges out in a fixed grid
// next to the sensor status panel and drives the window loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pixels::{Pixels, SurfaceTexture};
use rusttype::Font;
use serde::Deserialize;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::gauge::{Gauge, GaugeSpec};
use crate::raster::{render_scene, Canvas, Viewport};
use crate::scene::{Anchor, DrawCommand, Scene};
use crate::status::{self, SensorStatus};
use crate::svg;
use crate::telemetry::{FeedMode, MockTelemetry, Telemetry, TelemetryPoller, TelemetrySource};

/// Status panel row height in pixels.
const STATUS_ROW_HEIGHT: f64 = 20.0;

/// Telemetry field a gauge reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Channel {
    #[serde(rename = "speed_mps")]
    Speed,
    #[serde(rename = "disk_mb_s")]
    Disk,
    #[serde(rename = "pps_skew_us")]
    PpsSkew,
    #[serde(rename = "queue_pct")]
    Queue,
    #[serde(rename = "gnss_lock")]
    GnssLock,
    #[serde(rename = "temp_c")]
    Temperature,
}

impl Channel {
    pub fn read(self, t: &Telemetry) -> f64 {
        match self {
            Channel::Speed => t.speed_mps,
            Channel::Disk => t.disk_mb_s,
            Channel::PpsSkew => t.pps_skew_us,
            Channel::Queue => t.queue_pct,
            Channel::GnssLock => t.gnss_lock,
            Channel::Temperature => t.temp_c,
        }
    }
}

/// A gauge together with where its value comes from.
#[derive(Debug, Clone)]
pub struct GaugeBinding {
    pub title: String,
    pub channel: Channel,
    pub factor: f64,
    pub offset: f64,
    pub spec: GaugeSpec,
}

impl GaugeBinding {
    /// `raw * factor + offset`; NaN passes through to the engine.
    pub fn value(&self, t: &Telemetry) -> f64 {
        self.channel.read(t) * self.factor + self.offset
    }
}

/// One renderable region of the window.
#[derive(Debug, Clone)]
pub struct Layer {
    pub viewport: Viewport,
    pub scene: Scene,
}

struct Mounted {
    binding: GaugeBinding,
    gauge: Gauge,
}

/// The running dashboard.
pub struct Cluster {
    config: ClusterConfig,
    gauges: Vec<Mounted>,
    poller: TelemetryPoller,
    status: Vec<SensorStatus>,
    last_tick: Option<Instant>,
}

impl Cluster {
    /// Mount the configured gauges and take a first reading so needles
    /// start on their values.
    pub fn new(config: ClusterConfig, live: Option<Box<dyn TelemetrySource>>) -> Self {
        let mock = MockTelemetry::new(&config.mock);
        let mut poller = TelemetryPoller::new(live, mock, config.feed.poll_interval());
        poller.poll_due(Instant::now());
        let telemetry = poller.telemetry();

        let gauges = config
            .gauges
            .iter()
            .map(|binding| Mounted {
                gauge: Gauge::new(
                    binding.spec.clone(),
                    config.style,
                    config.spring,
                    binding.value(telemetry),
                ),
                binding: binding.clone(),
            })
            .collect();
        let status = status::effective_status(telemetry);
        log::info!("mounted {} gauge(s)", config.gauges.len());

        Self {
            config,
            gauges,
            poller,
            status,
            last_tick: None,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.poller.mode()
    }

    pub fn gauges(&self) -> impl Iterator<Item = &Gauge> {
        self.gauges.iter().map(|m| &m.gauge)
    }

    pub fn status(&self) -> &[SensorStatus] {
        &self.status
    }

    /// Poll when due, retarget the gauges and advance their needles by the
    /// time since the previous tick.
    pub fn tick(&mut self, now: Instant) {
        if self.poller.poll_due(now) {
            self.apply(self.poller.telemetry().clone());
        }
        let dt = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64());
        self.last_tick = Some(now);
        for mounted in &mut self.gauges {
            mounted.gauge.tick(dt);
        }
    }

    fn apply(&mut self, telemetry: Telemetry) {
        for mounted in &mut self.gauges {
            mounted.gauge.set_value(mounted.binding.value(&telemetry));
        }
        self.status = status::effective_status(&telemetry);
    }

    /// Pixel size of the whole window.
    pub fn window_size(&self) -> (usize, usize) {
        let window = &self.config.window;
        let columns = window.columns.max(1);
        let rows = self.gauges.len().div_ceil(columns).max(1);
        let status_height = (self.status.len() as f64 + 2.0) * STATUS_ROW_HEIGHT;
        let height = (rows * window.cell_size).max(status_height.ceil() as usize);
        (columns * window.cell_size + window.status_panel_width, height)
    }

    /// Scene of one gauge cell in dial-local units, title included.
    pub fn cell_scene(&self, index: usize) -> Option<Scene> {
        let mounted = self.gauges.get(index)?;
        let style = &self.config.style;
        let mut scene = mounted.gauge.scene();
        scene.add_command(DrawCommand::Text {
            x: 0.0,
            y: style.bezel_radius - style.label_font_size,
            text: mounted.binding.title.to_uppercase(),
            size: style.label_font_size,
            color: style.palette.tick,
            bold: true,
            anchor: Anchor::Middle,
        });
        Some(scene)
    }

    /// Every region of the frame: one dial per cell in a fixed grid, then
    /// the status panel with the LIVE/MOCK badge.
    pub fn scene(&self) -> Vec<Layer> {
        let window = &self.config.window;
        let columns = window.columns.max(1);
        let cell = window.cell_size as f64;

        let mut layers: Vec<Layer> = (0..self.gauges.len())
            .filter_map(|i| {
                let scene = self.cell_scene(i)?;
                let x = (i % columns) as f64 * cell;
                let y = (i / columns) as f64 * cell;
                Some(Layer {
                    viewport: Viewport::for_cell(x, y, cell),
                    scene,
                })
            })
            .collect();

        let palette = &self.config.style.palette;
        let panel_width = window.status_panel_width as f64;
        let mut panel = status::panel_scene(&self.status, palette, STATUS_ROW_HEIGHT);
        let mode = self.mode();
        panel.add_command(DrawCommand::Text {
            x: panel_width - 8.0,
            y: STATUS_ROW_HEIGHT / 2.0,
            text: mode.badge().to_string(),
            size: STATUS_ROW_HEIGHT * 0.5,
            color: match mode {
                FeedMode::Live => palette.good,
                FeedMode::Mock => palette.warn,
            },
            bold: true,
            anchor: Anchor::End,
        });
        layers.push(Layer {
            viewport: Viewport {
                cx: columns as f64 * cell,
                cy: 0.0,
                scale: 1.0,
            },
            scene: panel,
        });
        layers
    }

    pub fn render(&self, canvas: &mut Canvas, font: Option<&Font>) {
        canvas.clear(self.config.style.palette.background);
        for layer in self.scene() {
            render_scene(canvas, &layer.scene, &layer.viewport, font);
        }
    }

    /// Write one SVG per gauge into `dir`, named after the gauge title.
    pub fn snapshot_svg(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let size = self.config.window.cell_size as u32;
        let mut written = Vec::with_capacity(self.gauges.len());
        for (i, mounted) in self.gauges.iter().enumerate() {
            let Some(scene) = self.cell_scene(i) else {
                continue;
            };
            let path = dir.join(format!("{}.svg", slug(&mounted.binding.title)));
            std::fs::write(&path, svg::to_svg(&scene, size))?;
            log::debug!("wrote {}", path.display());
            written.push(path);
        }
        log::info!("wrote {} snapshot(s) to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Open the window and run until it is closed.
    pub fn run_window(mut self) -> Result<()> {
        let font = match &self.config.font_path {
            Some(path) => Some(load_font(path)?),
            None => {
                log::warn!("no font configured, text will not be drawn");
                None
            }
        };

        let (width, height) = self.window_size();
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(&self.config.window.title)
            .with_inner_size(LogicalSize::new(width as f64, height as f64))
            .with_resizable(false)
            .build(&event_loop)?;
        let window = Arc::new(window);

        // The frame is laid out in logical pixels; pixels scales it onto the
        // physical surface.
        let size = window.inner_size();
        log::debug!(
            "frame {}x{} on a {}x{} surface (scale factor {})",
            width,
            height,
            size.width,
            size.height,
            window.scale_factor()
        );
        let surface_texture = SurfaceTexture::new(size.width, size.height, &window);
        let mut pixels = Pixels::new(width as u32, height as u32, surface_texture)?;

        let framerate = self.config.window.max_framerate;
        let frame_duration = if framerate.is_finite() && framerate > 0.0 {
            Duration::from_secs_f64(1.0 / framerate)
        } else {
            Duration::from_secs_f64(1.0 / 60.0)
        };
        let mut last_frame = Instant::now();
        let window_clone = window.clone();

        event_loop.run(move |event, window_target| {
            window_target.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        log::info!("window closed");
                        window_target.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        if let Err(err) = pixels.resize_surface(new_size.width, new_size.height) {
                            log::warn!("resize failed: {}", err);
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        self.tick(Instant::now());
                        let mut canvas = Canvas::new(pixels.frame_mut(), width, height);
                        self.render(&mut canvas, font.as_ref());
                        if let Err(err) = pixels.render() {
                            log::error!("render failed: {}", err);
                            window_target.exit();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    if last_frame.elapsed() >= frame_duration {
                        window_clone.request_redraw();
                        last_frame = Instant::now();
                    }
                }
                _ => {}
            }
        })?;

        Ok(())
    }
}

/// Load a TrueType font from disk.
pub fn load_font(path: &Path) -> Result<Font<'static>> {
    let bytes = std::fs::read(path)?;
    Font::try_from_vec(bytes).ok_or_else(|| ClusterError::Font(path.display().to_string()))
}

fn slug(title: &str) -> String {
    let mut out = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "gauge".to_string()
    } else {
        trimmed.to_string()
    }
}
