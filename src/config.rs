use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::cluster::{Channel, GaugeBinding};
use crate::error::Result;
use crate::gauge::{GaugeSpec, Range, ValueFormat};
use crate::needle::SpringConfig;
use crate::scene::Color;

/// Palette shared by every dial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub bezel_fill: Color,
    pub bezel_stroke: Color,
    pub tick: Color,
    pub reference_tick: Color,
    pub hub_fill: Color,
    pub needle: Color,
    pub label: Color,
    pub good: Color,
    pub warn: Color,
    pub bad: Color,
    pub offline: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::new(0x02, 0x06, 0x17),
            bezel_fill: Color::new(0x0b, 0x12, 0x20),
            bezel_stroke: Color::new(0x1f, 0x29, 0x37),
            tick: Color::new(0x94, 0xa3, 0xb8),
            reference_tick: Color::new(0x64, 0x74, 0x8b),
            hub_fill: Color::new(0x11, 0x18, 0x27),
            needle: Color::new(0xe5, 0xe7, 0xeb),
            label: Color::new(0xe5, 0xe7, 0xeb),
            good: Color::new(0x22, 0xc5, 0x5e),
            warn: Color::new(0xf5, 0x9e, 0x0b),
            bad: Color::new(0xef, 0x44, 0x44),
            offline: Color::new(0x64, 0x74, 0x8b),
        }
    }
}

/// Dial geometry in local units. The SVG view box is 200 units wide, so the
/// defaults leave an 8 unit margin around the bezel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialStyle {
    pub bezel_radius: f64,
    pub bezel_stroke: f64,
    pub dial_radius: f64,
    pub band_width: f64,
    pub band_opacity: f64,
    pub tick_length: f64,
    pub tick_width: f64,
    pub label_inset: f64,
    pub label_font_size: f64,
    pub reference_tick_length: f64,
    pub hub_radius: f64,
    pub needle_length_factor: f64,
    pub needle_tail: f64,
    pub needle_half_width: f64,
    pub needle_cap_radius: f64,
    pub title_offset: f64,
    pub readout_offset: f64,
    pub text_font_size: f64,
    pub palette: Palette,
}

impl Default for DialStyle {
    fn default() -> Self {
        Self {
            bezel_radius: 92.0,
            bezel_stroke: 2.0,
            dial_radius: 78.0,
            band_width: 8.0,
            band_opacity: 0.25,
            tick_length: 10.0,
            tick_width: 2.0,
            label_inset: 18.0,
            label_font_size: 9.0,
            reference_tick_length: 8.0,
            hub_radius: 4.0,
            needle_length_factor: 0.7,
            needle_tail: 12.0,
            needle_half_width: 3.0,
            needle_cap_radius: 6.0,
            title_offset: 36.0,
            readout_offset: 52.0,
            text_font_size: 12.0,
            palette: Palette::default(),
        }
    }
}

impl DialStyle {
    pub fn needle_length(&self) -> f64 {
        self.dial_radius * self.needle_length_factor
    }
}

/// Configuration for application window
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub columns: usize,
    /// Pixel size of one gauge cell.
    pub cell_size: usize,
    pub status_panel_width: usize,
    pub max_framerate: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Cockpit".to_string(),
            columns: 3,
            cell_size: 240,
            status_panel_width: 240,
            max_framerate: 60.0,
        }
    }
}

/// Configuration for the live telemetry feed
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub poll_interval_ms: u64,
    /// A live feed with no good sample for this long counts as unavailable.
    /// HTTP requests are cut off after the same time.
    pub timeout_ms: u64,
    /// Endpoint polled for telemetry when no other live source is chosen.
    pub url: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            timeout_ms: 1500,
            url: None,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration for the synthetic generator
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MockConfig {
    pub seed: Option<u64>,
    /// Relative noise added on top of the sinusoids, 0 disables it.
    pub jitter: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            seed: None,
            jitter: 0.0,
        }
    }
}

/// Main configuration struct containing all cluster settings
#[derive(Debug, Clone, Builder)]
pub struct ClusterConfig {
    #[builder(default = default_gauges())]
    pub gauges: Vec<GaugeBinding>,
    #[builder(default)]
    pub window: WindowConfig,
    #[builder(default)]
    pub feed: FeedConfig,
    #[builder(default)]
    pub mock: MockConfig,
    #[builder(default)]
    pub style: DialStyle,
    #[builder(default)]
    pub spring: SpringConfig,
    /// Font used by the window renderer; without it text is not drawn.
    pub font_path: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClusterConfig {
    /// Load a TOML file. Sections that are absent keep their defaults; a
    /// gauge list, when present, replaces the default gauges.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!(
            "loaded {} gauge(s) from {}",
            config.gauges.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        let gauges = if file.gauge.is_empty() {
            default_gauges()
        } else {
            file.gauge.into_iter().map(GaugeFile::into_binding).collect()
        };
        Ok(Self::builder()
            .gauges(gauges)
            .window(file.window)
            .feed(file.feed)
            .mock(file.mock)
            .maybe_font_path(file.font)
            .build())
    }
}

// ============================================================================
// CONFIGURATION FILE (INTERNAL)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    font: Option<PathBuf>,
    window: WindowConfig,
    feed: FeedConfig,
    mock: MockConfig,
    gauge: Vec<GaugeFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GaugeFile {
    title: String,
    channel: Channel,
    #[serde(default = "one")]
    factor: f64,
    #[serde(default)]
    offset: f64,
    label: String,
    unit: Option<String>,
    min: f64,
    max: f64,
    pivot: Option<f64>,
    good: Option<Range>,
    warn: Option<Range>,
    bad: Option<Range>,
    span_deg: Option<f64>,
    ticks: Option<usize>,
    decimals: Option<usize>,
}

fn one() -> f64 {
    1.0
}

impl GaugeFile {
    fn into_binding(self) -> GaugeBinding {
        let format = match self.decimals {
            Some(decimals) => ValueFormat::Fixed(decimals),
            None => ValueFormat::Integer,
        };
        let spec = GaugeSpec::builder()
            .label(self.label)
            .maybe_unit(self.unit)
            .min(self.min)
            .max(self.max)
            .maybe_pivot(self.pivot)
            .maybe_good(self.good)
            .maybe_warn(self.warn)
            .maybe_bad(self.bad)
            .maybe_span_deg(self.span_deg)
            .maybe_ticks(self.ticks)
            .format(format)
            .build();
        GaugeBinding {
            title: self.title,
            channel: self.channel,
            factor: self.factor,
            offset: self.offset,
            spec,
        }
    }
}

fn gauge(title: &str, channel: Channel, factor: f64, offset: f64, spec: GaugeSpec) -> GaugeBinding {
    GaugeBinding {
        title: title.to_string(),
        channel,
        factor,
        offset,
        spec,
    }
}

/// The six gauges of the cockpit.
pub fn default_gauges() -> Vec<GaugeBinding> {
    vec![
        gauge(
            "Speed",
            Channel::Speed,
            3.6,
            0.0,
            GaugeSpec::builder()
                .label("km/h")
                .min(0.0)
                .max(140.0)
                .pivot(80.0)
                .good(Range::new(50.0, 110.0))
                .warn(Range::new(30.0, 130.0))
                .bad(Range::new(0.0, 25.0))
                .build(),
        ),
        gauge(
            "Disk Throughput",
            Channel::Disk,
            1.0,
            0.0,
            GaugeSpec::builder()
                .label("MB/s")
                .min(0.0)
                .max(800.0)
                .pivot(400.0)
                .good(Range::new(250.0, 600.0))
                .warn(Range::new(150.0, 700.0))
                .bad(Range::new(0.0, 120.0))
                .build(),
        ),
        gauge(
            "PPS Skew",
            Channel::PpsSkew,
            1.0,
            0.0,
            GaugeSpec::builder()
                .label("µs")
                .min(0.0)
                .max(200.0)
                .pivot(0.0)
                .good(Range::new(0.0, 40.0))
                .warn(Range::new(40.0, 100.0))
                .bad(Range::new(100.0, 200.0))
                .build(),
        ),
        gauge(
            "Queues",
            Channel::Queue,
            1.0,
            0.0,
            GaugeSpec::builder()
                .label("%")
                .min(0.0)
                .max(100.0)
                .pivot(30.0)
                .good(Range::new(10.0, 60.0))
                .warn(Range::new(60.0, 80.0))
                .bad(Range::new(80.0, 100.0))
                .build(),
        ),
        gauge(
            "GNSS Lock",
            Channel::GnssLock,
            50.0,
            20.0,
            GaugeSpec::builder()
                .label("CN0")
                .min(20.0)
                .max(70.0)
                .pivot(55.0)
                .good(Range::new(45.0, 70.0))
                .warn(Range::new(35.0, 45.0))
                .bad(Range::new(20.0, 35.0))
                .build(),
        ),
        gauge(
            "Chassis Temp",
            Channel::Temperature,
            1.0,
            0.0,
            GaugeSpec::builder()
                .label("°C")
                .min(0.0)
                .max(100.0)
                .pivot(55.0)
                .good(Range::new(20.0, 70.0))
                .warn(Range::new(70.0, 85.0))
                .bad(Range::new(85.0, 100.0))
                .build(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cluster_has_six_gauges() {
        let config = ClusterConfig::default();
        assert_eq!(config.gauges.len(), 6);
        assert_eq!(config.feed.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.window.max_framerate, 60.0);
    }

    #[test]
    fn toml_replaces_gauges_and_keeps_other_defaults() {
        let text = r#"
            [feed]
            poll_interval_ms = 250
            url = "http://192.168.1.20:8080/telemetry"

            [[gauge]]
            title = "Boost"
            channel = "temp_c"
            label = "bar"
            min = 0
            max = 2.5
            good = { from = 0.5, to = 1.8 }
            ticks = 6
            decimals = 1
        "#;
        let config = ClusterConfig::from_toml(text).unwrap();
        assert_eq!(config.gauges.len(), 1);
        let boost = &config.gauges[0];
        assert_eq!(boost.channel, Channel::Temperature);
        assert_eq!(boost.factor, 1.0);
        assert_eq!(boost.spec.max, 2.5);
        assert_eq!(boost.spec.ticks, 6);
        assert_eq!(boost.spec.format, ValueFormat::Fixed(1));
        assert_eq!(config.feed.poll_interval_ms, 250);
        assert_eq!(config.feed.timeout_ms, 1500);
        assert_eq!(
            config.feed.url.as_deref(),
            Some("http://192.168.1.20:8080/telemetry")
        );
        assert_eq!(config.window.columns, 3);
    }

    #[test]
    fn empty_toml_gives_default_cluster() {
        let config = ClusterConfig::from_toml("").unwrap();
        assert_eq!(config.gauges.len(), 6);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ClusterConfig::from_toml("[window]\ncolour = 3\n").is_err());
    }
}
