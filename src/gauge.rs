// ============================================================================
// GAUGE RENDERER
// ============================================================================
//
// A gauge owns its spec, the static face built from it and the needle
// state. Everything is emitted in dial-local units with the origin at the
// dial centre, so the needle always rotates about the visual centre.

use std::fmt;
use std::sync::Arc;

use bon::Builder;
use serde::Deserialize;

use crate::config::DialStyle;
use crate::needle::{NeedleState, SpringConfig};
use crate::scale::{self, AngularSpan, Band, BandSeverity, Mapper, Scale};
use crate::scene::{polar, Anchor, Color, DrawCommand, Scene};

/// Default number of major ticks.
pub const DEFAULT_TICKS: usize = 7;

/// Sub-range of a gauge as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Range {
    pub from: f64,
    pub to: f64,
}

impl Range {
    pub const fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    pub const fn band(self, severity: BandSeverity) -> Band {
        Band::new(self.from, self.to, severity)
    }
}

/// How numbers are turned into label text.
#[derive(Clone, Default)]
pub enum ValueFormat {
    /// Round to the nearest integer.
    #[default]
    Integer,
    /// Fixed number of decimals.
    Fixed(usize),
    Custom(Arc<dyn Fn(f64) -> String + Send + Sync>),
}

impl ValueFormat {
    pub fn custom(f: impl Fn(f64) -> String + Send + Sync + 'static) -> Self {
        ValueFormat::Custom(Arc::new(f))
    }

    /// Non-finite numbers always render as `--`.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return "--".to_string();
        }
        match self {
            ValueFormat::Integer => whole_number(value.round()),
            ValueFormat::Fixed(decimals) => format!("{:.*}", decimals, value),
            ValueFormat::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueFormat::Integer => f.write_str("Integer"),
            ValueFormat::Fixed(decimals) => f.debug_tuple("Fixed").field(decimals).finish(),
            ValueFormat::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for ValueFormat {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueFormat::Integer, ValueFormat::Integer) => true,
            (ValueFormat::Fixed(a), ValueFormat::Fixed(b)) => a == b,
            (ValueFormat::Custom(a), ValueFormat::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Print an already rounded number without a fraction. Magnitudes past the
/// integer types print in full and `-0` prints as `0`.
pub fn whole_number(rounded: f64) -> String {
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.0}", rounded)
}

/// Everything a gauge needs except the live value.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct GaugeSpec {
    #[builder(into)]
    pub label: String,
    #[builder(into)]
    pub unit: Option<String>,
    pub min: f64,
    pub max: f64,
    pub pivot: Option<f64>,
    pub good: Option<Range>,
    pub warn: Option<Range>,
    pub bad: Option<Range>,
    #[builder(default = scale::DEFAULT_SPAN_DEG)]
    pub span_deg: f64,
    #[builder(default = DEFAULT_TICKS)]
    pub ticks: usize,
    #[builder(default)]
    pub format: ValueFormat,
}

impl GaugeSpec {
    pub fn scale(&self) -> Scale {
        Scale {
            min: self.min,
            max: self.max,
            pivot: self.pivot,
        }
    }

    pub fn mapper(&self) -> Mapper {
        let good = self.good.map(|r| r.band(BandSeverity::Good));
        Mapper::new(
            self.scale(),
            AngularSpan::symmetric(self.span_deg),
            good.as_ref(),
        )
    }

    /// Bands in drawing order.
    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        [
            (self.good, BandSeverity::Good),
            (self.warn, BandSeverity::Warn),
            (self.bad, BandSeverity::Bad),
        ]
        .into_iter()
        .filter_map(|(range, severity)| range.map(|r| r.band(severity)))
    }

    /// Band severity of a reading, compared on raw values. A non-finite reading
    /// is judged at the mapper's rest value.
    pub fn status(&self, value: f64, mapper: &Mapper) -> BandSeverity {
        let value = if value.is_finite() {
            value
        } else {
            mapper.rest_value()
        };
        let outside = |range: Option<Range>, severity| {
            range.is_some_and(|r| r.band(severity).excludes(value))
        };
        if outside(self.bad, BandSeverity::Bad) {
            BandSeverity::Bad
        } else if outside(self.warn, BandSeverity::Warn) {
            BandSeverity::Warn
        } else {
            BandSeverity::Good
        }
    }
}

/// One major tick of the face.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub angle_deg: f64,
    pub value: f64,
    pub label: String,
}

/// Evenly spaced major ticks on the raw linear scale. Fewer than two, or a
/// degenerate scale, collapses to the two endpoints.
pub fn major_ticks(spec: &GaugeSpec) -> Vec<Tick> {
    let scale = spec.scale();
    let span = AngularSpan::symmetric(spec.span_deg);
    let count = if scale.is_degenerate() {
        2
    } else {
        spec.ticks.max(2)
    };
    (0..count)
        .map(|i| {
            let t = i as f64 / (count - 1) as f64;
            let value = scale.value_at(t);
            Tick {
                angle_deg: span.angle_at(t),
                value,
                label: spec.format.format(value),
            }
        })
        .collect()
}

fn severity_color(style: &DialStyle, severity: BandSeverity) -> Color {
    match severity {
        BandSeverity::Good => style.palette.good,
        BandSeverity::Warn => style.palette.warn,
        BandSeverity::Bad => style.palette.bad,
    }
}

/// Build the static face: bezel, bands, ticks, reference tick, hub, label.
pub fn build_face(spec: &GaugeSpec, mapper: &Mapper, style: &DialStyle) -> Scene {
    let mut scene = Scene::new();
    let palette = &style.palette;
    let r = style.dial_radius;

    scene.add_command(DrawCommand::Circle {
        cx: 0.0,
        cy: 0.0,
        r: style.bezel_radius,
        fill: Some(palette.bezel_fill),
        stroke: Some((palette.bezel_stroke, style.bezel_stroke)),
    });

    for band in spec.bands() {
        let scale::Arc { start_deg, end_deg } = scale::band_arc(&band, mapper);
        scene.add_command(DrawCommand::Wedge {
            start_deg,
            end_deg,
            outer_r: r,
            inner_r: r - style.band_width,
            color: severity_color(style, band.severity),
            opacity: style.band_opacity,
        });
    }

    for tick in major_ticks(spec) {
        let (x1, y1) = polar(tick.angle_deg, r);
        let (x2, y2) = polar(tick.angle_deg, r - style.tick_length);
        scene.add_command(DrawCommand::Line {
            x1,
            y1,
            x2,
            y2,
            color: palette.tick,
            width: style.tick_width,
        });
        let (x, y) = polar(tick.angle_deg, r - style.label_inset);
        scene.add_command(DrawCommand::Text {
            x,
            y,
            text: tick.label,
            size: style.label_font_size,
            color: palette.tick,
            bold: false,
            anchor: Anchor::Middle,
        });
    }

    scene.add_command(DrawCommand::Line {
        x1: 0.0,
        y1: -r,
        x2: 0.0,
        y2: -r + style.reference_tick_length,
        color: palette.reference_tick,
        width: style.tick_width,
    });

    scene.add_command(DrawCommand::Circle {
        cx: 0.0,
        cy: 0.0,
        r: style.hub_radius,
        fill: Some(palette.hub_fill),
        stroke: Some((palette.tick, 1.0)),
    });

    scene.add_command(DrawCommand::Text {
        x: 0.0,
        y: style.title_offset,
        text: spec.label.clone(),
        size: style.text_font_size,
        color: palette.label,
        bold: true,
        anchor: Anchor::Middle,
    });

    scene
}

/// A mounted gauge instance.
#[derive(Debug, Clone)]
pub struct Gauge {
    spec: GaugeSpec,
    style: DialStyle,
    spring: SpringConfig,
    mapper: Mapper,
    face: Scene,
    value: f64,
    needle: NeedleState,
}

impl Gauge {
    /// Mount a gauge. The needle starts on the angle of `value`.
    pub fn new(spec: GaugeSpec, style: DialStyle, spring: SpringConfig, value: f64) -> Self {
        let mapper = spec.mapper();
        let face = build_face(&spec, &mapper, &style);
        let needle = NeedleState::new(mapper.angle(value));
        Self {
            spec,
            style,
            spring,
            mapper,
            face,
            value,
            needle,
        }
    }

    pub fn with_defaults(spec: GaugeSpec, value: f64) -> Self {
        Self::new(spec, DialStyle::default(), SpringConfig::default(), value)
    }

    pub fn spec(&self) -> &GaugeSpec {
        &self.spec
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Replace the definition. The face is rebuilt only when it differs; the
    /// needle keeps its displayed angle and sweeps to the new target.
    pub fn set_spec(&mut self, spec: GaugeSpec) {
        if spec == self.spec {
            return;
        }
        self.mapper = spec.mapper();
        self.face = build_face(&spec, &self.mapper, &self.style);
        self.spec = spec;
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target_angle(&self) -> f64 {
        self.mapper.angle(self.value)
    }

    pub fn displayed_angle(&self) -> f64 {
        self.needle.displayed()
    }

    /// Advance the needle by one host frame.
    pub fn tick(&mut self, dt: f64) {
        let target = self.target_angle();
        self.needle.step(target, dt, &self.spring);
    }

    pub fn status(&self) -> BandSeverity {
        self.spec.status(self.value, &self.mapper)
    }

    pub fn status_color(&self) -> Color {
        severity_color(&self.style, self.status())
    }

    /// Formatted reading with the unit suffix.
    pub fn readout(&self) -> String {
        let value = if self.value.is_finite() {
            self.value
        } else {
            self.mapper.rest_value()
        };
        let text = self.spec.format.format(value);
        match &self.spec.unit {
            Some(unit) => format!("{} {}", text, unit),
            None => text,
        }
    }

    pub fn face(&self) -> &Scene {
        &self.face
    }

    /// Face plus the needle and readout at the displayed angle.
    pub fn scene(&self) -> Scene {
        let style = &self.style;
        let mut scene = self.face.clone();
        scene.add_command(DrawCommand::Needle {
            angle_deg: self.displayed_angle(),
            length: style.needle_length(),
            tail: style.needle_tail,
            half_width: style.needle_half_width,
            color: style.palette.needle,
        });
        scene.add_command(DrawCommand::Circle {
            cx: 0.0,
            cy: 0.0,
            r: style.needle_cap_radius,
            fill: Some(style.palette.bezel_fill),
            stroke: Some((style.palette.needle, 1.0)),
        });
        scene.add_command(DrawCommand::Text {
            x: 0.0,
            y: style.readout_offset,
            text: self.readout(),
            size: style.text_font_size,
            color: self.status_color(),
            bold: false,
            anchor: Anchor::Middle,
        });
        scene
    }
}
