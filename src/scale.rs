// ============================================================================
// SCALE MAPPER
// ============================================================================
//
// Pure value-to-angle mapping. Angles are in degrees, 0 points up and
// positive angles sweep clockwise. Every function here returns a finite
// angle for any input.

use serde::Deserialize;

/// Default total sweep of a dial face.
pub const DEFAULT_SPAN_DEG: f64 = 240.0;

/// Numeric range of a gauge, with an optional value pinned to "up".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
    pub pivot: Option<f64>,
}

impl Scale {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            pivot: None,
        }
    }

    pub const fn with_pivot(min: f64, max: f64, pivot: f64) -> Self {
        Self {
            min,
            max,
            pivot: Some(pivot),
        }
    }

    /// A scale is usable only when both bounds are finite and `max > min`.
    pub fn is_degenerate(&self) -> bool {
        !(self.min.is_finite() && self.max.is_finite() && self.max > self.min)
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Resolve the pivot: an explicit finite pivot wins, then the midpoint of
    /// a finite good band, then the scale midpoint.
    pub fn resolve_pivot(&self, good: Option<&Band>) -> f64 {
        if let Some(pivot) = self.pivot.filter(|p| p.is_finite()) {
            return pivot;
        }
        if let Some(mid) = good.map(Band::midpoint).filter(|m| m.is_finite()) {
            return mid;
        }
        self.midpoint()
    }

    /// Linear interpolation across `[min, max]`, used for tick values.
    pub fn value_at(&self, t: f64) -> f64 {
        lerp(self.min, self.max, t)
    }
}

/// Angular extent of the dial face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularSpan {
    pub start_deg: f64,
    pub end_deg: f64,
}

impl AngularSpan {
    /// Span centred on "up". Non-finite input falls back to the default
    /// sweep and the magnitude is limited to a full turn.
    pub fn symmetric(span_deg: f64) -> Self {
        let span = if span_deg.is_finite() {
            span_deg.clamp(-360.0, 360.0)
        } else {
            DEFAULT_SPAN_DEG
        };
        let half = span / 2.0;
        Self {
            start_deg: -half,
            end_deg: half,
        }
    }

    pub fn sweep(&self) -> f64 {
        self.end_deg - self.start_deg
    }

    fn midpoint(&self) -> f64 {
        (self.start_deg + self.end_deg) / 2.0
    }

    /// Angle for a normalised position `t` in `[0, 1]` along the span.
    pub fn angle_at(&self, t: f64) -> f64 {
        lerp(self.start_deg, self.end_deg, t)
    }
}

impl Default for AngularSpan {
    fn default() -> Self {
        Self::symmetric(DEFAULT_SPAN_DEG)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandSeverity {
    Good,
    Warn,
    Bad,
}

/// Coloured sub-range of a scale. `from > to` is allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub from: f64,
    pub to: f64,
    pub severity: BandSeverity,
}

impl Band {
    pub const fn new(from: f64, to: f64, severity: BandSeverity) -> Self {
        Self { from, to, severity }
    }

    pub fn midpoint(&self) -> f64 {
        (self.from + self.to) / 2.0
    }

    /// Bounds in ascending order.
    pub fn bounds(&self) -> (f64, f64) {
        (self.from.min(self.to), self.from.max(self.to))
    }

    /// `true` when `value` lies strictly outside the band.
    pub fn excludes(&self, value: f64) -> bool {
        let (lo, hi) = self.bounds();
        value < lo || value > hi
    }
}

/// Angular extent of a band, `start_deg <= end_deg`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub start_deg: f64,
    pub end_deg: f64,
}

impl Arc {
    pub fn extent(&self) -> f64 {
        self.end_deg - self.start_deg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    /// Needle points up at the pivot, each side stretched to the farther bound.
    Pivot,
    /// Uniform mapping of `[min, max]` onto the span.
    Linear,
}

/// Pivot-mode mapping around the scale's own pivot, or its midpoint when
/// none is set.
///
/// The half range is `max(pivot - min, max - pivot)`, so the side nearer the
/// pivot never reaches its end of the span. A non-finite `value` rests at the
/// pivot; a degenerate scale or pivot yields 0.
pub fn angle_for_value(value: f64, scale: &Scale, span: &AngularSpan) -> f64 {
    let pivot = scale.resolve_pivot(None);
    if scale.is_degenerate() || !pivot.is_finite() {
        log::trace!("degenerate scale {:?} (pivot {}), resting at 0", scale, pivot);
        return 0.0;
    }
    let half = (pivot - scale.min).max(scale.max - pivot);
    if !(half.is_finite() && half > 0.0) {
        return 0.0;
    }
    let value = if value.is_finite() { value } else { pivot };
    let t = ((value - pivot) / half).clamp(-1.0, 1.0);
    finite_or_zero(span.midpoint() + t * span.sweep() / 2.0)
}

/// Linear-mode mapping. A non-finite `value` rests at the scale midpoint.
pub fn linear_angle_for_value(value: f64, scale: &Scale, span: &AngularSpan) -> f64 {
    if scale.is_degenerate() {
        return 0.0;
    }
    let value = if value.is_finite() {
        value
    } else {
        scale.midpoint()
    };
    let t = ((value - scale.min) / (scale.max - scale.min)).clamp(0.0, 1.0);
    finite_or_zero(span.angle_at(t))
}

/// Resolved mapping of one gauge: scale, span, mode and pivot together.
/// `scale.pivot` always holds the resolved pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapper {
    pub scale: Scale,
    pub span: AngularSpan,
    pub mode: ScaleMode,
    pub pivot: f64,
}

impl Mapper {
    pub fn new(scale: Scale, span: AngularSpan, good: Option<&Band>) -> Self {
        let mode = if scale.pivot.is_some() || good.is_some() {
            ScaleMode::Pivot
        } else {
            ScaleMode::Linear
        };
        let pivot = scale.resolve_pivot(good);
        Self {
            scale: Scale {
                pivot: Some(pivot),
                ..scale
            },
            span,
            mode,
            pivot,
        }
    }

    pub fn angle(&self, value: f64) -> f64 {
        match self.mode {
            ScaleMode::Pivot => angle_for_value(value, &self.scale, &self.span),
            ScaleMode::Linear => linear_angle_for_value(value, &self.scale, &self.span),
        }
    }

    /// Value a non-finite reading is replaced with.
    pub fn rest_value(&self) -> f64 {
        match self.mode {
            ScaleMode::Pivot => self.pivot,
            ScaleMode::Linear => self.scale.midpoint(),
        }
    }
}

/// Map a band onto the dial. The arc is ordered by angle, so `{a, b}` and
/// `{b, a}` give the same arc.
pub fn band_arc(band: &Band, mapper: &Mapper) -> Arc {
    let a = mapper.angle(band.from);
    let b = mapper.angle(band.to);
    Arc {
        start_deg: a.min(b),
        end_deg: a.max(b),
    }
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn finite_or_zero(angle: f64) -> f64 {
    if angle.is_finite() {
        angle
    } else {
        0.0
    }
}
