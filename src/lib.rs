// ============================================================================
// CRATE LAYOUT
// ============================================================================
//
// Engine: `scale` maps values to angles, `needle` smooths the pointer,
// `gauge` builds a dial as a `scene` that `svg` or `raster` draw.
// Shell: `telemetry` and `status` feed the gauges, `cluster` runs the window.

pub mod cluster;
pub mod config;
pub mod error;
pub mod gauge;
pub mod needle;
pub mod raster;
pub mod scale;
pub mod scene;
pub mod status;
pub mod svg;
pub mod telemetry;

pub use cluster::{Channel, Cluster, GaugeBinding};
pub use config::{ClusterConfig, DialStyle, Palette};
pub use error::{ClusterError, Result};
pub use gauge::{Gauge, GaugeSpec, Range, ValueFormat};
pub use needle::{NeedleState, SpringConfig};
pub use scale::{angle_for_value, band_arc, Band, BandSeverity, Mapper, Scale, ScaleMode};
pub use scene::{Color, DrawCommand, Scene};
pub use svg::to_svg;
pub use telemetry::{FeedMode, HttpFeed, MockTelemetry, StdinFeed, Telemetry, TelemetrySource};
