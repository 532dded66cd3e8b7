//! Sensor status list shown beside the gauges.

use serde::Deserialize;

use crate::config::Palette;
use crate::gauge::whole_number;
use crate::scene::{Anchor, Color, DrawCommand, Scene};
use crate::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warn,
    Error,
    Offline,
}

impl Severity {
    pub fn color(self, palette: &Palette) -> Color {
        match self {
            Severity::Ok => palette.good,
            Severity::Warn => palette.warn,
            Severity::Error => palette.bad,
            Severity::Offline => palette.offline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorStatus {
    pub id: String,
    pub label: String,
    pub severity: Severity,
    #[serde(default)]
    pub message: Option<String>,
}

impl SensorStatus {
    fn new(id: &str, label: &str, severity: Severity, message: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            severity,
            message,
        }
    }

    fn ok(id: &str, label: &str) -> Self {
        Self::new(id, label, Severity::Ok, None)
    }
}

/// Rows derived from a telemetry record when it carries no status list.
pub fn default_status(t: &Telemetry) -> Vec<SensorStatus> {
    let gnss = if t.gnss_lock > 0.7 {
        Severity::Ok
    } else if t.gnss_lock > 0.4 {
        Severity::Warn
    } else {
        Severity::Error
    };
    let recorder = if t.queue_pct < 80.0 {
        Severity::Ok
    } else if t.queue_pct < 90.0 {
        Severity::Warn
    } else {
        Severity::Error
    };
    let storage = if t.disk_mb_s < 700.0 {
        Severity::Ok
    } else {
        Severity::Warn
    };
    let thermal = if t.temp_c < 70.0 {
        Severity::Ok
    } else if t.temp_c < 85.0 {
        Severity::Warn
    } else {
        Severity::Error
    };

    vec![
        SensorStatus::ok("dmi", "DMI (Wheel Pulse)"),
        SensorStatus::new(
            "ins",
            "GNSS/INS",
            gnss,
            Some(format!("Lock {}%", whole(t.gnss_lock * 100.0, f64::floor))),
        ),
        SensorStatus::ok("vux1a", "LiDAR VUX1-A"),
        SensorStatus::ok("vux1b", "LiDAR VUX1-B"),
        SensorStatus::ok("gpr", "GPR AIR"),
        SensorStatus::ok("cam_f0", "Camera Front 0"),
        SensorStatus::ok("cam_r0", "Camera Rear 0"),
        SensorStatus::ok("profiler", "AT Profiler"),
        SensorStatus::new(
            "recorder",
            "Recorder",
            recorder,
            Some(format!("{}% queue", whole(t.queue_pct, f64::round))),
        ),
        SensorStatus::new(
            "storage",
            "Storage",
            storage,
            Some(format!("{} MB/s", whole(t.disk_mb_s, f64::round))),
        ),
        SensorStatus::new(
            "thermal",
            "Thermals",
            thermal,
            Some(format!("{}°C", whole(t.temp_c, f64::round))),
        ),
    ]
}

fn whole(value: f64, round: fn(f64) -> f64) -> String {
    if value.is_finite() {
        whole_number(round(value))
    } else {
        "--".to_string()
    }
}

/// The record's own list when it has one, otherwise the derived rows.
pub fn effective_status(t: &Telemetry) -> Vec<SensorStatus> {
    match &t.status {
        Some(list) if !list.is_empty() => list.clone(),
        _ => default_status(t),
    }
}

/// Non-OK rows first; order within each group is preserved.
pub fn ordered(status: &[SensorStatus]) -> Vec<SensorStatus> {
    let (mut attention, ok): (Vec<_>, Vec<_>) = status
        .iter()
        .cloned()
        .partition(|s| s.severity != Severity::Ok);
    attention.extend(ok);
    attention
}

/// Status panel in local units: origin at the top-left, one row per sensor.
pub fn panel_scene(status: &[SensorStatus], palette: &Palette, row_height: f64) -> Scene {
    let mut scene = Scene::new();
    scene.add_command(DrawCommand::Text {
        x: 8.0,
        y: row_height / 2.0,
        text: "SENSORS".to_string(),
        size: row_height * 0.5,
        color: palette.tick,
        bold: true,
        anchor: Anchor::Start,
    });
    for (i, row) in ordered(status).iter().enumerate() {
        let y = row_height * (i as f64 + 1.5);
        scene.add_command(DrawCommand::Circle {
            cx: 12.0,
            cy: y,
            r: row_height * 0.2,
            fill: Some(row.severity.color(palette)),
            stroke: None,
        });
        let text = match &row.message {
            Some(message) => format!("{} · {}", row.label, message),
            None => row.label.clone(),
        };
        scene.add_command(DrawCommand::Text {
            x: 24.0,
            y,
            text,
            size: row_height * 0.55,
            color: if row.severity == Severity::Ok {
                palette.label
            } else {
                row.severity.color(palette)
            },
            bold: false,
            anchor: Anchor::Start,
        });
    }
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> Telemetry {
        Telemetry {
            speed_mps: 20.0,
            disk_mb_s: 400.0,
            pps_skew_us: 5.0,
            queue_pct: 40.0,
            gnss_lock: 0.9,
            temp_c: 50.0,
            status: None,
        }
    }

    fn severity_of(rows: &[SensorStatus], id: &str) -> Option<Severity> {
        rows.iter().find(|r| r.id == id).map(|r| r.severity)
    }

    #[test]
    fn nominal_record_is_all_ok() {
        let rows = default_status(&nominal());
        assert_eq!(rows.len(), 11);
        assert!(rows.iter().all(|r| r.severity == Severity::Ok));
        assert_eq!(
            rows.iter().find(|r| r.id == "ins").and_then(|r| r.message.clone()),
            Some("Lock 90%".to_string())
        );
    }

    #[test]
    fn thresholds() {
        let mut t = nominal();
        t.gnss_lock = 0.5;
        t.queue_pct = 85.0;
        t.disk_mb_s = 700.0;
        t.temp_c = 90.0;
        let rows = default_status(&t);
        assert_eq!(severity_of(&rows, "ins"), Some(Severity::Warn));
        assert_eq!(severity_of(&rows, "recorder"), Some(Severity::Warn));
        assert_eq!(severity_of(&rows, "storage"), Some(Severity::Warn));
        assert_eq!(severity_of(&rows, "thermal"), Some(Severity::Error));

        t.gnss_lock = 0.2;
        t.queue_pct = 95.0;
        let rows = default_status(&t);
        assert_eq!(severity_of(&rows, "ins"), Some(Severity::Error));
        assert_eq!(severity_of(&rows, "recorder"), Some(Severity::Error));
    }

    #[test]
    fn messages_print_huge_and_negative_zero_readings() {
        let mut t = nominal();
        t.temp_c = 1e20;
        t.queue_pct = -0.3;
        t.gnss_lock = f64::NAN;
        let rows = default_status(&t);
        let message = |id: &str| {
            rows.iter()
                .find(|r| r.id == id)
                .and_then(|r| r.message.clone())
        };
        assert_eq!(message("thermal").as_deref(), Some("100000000000000000000°C"));
        assert_eq!(message("recorder").as_deref(), Some("0% queue"));
        assert_eq!(message("ins").as_deref(), Some("Lock --%"));
    }

    #[test]
    fn non_ok_rows_come_first_in_stable_order() {
        let rows = vec![
            SensorStatus::ok("a", "A"),
            SensorStatus::new("b", "B", Severity::Error, None),
            SensorStatus::ok("c", "C"),
            SensorStatus::new("d", "D", Severity::Offline, None),
        ];
        let ids: Vec<_> = ordered(&rows).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["b", "d", "a", "c"]);
    }

    #[test]
    fn record_list_overrides_defaults_unless_empty() {
        let mut t = nominal();
        t.status = Some(vec![SensorStatus::ok("x", "X")]);
        assert_eq!(effective_status(&t).len(), 1);
        t.status = Some(Vec::new());
        assert_eq!(effective_status(&t).len(), 11);
    }

    #[test]
    fn panel_has_a_dot_and_a_line_per_row() {
        let rows = default_status(&nominal());
        let scene = panel_scene(&rows, &Palette::default(), 20.0);
        assert_eq!(scene.len(), 1 + 2 * rows.len());
    }
}
