// ============================================================================
// SVG BACK-END
// ============================================================================
//
// The view box is centred on the local origin, so a `rotate(a)` without a
// pivot argument turns the needle about the dial centre.

use std::fmt::Write;

use crate::scene::{needle_outline, polar, Anchor, Color, DrawCommand, Scene};

/// Half width of the view box in local units.
const VIEW_HALF: f64 = 100.0;

/// Extents below this are not drawn.
const MIN_WEDGE_DEG: f64 = 1e-6;

/// Numbers written into attributes. Non-finite values become `0`.
struct Num(f64);

impl std::fmt::Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = if self.0.is_finite() { self.0 } else { 0.0 };
        // Four decimals, trailing zeros trimmed, no negative zero.
        let rounded = (v * 10_000.0).round() / 10_000.0;
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        write!(f, "{}", rounded)
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn paint(color: Option<Color>) -> String {
    color.map_or_else(|| "none".to_string(), Color::to_hex)
}

/// Path data for an annular wedge. `large` is set when the sweep exceeds a
/// half turn; a full turn is split in two so the arc endpoints differ.
pub fn wedge_path(start_deg: f64, end_deg: f64, outer_r: f64, inner_r: f64) -> Option<String> {
    let (start_deg, end_deg) = (start_deg.min(end_deg), start_deg.max(end_deg));
    let extent = end_deg - start_deg;
    if !(extent.is_finite() && extent > MIN_WEDGE_DEG) {
        return None;
    }
    if extent >= 360.0 {
        let mid = start_deg + 180.0;
        let first = wedge_path(start_deg, mid, outer_r, inner_r)?;
        let second = wedge_path(mid, start_deg + 360.0, outer_r, inner_r)?;
        return Some(format!("{} {}", first, second));
    }

    let large = u8::from(extent > 180.0);
    let inner_r = inner_r.max(0.0);
    let (osx, osy) = polar(start_deg, outer_r);
    let (oex, oey) = polar(end_deg, outer_r);
    let (iex, iey) = polar(end_deg, inner_r);
    let (isx, isy) = polar(start_deg, inner_r);
    Some(format!(
        "M {} {} A {} {} 0 {} 1 {} {} L {} {} A {} {} 0 {} 0 {} {} Z",
        Num(osx),
        Num(osy),
        Num(outer_r),
        Num(outer_r),
        large,
        Num(oex),
        Num(oey),
        Num(iex),
        Num(iey),
        Num(inner_r),
        Num(inner_r),
        large,
        Num(isx),
        Num(isy),
    ))
}

fn write_command(out: &mut String, command: &DrawCommand) -> std::fmt::Result {
    match command {
        DrawCommand::Circle {
            cx,
            cy,
            r,
            fill,
            stroke,
        } => {
            let (stroke_color, stroke_width) = match stroke {
                Some((color, width)) => (Some(*color), *width),
                None => (None, 0.0),
            };
            writeln!(
                out,
                r#"<circle cx="{}" cy="{}" r="{}" fill="{}" stroke="{}" stroke-width="{}"/>"#,
                Num(*cx),
                Num(*cy),
                Num(r.max(0.0)),
                paint(*fill),
                paint(stroke_color),
                Num(stroke_width),
            )
        }
        DrawCommand::Wedge {
            start_deg,
            end_deg,
            outer_r,
            inner_r,
            color,
            opacity,
        } => match wedge_path(*start_deg, *end_deg, *outer_r, *inner_r) {
            Some(d) => writeln!(
                out,
                r#"<path d="{}" fill="{}" opacity="{}"/>"#,
                d,
                color.to_hex(),
                Num(opacity.clamp(0.0, 1.0)),
            ),
            None => Ok(()),
        },
        DrawCommand::Line {
            x1,
            y1,
            x2,
            y2,
            color,
            width,
        } => writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            Num(*x1),
            Num(*y1),
            Num(*x2),
            Num(*y2),
            color.to_hex(),
            Num(*width),
        ),
        DrawCommand::Text {
            x,
            y,
            text,
            size,
            color,
            bold,
            anchor,
        } => {
            let anchor = match anchor {
                Anchor::Start => "start",
                Anchor::Middle => "middle",
                Anchor::End => "end",
            };
            let weight = if *bold { r#" font-weight="600""# } else { "" };
            writeln!(
                out,
                r#"<text x="{}" y="{}" fill="{}" font-size="{}"{} text-anchor="{}" dominant-baseline="central">{}</text>"#,
                Num(*x),
                Num(*y),
                color.to_hex(),
                Num(*size),
                weight,
                anchor,
                escape(text),
            )
        }
        DrawCommand::Needle {
            angle_deg,
            length,
            tail,
            half_width,
            color,
        } => {
            // Drawn pointing up and rotated in the local frame.
            let [tip, left, right] = needle_outline(0.0, *length, *tail, *half_width);
            writeln!(
                out,
                r#"<g transform="rotate({})"><polygon points="{},{} {},{} {},{}" fill="{}"/></g>"#,
                Num(*angle_deg),
                Num(tip.0),
                Num(tip.1),
                Num(left.0),
                Num(left.1),
                Num(right.0),
                Num(right.1),
                color.to_hex(),
            )
        }
    }
}

/// Serialise a scene as a standalone SVG document `size_px` wide and high.
pub fn to_svg(scene: &Scene, size_px: u32) -> String {
    let mut out = String::new();
    let side = VIEW_HALF * 2.0;
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}">"#,
        size_px,
        size_px,
        Num(-VIEW_HALF),
        Num(-VIEW_HALF),
        Num(side),
        Num(side),
    );
    for command in scene.commands() {
        let _ = write_command(&mut out, command);
    }
    out.push_str("</svg>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::{Gauge, GaugeSpec, Range};

    fn arc_flags(d: &str) -> Vec<(String, String)> {
        // "A rx ry rot large sweep x y"
        let tokens: Vec<&str> = d.split_whitespace().collect();
        tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == "A")
            .map(|(i, _)| (tokens[i + 4].to_string(), tokens[i + 5].to_string()))
            .collect()
    }

    #[test]
    fn small_wedge_uses_small_arc() {
        let d = wedge_path(-120.0, -48.0, 78.0, 70.0).unwrap();
        assert!(d.starts_with("M "));
        assert!(d.ends_with(" Z"));
        let flags = arc_flags(&d);
        assert_eq!(flags[0], ("0".to_string(), "1".to_string()));
        assert_eq!(flags[1], ("0".to_string(), "0".to_string()));
    }

    #[test]
    fn wide_wedge_uses_large_arc() {
        let d = wedge_path(-110.0, 100.0, 78.0, 70.0).unwrap();
        let flags = arc_flags(&d);
        assert!(flags.iter().all(|(large, _)| large == "1"));
        // exactly a half turn is still the small variant
        let d = wedge_path(-90.0, 90.0, 78.0, 70.0).unwrap();
        assert!(arc_flags(&d).iter().all(|(large, _)| large == "0"));
    }

    #[test]
    fn full_turn_is_split() {
        let d = wedge_path(-180.0, 180.0, 78.0, 70.0).unwrap();
        assert_eq!(d.matches('M').count(), 2);
    }

    #[test]
    fn empty_or_invalid_wedges_are_skipped() {
        assert!(wedge_path(10.0, 10.0, 78.0, 70.0).is_none());
        assert!(wedge_path(f64::NAN, 10.0, 78.0, 70.0).is_none());
    }

    #[test]
    fn numbers_are_compact_and_finite() {
        assert_eq!(Num(1.0).to_string(), "1");
        assert_eq!(Num(-0.00001).to_string(), "0");
        assert_eq!(Num(f64::NAN).to_string(), "0");
        assert_eq!(Num(f64::INFINITY).to_string(), "0");
        assert_eq!(Num(2.123456).to_string(), "2.1235");
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn needle_rotates_about_origin() {
        let spec = GaugeSpec::builder()
            .label("x")
            .min(0.0)
            .max(100.0)
            .good(Range::new(40.0, 60.0))
            .build();
        let gauge = Gauge::with_defaults(spec, 100.0);
        let svg = to_svg(&gauge.scene(), 240);
        assert!(svg.contains(r#"viewBox="-100 -100 200 200""#));
        assert!(svg.contains(r#"<g transform="rotate(120)">"#));
    }
}
