// ============================================================================
// RETAINED MODE ABSTRACTIONS
// ============================================================================
//
// Commands are expressed in local units with the origin at the centre of the
// drawing, y pointing down, angles in degrees with 0 up and clockwise
// positive. Back-ends map local units onto their own surface.

use serde::Deserialize;

/// Color representation for gauge elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn as_tuple(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        fill: Option<Color>,
        stroke: Option<(Color, f64)>,
    },
    /// Annular sector between `inner_r` and `outer_r`, `start_deg <= end_deg`.
    Wedge {
        start_deg: f64,
        end_deg: f64,
        outer_r: f64,
        inner_r: f64,
        color: Color,
        opacity: f64,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: Color,
        width: f64,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        size: f64,
        color: Color,
        bold: bool,
        anchor: Anchor,
    },
    /// Tapered needle drawn pointing up, then rotated about the origin.
    Needle {
        angle_deg: f64,
        length: f64,
        tail: f64,
        half_width: f64,
        color: Color,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    commands: Vec<DrawCommand>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_command(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn extend(&mut self, other: &Scene) {
        self.commands.extend(other.commands.iter().cloned());
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Local position of a point at `angle_deg` (0 up, clockwise) and radius `r`.
pub fn polar(angle_deg: f64, r: f64) -> (f64, f64) {
    let rad = angle_deg.to_radians();
    (r * rad.sin(), -r * rad.cos())
}

/// Rotate a local point clockwise about the origin.
pub fn rotate(point: (f64, f64), angle_deg: f64) -> (f64, f64) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (x, y) = point;
    (x * cos - y * sin, x * sin + y * cos)
}

/// Needle outline in local units: tip, then the two tail corners.
pub fn needle_outline(angle_deg: f64, length: f64, tail: f64, half_width: f64) -> [(f64, f64); 3] {
    [
        rotate((0.0, -length), angle_deg),
        rotate((-half_width, tail), angle_deg),
        rotate((half_width, tail), angle_deg),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn zero_degrees_points_up() {
        assert!(close(polar(0.0, 10.0), (0.0, -10.0)));
        assert!(close(polar(90.0, 10.0), (10.0, 0.0)));
        assert!(close(polar(-90.0, 10.0), (-10.0, 0.0)));
    }

    #[test]
    fn needle_tip_follows_polar() {
        for angle in [-120.0, -33.0, 0.0, 47.5, 120.0] {
            let [tip, _, _] = needle_outline(angle, 55.0, 12.0, 3.0);
            assert!(close(tip, polar(angle, 55.0)));
        }
    }

    #[test]
    fn hex_color() {
        assert_eq!(Color::new(0x22, 0xc5, 0x5e).to_hex(), "#22c55e");
    }
}
