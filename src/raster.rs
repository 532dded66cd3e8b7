// ============================================================================
// RASTER BACK-END
// ============================================================================

use rusttype::{point, Font, PositionedGlyph, Scale};

use crate::scene::{polar, rotate, Anchor, Color, DrawCommand, Scene};

/// RGBA framebuffer borrowed from `pixels`.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: usize,
    height: usize,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: usize, height: usize) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self, color: Color) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&[color.r, color.g, color.b, 0xff]);
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) * 4;
        self.frame
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Alpha-blend `color` over the pixel at `(x, y)`.
    fn blend(&mut self, x: i32, y: i32, color: Color, alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 4;
        let Some(dst) = self.frame.get_mut(idx..idx + 4) else {
            return;
        };
        let a = alpha.clamp(0.0, 1.0);
        let mix = |src: u8, dst: u8| (src as f32 * a + dst as f32 * (1.0 - a)).round() as u8;
        dst[0] = mix(color.r, dst[0]);
        dst[1] = mix(color.g, dst[1]);
        dst[2] = mix(color.b, dst[2]);
        dst[3] = 0xff;
    }
}

/// Local-to-pixel transform: `pixel = centre + local * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub cx: f64,
    pub cy: f64,
    pub scale: f64,
}

impl Viewport {
    /// Fit a 200-unit dial into a square cell.
    pub fn for_cell(x: f64, y: f64, size: f64) -> Self {
        Self {
            cx: x + size / 2.0,
            cy: y + size / 2.0,
            scale: size / 200.0,
        }
    }

    pub fn map(&self, (x, y): (f64, f64)) -> (f32, f32) {
        (
            (self.cx + x * self.scale) as f32,
            (self.cy + y * self.scale) as f32,
        )
    }

    pub fn len(&self, units: f64) -> f32 {
        (units * self.scale) as f32
    }
}

// ============================================================================
// DRAWING PRIMITIVES
// ============================================================================

fn draw_line_with<F>(canvas: &mut Canvas, from: (f32, f32), to: (f32, f32), color: Color, width_at: F)
where
    F: Fn(f32) -> f32,
{
    let (x0, y0) = from;
    let (x1, y1) = to;
    let max_width = width_at(0.0).max(width_at(1.0));
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return;
    }
    let pad = max_width.ceil() + 1.0;
    let min_x = (x0.min(x1) - pad).floor() as i32;
    let max_x = (x0.max(x1) + pad).ceil() as i32;
    let min_y = (y0.min(y1) - pad).floor() as i32;
    let max_y = (y0.max(y1) + pad).ceil() as i32;
    let dx = x1 - x0;
    let dy = y1 - y0;
    let len_sq = dx * dx + dy * dy;
    for y in min_y.max(0)..=max_y.min(canvas.height as i32 - 1) {
        for x in min_x.max(0)..=max_x.min(canvas.width as i32 - 1) {
            let px = x as f32 - x0;
            let py = y as f32 - y0;
            let t = if len_sq > 0.0 {
                ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let lx = x0 + t * dx;
            let ly = y0 + t * dy;
            let dist = ((lx - x as f32).powi(2) + (ly - y as f32).powi(2)).sqrt();
            let aa = (1.0 - (dist - width_at(t) / 2.0).clamp(0.0, 1.0)).clamp(0.0, 1.0);
            if aa > 0.01 {
                canvas.blend(x, y, color, aa);
            }
        }
    }
}

pub fn draw_thick_line_aa(canvas: &mut Canvas, from: (f32, f32), to: (f32, f32), thickness: f32, color: Color) {
    draw_line_with(canvas, from, to, color, |_| thickness);
}

/// Line that narrows from `thickness` at `from` to a point at `to`.
pub fn draw_thick_line_tapered_aa(
    canvas: &mut Canvas,
    from: (f32, f32),
    to: (f32, f32),
    thickness: f32,
    color: Color,
) {
    // 0.05 keeps the tip from vanishing
    draw_line_with(canvas, from, to, color, |t| thickness * (1.0 - t * 0.95));
}

/// Anti-aliased disc, or ring when `inner` is positive.
fn draw_annulus(canvas: &mut Canvas, centre: (f32, f32), outer: f32, inner: f32, color: Color, alpha: f32) {
    let (cx, cy) = centre;
    if !(cx.is_finite() && cy.is_finite() && outer.is_finite()) || outer <= 0.0 {
        return;
    }
    let reach = outer.ceil() as i32 + 1;
    let (bx, by) = (cx.round() as i32, cy.round() as i32);
    for y in (by - reach).max(0)..=(by + reach).min(canvas.height as i32 - 1) {
        for x in (bx - reach).max(0)..=(bx + reach).min(canvas.width as i32 - 1) {
            let dist = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            let aa = radial_alpha(dist, inner, outer);
            if aa > 0.0 {
                canvas.blend(x, y, color, aa * alpha);
            }
        }
    }
}

fn radial_alpha(dist: f32, inner: f32, outer: f32) -> f32 {
    if dist > outer {
        1.0 - (dist - outer).min(1.0)
    } else if inner > 0.0 && dist < inner {
        1.0 - (inner - dist).min(1.0)
    } else {
        1.0
    }
}

pub fn draw_circle(canvas: &mut Canvas, centre: (f32, f32), radius: f32, color: Color) {
    draw_annulus(canvas, centre, radius, 0.0, color, 1.0);
}

pub fn draw_ring(canvas: &mut Canvas, centre: (f32, f32), radius: f32, width: f32, color: Color) {
    let half = (width / 2.0).max(0.5);
    draw_annulus(canvas, centre, radius + half, radius - half, color, 1.0);
}

/// Angle of a pixel offset in the dial convention: 0 up, clockwise.
fn dial_angle(dx: f32, dy: f32) -> f64 {
    (dx as f64).atan2(-(dy as f64)).to_degrees()
}

pub fn fill_wedge(
    canvas: &mut Canvas,
    centre: (f32, f32),
    start_deg: f64,
    end_deg: f64,
    outer: f32,
    inner: f32,
    color: Color,
    alpha: f32,
) {
    let extent = end_deg - start_deg;
    let (cx, cy) = centre;
    if !(extent.is_finite() && extent > 0.0 && cx.is_finite() && cy.is_finite()) {
        return;
    }
    let reach = outer.ceil() as i32 + 1;
    let (bx, by) = (cx.round() as i32, cy.round() as i32);
    for y in (by - reach).max(0)..=(by + reach).min(canvas.height as i32 - 1) {
        for x in (bx - reach).max(0)..=(bx + reach).min(canvas.width as i32 - 1) {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < inner - 1.0 || dist > outer + 1.0 {
                continue;
            }
            let offset = (dial_angle(dx, dy) - start_deg).rem_euclid(360.0);
            if extent < 360.0 && offset > extent {
                continue;
            }
            let aa = radial_alpha(dist, inner, outer);
            if aa > 0.0 {
                canvas.blend(x, y, color, aa * alpha);
            }
        }
    }
}

fn text_bounds(glyphs: &[PositionedGlyph]) -> Option<(i32, i32, i32, i32)> {
    let (min_x, max_x, min_y, max_y) = glyphs.iter().filter_map(|g| g.pixel_bounding_box()).fold(
        (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        |(min_x, max_x, min_y, max_y), bb| {
            (
                min_x.min(bb.min.x),
                max_x.max(bb.max.x),
                min_y.min(bb.min.y),
                max_y.max(bb.max.y),
            )
        },
    );
    (min_x < max_x && min_y < max_y).then_some((min_x, max_x, min_y, max_y))
}

/// Draw `text` vertically centred on `y`, horizontally placed by `anchor`.
pub fn draw_text(
    canvas: &mut Canvas,
    font: &Font,
    (x, y): (f32, f32),
    text: &str,
    size: f32,
    color: Color,
    anchor: Anchor,
) {
    if !(x.is_finite() && y.is_finite()) || size <= 0.0 {
        return;
    }
    let scale = Scale::uniform(size);
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<PositionedGlyph> = font.layout(text, scale, point(0.0, v_metrics.ascent)).collect();
    let Some((min_x, max_x, min_y, max_y)) = text_bounds(&glyphs) else {
        return;
    };
    let width_px = max_x - min_x;
    let height_px = max_y - min_y;
    let offset_x = match anchor {
        Anchor::Start => x.round() as i32,
        Anchor::Middle => x.round() as i32 - width_px / 2,
        Anchor::End => x.round() as i32 - width_px,
    };
    let offset_y = y.round() as i32 - height_px / 2;
    for glyph in &glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = offset_x + gx as i32 + bb.min.x - min_x;
                let py = offset_y + gy as i32 + bb.min.y - min_y;
                canvas.blend(px, py, color, v);
            });
        }
    }
}

/// Draw a scene through `viewport`. Text is skipped without a font.
pub fn render_scene(canvas: &mut Canvas, scene: &Scene, viewport: &Viewport, font: Option<&Font>) {
    for command in scene.commands() {
        match command {
            DrawCommand::Circle {
                cx,
                cy,
                r,
                fill,
                stroke,
            } => {
                let centre = viewport.map((*cx, *cy));
                let radius = viewport.len(*r);
                if let Some(fill) = fill {
                    draw_circle(canvas, centre, radius, *fill);
                }
                if let Some((color, width)) = stroke {
                    draw_ring(canvas, centre, radius, viewport.len(*width), *color);
                }
            }
            DrawCommand::Wedge {
                start_deg,
                end_deg,
                outer_r,
                inner_r,
                color,
                opacity,
            } => fill_wedge(
                canvas,
                viewport.map((0.0, 0.0)),
                *start_deg,
                *end_deg,
                viewport.len(*outer_r),
                viewport.len(*inner_r),
                *color,
                *opacity as f32,
            ),
            DrawCommand::Line {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
            } => draw_thick_line_aa(
                canvas,
                viewport.map((*x1, *y1)),
                viewport.map((*x2, *y2)),
                viewport.len(*width).max(1.0),
                *color,
            ),
            DrawCommand::Text {
                x,
                y,
                text,
                size,
                color,
                anchor,
                ..
            } => {
                if let Some(font) = font {
                    draw_text(
                        canvas,
                        font,
                        viewport.map((*x, *y)),
                        text,
                        viewport.len(*size),
                        *color,
                        *anchor,
                    );
                }
            }
            DrawCommand::Needle {
                angle_deg,
                length,
                tail,
                half_width,
                color,
            } => {
                // Rotate in local units, then map: the pivot is the local origin.
                let tip = viewport.map(polar(*angle_deg, *length));
                let back = viewport.map(rotate((0.0, *tail), *angle_deg));
                draw_thick_line_tapered_aa(canvas, back, tip, viewport.len(*half_width * 2.0), *color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Color = Color::new(0, 0, 0);
    const WHITE: Color = Color::new(0xff, 0xff, 0xff);

    fn frame(size: usize) -> Vec<u8> {
        vec![0; size * size * 4]
    }

    #[test]
    fn viewport_maps_origin_to_cell_centre() {
        let vp = Viewport::for_cell(100.0, 0.0, 200.0);
        assert_eq!(vp.map((0.0, 0.0)), (200.0, 100.0));
        assert_eq!(vp.map((0.0, -100.0)), (200.0, 0.0));
        assert_eq!(vp.len(10.0), 10.0);
    }

    #[test]
    fn dial_angle_matches_scene_convention() {
        assert!((dial_angle(0.0, -1.0) - 0.0).abs() < 1e-9);
        assert!((dial_angle(1.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((dial_angle(-1.0, 0.0) + 90.0).abs() < 1e-9);
    }

    #[test]
    fn wedge_covers_only_its_sector() {
        let mut buf = frame(64);
        let mut canvas = Canvas::new(&mut buf, 64, 64);
        canvas.clear(BLACK);
        // right half of the dial
        fill_wedge(&mut canvas, (32.0, 32.0), 0.0, 180.0, 30.0, 20.0, WHITE, 1.0);
        assert_eq!(canvas.pixel(57, 32), Some([0xff, 0xff, 0xff, 0xff]));
        assert_eq!(canvas.pixel(7, 32), Some([0, 0, 0, 0xff]));
        // inside the inner radius stays clear
        assert_eq!(canvas.pixel(40, 32), Some([0, 0, 0, 0xff]));
    }

    #[test]
    fn needle_points_up_at_zero() {
        let mut buf = frame(100);
        let mut canvas = Canvas::new(&mut buf, 100, 100);
        canvas.clear(BLACK);
        let mut scene = Scene::new();
        scene.add_command(DrawCommand::Needle {
            angle_deg: 0.0,
            length: 60.0,
            tail: 12.0,
            half_width: 3.0,
            color: WHITE,
        });
        // 100 px cell: centre (50, 50), tip at (50, 20), tail at (50, 56)
        render_scene(&mut canvas, &scene, &Viewport::for_cell(0.0, 0.0, 100.0), None);
        let up = canvas.pixel(50, 30).unwrap_or_default();
        let down = canvas.pixel(50, 80).unwrap_or_default();
        assert!(up[0] > 0x80);
        assert_eq!(down[0], 0);
    }

    #[test]
    fn primitives_ignore_non_finite_input() {
        let mut buf = frame(16);
        let mut canvas = Canvas::new(&mut buf, 16, 16);
        canvas.clear(BLACK);
        draw_thick_line_aa(&mut canvas, (f32::NAN, 0.0), (4.0, 4.0), 2.0, WHITE);
        draw_circle(&mut canvas, (f32::INFINITY, 3.0), 4.0, WHITE);
        fill_wedge(&mut canvas, (8.0, 8.0), f64::NAN, 10.0, 6.0, 2.0, WHITE, 1.0);
        assert!(buf.chunks_exact(4).all(|p| p == [0, 0, 0, 0xff]));
    }
}
