use crate::error::{DrawError, DrawResult};
use crate::{Color, StampKind};
use ab_glyph::{point, Font, FontRef, PxScale, ScaleFont};
use font_kit::family_name::FamilyName;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use image::{ImageBuffer, Rgba, RgbaImage};
use std::sync::OnceLock;

const STAMP_SIZE: f32 = 40.0;

static SYSTEM_FONT: OnceLock<Option<&'static [u8]>> = OnceLock::new();

/// A position in surface coordinates. Fractional values are allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Which transient overlay a stroke is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Primary,
    Mirror,
}

pub struct Canvas {
    pub surface: RgbaImage,
    pub overlay: RgbaImage,        // In-progress stroke or shape
    pub mirror_overlay: RgbaImage, // Reflected copy of the stroke when mirroring
    pub width: u32,
    pub height: u32,
}

pub struct Renderer {
    pub canvas: Canvas,
    pub brush_tips: Vec<Vec<u8>>, // Round masks indexed by diameter, built lazily
    pub font: Option<FontRef<'static>>,
}

impl Canvas {
    /// A fully transparent surface.
    pub fn new(width: u32, height: u32) -> DrawResult<Self> {
        if width == 0 || height == 0 {
            return Err(DrawError::InvalidSize { width, height });
        }
        Ok(Self {
            surface: ImageBuffer::new(width, height),
            overlay: ImageBuffer::new(width, height),
            mirror_overlay: ImageBuffer::new(width, height),
            width,
            height,
        })
    }

    pub fn fill(&mut self, color: Color) {
        for pixel in self.surface.pixels_mut() {
            *pixel = color.to_rgba();
        }
    }

    pub fn clear_overlays(&mut self) {
        clear_image(&mut self.overlay);
        clear_image(&mut self.mirror_overlay);
    }

    pub fn overlay_mut(&mut self, kind: OverlayKind) -> &mut RgbaImage {
        match kind {
            OverlayKind::Primary => &mut self.overlay,
            OverlayKind::Mirror => &mut self.mirror_overlay,
        }
    }

    /// Replace the surface with `image`, adopting its dimensions.
    ///
    /// Overlays survive when the size is unchanged, so a gesture in progress
    /// is committed on top of the restored surface.
    pub fn replace(&mut self, image: RgbaImage) {
        let (width, height) = image.dimensions();
        if (width, height) != (self.width, self.height) {
            self.overlay = ImageBuffer::new(width, height);
            self.mirror_overlay = ImageBuffer::new(width, height);
            self.width = width;
            self.height = height;
        }
        self.surface = image;
    }

    /// Blend both overlays onto the surface and clear them.
    pub fn commit_overlays(&mut self) {
        for (src, dst) in self.overlay.pixels().zip(self.surface.pixels_mut()) {
            if src[3] > 0 {
                *dst = blend_over(*dst, *src);
            }
        }
        for (src, dst) in self.mirror_overlay.pixels().zip(self.surface.pixels_mut()) {
            if src[3] > 0 {
                *dst = blend_over(*dst, *src);
            }
        }
        self.clear_overlays();
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(Color::from(*self.surface.get_pixel(x, y)))
        } else {
            None
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Whether `at` lies within `margin` pixels of the surface.
    pub fn reaches(&self, at: Point, margin: f64) -> bool {
        at.x >= -margin
            && at.y >= -margin
            && at.x <= self.width as f64 + margin
            && at.y <= self.height as f64 + margin
    }

    fn blend_surface_pixel(&mut self, x: i64, y: i64, color: Color) {
        if self.contains(x, y) {
            let dst = self.surface.get_pixel_mut(x as u32, y as u32);
            *dst = blend_over(*dst, color.to_rgba());
        }
    }
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> DrawResult<Self> {
        let font = system_font().and_then(|bytes| FontRef::try_from_slice(bytes).ok());
        Self::with_font(width, height, font)
    }

    /// Renderer with an explicit font; `None` selects the built-in bitmap font.
    pub fn with_font(width: u32, height: u32, font: Option<FontRef<'static>>) -> DrawResult<Self> {
        Ok(Self {
            canvas: Canvas::new(width, height)?,
            brush_tips: Vec::new(),
            font,
        })
    }

    fn brush_tip(&mut self, diameter: usize) -> &[u8] {
        if self.brush_tips.len() <= diameter {
            self.brush_tips.resize(diameter + 1, Vec::new());
        }
        if self.brush_tips[diameter].is_empty() {
            let d = diameter;
            let mut mask = vec![0u8; d * d];
            let radius_squared = (d * d) as f64 / 4.0;
            for y in 0..d {
                for x in 0..d {
                    let xx = x as f64 + 0.5 - d as f64 / 2.0;
                    let yy = y as f64 + 0.5 - d as f64 / 2.0;
                    mask[y * d + x] = u8::from(xx * xx + yy * yy <= radius_squared);
                }
            }
            self.brush_tips[diameter] = mask;
        }
        &self.brush_tips[diameter]
    }

    /// Stamp one round dab of `width` into an overlay.
    ///
    /// Overlay pixels are overwritten rather than blended so a stroke never
    /// builds up alpha where its own segments overlap.
    pub fn dab(&mut self, kind: OverlayKind, at: Point, width: u32, color: Color) {
        let d = width.max(1) as usize;
        let start_x = at.x.floor() as i64 - (d / 2) as i64;
        let start_y = at.y.floor() as i64 - (d / 2) as i64;
        let shape = self.brush_tip(d).to_vec();
        let pixel = color.to_rgba();

        let canvas = &mut self.canvas;
        let (w, h) = (canvas.width as i64, canvas.height as i64);
        let target = canvas.overlay_mut(kind);
        for i in 0..d {
            for j in 0..d {
                if shape[i * d + j] == 0 {
                    continue;
                }
                let px = start_x + j as i64;
                let py = start_y + i as i64;
                if px >= 0 && py >= 0 && px < w && py < h {
                    target.put_pixel(px as u32, py as u32, pixel);
                }
            }
        }
    }

    /// Draw a round-capped segment into an overlay.
    ///
    /// The segment is clipped to the surface grown by the brush width first,
    /// so far-off endpoints cost no more than on-surface ones.
    pub fn stroke_segment(
        &mut self,
        kind: OverlayKind,
        from: Point,
        to: Point,
        width: u32,
        color: Color,
    ) {
        let margin = width.max(1) as f64;
        let min = Point::new(-margin, -margin);
        let max = Point::new(
            self.canvas.width as f64 + margin,
            self.canvas.height as f64 + margin,
        );
        let Some((from, to)) = clip_segment(from, to, min, max) else {
            return;
        };

        let mut curr_x = from.x.floor() as i64;
        let mut curr_y = from.y.floor() as i64;
        let end_x = to.x.floor() as i64;
        let end_y = to.y.floor() as i64;

        let dx = (end_x - curr_x).abs();
        let dy = (end_y - curr_y).abs();
        let sx = if curr_x < end_x { 1 } else { -1 };
        let sy = if curr_y < end_y { 1 } else { -1 };
        let mut err = dx - dy;

        loop {
            self.dab(kind, Point::new(curr_x as f64, curr_y as f64), width, color);

            if curr_x == end_x && curr_y == end_y {
                break;
            }

            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                curr_x += sx;
            }
            if e2 < dx {
                err += dx;
                curr_y += sy;
            }
        }
    }

    /// Outline of the rectangle spanned by `start` and `end` into the primary overlay.
    pub fn stroke_rect(&mut self, start: Point, end: Point, width: u32, color: Color) {
        let corners = [
            start,
            Point::new(end.x, start.y),
            end,
            Point::new(start.x, end.y),
        ];
        for i in 0..corners.len() {
            let next = corners[(i + 1) % corners.len()];
            self.stroke_segment(OverlayKind::Primary, corners[i], next, width, color);
        }
    }

    /// Draw `text` onto the surface with its baseline starting at `origin`.
    pub fn draw_text(&mut self, origin: Point, text: &str, size: f32, color: Color) {
        let reach = size as f64 * (text.chars().count() + 1) as f64;
        if !self.canvas.reaches(origin, reach) {
            return;
        }
        match self.font.clone() {
            Some(font) => self.draw_font_text(origin, text, size, color, &font),
            None => self.draw_bitmap_text(origin, text, size, color),
        }
    }

    /// Place a stamp centered on `at`.
    pub fn draw_stamp(&mut self, at: Point, kind: StampKind, color: Color) {
        if !self.canvas.reaches(at, STAMP_SIZE as f64) {
            return;
        }
        let symbol = kind.symbol();
        if let Some(font) = self.font.clone() {
            if font.glyph_id(symbol).0 != 0 {
                let origin = Point::new(at.x - 20.0, at.y + 20.0);
                self.draw_font_text(origin, &symbol.to_string(), STAMP_SIZE, color, &font);
                return;
            }
        }
        self.draw_stamp_shape(at, kind, color);
    }

    fn draw_font_text(
        &mut self,
        origin: Point,
        text: &str,
        size: f32,
        color: Color,
        font: &FontRef<'static>,
    ) {
        let scale = PxScale::from(size);
        let scaled = font.as_scaled(scale);
        let mut cursor = point(origin.x as f32, origin.y as f32);

        let mut glyphs = Vec::new();
        for ch in text.chars() {
            let glyph_id = font.glyph_id(ch);
            glyphs.push(glyph_id.with_scale_and_position(scale, cursor));
            cursor.x += scaled.h_advance(glyph_id);
        }

        for glyph in glyphs {
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let mut covered = Vec::new();
            // Binary coverage keeps the output independent of the rasterizer's AA
            outlined.draw(|gx, gy, coverage| {
                if coverage > 0.5 {
                    let x = bounds.min.x as i64 + gx as i64;
                    covered.push((x, bounds.min.y as i64 + gy as i64));
                }
            });
            for (x, y) in covered {
                self.canvas.blend_surface_pixel(x, y, color);
            }
        }
    }

    fn draw_bitmap_text(&mut self, origin: Point, text: &str, size: f32, color: Color) {
        let scale = (size / 8.0).max(1.0) as i64;
        let top = origin.y.floor() as i64 - 7 * scale;
        let mut char_x = origin.x.floor() as i64;

        for ch in text.chars() {
            if let Some(bitmap) = bitmap_glyph(ch) {
                for (row, byte) in bitmap.iter().enumerate() {
                    for col in 0..8 {
                        if (byte >> (7 - col)) & 1 == 0 {
                            continue;
                        }
                        for sy in 0..scale {
                            for sx in 0..scale {
                                let px = char_x + col * scale + sx;
                                let py = top + row as i64 * scale + sy;
                                self.canvas.blend_surface_pixel(px, py, color);
                            }
                        }
                    }
                }
            }
            char_x += 8 * scale + 1;
            if char_x >= self.canvas.width as i64 {
                break;
            }
        }
    }

    fn draw_stamp_shape(&mut self, at: Point, kind: StampKind, color: Color) {
        let radius = (STAMP_SIZE / 2.0) as f64;
        let star = star_polygon(at, radius, radius * 0.45);
        let min_x = (at.x - radius).floor() as i64;
        let max_x = (at.x + radius).ceil() as i64;
        let min_y = (at.y - radius).floor() as i64;
        let max_y = (at.y + radius).ceil() as i64;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let inside = match kind {
                    StampKind::Star => point_in_polygon(center, &star),
                    StampKind::Check => on_check_mark(center, at, radius),
                    _ => {
                        let dx = center.x - at.x;
                        let dy = center.y - at.y;
                        dx * dx + dy * dy <= radius * radius
                    }
                };
                if inside {
                    self.canvas.blend_surface_pixel(x, y, color);
                }
            }
        }
    }
}

/// Source-over composite of `src` onto `dst`.
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a1 = src[3] as f64 / 255.0;
    let a0 = dst[3] as f64 / 255.0;
    let a = a1 + a0 * (1.0 - a1);
    if a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |i: usize| {
        let c = (src[i] as f64 * a1 + dst[i] as f64 * a0 * (1.0 - a1)) / a;
        (c + 0.5).min(255.0) as u8
    };
    Rgba([channel(0), channel(1), channel(2), (a * 255.0 + 0.5).min(255.0) as u8])
}

fn clear_image(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        *pixel = Rgba([0, 0, 0, 0]);
    }
}

fn system_font() -> Option<&'static [u8]> {
    *SYSTEM_FONT.get_or_init(|| {
        let source = SystemSource::new();
        let family_names = [FamilyName::Title("Arial".into()), FamilyName::SansSerif];

        for family_name in &family_names {
            let family = [family_name.clone()];
            let Ok(handle) = source.select_best_match(&family, &Properties::new()) else {
                continue;
            };
            let Ok(font) = handle.load() else {
                continue;
            };
            if let Some(data) = font.copy_font_data() {
                // Loaded once per process
                let bytes: &'static [u8] = Box::leak((*data).clone().into_boxed_slice());
                if FontRef::try_from_slice(bytes).is_ok() {
                    tracing::debug!(family = ?family_name, "loaded system font");
                    return Some(bytes);
                }
            }
        }
        tracing::warn!("no system font found, text falls back to the bitmap font");
        None
    })
}

/// Liang-Barsky clip of the segment `from`-`to` against the box `min`-`max`.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    if !from.is_finite() || !to.is_finite() {
        return None;
    }
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    let edges = [
        (-dx, from.x - min.x),
        (dx, max.x - from.x),
        (-dy, from.y - min.y),
        (dy, max.y - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let start = if t0 > 0.0 { Point::new(from.x + t0 * dx, from.y + t0 * dy) } else { from };
    let end = if t1 < 1.0 { Point::new(from.x + t1 * dx, from.y + t1 * dy) } else { to };
    Some((start, end))
}

fn star_polygon(center: Point, outer: f64, inner: f64) -> Vec<Point> {
    (0..10)
        .map(|i| {
            let r = if i % 2 == 0 { outer } else { inner };
            let angle = -std::f64::consts::FRAC_PI_2 + i as f64 * std::f64::consts::PI / 5.0;
            Point::new(center.x + r * angle.cos(), center.y + r * angle.sin())
        })
        .collect()
}

fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn on_check_mark(p: Point, center: Point, radius: f64) -> bool {
    let a = Point::new(center.x - radius * 0.7, center.y);
    let b = Point::new(center.x - radius * 0.2, center.y + radius * 0.5);
    let c = Point::new(center.x + radius * 0.7, center.y - radius * 0.6);
    let half = radius * 0.15;
    distance_to_segment(p, a, b) <= half || distance_to_segment(p, b, c) <= half
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (vx, vy) = (b.x - a.x, b.y - a.y);
    let len_sq = vx * vx + vy * vy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * vx + (p.y - a.y) * vy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * vx, a.y + t * vy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

fn bitmap_glyph(ch: char) -> Option<&'static [u8; 8]> {
    let ch = ch.to_ascii_uppercase();
    BITMAP_FONT.iter().find(|(c, _)| *c == ch).map(|(_, bits)| bits)
}

// 8x8 fallback glyphs, most significant bit on the left
const BITMAP_FONT: &[(char, [u8; 8])] = &[
    (' ', [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
    ('A', [0x18, 0x24, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x00]),
    ('B', [0x7C, 0x42, 0x42, 0x7C, 0x42, 0x42, 0x7C, 0x00]),
    ('C', [0x3C, 0x42, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00]),
    ('D', [0x78, 0x44, 0x42, 0x42, 0x42, 0x44, 0x78, 0x00]),
    ('E', [0x7E, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x7E, 0x00]),
    ('F', [0x7E, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x40, 0x00]),
    ('G', [0x3C, 0x42, 0x40, 0x4E, 0x42, 0x42, 0x3C, 0x00]),
    ('H', [0x42, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x00]),
    ('I', [0x3E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00]),
    ('J', [0x02, 0x02, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00]),
    ('K', [0x44, 0x48, 0x50, 0x60, 0x50, 0x48, 0x44, 0x00]),
    ('L', [0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7E, 0x00]),
    ('M', [0x42, 0x66, 0x5A, 0x42, 0x42, 0x42, 0x42, 0x00]),
    ('N', [0x42, 0x62, 0x52, 0x4A, 0x46, 0x42, 0x42, 0x00]),
    ('O', [0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00]),
    ('P', [0x7C, 0x42, 0x42, 0x7C, 0x40, 0x40, 0x40, 0x00]),
    ('Q', [0x3C, 0x42, 0x42, 0x42, 0x4A, 0x44, 0x3A, 0x00]),
    ('R', [0x7C, 0x42, 0x42, 0x7C, 0x48, 0x44, 0x42, 0x00]),
    ('S', [0x3C, 0x42, 0x40, 0x3C, 0x02, 0x42, 0x3C, 0x00]),
    ('T', [0x7F, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00]),
    ('U', [0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00]),
    ('V', [0x42, 0x42, 0x42, 0x42, 0x24, 0x18, 0x18, 0x00]),
    ('W', [0x42, 0x42, 0x42, 0x42, 0x5A, 0x66, 0x42, 0x00]),
    ('X', [0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x42, 0x00]),
    ('Y', [0x41, 0x22, 0x14, 0x08, 0x08, 0x08, 0x08, 0x00]),
    ('Z', [0x7E, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00]),
    ('0', [0x3C, 0x46, 0x4A, 0x52, 0x62, 0x62, 0x3C, 0x00]),
    ('1', [0x18, 0x28, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00]),
    ('2', [0x3C, 0x42, 0x02, 0x0C, 0x30, 0x40, 0x7E, 0x00]),
    ('3', [0x3C, 0x42, 0x02, 0x1C, 0x02, 0x42, 0x3C, 0x00]),
    ('4', [0x08, 0x18, 0x28, 0x48, 0x7E, 0x08, 0x08, 0x00]),
    ('5', [0x7E, 0x40, 0x7C, 0x02, 0x02, 0x42, 0x3C, 0x00]),
    ('6', [0x3C, 0x40, 0x40, 0x7C, 0x42, 0x42, 0x3C, 0x00]),
    ('7', [0x7E, 0x02, 0x04, 0x08, 0x10, 0x20, 0x20, 0x00]),
    ('8', [0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x3C, 0x00]),
    ('9', [0x3C, 0x42, 0x42, 0x3E, 0x02, 0x02, 0x3C, 0x00]),
    ('.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00]),
    (',', [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x30]),
    ('!', [0x18, 0x18, 0x18, 0x18, 0x00, 0x00, 0x18, 0x00]),
    ('?', [0x3C, 0x42, 0x04, 0x08, 0x08, 0x00, 0x08, 0x00]),
];
