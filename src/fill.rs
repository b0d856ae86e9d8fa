//! 4-connected flood fill with exact RGB matching.

use crate::Color;
use image::RgbaImage;

/// Fill the region connected to `(x, y)` on `surface`.
///
/// Matching is done against a copy of the surface taken before any write, so
/// the output never feeds back into the comparison. Returns the number of
/// pixels written; `0` means the surface was left untouched (seed out of
/// bounds, or the seed already has the fill color).
pub fn flood_fill(surface: &mut RgbaImage, x: i64, y: i64, fill: Color, opacity: f64) -> usize {
    let (width, height) = surface.dimensions();
    let in_bounds = |x: i64, y: i64| x >= 0 && y >= 0 && x < width as i64 && y < height as i64;
    if !in_bounds(x, y) {
        return 0;
    }

    let source = surface.clone();
    let target = Color::from(*source.get_pixel(x as u32, y as u32));
    if target.same_rgb(&fill) {
        return 0;
    }

    let alpha = (fill.a as f64 / 255.0 * opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let pixel = Color { a: alpha, ..fill }.to_rgba();

    let mut visited = vec![false; width as usize * height as usize];
    let mut stack = vec![(x, y)];
    let mut written = 0;

    while let Some((px, py)) = stack.pop() {
        if !in_bounds(px, py) {
            continue;
        }
        let index = py as usize * width as usize + px as usize;
        if visited[index] {
            continue;
        }

        let current = Color::from(*source.get_pixel(px as u32, py as u32));
        if current.same_rgb(&target) {
            surface.put_pixel(px as u32, py as u32, pixel);
            visited[index] = true;
            written += 1;

            stack.push((px + 1, py));
            stack.push((px - 1, py));
            stack.push((px, py + 1));
            stack.push((px, py - 1));
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, WHITE)
    }

    #[test]
    fn fills_blank_surface_entirely() {
        let mut img = white(10, 10);
        assert_eq!(flood_fill(&mut img, 5, 5, RED, 1.0), 100);
        assert!(img.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn vertical_line_is_a_boundary() {
        let mut img = white(10, 10);
        for y in 0..10 {
            img.put_pixel(5, y, Rgba([0, 0, 0, 255]));
        }

        flood_fill(&mut img, 0, 0, BLUE, 1.0);

        for y in 0..10 {
            for x in 0..5 {
                assert_eq!(*img.get_pixel(x, y), Rgba([0, 0, 255, 255]));
            }
            assert_eq!(*img.get_pixel(5, y), Rgba([0, 0, 0, 255]));
            for x in 6..10 {
                assert_eq!(*img.get_pixel(x, y), WHITE);
            }
        }
    }

    #[test]
    fn same_color_fill_is_a_no_op() {
        let mut img = white(6, 6);
        img.put_pixel(2, 2, Rgba([255, 0, 0, 40]));
        let before = img.clone();

        assert_eq!(flood_fill(&mut img, 2, 2, RED, 1.0), 0);
        assert_eq!(img, before);

        // Filling twice changes nothing the second time
        flood_fill(&mut img, 0, 0, BLUE, 1.0);
        let once = img.clone();
        assert_eq!(flood_fill(&mut img, 0, 0, BLUE, 1.0), 0);
        assert_eq!(img, once);
    }

    #[test]
    fn diagonal_neighbors_are_not_connected() {
        // Checkerboard: white cells only touch diagonally
        let mut img = RgbaImage::from_fn(4, 4, |x, y| {
            if (x + y) % 2 == 0 { WHITE } else { Rgba([0, 0, 0, 255]) }
        });

        assert_eq!(flood_fill(&mut img, 0, 0, RED, 1.0), 1);
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(1, 1), WHITE);
    }

    #[test]
    fn out_of_bounds_seed_writes_nothing() {
        let mut img = white(3, 3);
        assert_eq!(flood_fill(&mut img, -1, 0, RED, 1.0), 0);
        assert_eq!(flood_fill(&mut img, 0, 3, RED, 1.0), 0);
        assert_eq!(img, white(3, 3));
    }

    #[test]
    fn alpha_is_scaled_by_opacity_and_ignored_for_matching() {
        let mut img = white(4, 1);
        img.put_pixel(3, 0, Rgba([255, 255, 255, 10]));

        assert_eq!(flood_fill(&mut img, 0, 0, RED, 0.5), 4);
        assert!(img.pixels().all(|p| *p == Rgba([255, 0, 0, 128])));
    }
}
