use std::path::Path;

use image::{Rgb, RgbImage};

use crate::BenchError;

/// Turns a sample sequence into a chart image on disk.
pub trait PlotRenderer {
    fn render(&self, samples: &[f64], path: &Path) -> Result<(), BenchError>;
}

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Plain line chart written as PNG: x is the frame index, y spans
/// `[0, max]` of the samples.
#[derive(Debug, Clone, Copy)]
pub struct PngLinePlotter {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl Default for PngLinePlotter {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            margin: 40,
        }
    }
}

impl PngLinePlotter {
    /// Draws the chart into memory without touching the filesystem.
    pub fn draw(&self, samples: &[f64]) -> Result<RgbImage, BenchError> {
        if self.width <= self.margin * 2 || self.height <= self.margin * 2 {
            return Err(BenchError::Plot(format!(
                "canvas {}x{} too small for margin {}",
                self.width, self.height, self.margin
            )));
        }

        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let left = self.margin as i64;
        let right = (self.width - self.margin) as i64;
        let top = self.margin as i64;
        let bottom = (self.height - self.margin) as i64;

        for step in 1..=4 {
            let y = bottom - (bottom - top) * step / 4;
            draw_line(&mut img, (left, y), (right, y), GRID);
        }
        draw_line(&mut img, (left, top), (left, bottom), AXIS);
        draw_line(&mut img, (left, bottom), (right, bottom), AXIS);

        let y_max = samples.iter().copied().fold(0.0_f64, f64::max);
        let y_span = if y_max > 0.0 { y_max } else { 1.0 };
        let x_span = samples.len().saturating_sub(1).max(1) as f64;

        let to_pixel = |index: usize, value: f64| {
            let x = left as f64 + (right - left) as f64 * index as f64 / x_span;
            let y = bottom as f64 - (bottom - top) as f64 * value.max(0.0) / y_span;
            (x.round() as i64, y.round() as i64)
        };

        match samples {
            [] => {}
            [only] => {
                let p = to_pixel(0, *only);
                draw_line(&mut img, p, (right, p.1), LINE);
            }
            _ => {
                for (index, pair) in samples.windows(2).enumerate() {
                    let a = to_pixel(index, pair[0]);
                    let b = to_pixel(index + 1, pair[1]);
                    draw_line(&mut img, a, b, LINE);
                }
            }
        }

        Ok(img)
    }
}

impl PlotRenderer for PngLinePlotter {
    fn render(&self, samples: &[f64], path: &Path) -> Result<(), BenchError> {
        self.draw(samples)?
            .save(path)
            .map_err(|err| BenchError::Plot(format!("{}: {err}", path.display())))
    }
}

// Bresenham; points outside the canvas are dropped.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
