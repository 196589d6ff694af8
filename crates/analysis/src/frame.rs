// crates/analysis/src/frame.rs
//! Grayscale frames and the vision primitives the backends are built on.
//!
//! Edge, line and region detection are `imageproc` calls. Everything here is
//! synchronous and CPU-bound; callers run it on the blocking pool.

use std::collections::HashMap;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::edges::canny;
use imageproc::hough::{detect_lines, LineDetectionOptions};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Canny hysteresis thresholds.
pub const CANNY_LOW: f32 = 50.0;
pub const CANNY_HIGH: f32 = 150.0;

/// Neighbourhood in Hough space within which weaker peaks are dropped.
const LINE_SUPPRESSION_RADIUS: u32 = 8;

/// One decoded grayscale frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    /// Frame number in the source video.
    pub index: u64,
    pub image: GrayImage,
}

impl GrayFrame {
    pub fn new(index: u64, image: GrayImage) -> Self {
        Self { index, image }
    }

    /// Wrap a row-major 8-bit buffer, `None` if its length is not `width * height`.
    pub fn from_raw(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, pixels).map(|image| Self::new(index, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// Which side of a threshold level counts as foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pixels strictly brighter than the level.
    Above,
    /// Pixels at or below the level.
    AtOrBelow,
}

/// Mean absolute per-pixel difference, or `None` when dimensions differ.
pub fn mean_abs_diff(a: &GrayFrame, b: &GrayFrame) -> Option<f64> {
    if a.image.dimensions() != b.image.dimensions() || a.area() == 0 {
        return None;
    }
    let total: u64 = a
        .image
        .as_raw()
        .iter()
        .zip(b.image.as_raw())
        .map(|(&p, &q)| p.abs_diff(q) as u64)
        .sum();
    Some(total as f64 / a.area() as f64)
}

/// Canny edge map; edge pixels are 255, everything else 0.
pub fn edges(frame: &GrayFrame) -> GrayImage {
    canny(&frame.image, CANNY_LOW, CANNY_HIGH)
}

/// Fraction of pixels on a Canny edge.
pub fn edge_density(frame: &GrayFrame) -> f64 {
    let area = frame.area();
    if area == 0 {
        return 0.0;
    }
    let edge_pixels = edges(frame).pixels().filter(|p| p[0] > 0).count();
    edge_pixels as f64 / area as f64
}

/// Count straight lines in an edge map that run within `tolerance_deg` of
/// horizontal and are supported by at least `min_votes` edge pixels.
pub fn horizontal_lines(edge_map: &GrayImage, min_votes: u32, tolerance_deg: u32) -> usize {
    let options = LineDetectionOptions {
        vote_threshold: min_votes,
        suppression_radius: LINE_SUPPRESSION_RADIUS,
    };
    // Polar angles measure the line normal, so horizontal lines sit at 90.
    detect_lines(edge_map, options)
        .into_iter()
        .filter(|line| line.angle_in_degrees.abs_diff(90) < tolerance_deg)
        .count()
}

/// Count 4-connected regions on the `polarity` side of `level` whose pixel
/// area exceeds `min_area`.
pub fn count_regions(frame: &GrayFrame, level: u8, polarity: Polarity, min_area: usize) -> usize {
    let kind = match polarity {
        Polarity::Above => ThresholdType::Binary,
        Polarity::AtOrBelow => ThresholdType::BinaryInverted,
    };
    let mask = threshold(&frame.image, level, kind);
    let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));

    let mut areas: HashMap<u32, usize> = HashMap::new();
    for label in labels.pixels().map(|p| p[0]).filter(|&l| l != 0) {
        *areas.entry(label).or_default() += 1;
    }
    areas.values().filter(|&&area| area > min_area).count()
}

#[cfg(test)]
pub(crate) mod test_frames {
    use super::GrayFrame;
    use image::{GrayImage, Luma};
    use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
    use imageproc::rect::Rect;

    pub fn filled(index: u64, width: u32, height: u32, value: u8) -> GrayFrame {
        GrayFrame::new(index, GrayImage::from_pixel(width, height, Luma([value])))
    }

    /// Paint `value` into the rectangle `[x0, x1) x [y0, y1)`.
    pub fn paint(frame: &mut GrayFrame, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        let rect = Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
        draw_filled_rect_mut(&mut frame.image, rect, Luma([value]));
    }

    /// Draw a straight stroke `thickness` pixels tall from `start` to `end`.
    pub fn stroke(
        frame: &mut GrayFrame,
        start: (f32, f32),
        end: (f32, f32),
        thickness: u32,
        value: u8,
    ) {
        for dy in 0..thickness {
            let dy = dy as f32;
            draw_line_segment_mut(
                &mut frame.image,
                (start.0, start.1 + dy),
                (end.0, end.1 + dy),
                Luma([value]),
            );
        }
    }
}
