//! Luminance-grid extractor
//!
//! Treats the payload as an 8-bit luminance plane, smooths it with a 3x3 box
//! filter, keeps local maxima of gradient magnitude and describes each with
//! a 4x4 grid of gradient sums over an 8x8 window.

use super::{ExtractionError, FeatureExtractor, FeatureSet};

/// Bytes per descriptor row: 16 cells x (|dx|, |dy|)
pub const DESCRIPTOR_DIM: usize = 32;

const WINDOW_RADIUS: usize = 4;

#[derive(Debug, Clone)]
pub struct LumaGridExtractor {
    /// Minimum gradient magnitude for a keypoint
    pub threshold: i32,
    /// Strongest keypoints kept per image
    pub max_features: usize,
}

impl Default for LumaGridExtractor {
    fn default() -> Self {
        Self {
            threshold: 24,
            max_features: 500,
        }
    }
}

struct Plane {
    width: usize,
    height: usize,
    pixels: Vec<i32>,
}

impl Plane {
    /// Lay the payload out as a near-square plane, dropping the ragged tail
    fn from_bytes(payload: &[u8]) -> Self {
        let width = ((payload.len() as f64).sqrt().ceil() as usize).max(1);
        let height = payload.len() / width;
        let pixels = payload[..width * height]
            .iter()
            .map(|&b| i32::from(b))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> i32 {
        self.pixels[y * self.width + x]
    }

    fn box_blur(&self) -> Self {
        let mut out = self.pixels.clone();
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                let mut sum = 0;
                for dy in 0..3 {
                    for dx in 0..3 {
                        sum += self.at(x + dx - 1, y + dy - 1);
                    }
                }
                out[y * self.width + x] = sum / 9;
            }
        }
        Self {
            width: self.width,
            height: self.height,
            pixels: out,
        }
    }
}

struct Gradients {
    dx: Vec<i32>,
    dy: Vec<i32>,
    magnitude: Vec<i32>,
}

fn gradients(plane: &Plane) -> Gradients {
    let len = plane.width * plane.height;
    let mut dx = vec![0; len];
    let mut dy = vec![0; len];
    let mut magnitude = vec![0; len];
    for y in 1..plane.height - 1 {
        for x in 1..plane.width - 1 {
            let i = y * plane.width + x;
            dx[i] = plane.at(x + 1, y) - plane.at(x - 1, y);
            dy[i] = plane.at(x, y + 1) - plane.at(x, y - 1);
            magnitude[i] = dx[i].abs() + dy[i].abs();
        }
    }
    Gradients { dx, dy, magnitude }
}

impl LumaGridExtractor {
    fn keypoints(&self, plane: &Plane, grads: &Gradients) -> Vec<(usize, usize, i32)> {
        let w = plane.width;
        let mut found = Vec::new();
        for y in WINDOW_RADIUS..plane.height - WINDOW_RADIUS {
            for x in WINDOW_RADIUS..w - WINDOW_RADIUS {
                let m = grads.magnitude[y * w + x];
                if m < self.threshold {
                    continue;
                }
                // plateaus yield one peak: strict against earlier raster neighbors
                let is_peak = (0..3).all(|dy| {
                    (0..3).all(|dx| {
                        let neighbor = grads.magnitude[(y + dy - 1) * w + (x + dx - 1)];
                        match (dx, dy) {
                            (1, 1) => true,
                            (_, 0) | (0, 1) => neighbor < m,
                            _ => neighbor <= m,
                        }
                    })
                });
                if is_peak {
                    found.push((x, y, m));
                }
            }
        }
        // strongest first, position breaks ties
        found.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));
        found.truncate(self.max_features);
        found
    }

    fn describe(&self, plane: &Plane, grads: &Gradients, x: usize, y: usize) -> [u8; DESCRIPTOR_DIM] {
        let w = plane.width;
        let mut cells = [0i64; DESCRIPTOR_DIM];
        for wy in 0..2 * WINDOW_RADIUS {
            for wx in 0..2 * WINDOW_RADIUS {
                let px = x + wx - WINDOW_RADIUS;
                let py = y + wy - WINDOW_RADIUS;
                let cell = (wy / 2) * 4 + wx / 2;
                let i = py * w + px;
                cells[cell * 2] += i64::from(grads.dx[i].abs());
                cells[cell * 2 + 1] += i64::from(grads.dy[i].abs());
            }
        }

        let peak = cells.iter().copied().max().unwrap_or(0).max(1);
        let mut descriptor = [0u8; DESCRIPTOR_DIM];
        for (slot, value) in descriptor.iter_mut().zip(cells.iter()) {
            *slot = ((value * 255) / peak) as u8;
        }
        descriptor
    }
}

impl FeatureExtractor for LumaGridExtractor {
    fn name(&self) -> &'static str {
        "luma-grid"
    }

    fn extract(&self, payload: &[u8]) -> Result<FeatureSet, ExtractionError> {
        if payload.is_empty() {
            return Err(ExtractionError::InvalidInput("empty payload".to_string()));
        }

        let raw = Plane::from_bytes(payload);
        if raw.width <= 2 * WINDOW_RADIUS || raw.height <= 2 * WINDOW_RADIUS {
            return Ok(FeatureSet::empty(DESCRIPTOR_DIM));
        }

        let plane = raw.box_blur();
        let grads = gradients(&plane);
        let keypoints = self.keypoints(&plane, &grads);

        let mut descriptors = Vec::with_capacity(keypoints.len() * DESCRIPTOR_DIM);
        for &(x, y, _) in &keypoints {
            descriptors.extend_from_slice(&self.describe(&plane, &grads, x, y));
        }

        FeatureSet::new(keypoints.len(), DESCRIPTOR_DIM, descriptors)
    }
}
