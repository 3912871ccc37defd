//! Focal-plane distortion maps. Coordinates are millimetres from the
//! boresight.

/// Maps between distorted (measured) and undistorted (ideal) focal-plane
/// coordinates.
pub trait DistortionMap: Send + Sync + std::fmt::Debug {
    fn undistort(&self, x: f64, y: f64) -> (f64, f64);
    fn distort(&self, ux: f64, uy: f64) -> (f64, f64);
}

/// Identity map.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDistortion;

impl DistortionMap for NoDistortion {
    fn undistort(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn distort(&self, ux: f64, uy: f64) -> (f64, f64) {
        (ux, uy)
    }
}

/// Odd-order radial distortion: `u = d * (1 + k1 r^2 + k2 r^4 + k3 r^6)`
/// with `r` the distorted radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialDistortion {
    pub k: [f64; 3],
}

impl RadialDistortion {
    const MAX_ITERATIONS: usize = 50;
    const TOLERANCE: f64 = 1e-12;

    pub fn new(k1: f64, k2: f64, k3: f64) -> Self {
        Self { k: [k1, k2, k3] }
    }

    fn factor(&self, r2: f64) -> f64 {
        1.0 + r2 * (self.k[0] + r2 * (self.k[1] + r2 * self.k[2]))
    }
}

impl DistortionMap for RadialDistortion {
    fn undistort(&self, x: f64, y: f64) -> (f64, f64) {
        let f = self.factor(x * x + y * y);
        (x * f, y * f)
    }

    fn distort(&self, ux: f64, uy: f64) -> (f64, f64) {
        // Fixed-point iteration on d = u / factor(|d|^2).
        let (mut x, mut y) = (ux, uy);
        for _ in 0..Self::MAX_ITERATIONS {
            let f = self.factor(x * x + y * y);
            if f == 0.0 {
                break;
            }
            let (nx, ny) = (ux / f, uy / f);
            let done = (nx - x).abs() < Self::TOLERANCE && (ny - y).abs() < Self::TOLERANCE;
            x = nx;
            y = ny;
            if done {
                break;
            }
        }
        (x, y)
    }
}
