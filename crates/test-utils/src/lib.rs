//! Test support shared by the cubekit crates: synthetic cubes, foreign
//! file builders, plate kernels and tolerance assertions.
//!
//! Tests that need real mission data (large shape kernels, archived
//! images) look it up with [`find_test_file`] and skip when it is absent.

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Path of a mission data file, or return from the test when it is not
/// installed.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "skipping: {} not found (set CUBEKIT_TEST_DATA)",
                    $name
                );
                return;
            }
        }
    }};
}

/// Asserts `|left - right| <= epsilon`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!("assertion failed: {} differs from {} by {} (epsilon {})", left, right, diff, epsilon);
        }
    }};
}

/// Component-wise [`assert_approx_eq!`] for anything indexable by 0..3.
#[macro_export]
macro_rules! assert_vec3_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let l = $left;
        let r = $right;
        $crate::assert_approx_eq!(l[0], r[0], $epsilon);
        $crate::assert_approx_eq!(l[1], r[1], $epsilon);
        $crate::assert_approx_eq!(l[2], r[2], $epsilon);
    }};
}
