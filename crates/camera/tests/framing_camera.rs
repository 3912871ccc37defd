//! Framing camera over ellipsoid and plate shapes.

use camera::{Camera, FrameGeometry, FramingCamera, RadialDistortion, StaticEphemeris};
use cube_common::ErrorKind;
use shape_model::{DskShapeModel, EllipsoidShape, PlateKernel, ShapeModel, Vec3};
use std::sync::Arc;
use test_utils::assert_approx_eq;

fn nadir_camera(shape: Arc<dyn ShapeModel>) -> FramingCamera {
    let ephemeris = StaticEphemeris::nadir(Vec3::new(100.0, 0.0, 0.0), Vec3::new(1.5e8, 0.0, 0.0), [10.0; 3]).unwrap();
    FramingCamera::new(FrameGeometry::new(65, 65, 10.0, 0.1), shape, Arc::new(ephemeris), 0.0).unwrap()
}

fn sphere() -> Arc<dyn ShapeModel> {
    Arc::new(EllipsoidShape::sphere(10.0).unwrap())
}

#[test]
fn test_boresight_sees_sub_spacecraft_point() {
    let mut cam = nadir_camera(sphere());
    assert!(cam.set_image(33.0, 33.0).unwrap());
    assert_approx_eq!(cam.universal_latitude().unwrap(), 0.0, 1e-9);
    assert_approx_eq!(cam.universal_longitude().unwrap(), 0.0, 1e-9);
    assert_approx_eq!(cam.local_radius().unwrap(), 10.0, 1e-9);
    assert_approx_eq!(cam.emission_angle().unwrap(), 0.0, 1e-6);
    assert_approx_eq!(cam.phase_angle().unwrap(), 0.0, 1e-6);
    // 90 km range, 0.1 mm pitch, 10 mm focal length: 900 m per pixel.
    assert_approx_eq!(cam.pixel_resolution().unwrap(), 900.0, 1e-6);
}

#[test]
fn test_off_limb_pixel_misses() {
    let mut cam = nadir_camera(sphere());
    assert!(!cam.set_image(1.0, 1.0).unwrap());
    let err = cam.universal_latitude().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Camera);
}

#[test]
fn test_image_ground_round_trip() {
    let mut cam = nadir_camera(sphere());
    for (s, l) in [(30.0, 35.0), (36.5, 28.25), (33.0, 40.0)] {
        assert!(cam.set_image(s, l).unwrap());
        let (lat, lon) = (cam.universal_latitude().unwrap(), cam.universal_longitude().unwrap());
        assert!(cam.set_ground(lat, lon).unwrap());
        let (s2, l2) = cam.image_position().unwrap();
        assert_approx_eq!(s2, s, 1e-6);
        assert_approx_eq!(l2, l, 1e-6);
    }
}

#[test]
fn test_far_side_is_not_visible() {
    let mut cam = nadir_camera(sphere());
    assert!(!cam.set_ground(0.0, 180.0).unwrap());
    assert!(cam.set_ground(0.0, 0.0).unwrap());
}

#[test]
fn test_distortion_round_trip() {
    let mut cam = nadir_camera(sphere()).with_distortion(Box::new(RadialDistortion::new(1e-3, 0.0, 0.0)));
    assert!(cam.set_image(38.0, 30.0).unwrap());
    let (lat, lon) = (cam.universal_latitude().unwrap(), cam.universal_longitude().unwrap());
    assert!(cam.set_ground(lat, lon).unwrap());
    let (s, l) = cam.image_position().unwrap();
    assert_approx_eq!(s, 38.0, 1e-6);
    assert_approx_eq!(l, 30.0, 1e-6);
}

#[test]
fn test_plate_model_local_angles() {
    let r = 10.0;
    let kernel = PlateKernel::from_parts(
        vec![
            Vec3::new(r, 0.0, 0.0),
            Vec3::new(-r, 0.0, 0.0),
            Vec3::new(0.0, r, 0.0),
            Vec3::new(0.0, -r, 0.0),
            Vec3::new(0.0, 0.0, r),
            Vec3::new(0.0, 0.0, -r),
        ],
        vec![[1, 3, 5], [3, 2, 5], [2, 4, 5], [4, 1, 5], [3, 1, 6], [2, 3, 6], [4, 2, 6], [1, 4, 6]],
    )
    .unwrap();
    let mut cam = nadir_camera(Arc::new(DskShapeModel::from_kernel(kernel)));
    // Slightly off the vertex so the ray lands inside plate 1.
    assert!(cam.set_image(34.0, 32.0).unwrap());
    let local = cam.local_photometric_angles().unwrap();
    assert!(local.valid);
    // Plate normal (1,1,1)/sqrt(3) is tilted from the view direction.
    assert!(local.emission > 50.0 && local.emission < 60.0);
    assert!(cam.emission_angle().unwrap() < 10.0);
}

#[test]
fn test_band_bounds() {
    let mut cam = nadir_camera(sphere());
    assert!(cam.set_band(1).is_ok());
    assert_eq!(cam.set_band(2).unwrap_err().kind(), ErrorKind::BadArgument);
}
