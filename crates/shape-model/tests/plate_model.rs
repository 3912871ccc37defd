//! End-to-end plate model behaviour: intersection, lat/lon queries, error
//! kinds and shared handles across threads.

use cube_common::ErrorKind;
use shape_model::{
    direction_to_lat_lon, DskShapeModel, EllipsoidShape, PlateKernel, ShapeModel, Vec3,
};
use std::path::PathBuf;
use test_utils::fixtures::geometry;
use test_utils::{
    assert_approx_eq, assert_vec3_approx_eq, octahedron_plate_text, require_test_file, temp_test_dir,
    unit_plate_text,
};

fn v(a: [f64; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

fn write_kernel(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn octahedron(dir: &tempfile::TempDir) -> DskShapeModel {
    DskShapeModel::open(write_kernel(dir, "octa.plt", &octahedron_plate_text(10.0))).unwrap()
}

#[test]
fn test_unit_plate_hit() {
    let dir = temp_test_dir();
    let model = DskShapeModel::open(write_kernel(&dir, "unit.plt", &unit_plate_text())).unwrap();
    let hit = model
        .intercept(&v(geometry::HIT_OBSERVER), &v(geometry::HIT_LOOK))
        .unwrap()
        .expect("ray should strike the plate");
    assert_vec3_approx_eq!(hit.surface_point(), [1.0, 0.0, 0.0], 1e-10);
    assert_approx_eq!(hit.emission_angle(), (1.0 / 3f64.sqrt()).acos(), 1e-12);
    assert_approx_eq!(hit.range(), 999.0, 1e-9);
}

#[test]
fn test_unit_plate_miss() {
    let dir = temp_test_dir();
    let model = DskShapeModel::open(write_kernel(&dir, "unit.plt", &unit_plate_text())).unwrap();
    let hit = model
        .intercept(&v(geometry::MISS_OBSERVER), &v(geometry::MISS_LOOK))
        .unwrap();
    assert!(hit.is_none());
}

#[test]
fn test_centroid_rays_hit_own_plate() {
    let dir = temp_test_dir();
    let model = octahedron(&dir);
    let max_radius = model.max_radius().unwrap();
    for id in 1..=model.plate_count().unwrap() {
        let plate = model.plate(id).unwrap();
        let observer = plate.centroid().normalize() * (2.0 * max_radius);
        let hit = model.intercept(&observer, &(-observer)).unwrap().unwrap();
        let struck = hit.plate();
        let shares_vertex = plate
            .vertices
            .iter()
            .any(|pv| struck.vertices.iter().any(|sv| (pv - sv).norm() < 1e-12));
        assert!(shares_vertex || (struck.centroid() - plate.centroid()).norm() < 1e-9);
        assert_eq!(hit.plate_id(), id);
    }
}

#[test]
fn test_lat_lon_points_lie_on_requested_direction() {
    let dir = temp_test_dir();
    let model = octahedron(&dir);
    let mut lat = -85.0;
    while lat <= 85.0 {
        let mut lon = 0.0;
        while lon < 360.0 {
            if let Some(point) = model.surface_point(lat, lon).unwrap() {
                let (plat, plon) = direction_to_lat_lon(&point);
                assert_approx_eq!(plat, lat, 1e-8);
                let dlon = (plon - lon).rem_euclid(360.0);
                assert!(dlon < 1e-8 || dlon > 360.0 - 1e-8, "lon {lon} came back as {plon}");
            }
            lon += 17.0;
        }
        lat += 12.5;
    }
}

#[test]
fn test_local_radius_on_octahedron() {
    let dir = temp_test_dir();
    let model = octahedron(&dir);
    // Vertex directions sit at the full radius, face centers at r / sqrt(3).
    assert_approx_eq!(model.local_radius(0.0, 0.0).unwrap().unwrap(), 10.0, 1e-9);
    let face_lat = (1.0 / 3f64.sqrt()).asin().to_degrees();
    assert_approx_eq!(model.local_radius(face_lat, 45.0).unwrap().unwrap(), 10.0 / 3f64.sqrt(), 1e-9);
}

#[test]
fn test_missing_dsk_is_user_error() {
    let err = DskShapeModel::open("/definitely/not/here/vesta.plt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(err.to_string().contains("vesta.plt"));
}

#[test]
fn test_non_dsk_file_is_spice_unknown() {
    let dir = temp_test_dir();
    let path = dir.path().join("image.fits");
    std::fs::write(&path, [0x53u8, 0x49, 0x4d, 0x50, 0xff, 0x00, 0xfe]).unwrap();
    let err = DskShapeModel::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpiceUnknown);
}

#[test]
fn test_unopened_facade_is_configuration_error() {
    let model = DskShapeModel::unopened();
    let err = model.intercept(&Vec3::new(10.0, 0.0, 0.0), &Vec3::new(-1.0, 0.0, 0.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_shared_handle_across_threads() {
    let dir = temp_test_dir();
    let model = octahedron(&dir);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let model = model.clone();
            std::thread::spawn(move || {
                let lon = 90.0 * i as f64 + 10.0;
                model.surface_point(20.0, lon).unwrap().is_some()
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }
    assert_eq!(model.handle_references(), 1);
}

#[test]
fn test_plate_model_and_ellipsoid_agree_at_vertices() {
    let kernel = PlateKernel::from_parts(
        vec![
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -5.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -5.0),
        ],
        vec![[1, 3, 5], [3, 2, 5], [2, 4, 5], [4, 1, 5], [3, 1, 6], [2, 3, 6], [4, 2, 6], [1, 4, 6]],
    )
    .unwrap();
    let plates: Box<dyn ShapeModel> = Box::new(DskShapeModel::from_kernel(kernel));
    let sphere: Box<dyn ShapeModel> = Box::new(EllipsoidShape::sphere(5.0).unwrap());
    for shape in [&plates, &sphere] {
        let hit = shape
            .intersect(&Vec3::new(0.0, 0.0, 50.0), &Vec3::new(0.0, 0.0, -1.0))
            .unwrap()
            .unwrap();
        assert_approx_eq!(hit.point.z, 5.0, 1e-9);
    }
}

#[test]
fn test_mission_kernel_nadir_points() {
    let path = require_test_file!("phobos_k275.plt");
    let model = DskShapeModel::open(path).unwrap();
    assert!(model.plate_count().unwrap() > 0);
    let max_radius = model.max_radius().unwrap();
    for (lat, lon) in [(0.0, 0.0), (45.0, 90.0), (-60.0, 200.0)] {
        let point = model.surface_point(lat, lon).unwrap().expect("closed body");
        assert!(point.norm() <= max_radius + 1e-9);
        let (plat, _) = direction_to_lat_lon(&point);
        assert_approx_eq!(plat, lat, 1e-8);
    }
}
