//! Common test fixtures: plate kernels and reference geometry.

/// Plate-vertex text for a regular octahedron of the given radius.
///
/// Vertices 1..=6 are +X, -X, +Y, -Y, +Z, -Z; plates are wound so their
/// normals point away from the origin.
pub fn octahedron_plate_text(radius: f64) -> String {
    let r = radius;
    let vertices = [
        (r, 0.0, 0.0),
        (-r, 0.0, 0.0),
        (0.0, r, 0.0),
        (0.0, -r, 0.0),
        (0.0, 0.0, r),
        (0.0, 0.0, -r),
    ];
    let plates = [
        (1, 3, 5),
        (3, 2, 5),
        (2, 4, 5),
        (4, 1, 5),
        (3, 1, 6),
        (2, 3, 6),
        (4, 2, 6),
        (1, 4, 6),
    ];
    let mut text = String::from("# octahedron test body\n");
    text.push_str(&format!("{}\n", vertices.len()));
    for (i, (x, y, z)) in vertices.iter().enumerate() {
        text.push_str(&format!("{} {x} {y} {z}\n", i + 1));
    }
    text.push_str(&format!("{}\n", plates.len()));
    for (i, (a, b, c)) in plates.iter().enumerate() {
        text.push_str(&format!("{} {a} {b} {c}\n", i + 1));
    }
    text
}

/// The unit plate `(1,0,0), (0,1,0), (0,0,1)` as a one-plate kernel.
pub fn unit_plate_text() -> String {
    "3\n1 1 0 0\n2 0 1 0\n3 0 0 1\n1\n1 1 2 3\n".to_string()
}

/// The same octahedron as a Wavefront OBJ mesh.
pub fn octahedron_obj_text(radius: f64) -> String {
    let r = radius;
    format!(
        "# octahedron\n\
         v {r} 0 0\nv {n} 0 0\nv 0 {r} 0\nv 0 {n} 0\nv 0 0 {r}\nv 0 0 {n}\n\
         f 1 3 5\nf 3 2 5\nf 2 4 5\nf 4 1 5\n\
         f 3 1 6\nf 2 3 6\nf 4 2 6\nf 1 4 6\n",
        n = -r
    )
}

/// Reference geometry for plate intersection.
pub mod geometry {
    /// Vertices of the unit plate.
    pub const UNIT_PLATE: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    /// Observer and look direction that hit the unit plate at (1, 0, 0).
    pub const HIT_OBSERVER: [f64; 3] = [1000.0, 0.0, 0.0];
    pub const HIT_LOOK: [f64; 3] = [-1.0, 0.0, 0.0];

    /// Observer and look direction that miss (observer behind the plate).
    pub const MISS_OBSERVER: [f64; 3] = [0.0, 0.0, 0.0];
    pub const MISS_LOOK: [f64; 3] = [1.0, 1.0, 1.0];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octahedron_counts() {
        let text = octahedron_plate_text(10.0);
        let lines: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(lines[0], "6");
        assert_eq!(lines[7], "8");
        assert_eq!(lines.len(), 1 + 6 + 1 + 8);
    }
}
