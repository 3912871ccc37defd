//! Plate kernels: the in-memory mesh behind a DSK handle.
//!
//! Two text encodings are accepted:
//!
//! * MKDSK plate-vertex format: the vertex count, one `id x y z` line per
//!   vertex, the plate count, then one `id v1 v2 v3` line per plate.
//! * Wavefront OBJ: `v x y z` and `f a b c` records (1-based vertices).
//!
//! Lines beginning with `#` are comments. Comments of the form
//! `# key = value` fill the segment descriptor (`body`, `surface`,
//! `frame`).

use crate::bvh::{Aabb, Bvh};
use crate::geometry::Vec3;
use crate::plate::TriangularPlate;
use crate::tolerance::Tolerance;
use cube_common::{CubeError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Summary of a loaded shape segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    pub body: Option<i32>,
    pub surface: Option<i32>,
    pub frame: Option<String>,
    pub vertex_count: usize,
    pub plate_count: usize,
    pub bounds_min: [f64; 3],
    pub bounds_max: [f64; 3],
    pub min_radius: f64,
    pub max_radius: f64,
}

/// Packed vertex and plate arrays with a ray acceleration structure.
///
/// Vertex and plate ids are 1-based; storage is 0-based.
#[derive(Debug, Clone)]
pub struct PlateKernel {
    source: PathBuf,
    vertices: Vec<Vec3>,
    plates: Vec<[u32; 3]>,
    bvh: Bvh,
    segment: SegmentDescriptor,
}

impl PlateKernel {
    /// Load a kernel file. A missing file is a user error naming the file;
    /// content that is not a plate kernel is reported as a toolkit failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CubeError::user(format!("DSK file {} does not exist", path.display())));
        }
        let bytes = std::fs::read(path).map_err(|e| CubeError::io(path, e))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| CubeError::spice(format!("{} is not a plate kernel (binary content)", path.display())))?;

        let is_obj = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("obj"));
        let kernel = if is_obj {
            Self::parse_obj(&text, path)
        } else {
            Self::parse_plate_vertex(&text, path)
        }?;

        info!(
            file = %path.display(),
            plates = kernel.plate_count(),
            vertices = kernel.vertex_count(),
            max_radius = kernel.segment.max_radius,
            "Loaded plate kernel"
        );
        Ok(kernel)
    }

    /// Build a kernel from arrays; `plates` holds 1-based vertex ids.
    pub fn from_parts(vertices: Vec<Vec3>, plates: Vec<[usize; 3]>) -> Result<Self> {
        Self::assemble(PathBuf::from("<memory>"), vertices, plates, Header::default())
            .map_err(|msg| CubeError::bad_argument(msg))
    }

    fn parse_plate_vertex(text: &str, path: &Path) -> Result<Self> {
        let header = Header::scan(text);
        let fail = |msg: String| CubeError::spice(format!("{} is not a plate kernel: {}", path.display(), msg));
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let mut count = |what: &str| -> Result<usize> {
            let (n, line) = lines.next().ok_or_else(|| fail(format!("missing {what} count")))?;
            line.parse::<usize>()
                .map_err(|_| fail(format!("line {n}: expected {what} count, found '{line}'")))
        };
        let nv = count("vertex")?;
        let mut vertices = Vec::with_capacity(nv);
        for _ in 0..nv {
            let (n, line) = lines.next().ok_or_else(|| fail("truncated vertex list".into()))?;
            let fields = numbers::<f64>(line).ok_or_else(|| fail(format!("line {n}: bad vertex '{line}'")))?;
            if fields.len() != 4 {
                return Err(fail(format!("line {n}: vertex needs id x y z")));
            }
            vertices.push(Vec3::new(fields[1], fields[2], fields[3]));
        }

        let (n, line) = lines.next().ok_or_else(|| fail("missing plate count".into()))?;
        let np = line
            .parse::<usize>()
            .map_err(|_| fail(format!("line {n}: expected plate count, found '{line}'")))?;
        let mut plates = Vec::with_capacity(np);
        for _ in 0..np {
            let (n, line) = lines.next().ok_or_else(|| fail("truncated plate list".into()))?;
            let fields = numbers::<usize>(line).ok_or_else(|| fail(format!("line {n}: bad plate '{line}'")))?;
            if fields.len() != 4 {
                return Err(fail(format!("line {n}: plate needs id v1 v2 v3")));
            }
            plates.push([fields[1], fields[2], fields[3]]);
        }

        Self::assemble(path.to_path_buf(), vertices, plates, header).map_err(fail)
    }

    fn parse_obj(text: &str, path: &Path) -> Result<Self> {
        let header = Header::scan(text);
        let fail = |msg: String| CubeError::spice(format!("{} is not a plate kernel: {}", path.display(), msg));
        let mut vertices = Vec::new();
        let mut plates = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let rest: Vec<&str> = tokens.collect();
                    let xyz = numbers::<f64>(&rest.join(" "))
                        .filter(|v| v.len() >= 3)
                        .ok_or_else(|| fail(format!("line {}: bad vertex", i + 1)))?;
                    vertices.push(Vec3::new(xyz[0], xyz[1], xyz[2]));
                }
                Some("f") => {
                    // Faces may carry texture/normal indices as a/b/c.
                    let ids: Option<Vec<usize>> = tokens
                        .map(|t| t.split('/').next().and_then(|v| v.parse().ok()))
                        .collect();
                    match ids.as_deref() {
                        Some([a, b, c]) => plates.push([*a, *b, *c]),
                        _ => return Err(fail(format!("line {}: faces must be triangles", i + 1))),
                    }
                }
                _ => {}
            }
        }
        Self::assemble(path.to_path_buf(), vertices, plates, header).map_err(fail)
    }

    fn assemble(
        source: PathBuf,
        vertices: Vec<Vec3>,
        plates: Vec<[usize; 3]>,
        header: Header,
    ) -> std::result::Result<Self, String> {
        if vertices.is_empty() || plates.is_empty() {
            return Err("no plates".to_string());
        }
        let nv = vertices.len();
        let mut packed = Vec::with_capacity(plates.len());
        let mut bounds = Vec::with_capacity(plates.len());
        for (i, p) in plates.iter().enumerate() {
            if p.iter().any(|&v| v == 0 || v > nv) {
                return Err(format!("plate {} references a vertex outside 1..={}", i + 1, nv));
            }
            let mut b = Aabb::empty();
            for &v in p {
                b.grow(&vertices[v - 1]);
            }
            bounds.push(b);
            packed.push([(p[0] - 1) as u32, (p[1] - 1) as u32, (p[2] - 1) as u32]);
        }

        let bvh = Bvh::build(&bounds);
        let all = bvh.bounds().unwrap_or_else(Aabb::empty);
        let radii = vertices.iter().map(|v| v.norm());
        let (min_radius, max_radius) = radii.fold((f64::INFINITY, 0.0f64), |(lo, hi), r| (lo.min(r), hi.max(r)));
        let segment = SegmentDescriptor {
            body: header.body,
            surface: header.surface,
            frame: header.frame,
            vertex_count: nv,
            plate_count: packed.len(),
            bounds_min: [all.min.x, all.min.y, all.min.z],
            bounds_max: [all.max.x, all.max.y, all.max.z],
            min_radius,
            max_radius,
        };
        debug!(source = %source.display(), plates = packed.len(), "Built plate hierarchy");
        Ok(Self {
            source,
            vertices,
            plates: packed,
            bvh,
            segment,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn plate_count(&self) -> usize {
        self.plates.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn segment(&self) -> &SegmentDescriptor {
        &self.segment
    }

    pub fn max_radius(&self) -> f64 {
        self.segment.max_radius
    }

    /// Vertex by 1-based id.
    pub fn vertex(&self, id: usize) -> Result<Vec3> {
        if id == 0 || id > self.vertices.len() {
            return Err(CubeError::bad_argument(format!(
                "vertex id {} outside [1, {}]",
                id,
                self.vertices.len()
            )));
        }
        Ok(self.vertices[id - 1])
    }

    /// 1-based vertex ids of a plate.
    pub fn plate_vertex_ids(&self, id: usize) -> Result<[usize; 3]> {
        let p = self.plate_indices(id)?;
        Ok([p[0] as usize + 1, p[1] as usize + 1, p[2] as usize + 1])
    }

    /// Plate by 1-based id.
    pub fn plate(&self, id: usize) -> Result<TriangularPlate> {
        let p = self.plate_indices(id)?;
        Ok(self.make_plate(id, p))
    }

    fn plate_indices(&self, id: usize) -> Result<[u32; 3]> {
        if id == 0 || id > self.plates.len() {
            return Err(CubeError::bad_argument(format!(
                "plate id {} outside [1, {}]",
                id,
                self.plates.len()
            )));
        }
        Ok(self.plates[id - 1])
    }

    fn make_plate(&self, id: usize, p: [u32; 3]) -> TriangularPlate {
        TriangularPlate::new(
            id,
            self.vertices[p[0] as usize],
            self.vertices[p[1] as usize],
            self.vertices[p[2] as usize],
        )
    }

    /// Nearest plate struck by the ray, as (plate, point).
    pub fn intercept(&self, observer: &Vec3, look: &Vec3, tol: &Tolerance) -> Option<(TriangularPlate, Vec3)> {
        let pad = tol.absolute + tol.relative * self.segment.max_radius;
        let (index, t) = self.bvh.nearest(observer, look, pad, |i| {
            self.make_plate(i + 1, self.plates[i])
                .intercept_distance(observer, look, tol)
        })?;
        let plate = self.make_plate(index + 1, self.plates[index]);
        Some((plate, observer + look * t))
    }
}

#[derive(Debug, Default)]
struct Header {
    body: Option<i32>,
    surface: Option<i32>,
    frame: Option<String>,
}

impl Header {
    fn scan(text: &str) -> Self {
        let mut header = Header::default();
        for line in text.lines().map(str::trim).filter(|l| l.starts_with('#')) {
            let Some((key, value)) = line.trim_start_matches('#').split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "body" => header.body = value.parse().ok(),
                "surface" => header.surface = value.parse().ok(),
                "frame" => header.frame = Some(value.to_string()),
                _ => {}
            }
        }
        header
    }
}

fn numbers<T: std::str::FromStr>(line: &str) -> Option<Vec<T>> {
    line.split_whitespace().map(|t| t.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_utils::{octahedron_obj_text, octahedron_plate_text};

    fn write_temp(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .and_then(|mut f| f.write_all(text.as_bytes()))
            .unwrap();
        path
    }

    #[test]
    fn test_load_plate_vertex_file() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("# body = 401\n# frame = IAU_PHOBOS\n{}", octahedron_plate_text(10.0));
        let kernel = PlateKernel::load(write_temp(&dir, "octa.plt", &text)).unwrap();
        assert_eq!(kernel.plate_count(), 8);
        assert_eq!(kernel.vertex_count(), 6);
        assert_eq!(kernel.segment().body, Some(401));
        assert_eq!(kernel.segment().frame.as_deref(), Some("IAU_PHOBOS"));
        assert!((kernel.max_radius() - 10.0).abs() < 1e-12);
        assert_eq!(kernel.plate_vertex_ids(1).unwrap(), [1, 3, 5]);
    }

    #[test]
    fn test_obj_matches_plate_vertex() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlateKernel::load(write_temp(&dir, "a.plt", &octahedron_plate_text(3.0))).unwrap();
        let b = PlateKernel::load(write_temp(&dir, "b.obj", &octahedron_obj_text(3.0))).unwrap();
        for id in 1..=8 {
            assert_eq!(a.plate(id).unwrap(), b.plate(id).unwrap());
        }
    }

    #[test]
    fn test_bad_ids_are_bad_arguments() {
        let kernel = PlateKernel::from_parts(
            vec![Vec3::x(), Vec3::y(), Vec3::z()],
            vec![[1, 2, 3]],
        )
        .unwrap();
        for err in [kernel.plate(0).unwrap_err(), kernel.plate(2).unwrap_err(), kernel.vertex(4).unwrap_err()] {
            assert_eq!(err.kind(), cube_common::ErrorKind::BadArgument);
        }
    }

    #[test]
    fn test_not_a_kernel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "notes.txt", "PDS_VERSION_ID = PDS3\nEND\n");
        let err = PlateKernel::load(path).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::SpiceUnknown);

        let path = write_temp(&dir, "dangling.plt", "3\n1 1 0 0\n2 0 1 0\n3 0 0 1\n1\n1 1 2 9\n");
        let err = PlateKernel::load(path).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::SpiceUnknown);
    }

    #[test]
    fn test_nearest_plate_is_front_face() {
        let kernel = PlateKernel::from_parts(
            vec![
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(-10.0, 0.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
                Vec3::new(0.0, -10.0, 0.0),
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(0.0, 0.0, -10.0),
            ],
            vec![
                [1, 3, 5],
                [3, 2, 5],
                [2, 4, 5],
                [4, 1, 5],
                [3, 1, 6],
                [2, 3, 6],
                [4, 2, 6],
                [1, 4, 6],
            ],
        )
        .unwrap();
        let observer = Vec3::new(100.0, 100.0, 100.0);
        let (plate, point) = kernel
            .intercept(&observer, &(-observer), &Tolerance::default())
            .unwrap();
        assert_eq!(plate.id, 1);
        let expected = Vec3::repeat(10.0 / 3.0);
        assert!((point - expected).norm() < 1e-10);
    }
}
