//! Axis-aligned bounding volume hierarchy over plates.

use crate::geometry::Vec3;

const LEAF_SIZE: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f64::INFINITY),
            max: Vec3::repeat(f64::NEG_INFINITY),
        }
    }

    pub fn grow(&mut self, p: &Vec3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn merge(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    fn longest_axis(&self) -> usize {
        let extent = self.max - self.min;
        if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        }
    }

    /// Entry distance of the ray into the box, if it enters at or beyond
    /// `t = 0` and before `t_max`. `pad` widens the box on every side.
    fn ray_entry(&self, origin: &Vec3, inv_dir: &Vec3, t_max: f64, pad: f64) -> Option<f64> {
        let mut t0 = 0.0f64;
        let mut t1 = t_max;
        for axis in 0..3 {
            let lo = self.min[axis] - pad;
            let hi = self.max[axis] + pad;
            if inv_dir[axis].is_infinite() {
                if origin[axis] < lo || origin[axis] > hi {
                    return None;
                }
                continue;
            }
            let mut near = (lo - origin[axis]) * inv_dir[axis];
            let mut far = (hi - origin[axis]) * inv_dir[axis];
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        Some(t0)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { bounds: Aabb, start: usize, count: usize },
    Branch { bounds: Aabb, left: usize, right: usize },
}

impl Node {
    fn bounds(&self) -> &Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => bounds,
        }
    }
}

/// Hierarchy over plate indices (0-based into the kernel's plate array).
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<Node>,
    order: Vec<usize>,
}

impl Bvh {
    /// Build from per-plate bounds.
    pub fn build(bounds: &[Aabb]) -> Self {
        let centroids: Vec<Vec3> = bounds.iter().map(|b| (b.min + b.max) * 0.5).collect();
        let mut order: Vec<usize> = (0..bounds.len()).collect();
        let mut nodes = Vec::with_capacity(2 * bounds.len() / LEAF_SIZE + 1);
        if !bounds.is_empty() {
            build_node(&mut nodes, &mut order, 0, bounds.len(), bounds, &centroids);
        }
        Self { nodes, order }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| *n.bounds())
    }

    /// Visit candidate plates along a ray. `visit` receives a plate index
    /// and returns the hit distance, if any; the search keeps the nearest
    /// hit, preferring the lower index on equal distance, and returns it
    /// as (index, t).
    pub fn nearest<F>(&self, origin: &Vec3, dir: &Vec3, pad: f64, mut visit: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize) -> Option<f64>,
    {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let mut best: Option<(usize, f64)> = None;
        let mut stack = vec![0usize];

        while let Some(i) = stack.pop() {
            let limit = best.map_or(f64::INFINITY, |(_, t)| t);
            let node = &self.nodes[i];
            if node.bounds().ray_entry(origin, &inv_dir, limit, pad).is_none() {
                continue;
            }
            match node {
                Node::Leaf { start, count, .. } => {
                    for &plate in &self.order[*start..*start + *count] {
                        if let Some(t) = visit(plate) {
                            let better = match best {
                                None => true,
                                Some((p, bt)) => t < bt || (t == bt && plate < p),
                            };
                            if better {
                                best = Some((plate, t));
                            }
                        }
                    }
                }
                Node::Branch { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        best
    }
}

fn build_node(
    nodes: &mut Vec<Node>,
    order: &mut [usize],
    start: usize,
    end: usize,
    bounds: &[Aabb],
    centroids: &[Vec3],
) -> usize {
    let mut node_bounds = Aabb::empty();
    let mut centroid_bounds = Aabb::empty();
    for &i in &order[start..end] {
        node_bounds.merge(&bounds[i]);
        centroid_bounds.grow(&centroids[i]);
    }

    let index = nodes.len();
    let count = end - start;
    if count <= LEAF_SIZE {
        nodes.push(Node::Leaf {
            bounds: node_bounds,
            start,
            count,
        });
        return index;
    }

    let axis = centroid_bounds.longest_axis();
    let mid = start + count / 2;
    order[start..end].select_nth_unstable_by(count / 2, |a, b| {
        centroids[*a][axis].total_cmp(&centroids[*b][axis])
    });

    // Placeholder replaced once both children exist.
    nodes.push(Node::Leaf {
        bounds: node_bounds,
        start,
        count: 0,
    });
    let left = build_node(nodes, order, start, mid, bounds, centroids);
    let right = build_node(nodes, order, mid, end, bounds, centroids);
    nodes[index] = Node::Branch {
        bounds: node_bounds,
        left,
        right,
    };
    index
}
