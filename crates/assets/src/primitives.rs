use lumen_gpu::{GraphicsDevice, Mesh, Vertex};
use std::f32::consts::{PI, TAU};

/// CPU-side indexed triangle list, counter-clockwise front faces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Upload to `device`.
    pub fn upload(&self, device: &mut dyn GraphicsDevice) -> Mesh {
        Mesh::new(device, &self.vertices, &self.indices)
    }
}

/// Axis-aligned cube centered on the origin, 4 vertices per face.
pub fn cube(size: f32) -> MeshData {
    let p = size * 0.5;
    // Counter-clockwise corners of each face as seen from outside.
    #[rustfmt::skip]
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0],  [[-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p]]),
        ([0.0, 0.0, -1.0], [[ p, -p, -p], [-p, -p, -p], [-p,  p, -p], [ p,  p, -p]]),
        ([1.0, 0.0, 0.0],  [[ p, -p,  p], [ p, -p, -p], [ p,  p, -p], [ p,  p,  p]]),
        ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p,  p], [-p,  p,  p], [-p,  p, -p]]),
        ([0.0, 1.0, 0.0],  [[-p,  p,  p], [ p,  p,  p], [ p,  p, -p], [-p,  p, -p]]),
        ([0.0, -1.0, 0.0], [[-p, -p, -p], [ p, -p, -p], [ p, -p,  p], [-p, -p,  p]]),
    ];
    let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut data = MeshData::default();
    for (normal, corners) in faces {
        let base = data.vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            data.vertices.push(Vertex::new(corner, normal, uv));
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    data
}

/// Square in the XZ plane facing +Y, split into `subdivisions` cells per side.
pub fn plane(size: f32, subdivisions: u32) -> MeshData {
    let n = subdivisions.max(1);
    let half = size * 0.5;
    let row = n + 1;

    let mut data = MeshData::default();
    for i in 0..=n {
        let t = i as f32 / n as f32;
        for j in 0..=n {
            let s = j as f32 / n as f32;
            data.vertices.push(Vertex::new(
                [-half + size * s, 0.0, half - size * t],
                [0.0, 1.0, 0.0],
                [s, 1.0 - t],
            ));
        }
    }
    for i in 0..n {
        for j in 0..n {
            let a = i * row + j;
            let b = a + 1;
            let c = a + row + 1;
            let d = a + row;
            data.indices.extend_from_slice(&[a, b, c, c, d, a]);
        }
    }
    data
}

/// Sphere of `radius` with `segments` slices around Y and `rings` stacks
/// from pole to pole. The seam column is duplicated for texture wrap.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let row = segments + 1;

    let mut data = MeshData::default();
    for r in 0..=rings {
        let v = r as f32 / rings as f32;
        let theta = v * PI;
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let phi = u * TAU;
            let normal = [theta.sin() * phi.sin(), theta.cos(), theta.sin() * phi.cos()];
            let position = normal.map(|c| c * radius);
            data.vertices.push(Vertex::new(position, normal, [u, v]));
        }
    }
    for r in 0..rings {
        for s in 0..segments {
            let a = r * row + s;
            let b = a + row;
            let c = b + 1;
            let d = a + 1;
            // The first and last stacks collapse to a point at the poles.
            if r + 1 < rings {
                data.indices.extend_from_slice(&[a, b, c]);
            }
            if r > 0 {
                data.indices.extend_from_slice(&[a, c, d]);
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use lumen_gpu::RecordingDevice;

    fn triangles(data: &MeshData) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        data.indices.chunks_exact(3).map(|tri| {
            [
                data.vertices[tri[0] as usize],
                data.vertices[tri[1] as usize],
                data.vertices[tri[2] as usize],
            ]
        })
    }

    fn face_normal([a, b, c]: [Vertex; 3]) -> Vec3 {
        let a = Vec3::from(a.position);
        let b = Vec3::from(b.position);
        let c = Vec3::from(c.position);
        (b - a).cross(c - a)
    }

    fn assert_outward(data: &MeshData) {
        for tri in triangles(data) {
            let geometric = face_normal(tri);
            assert!(geometric.length() > 1e-6, "degenerate triangle");
            let shading = Vec3::from(tri[0].normal) + Vec3::from(tri[1].normal) + Vec3::from(tri[2].normal);
            assert!(geometric.dot(shading) > 0.0, "triangle winds inward");
        }
    }

    fn assert_indices_in_range(data: &MeshData) {
        let count = data.vertices.len() as u32;
        assert!(data.indices.iter().all(|&i| i < count));
        assert_eq!(data.indices.len() % 3, 0);
    }

    #[test]
    fn cube_counts() {
        let data = cube(1.0);
        assert_eq!(data.vertices.len(), 24);
        assert_eq!(data.indices.len(), 36);
        assert_eq!(data.triangle_count(), 12);
        assert_indices_in_range(&data);
    }

    #[test]
    fn cube_faces_outward() {
        assert_outward(&cube(2.0));
    }

    #[test]
    fn cube_extent_follows_size() {
        let data = cube(3.0);
        let max = data
            .vertices
            .iter()
            .map(|v| Vec3::from(v.position).abs().max_element())
            .fold(0.0_f32, f32::max);
        assert!((max - 1.5).abs() < 1e-6);
    }

    #[test]
    fn plane_faces_up() {
        let data = plane(4.0, 3);
        assert_eq!(data.vertices.len(), 16);
        assert_eq!(data.triangle_count(), 18);
        assert_indices_in_range(&data);
        assert_outward(&data);
        for tri in triangles(&data) {
            assert!(face_normal(tri).normalize().y > 0.999);
        }
    }

    #[test]
    fn plane_clamps_subdivisions() {
        assert_eq!(plane(1.0, 0).triangle_count(), 2);
    }

    #[test]
    fn sphere_is_closed_and_outward() {
        let data = uv_sphere(2.0, 16, 8);
        assert_eq!(data.vertices.len(), 17 * 9);
        // Pole stacks contribute one triangle per segment, the rest two.
        assert_eq!(data.triangle_count(), 16 * (2 * 8 - 2));
        assert_indices_in_range(&data);
        assert_outward(&data);
        for v in &data.vertices {
            assert!((Vec3::from(v.position).length() - 2.0).abs() < 1e-4);
            assert!((Vec3::from(v.normal).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn upload_creates_buffers() {
        let mut device = RecordingDevice::new();
        let mesh = cube(1.0).upload(&mut device);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(device.live_buffers(), 2);
        mesh.release(&mut device);
        assert_eq!(device.live_buffers(), 0);
    }
}
