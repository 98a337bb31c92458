//! Procedural shapes used to build the room shell and the cubicle partitions.

use crate::data_structures::model::{MeshData, ModelVertex};

/// Axis-aligned box centred at the origin with the given full extents.
///
/// Every face has its own four vertices so the normals stay flat.
pub fn cuboid(name: impl Into<String>, width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
    // (normal, four corners counter-clockwise seen from outside)
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-x, -y, z], [x, -y, z], [x, y, z], [-x, y, z]]),
        ([0.0, 0.0, -1.0], [[x, -y, -z], [-x, -y, -z], [-x, y, -z], [x, y, -z]]),
        ([-1.0, 0.0, 0.0], [[-x, -y, -z], [-x, -y, z], [-x, y, z], [-x, y, -z]]),
        ([1.0, 0.0, 0.0], [[x, -y, z], [x, -y, -z], [x, y, -z], [x, y, z]]),
        ([0.0, 1.0, 0.0], [[-x, y, z], [x, y, z], [x, y, -z], [-x, y, -z]]),
        ([0.0, -1.0, 0.0], [[-x, -y, -z], [x, -y, -z], [x, -y, z], [-x, -y, z]]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        vertices.extend(corners.iter().map(|&position| ModelVertex { position, normal }));
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    MeshData {
        name: name.into(),
        vertices,
        indices,
    }
}

/// Horizontal quad facing +y, centred at the origin.
pub fn plane(name: impl Into<String>, width: f32, depth: f32) -> MeshData {
    let (x, z) = (width / 2.0, depth / 2.0);
    let normal = [0.0, 1.0, 0.0];
    let vertices = [[-x, 0.0, z], [x, 0.0, z], [x, 0.0, -z], [-x, 0.0, -z]]
        .into_iter()
        .map(|position| ModelVertex { position, normal })
        .collect();
    MeshData {
        name: name.into(),
        vertices,
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_has_flat_faces() {
        let mesh = cuboid("box", 2.0, 4.0, 6.0);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, cgmath::Vector3::new(-1.0, -2.0, -3.0));
        assert_eq!(bounds.max, cgmath::Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn cuboid_winding_faces_outwards() {
        use cgmath::InnerSpace;
        let mesh = cuboid("box", 1.0, 1.0, 1.0);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| {
                cgmath::Vector3::from(mesh.vertices[i as usize].position)
            });
            let face_normal = (b - a).cross(c - a);
            let stored = cgmath::Vector3::from(mesh.vertices[tri[0] as usize].normal);
            assert!(face_normal.dot(stored) > 0.0);
        }
    }

    #[test]
    fn plane_is_flat() {
        let mesh = plane("floor", 10.0, 4.0);
        assert!(mesh.vertices.iter().all(|v| v.position[1] == 0.0));
        assert_eq!(mesh.indices.len(), 6);
    }
}
