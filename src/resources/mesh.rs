//! glTF/GLB parsing into [`AssetNode`] trees.

use std::path::Path;

use cgmath::{Euler, Quaternion, Vector3};

use crate::{
    data_structures::{
        instance::Transform,
        model::{Material, MeshData, ModelVertex},
    },
    resources::{AssetNode, load_binary},
};

/// Parses a glTF document. External buffers are resolved relative to `root`.
pub async fn parse_gltf(root: &Path, file_name: &str, bytes: &[u8]) -> anyhow::Result<AssetNode> {
    let gltf = gltf::Gltf::from_slice(bytes)?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("{file_name}: binary chunk missing"))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                if uri.starts_with("data:") {
                    anyhow::bail!("{file_name}: embedded data URIs are not supported");
                }
                buffer_data.push(load_binary(root, uri).await?);
            }
        }
    }

    let materials: Vec<Material> = gltf
        .materials()
        .enumerate()
        .map(|(idx, material)| {
            let pbr = material.pbr_metallic_roughness();
            let name = material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{file_name}#{idx}"));
            Material {
                name,
                base_colour: pbr.base_color_factor(),
                roughness: pbr.roughness_factor(),
            }
        })
        .collect();
    let fallback = Material::new(format!("{file_name}#default"), [0.7, 0.7, 0.7, 1.0]);

    let mut asset = AssetNode::new(file_name);
    for scene in gltf.scenes() {
        for node in scene.nodes() {
            asset
                .children
                .push(convert_node(&node, &buffer_data, &materials, &fallback)?);
        }
    }
    if asset.mesh_count() == 0 {
        anyhow::bail!("{file_name}: no meshes found");
    }
    Ok(asset)
}

fn convert_node(
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    materials: &[Material],
    fallback: &Material,
) -> anyhow::Result<AssetNode> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let mut asset = AssetNode::new(name);
    asset.transform = to_transform(node.transform().decomposed());

    if let Some(mesh) = node.mesh() {
        for (idx, primitive) in mesh.primitives().enumerate() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

            let mut vertices: Vec<ModelVertex> = match reader.read_positions() {
                Some(positions) => positions
                    .map(|position| ModelVertex {
                        position,
                        normal: [0.0, 1.0, 0.0],
                    })
                    .collect(),
                None => continue,
            };
            if let Some(normals) = reader.read_normals() {
                for (vertex, normal) in vertices.iter_mut().zip(normals) {
                    vertex.normal = normal;
                }
            }
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            if indices.iter().any(|&i| i as usize >= vertices.len()) {
                anyhow::bail!("mesh {:?} indexes past its vertex buffer", mesh.name());
            }

            let material = primitive
                .material()
                .index()
                .and_then(|i| materials.get(i))
                .unwrap_or(fallback)
                .clone();
            let mesh_name = format!("{}#{idx}", mesh.name().unwrap_or("mesh"));
            asset.meshes.push((
                MeshData {
                    name: mesh_name,
                    vertices,
                    indices,
                },
                material,
            ));
        }
    }

    for child in node.children() {
        asset
            .children
            .push(convert_node(&child, buffers, materials, fallback)?);
    }
    Ok(asset)
}

fn to_transform((translation, rotation, scale): ([f32; 3], [f32; 4], [f32; 3])) -> Transform {
    let [x, y, z, w] = rotation;
    let euler = Euler::from(Quaternion::new(w, x, y, z));
    Transform {
        position: translation.into(),
        rotation: Vector3::new(euler.x.0, euler.y.0, euler.z.0),
        scale: scale.into(),
    }
}
