//! Loading of external 3D assets.
//!
//! Assets are read and parsed off the frame thread into plain CPU-side
//! [`AssetNode`] trees. Nothing here touches the GPU; the environment builder
//! uploads the meshes once a load resolves on the frame thread.

use std::{future::Future, path::PathBuf, pin::Pin};

use futures::channel::oneshot;

use crate::data_structures::{
    instance::Transform,
    model::{Material, MeshData},
};

pub mod mesh;

/// A loaded asset: a named transform node with its meshes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetNode {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<(MeshData, Material)>,
    pub children: Vec<AssetNode>,
}

impl AssetNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::new(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Number of meshes in the whole tree.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(AssetNode::mesh_count).sum::<usize>()
    }
}

pub type AssetFuture = Pin<Box<dyn Future<Output = anyhow::Result<AssetNode>>>>;

/// Source of binary 3D assets addressed by relative path.
pub trait AssetLoader {
    fn load(&self, path: &str) -> AssetFuture;
}

/// Loads GLB/glTF files from the asset root. Native builds read and parse on
/// the tokio runtime; wasm builds fetch relative to the page origin.
#[derive(Debug, Clone)]
pub struct FileAssetLoader {
    root: PathBuf,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Handle,
}

impl FileAssetLoader {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(root: impl Into<PathBuf>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            root: root.into(),
            runtime,
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for FileAssetLoader {
    fn load(&self, path: &str) -> AssetFuture {
        let (tx, rx) = oneshot::channel();
        let root = self.root.clone();
        let path = path.to_string();
        let task = async move {
            let result = match load_binary(&root, &path).await {
                Ok(bytes) => mesh::parse_gltf(&root, &path, &bytes).await,
                Err(err) => Err(err),
            };
            // The receiver is gone once the viewer unmounted.
            let _ = tx.send(result);
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.runtime.spawn(task);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);

        Box::pin(async move { rx.await? })
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &std::path::Path, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin unavailable"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.display()))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(root: &std::path::Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        response.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = root.join(file_name);
        tokio::fs::read(&path)
            .await
            .map_err(|err| anyhow::anyhow!("reading {}: {err}", path.display()))?
    };

    Ok(data)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn missing_file_resolves_to_an_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let loader = FileAssetLoader::new("does-not-exist", runtime.handle().clone());
        let result = runtime.block_on(loader.load("desk.glb"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("desk.glb"));
    }

    #[test]
    fn mesh_count_includes_children() {
        let mut root = AssetNode::new("chair");
        let mut seat = AssetNode::new("seat");
        seat.meshes.push((
            crate::data_structures::primitives::cuboid("seat", 0.5, 0.1, 0.5),
            Material::new("fabric", [0.2, 0.2, 0.3, 1.0]),
        ));
        root.children.push(seat.clone());
        root.children.push(seat);
        assert_eq!(root.mesh_count(), 2);
    }
}
