pub mod content;
pub mod gpu;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod texture;

use gpu::GpuDevice;
use hearth::loader::{LoaderId, ResourceSystem};
use std::sync::Arc;

/// Registers a loader for every demo resource type, all sharing one device
pub fn register_demo_loaders(
    resource_system: &mut ResourceSystem,
    device: &Arc<GpuDevice>,
) -> Vec<LoaderId> {
    vec![
        resource_system.register_compiled_loader(pipeline::PipelineLoader::new(device.clone())),
        resource_system.register_compiled_loader(texture::TextureLoader::new(device.clone())),
        resource_system.register_compiled_loader(material::MaterialLoader::new(device.clone())),
        resource_system.register_compiled_loader(mesh::MeshLoader::new(device.clone())),
    ]
}

#[cfg(test)]
mod tests;
