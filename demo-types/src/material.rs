use crate::gpu::{GpuDevice, GpuObjectId};
use crate::pipeline::Pipeline;
use crate::texture::Texture;
use hearth::base::{ResourceError, ResourceHeader, ResourceId, ResourceResult};
use hearth::loader::{CompiledResourceLoader, InstallDependencies, InstallStatus, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Size of the uniform block a material binds
const MATERIAL_UNIFORM_SIZE: usize = 64;

// Non-texture data associated with the material. Textures and the pipeline are dependencies: the
// pipeline is always dependency #0, textures follow in the order of the texture slots below.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MaterialBuiltData {
    pub base_color_factor: glam::Vec4,
    pub emissive_factor: glam::Vec3,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_threshold: f32,
    pub texture_slots: Vec<String>,
}

impl Default for MaterialBuiltData {
    fn default() -> Self {
        MaterialBuiltData {
            base_color_factor: glam::Vec4::new(1.0, 1.0, 1.0, 1.0),
            emissive_factor: glam::Vec3::new(0.0, 0.0, 0.0),
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_threshold: 0.5,
            texture_slots: Vec::default(),
        }
    }
}

pub struct Material {
    pub data: MaterialBuiltData,
    pub pipeline: ResourceId,
    // Same order as data.texture_slots
    pub textures: Vec<ResourceId>,
    pub uniform_buffer: Option<GpuObjectId>,
}

impl Material {
    pub fn texture(
        &self,
        slot: &str,
    ) -> Option<ResourceId> {
        let index = self.data.texture_slots.iter().position(|x| x == slot)?;
        self.textures.get(index).copied()
    }
}

impl Resource for Material {}

pub struct MaterialLoader {
    device: Arc<GpuDevice>,
}

impl MaterialLoader {
    pub fn new(device: Arc<GpuDevice>) -> Self {
        MaterialLoader { device }
    }
}

impl CompiledResourceLoader for MaterialLoader {
    type Payload = MaterialBuiltData;
    type Resource = Material;

    fn loadable_types(&self) -> &[&'static str] {
        &["material"]
    }

    fn create(
        &self,
        header: &ResourceHeader,
        payload: MaterialBuiltData,
    ) -> ResourceResult<Material> {
        if header.dependencies.len() != payload.texture_slots.len() + 1 {
            return Err(ResourceError::parse_error(
                header.path.as_str(),
                format!(
                    "material declares {} dependencies, expected a pipeline and {} textures",
                    header.dependencies.len(),
                    payload.texture_slots.len()
                ),
            ));
        }

        Ok(Material {
            data: payload,
            pipeline: ResourceId::null(),
            textures: Vec::default(),
            uniform_buffer: None,
        })
    }

    fn install(
        &self,
        resource: &mut Material,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        let pipeline = dependencies.require::<Pipeline>(0)?;
        if pipeline.gpu_pipeline.is_none() {
            return Err(ResourceError::install_error(
                dependencies.resource_path(),
                "pipeline has no device object",
            ));
        }

        let mut textures = Vec::with_capacity(dependencies.len() - 1);
        for index in 1..dependencies.len() {
            dependencies.require::<Texture>(index)?;
            if let Some(handle) = dependencies.handle(index) {
                textures.push(handle);
            }
        }

        let uniform_buffer = self
            .device
            .create_buffer(MATERIAL_UNIFORM_SIZE, dependencies.resource_path())
            .map_err(|e| ResourceError::install_error(dependencies.resource_path(), e))?;

        resource.pipeline = dependencies.handle(0).unwrap_or_default();
        resource.textures = textures;
        resource.uniform_buffer = Some(uniform_buffer);
        Ok(InstallStatus::Complete)
    }

    fn uninstall(
        &self,
        resource: &mut Material,
    ) {
        if let Some(buffer) = resource.uniform_buffer.take() {
            self.device.destroy(buffer);
        }
    }
}
