use crate::gpu::{GpuDevice, GpuObjectId};
use crate::material::Material;
use hearth::base::{ResourceError, ResourceHeader, ResourceId, ResourceResult};
use hearth::loader::{CompiledResourceLoader, InstallDependencies, InstallStatus, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeshPartData {
    pub index_offset: u32,
    pub index_count: u32,
    // Index into the mesh's dependencies, which are all materials
    pub material_index: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeshBuiltData {
    pub positions: Vec<glam::Vec3>,
    pub normals: Vec<glam::Vec3>,
    pub indices: Vec<u32>,
    pub parts: Vec<MeshPartData>,
}

pub struct Mesh {
    pub data: MeshBuiltData,
    // Material for each part, in part order
    pub part_materials: Vec<ResourceId>,
    pub vertex_buffer: Option<GpuObjectId>,
    pub index_buffer: Option<GpuObjectId>,
}

impl Resource for Mesh {}

pub struct MeshLoader {
    device: Arc<GpuDevice>,
}

impl MeshLoader {
    pub fn new(device: Arc<GpuDevice>) -> Self {
        MeshLoader { device }
    }

    fn destroy_buffers(
        &self,
        mesh: &mut Mesh,
    ) {
        if let Some(buffer) = mesh.vertex_buffer.take() {
            self.device.destroy(buffer);
        }
        if let Some(buffer) = mesh.index_buffer.take() {
            self.device.destroy(buffer);
        }
    }
}

fn validate(
    header: &ResourceHeader,
    data: &MeshBuiltData,
) -> Result<(), String> {
    if data.normals.len() != data.positions.len() {
        return Err(format!(
            "{} positions but {} normals",
            data.positions.len(),
            data.normals.len()
        ));
    }

    if let Some(index) = data.indices.iter().find(|x| **x as usize >= data.positions.len()) {
        return Err(format!("index {} is out of range", index));
    }

    for part in &data.parts {
        if (part.index_offset + part.index_count) as usize > data.indices.len() {
            return Err(format!(
                "part at offset {} with {} indices exceeds the index buffer",
                part.index_offset, part.index_count
            ));
        }

        if part.material_index as usize >= header.dependencies.len() {
            return Err(format!("material #{} is not declared", part.material_index));
        }
    }

    Ok(())
}

impl CompiledResourceLoader for MeshLoader {
    type Payload = MeshBuiltData;
    type Resource = Mesh;

    fn loadable_types(&self) -> &[&'static str] {
        &["mesh"]
    }

    fn create(
        &self,
        header: &ResourceHeader,
        payload: MeshBuiltData,
    ) -> ResourceResult<Mesh> {
        validate(header, &payload).map_err(|e| ResourceError::parse_error(header.path.as_str(), e))?;
        Ok(Mesh {
            data: payload,
            part_materials: Vec::default(),
            vertex_buffer: None,
            index_buffer: None,
        })
    }

    fn install(
        &self,
        resource: &mut Mesh,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        let mut part_materials = Vec::with_capacity(resource.data.parts.len());
        for part in &resource.data.parts {
            let index = part.material_index as usize;
            dependencies.require::<Material>(index)?;
            part_materials.push(dependencies.handle(index).unwrap_or_default());
        }

        let path = dependencies.resource_path();
        let vertex_size = resource.data.positions.len() * std::mem::size_of::<[f32; 6]>();
        resource.vertex_buffer = Some(
            self.device
                .create_buffer(vertex_size, path)
                .map_err(|e| ResourceError::install_error(path, e))?,
        );

        let index_size = resource.data.indices.len() * std::mem::size_of::<u32>();
        match self.device.create_buffer(index_size, path) {
            Ok(buffer) => resource.index_buffer = Some(buffer),
            Err(e) => {
                self.destroy_buffers(resource);
                return Err(ResourceError::install_error(path, e));
            }
        }

        resource.part_materials = part_materials;
        Ok(InstallStatus::Complete)
    }

    fn uninstall(
        &self,
        resource: &mut Mesh,
    ) {
        self.destroy_buffers(resource);
    }
}
