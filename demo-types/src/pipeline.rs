use crate::gpu::{GpuDevice, GpuObjectId};
use hearth::base::{ResourceError, ResourceHeader, ResourceResult};
use hearth::loader::{CompiledResourceLoader, InstallDependencies, InstallStatus, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMethod {
    Opaque,
    AlphaClip,
    AlphaBlend,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PipelineBuiltData {
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub blend_method: BlendMethod,
    pub backface_culling: bool,
}

pub struct Pipeline {
    pub data: PipelineBuiltData,
    pub gpu_pipeline: Option<GpuObjectId>,
}

impl Resource for Pipeline {}

pub struct PipelineLoader {
    device: Arc<GpuDevice>,
}

impl PipelineLoader {
    pub fn new(device: Arc<GpuDevice>) -> Self {
        PipelineLoader { device }
    }
}

impl CompiledResourceLoader for PipelineLoader {
    type Payload = PipelineBuiltData;
    type Resource = Pipeline;

    fn loadable_types(&self) -> &[&'static str] {
        &["pipeline"]
    }

    fn create(
        &self,
        header: &ResourceHeader,
        payload: PipelineBuiltData,
    ) -> ResourceResult<Pipeline> {
        if payload.vertex_shader.is_empty() || payload.fragment_shader.is_empty() {
            return Err(ResourceError::parse_error(
                header.path.as_str(),
                "pipeline is missing a shader stage",
            ));
        }

        Ok(Pipeline {
            data: payload,
            gpu_pipeline: None,
        })
    }

    fn install(
        &self,
        resource: &mut Pipeline,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        let pipeline = self
            .device
            .create_pipeline(dependencies.resource_path())
            .map_err(|e| ResourceError::install_error(dependencies.resource_path(), e))?;
        resource.gpu_pipeline = Some(pipeline);
        Ok(InstallStatus::Complete)
    }

    fn uninstall(
        &self,
        resource: &mut Pipeline,
    ) {
        if let Some(pipeline) = resource.gpu_pipeline.take() {
            self.device.destroy(pipeline);
        }
    }
}
