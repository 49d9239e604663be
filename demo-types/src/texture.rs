use crate::gpu::{GpuDevice, GpuObjectId};
use hearth::base::{ResourceError, ResourceHeader, ResourceResult};
use hearth::loader::{CompiledResourceLoader, InstallDependencies, InstallStatus, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_ROWS_PER_FRAME: u32 = 64;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TextureBuiltData {
    pub width: u32,
    pub height: u32,
    // RGBA8, rows top to bottom
    pub image_bytes: Vec<u8>,
}

pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub gpu_texture: Option<GpuObjectId>,
    // CPU copy, released once the upload finishes
    image_bytes: Vec<u8>,
    rows_uploaded: u32,
}

impl Texture {
    pub fn rows_uploaded(&self) -> u32 {
        self.rows_uploaded
    }

    pub fn is_uploaded(&self) -> bool {
        self.rows_uploaded >= self.height
    }
}

impl Resource for Texture {}

/// Uploads a bounded number of rows per frame, so large textures install over several ticks
pub struct TextureLoader {
    device: Arc<GpuDevice>,
    rows_per_frame: u32,
}

impl TextureLoader {
    pub fn new(device: Arc<GpuDevice>) -> Self {
        Self::with_rows_per_frame(device, DEFAULT_ROWS_PER_FRAME)
    }

    pub fn with_rows_per_frame(
        device: Arc<GpuDevice>,
        rows_per_frame: u32,
    ) -> Self {
        TextureLoader {
            device,
            rows_per_frame: rows_per_frame.max(1),
        }
    }

    fn upload_rows(
        &self,
        texture: &mut Texture,
    ) -> InstallStatus {
        profiling::scope!("TextureLoader::upload_rows");
        texture.rows_uploaded = (texture.rows_uploaded + self.rows_per_frame).min(texture.height);
        if texture.is_uploaded() {
            texture.image_bytes = Vec::default();
            InstallStatus::Complete
        } else {
            InstallStatus::InProgress
        }
    }
}

impl CompiledResourceLoader for TextureLoader {
    type Payload = TextureBuiltData;
    type Resource = Texture;

    fn loadable_types(&self) -> &[&'static str] {
        &["texture"]
    }

    fn create(
        &self,
        header: &ResourceHeader,
        payload: TextureBuiltData,
    ) -> ResourceResult<Texture> {
        let expected_size = payload.width as usize * payload.height as usize * 4;
        if payload.image_bytes.len() != expected_size {
            return Err(ResourceError::parse_error(
                header.path.as_str(),
                format!(
                    "{}x{} texture has {} bytes, expected {}",
                    payload.width,
                    payload.height,
                    payload.image_bytes.len(),
                    expected_size
                ),
            ));
        }

        Ok(Texture {
            width: payload.width,
            height: payload.height,
            gpu_texture: None,
            image_bytes: payload.image_bytes,
            rows_uploaded: 0,
        })
    }

    fn install(
        &self,
        resource: &mut Texture,
        dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        let texture = self
            .device
            .create_texture(resource.width, resource.height, dependencies.resource_path())
            .map_err(|e| ResourceError::install_error(dependencies.resource_path(), e))?;
        resource.gpu_texture = Some(texture);
        Ok(self.upload_rows(resource))
    }

    fn poll_install(
        &self,
        resource: &mut Texture,
        _dependencies: &InstallDependencies,
    ) -> ResourceResult<InstallStatus> {
        Ok(self.upload_rows(resource))
    }

    fn uninstall(
        &self,
        resource: &mut Texture,
    ) {
        if let Some(texture) = resource.gpu_texture.take() {
            self.device.destroy(texture);
        }
        resource.rows_uploaded = 0;
    }
}
