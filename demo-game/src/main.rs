use demo_types::content::*;
use demo_types::gpu::{GpuDevice, GpuObjectKind};
use demo_types::material::Material;
use demo_types::mesh::Mesh;
use hearth::base::{ResourceId, ResourceResult};
use hearth::loader::{LoadState, ResourceSystem, ResourceSystemConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn config_file_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/resources.json"))
}

// Writes the compiled demo content under the data root so the disk file system can stream it
fn bake_demo_content(data_root_path: &Path) -> ResourceResult<()> {
    profiling::scope!("bake_demo_content");
    for file in build_demo_content()? {
        let full_path = data_root_path.join(&file.path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, &file.bytes)?;
    }

    log::info!("Baked demo content to {:?}", data_root_path);
    Ok(())
}

fn log_mesh(
    resource_system: &ResourceSystem,
    handle: ResourceId,
) {
    let mesh = resource_system.get_resource::<Mesh>(handle);
    for (part, material) in mesh.data.parts.iter().zip(&mesh.part_materials) {
        let material_path = resource_system
            .record(*material)
            .map(|x| x.path().to_string())
            .unwrap_or_default();
        let slots = resource_system
            .try_get_resource::<Material>(*material)
            .map(|x| x.data.texture_slots.clone())
            .unwrap_or_default();
        println!(
            "  {} indices at offset {} use {} with textures {:?}",
            part.index_count, part.index_offset, material_path, slots
        );
    }
}

fn main() {
    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(log::LevelFilter::Debug)
        .init();

    let config = ResourceSystemConfig::read_from_path(&config_file_path()).unwrap();
    bake_demo_content(&config.data_root_path).unwrap();

    let device = Arc::new(GpuDevice::new());
    let mut resource_system = ResourceSystem::from_config(&config).unwrap();
    demo_types::register_demo_loaders(&mut resource_system, &device);

    // Pipelines are needed before the first frame, everything else streams in
    let lit_pipeline = resource_system.load_blocking(LIT_PIPELINE);
    println!(
        "{} is {:?} before the first tick",
        LIT_PIPELINE,
        resource_system.load_state(lit_pipeline)
    );

    let meshes = [
        (CUBE_MESH, resource_system.load_async(CUBE_MESH)),
        (WALL_MESH, resource_system.load_async(WALL_MESH)),
    ];

    loop {
        std::thread::sleep(std::time::Duration::from_millis(15));
        resource_system.tick();
        profiling::finish_frame!();

        for (path, handle) in &meshes {
            match resource_system.load_state(*handle) {
                Some(LoadState::Ready) => println!("{} ready", path),
                Some(LoadState::Failed) => println!(
                    "{} failed: {}",
                    path,
                    resource_system
                        .record(*handle)
                        .and_then(|x| x.error())
                        .map(|x| x.to_string())
                        .unwrap_or_default()
                ),
                state => println!("{} {:?}", path, state),
            }
        }

        if resource_system.is_idle() {
            break;
        }
    }

    println!(
        "Streaming finished after {} ticks: {:?}",
        resource_system.tick_index(),
        resource_system.stats()
    );
    for (path, handle) in &meshes {
        if resource_system.is_ready(*handle) {
            println!("{}", path);
            log_mesh(&resource_system, *handle);
        }
    }

    println!(
        "Device objects: {} buffers, {} textures, {} pipelines",
        device.live_object_count(GpuObjectKind::Buffer),
        device.live_object_count(GpuObjectKind::Texture),
        device.live_object_count(GpuObjectKind::Pipeline)
    );
}
