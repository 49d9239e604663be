use crate::content::*;
use crate::gpu::{GpuDevice, GpuObjectKind};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::texture::{Texture, TextureBuiltData};
use hearth::base::ResourceError;
use hearth::loader::{
    InlineScheduler, LoadState, MemoryFileSystem, ResourceSystem, ResourceSystemConfig,
};
use std::sync::Arc;

fn demo_system(device: &Arc<GpuDevice>) -> (ResourceSystem, Arc<MemoryFileSystem>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let file_system = Arc::new(MemoryFileSystem::default());
    for file in build_demo_content().unwrap() {
        file_system.add_file(file.path, file.bytes);
    }

    let config = ResourceSystemConfig {
        max_loaded_resources: 32,
        ..Default::default()
    };
    let mut system = ResourceSystem::new(&config, file_system.clone(), Box::new(InlineScheduler));
    crate::register_demo_loaders(&mut system, device);
    (system, file_system)
}

fn tick_until_idle(system: &mut ResourceSystem) -> u32 {
    let mut ticks = 0;
    while !system.is_idle() {
        system.tick();
        ticks += 1;
        assert!(ticks < 100, "never went idle: {:?}", system.stats());
    }

    ticks
}

fn id(
    system: &ResourceSystem,
    path: &str,
) -> hearth::base::ResourceId {
    system.handle_for_path(path).unwrap()
}

#[test]
fn demo_content_streams() {
    let device = Arc::new(GpuDevice::new());
    let (mut system, _) = demo_system(&device);

    let cube = system.load_async(CUBE_MESH);
    let wall = system.load_async(WALL_MESH);
    tick_until_idle(&mut system);

    assert!(system.is_ready(cube));
    assert!(system.is_ready(wall));
    assert_eq!(system.stats().ready, 8);

    let brick = id(&system, BRICK_MATERIAL);
    let glass = id(&system, GLASS_MATERIAL);
    let mesh = system.get_resource::<Mesh>(cube);
    assert_eq!(mesh.part_materials, vec![brick, glass]);
    assert!(mesh.vertex_buffer.is_some());

    let brick_material = system.get_resource::<Material>(brick);
    assert_eq!(brick_material.pipeline, id(&system, LIT_PIPELINE));
    assert_eq!(
        brick_material.texture("normal"),
        Some(id(&system, BRICK_NORMAL_TEXTURE))
    );
    assert_eq!(brick_material.textures.len(), 2);

    // The brick material is shared by both meshes
    let mut users = system.record(brick).unwrap().users().to_vec();
    users.sort();
    let mut expected = vec![cube, wall];
    expected.sort();
    assert_eq!(users, expected);

    let albedo = system.get_resource::<Texture>(id(&system, BRICK_ALBEDO_TEXTURE));
    assert!(albedo.is_uploaded());
    assert_eq!(albedo.rows_uploaded(), 256);

    assert_eq!(device.live_object_count(GpuObjectKind::Pipeline), 2);
    assert_eq!(device.live_object_count(GpuObjectKind::Texture), 2);
    // A uniform buffer per material, vertex and index buffers per mesh
    assert_eq!(device.live_object_count(GpuObjectKind::Buffer), 6);
}

#[test]
fn blocking_load_matches_streaming() {
    let device = Arc::new(GpuDevice::new());
    let (mut system, _) = demo_system(&device);

    let cube = system.load_blocking(CUBE_MESH);
    assert!(system.is_ready(cube));
    assert!(system.is_ready(id(&system, BRICK_ALBEDO_TEXTURE)));
    assert_eq!(system.tick_index(), 0);

    let mesh = system.get_resource::<Mesh>(cube);
    assert_eq!(
        mesh.part_materials,
        vec![id(&system, BRICK_MATERIAL), id(&system, GLASS_MATERIAL)]
    );
}

#[test]
fn texture_upload_spans_several_ticks() {
    let device = Arc::new(GpuDevice::new());
    let (mut system, _) = demo_system(&device);

    let albedo = system.load_async(BRICK_ALBEDO_TEXTURE);
    let mut installing_ticks = 0;
    while !system.is_idle() {
        system.tick();
        if system.load_state(albedo) == Some(LoadState::Installing) {
            installing_ticks += 1;
        }
        assert!(system.tick_index() < 100);
    }

    // 256 rows at 64 rows per tick
    assert_eq!(installing_ticks, 3);
    assert!(system.is_ready(albedo));
}

#[test]
fn device_failure_fails_dependents_only() {
    // Enough for everything except the 256x256 albedo texture
    let device = Arc::new(GpuDevice::with_memory_budget(100_000));
    let (mut system, _) = demo_system(&device);

    let cube = system.load_async(CUBE_MESH);
    let glass = system.load_async(GLASS_MATERIAL);
    tick_until_idle(&mut system);

    assert!(system.is_ready(glass));
    assert!(system.is_ready(id(&system, BRICK_NORMAL_TEXTURE)));
    assert_eq!(
        system.load_state(id(&system, BRICK_ALBEDO_TEXTURE)),
        Some(LoadState::Failed)
    );
    assert_eq!(
        system.load_state(id(&system, BRICK_MATERIAL)),
        Some(LoadState::Failed)
    );
    assert_eq!(system.load_state(cube), Some(LoadState::Failed));

    match system.record(cube).unwrap().error() {
        Some(ResourceError::DependencyFailed { dependency, .. }) => {
            assert_eq!(dependency, BRICK_MATERIAL)
        }
        e => panic!("unexpected error {:?}", e),
    }
    assert_eq!(device.live_object_count(GpuObjectKind::Texture), 1);
}

#[test]
fn malformed_texture_is_a_parse_error() {
    let device = Arc::new(GpuDevice::new());
    let (mut system, file_system) = demo_system(&device);

    let truncated = TextureBuiltData {
        width: 4,
        height: 4,
        image_bytes: vec![0; 10],
    };
    let file = compile_resource("texture", "textures/truncated.texture", &[], &truncated).unwrap();
    file_system.add_file(file.path, file.bytes);

    // The header claims to be a mesh, the path says texture
    let mislabeled = compile_resource(
        "mesh",
        "textures/mislabeled.texture",
        &[],
        &checkerboard(2, 2, 1),
    )
    .unwrap();
    file_system.add_file(mislabeled.path, mislabeled.bytes);

    let truncated = system.load_async("textures/truncated.texture");
    let mislabeled = system.load_async("textures/mislabeled.texture");
    tick_until_idle(&mut system);

    for handle in [truncated, mislabeled] {
        match system.record(handle).unwrap().error() {
            Some(ResourceError::ParseError { .. }) => {}
            e => panic!("unexpected error {:?}", e),
        }
    }
    assert_eq!(device.live_object_count(GpuObjectKind::Texture), 0);
}
