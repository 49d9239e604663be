use crate::material::MaterialBuiltData;
use crate::mesh::{MeshBuiltData, MeshPartData};
use crate::pipeline::{BlendMethod, PipelineBuiltData};
use crate::texture::TextureBuiltData;
use hearth::base::{write_compiled_resource, ResourceHeader, ResourceResult};
use serde::Serialize;

pub const LIT_PIPELINE: &str = "pipelines/lit.pipeline";
pub const TRANSPARENT_PIPELINE: &str = "pipelines/transparent.pipeline";
pub const BRICK_ALBEDO_TEXTURE: &str = "textures/brick_albedo.texture";
pub const BRICK_NORMAL_TEXTURE: &str = "textures/brick_normal.texture";
pub const BRICK_MATERIAL: &str = "materials/brick.material";
pub const GLASS_MATERIAL: &str = "materials/glass.material";
pub const CUBE_MESH: &str = "meshes/cube.mesh";
pub const WALL_MESH: &str = "meshes/wall.mesh";

/// A compiled resource ready to be written to disk or added to a memory file system
pub struct CompiledFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Compiles a single resource. Dependencies are paths, in the order install will look them up.
pub fn compile_resource<T: Serialize>(
    type_tag: &str,
    path: &str,
    dependencies: &[&str],
    payload: &T,
) -> ResourceResult<CompiledFile> {
    let mut header = ResourceHeader::new(type_tag, path);
    for dependency in dependencies {
        header = header.with_dependency(*dependency);
    }

    Ok(CompiledFile {
        path: path.to_string(),
        bytes: write_compiled_resource(&header, payload)?,
    })
}

pub fn checkerboard(
    width: u32,
    height: u32,
    cell_size: u32,
) -> TextureBuiltData {
    let mut image_bytes = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let light = ((x / cell_size) + (y / cell_size)) % 2 == 0;
            let value = if light { 200 } else { 60 };
            image_bytes.extend_from_slice(&[value, value, value, 255]);
        }
    }

    TextureBuiltData {
        width,
        height,
        image_bytes,
    }
}

pub fn cube_mesh() -> MeshBuiltData {
    let positions: Vec<glam::Vec3> = (0..8)
        .map(|i| {
            glam::Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            )
        })
        .collect();
    let normals = positions.iter().map(|x| x.normalize()).collect();

    #[rustfmt::skip]
    let indices = vec![
        // -z, +z, -x
        0, 2, 1, 1, 2, 3,
        4, 5, 6, 5, 7, 6,
        0, 4, 2, 2, 4, 6,
        // +x, -y, +y
        1, 3, 5, 3, 7, 5,
        0, 1, 4, 1, 5, 4,
        2, 6, 3, 3, 6, 7,
    ];

    MeshBuiltData {
        positions,
        normals,
        indices,
        parts: vec![
            MeshPartData {
                index_offset: 0,
                index_count: 18,
                material_index: 0,
            },
            MeshPartData {
                index_offset: 18,
                index_count: 18,
                material_index: 1,
            },
        ],
    }
}

pub fn wall_mesh() -> MeshBuiltData {
    MeshBuiltData {
        positions: vec![
            glam::Vec3::new(-2.0, 0.0, 0.0),
            glam::Vec3::new(2.0, 0.0, 0.0),
            glam::Vec3::new(-2.0, 3.0, 0.0),
            glam::Vec3::new(2.0, 3.0, 0.0),
        ],
        normals: vec![glam::Vec3::new(0.0, 0.0, 1.0); 4],
        indices: vec![0, 1, 2, 1, 3, 2],
        parts: vec![MeshPartData {
            index_offset: 0,
            index_count: 6,
            material_index: 0,
        }],
    }
}

/// Everything the demo streams: two meshes sharing a material, two pipelines and two textures
pub fn build_demo_content() -> ResourceResult<Vec<CompiledFile>> {
    let lit_pipeline = PipelineBuiltData {
        vertex_shader: "shaders/mesh.vert".to_string(),
        fragment_shader: "shaders/lit.frag".to_string(),
        blend_method: BlendMethod::Opaque,
        backface_culling: true,
    };
    let transparent_pipeline = PipelineBuiltData {
        vertex_shader: "shaders/mesh.vert".to_string(),
        fragment_shader: "shaders/transparent.frag".to_string(),
        blend_method: BlendMethod::AlphaBlend,
        backface_culling: false,
    };

    let brick_material = MaterialBuiltData {
        roughness_factor: 0.9,
        metallic_factor: 0.0,
        texture_slots: vec!["albedo".to_string(), "normal".to_string()],
        ..Default::default()
    };
    let glass_material = MaterialBuiltData {
        base_color_factor: glam::Vec4::new(0.8, 0.9, 1.0, 0.3),
        roughness_factor: 0.05,
        metallic_factor: 0.0,
        ..Default::default()
    };

    Ok(vec![
        compile_resource("pipeline", LIT_PIPELINE, &[], &lit_pipeline)?,
        compile_resource("pipeline", TRANSPARENT_PIPELINE, &[], &transparent_pipeline)?,
        compile_resource("texture", BRICK_ALBEDO_TEXTURE, &[], &checkerboard(256, 256, 32))?,
        compile_resource("texture", BRICK_NORMAL_TEXTURE, &[], &checkerboard(128, 128, 16))?,
        compile_resource(
            "material",
            BRICK_MATERIAL,
            &[LIT_PIPELINE, BRICK_ALBEDO_TEXTURE, BRICK_NORMAL_TEXTURE],
            &brick_material,
        )?,
        compile_resource("material", GLASS_MATERIAL, &[TRANSPARENT_PIPELINE], &glass_material)?,
        compile_resource("mesh", CUBE_MESH, &[BRICK_MATERIAL, GLASS_MATERIAL], &cube_mesh())?,
        compile_resource("mesh", WALL_MESH, &[BRICK_MATERIAL], &wall_mesh())?,
    ])
}

