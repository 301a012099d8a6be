use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use serde_json::{json, Value};

use crate::conversion::{Asset, Exporter, Geometry, Mesh, Path, Scene, Visual};

use super::{
    accessor::{describe, TypedArray},
    buffer::BufferBuilder,
    camera::convert_camera,
    error::Result,
    glb, graph,
    internal::{
        GltfBuffer, GltfJson, GltfMaterial, GltfMesh, GltfPbrMetallicRoughness, GltfPrimitive,
        GltfScene,
    },
    material::MaterialWriter,
    validate::{GltfValidator, SchemaValidator},
    ExportOptions, MODEL_FILE_NAME,
};

/// `GL_LINES`
pub const MODE_LINES: u32 = 1;
/// `GL_TRIANGLES`
pub const MODE_TRIANGLES: u32 = 4;

/// Exports a scene as a `.gltf` file plus one `.bin` file per binary blob.
#[derive(Default, Clone)]
pub struct GltfExporter {
    pub options: ExportOptions,
}

impl Exporter for GltfExporter {
    fn export(&self, scene: &Scene) -> anyhow::Result<Vec<Asset>> {
        let files = export_gltf(scene, &self.options)?;
        Ok(files
            .into_iter()
            .map(|(name, bytes)| Asset::new(bytes, name))
            .collect())
    }
}

/// Exports a scene as a single `.glb` file.
#[derive(Default, Clone)]
pub struct GlbExporter {
    pub options: ExportOptions,
}

impl Exporter for GlbExporter {
    fn export(&self, scene: &Scene) -> anyhow::Result<Vec<Asset>> {
        let bytes = export_glb(scene, &self.options)?;

        let name = match scene.geometry.first() {
            Some((name, _)) => name.as_str(),
            None => "model",
        };

        Ok(vec![Asset::new(bytes, format!("{}.glb", name))])
    }
}

/// Exports a scene as glTF files, by name: [`MODEL_FILE_NAME`] with the JSON document, plus one
/// buffer file per binary blob.
pub fn export_gltf(scene: &Scene, options: &ExportOptions) -> Result<BTreeMap<String, Vec<u8>>> {
    let Document { mut root, buffers } = build_document(scene, options)?;

    let (files, gltf_buffers, views) = buffers.files();
    root.buffers = gltf_buffers;
    root.buffer_views = views;

    let mut files: BTreeMap<_, _> = files.into_iter().collect();
    files.insert(MODEL_FILE_NAME.to_string(), serialize(&root, options)?);
    Ok(files)
}

/// Exports a scene as a GLB file.
pub fn export_glb(scene: &Scene, options: &ExportOptions) -> Result<Vec<u8>> {
    let Document { mut root, buffers } = build_document(scene, options)?;

    if buffers.is_empty() {
        return glb::write(serialize(&root, options)?, None);
    }

    let (data, views) = buffers.assemble();
    root.buffers = vec![GltfBuffer {
        byte_length: data.len(),
        uri: None,
    }];
    root.buffer_views = views;

    glb::write(serialize(&root, options)?, Some(&data))
}

fn serialize(root: &GltfJson, options: &ExportOptions) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(root)?;
    if options.strict {
        GltfValidator.validate(&json)?;
    }
    Ok(json)
}

/// The JSON tree and binary blobs of a document being exported.
pub(crate) struct Document {
    pub(crate) root: GltfJson,
    buffers: BufferBuilder,
}

impl Document {
    pub(crate) fn new(extras: Option<Value>) -> Self {
        Self {
            root: GltfJson {
                extras,
                ..Default::default()
            },
            buffers: BufferBuilder::new(),
        }
    }

    /// Appends the bytes of an array along with the accessor that describes them. Returns the
    /// accessor index.
    pub(crate) fn push_accessor(&mut self, array: &TypedArray, with_bounds: bool) -> Result<usize> {
        let bytes = array.to_bytes()?;
        let mut accessor = describe(array, with_bounds);
        accessor.buffer_view = Some(self.buffers.append(bytes));

        self.root.accessors.push(accessor);
        Ok(self.root.accessors.len() - 1)
    }

    /// Appends a raw blob, such as an encoded image. Returns its buffer view index.
    pub(crate) fn push_view(&mut self, bytes: Vec<u8>) -> usize {
        self.buffers.append(bytes)
    }

    fn push_mesh(&mut self, mesh: GltfMesh) -> usize {
        self.root.meshes.push(mesh);
        self.root.meshes.len() - 1
    }
}

fn build_document(scene: &Scene, options: &ExportOptions) -> Result<Document> {
    let mut document = Document::new(options.extras.clone());
    let mut materials = MaterialWriter::new(options.image_codec.as_deref());
    let mut line_material = None;

    let mut meshes = HashMap::new();
    for (name, geometry) in &scene.geometry {
        let index = match geometry {
            Geometry::Mesh(mesh) => insert_mesh(
                &mut document,
                &mut materials,
                name,
                mesh,
                options.include_normals,
            )?,
            Geometry::Path(path) => insert_path(&mut document, &mut line_material, name, path)?,
        };
        if let Some(index) = index {
            meshes.insert(name.clone(), index);
        }
    }

    let root = &mut document.root;
    root.nodes = graph::flatten(&scene.graph, &meshes);
    root.scene = Some(0);
    root.scenes = vec![GltfScene {
        name: None,
        nodes: vec![0],
    }];
    root.cameras = vec![convert_camera(&scene.camera)];

    Ok(document)
}

/// Converts and inserts a triangle mesh into the document. Returns the mesh index, or `None`
/// if the mesh has nothing to export.
fn insert_mesh(
    document: &mut Document,
    materials: &mut MaterialWriter,
    name: &str,
    mesh: &Mesh,
    include_normals: Option<bool>,
) -> Result<Option<usize>> {
    if mesh.is_empty() {
        log::warn!("Skipping empty mesh \"{}\"", name);
        return Ok(None);
    }

    let mut primitive = GltfPrimitive {
        mode: Some(MODE_TRIANGLES),
        ..Default::default()
    };

    if !mesh.faces.is_empty() {
        let indices = TypedArray::from_faces(&mesh.faces);
        primitive.indices = Some(document.push_accessor(&indices, true)?);
    }

    let positions = TypedArray::from_vec3(&mesh.vertices);
    primitive.attributes.position = Some(document.push_accessor(&positions, true)?);

    match &mesh.visual {
        Visual::VertexColor(_) | Visual::FaceColor(_) => match mesh.vertex_colors() {
            Some(colors) if colors.len() == mesh.vertices.len() => {
                let colors = TypedArray::from_rgba8(&colors);
                primitive.attributes.color_0 = Some(document.push_accessor(&colors, false)?);
            }
            _ => log::warn!("Skipping colors of \"{}\": one per vertex is required", name),
        },
        Visual::Textured(visual) => {
            if let Some(material) = &visual.material {
                primitive.material = Some(materials.append(document, material));
            }
            match &visual.uv {
                Some(uv) if uv.len() == mesh.vertices.len() => {
                    let uv = TypedArray::from_vec2(&flip_uv(uv));
                    primitive.attributes.tex_coord_0 = Some(document.push_accessor(&uv, false)?);
                }
                Some(_) => log::warn!(
                    "Skipping texture coordinates of \"{}\": one per vertex is required",
                    name
                ),
                None => {}
            }
        }
        Visual::None => {}
    }

    let normals = match include_normals {
        Some(true) => Some(mesh.vertex_normals()),
        Some(false) => None,
        None => mesh.vertex_normals.clone(),
    };
    if let Some(normals) = normals {
        let normals = TypedArray::from_vec3(&normals);
        primitive.attributes.normal = Some(document.push_accessor(&normals, false)?);
    }

    Ok(Some(document.push_mesh(GltfMesh {
        name: Some(name.to_string()),
        primitives: vec![primitive],
        extras: units_extras(mesh.units.as_deref()),
    })))
}

/// Converts and inserts a set of polylines into the document as a line list. Every path shares
/// the same default material.
fn insert_path(
    document: &mut Document,
    line_material: &mut Option<usize>,
    name: &str,
    path: &Path,
) -> Result<Option<usize>> {
    let segments = path.line_segments();
    if segments.is_empty() {
        log::warn!("Skipping empty path \"{}\"", name);
        return Ok(None);
    }

    let positions = TypedArray::from_vec3(&segments);
    let position = document.push_accessor(&positions, true)?;

    let material = *line_material.get_or_insert_with(|| {
        document.root.materials.push(GltfMaterial {
            pbr_metallic_roughness: Some(GltfPbrMetallicRoughness {
                base_color_factor: Some([0.; 4]),
                metallic_factor: Some(0.),
                roughness_factor: Some(0.),
                ..Default::default()
            }),
            ..Default::default()
        });
        document.root.materials.len() - 1
    });

    let mut primitive = GltfPrimitive {
        mode: Some(MODE_LINES),
        material: Some(material),
        ..Default::default()
    };
    primitive.attributes.position = Some(position);

    Ok(Some(document.push_mesh(GltfMesh {
        name: Some(name.to_string()),
        primitives: vec![primitive],
        extras: units_extras(path.units.as_deref()),
    })))
}

/// glTF lengths are implicitly in meters, so only other units are recorded.
fn units_extras(units: Option<&str>) -> Option<Value> {
    units
        .filter(|units| !units.contains("meter"))
        .map(|units| json!({ "units": units }))
}

/// Moves the origin of texture coordinates between the bottom left, as stored in a
/// [`TextureVisual`](crate::conversion::TextureVisual), and the top left, as stored in glTF.
pub fn flip_uv(uv: &[Vec2]) -> Vec<Vec2> {
    uv.iter().map(|uv| Vec2::new(uv.x, 1. - uv.y)).collect()
}
