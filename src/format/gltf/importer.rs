use std::{io::Read, sync::Arc};

use glam::{Vec2, Vec3};

use crate::conversion::{
    names::UniqueNames, Asset, Camera, FileResolver, Geometry, GraphEdge, Importer, Mesh,
    PbrMaterial, Resolver, Scene, SceneGraph, TextureVisual, Visual,
};

use super::{
    accessor::{self, TypedArray, ViewData},
    error::{Error, Result},
    exporter::{flip_uv, MODE_TRIANGLES},
    glb, graph,
    internal::{GltfJson, GltfMesh, GltfPrimitive},
    material::read_materials,
    validate::{GltfValidator, SchemaValidator},
    LoadOptions, MODEL_FILE_NAME,
};

/// The units of glTF data that doesn't say otherwise.
const DEFAULT_UNITS: &str = "meters";

/// Imports `.gltf` files. Buffers and images they reference are read relative to the file.
#[derive(Default, Clone)]
pub struct GltfImporter {
    pub options: LoadOptions,
}

impl Importer for GltfImporter {
    fn import(&self, asset: &Asset, scene: &mut Scene) -> anyhow::Result<()> {
        let resolver = FileResolver::new(asset.parent_dir());
        let mut source = asset.bytes.as_slice();
        let loaded = load_gltf(Some(&mut source as &mut dyn Read), &resolver, &self.options)?;
        merge_into(scene, loaded);
        Ok(())
    }

    fn extensions(&self) -> &[&str] {
        &["gltf"]
    }
}

/// Imports `.glb` files.
#[derive(Default, Clone)]
pub struct GlbImporter {
    pub options: LoadOptions,
}

impl Importer for GlbImporter {
    fn import(&self, asset: &Asset, scene: &mut Scene) -> anyhow::Result<()> {
        let resolver = FileResolver::new(asset.parent_dir());
        let loaded = load_glb(&mut asset.bytes.as_slice(), Some(&resolver), &self.options)?;
        merge_into(scene, loaded);
        Ok(())
    }

    fn extensions(&self) -> &[&str] {
        &["glb"]
    }
}

fn merge_into(scene: &mut Scene, loaded: LoadedScene) {
    *scene = std::mem::take(scene).merge(loaded.into());
}

/// Everything needed to construct a scene from a glTF document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScene {
    /// The triangle meshes, by name. Every triangle primitive becomes its own mesh.
    pub geometry: Vec<(String, Mesh)>,
    pub graph: Vec<GraphEdge>,
    pub base_frame: String,
}

impl From<LoadedScene> for Scene {
    fn from(loaded: LoadedScene) -> Self {
        Scene {
            geometry: loaded
                .geometry
                .into_iter()
                .map(|(name, mesh)| (name, Geometry::Mesh(mesh)))
                .collect(),
            graph: SceneGraph {
                base_frame: loaded.base_frame,
                edges: loaded.graph,
            },
            camera: Camera::default(),
        }
    }
}

/// Loads a multi-file glTF document.
///
/// The JSON is read from `source` if it holds any, or from [`MODEL_FILE_NAME`] through the
/// resolver otherwise. Buffers and images are fetched through the resolver unless they are
/// embedded as base64 data.
pub fn load_gltf(
    source: Option<&mut dyn Read>,
    resolver: &dyn Resolver,
    options: &LoadOptions,
) -> Result<LoadedScene> {
    let mut bytes = Vec::new();
    if let Some(source) = source {
        source.read_to_end(&mut bytes)?;
    }

    let json = match serde_json::from_slice::<GltfJson>(&bytes) {
        Ok(json) => {
            if options.strict {
                GltfValidator.validate(&bytes)?;
            }
            json
        }
        Err(err) => {
            log::debug!(
                "The source is not a glTF document ({}), reading \"{}\" instead",
                err,
                MODEL_FILE_NAME
            );
            let bytes = resolve(resolver, MODEL_FILE_NAME)?;
            parse_json(&bytes, options)?
        }
    };

    let buffers = json
        .buffers
        .iter()
        .enumerate()
        .map(|(index, buffer)| match &buffer.uri {
            Some(uri) => uri_to_bytes(uri, Some(resolver)),
            None => Err(Error::format(format!("buffer {} has no URI", index))),
        })
        .collect::<Result<Vec<_>>>()?;

    read_buffers(&json, &buffers, Some(resolver), options)
}

/// Loads a GLB file. Buffers without a URI are backed by the binary chunks, in order. The
/// resolver is only needed for resources stored outside of the file.
pub fn load_glb(
    source: &mut dyn Read,
    resolver: Option<&dyn Resolver>,
    options: &LoadOptions,
) -> Result<LoadedScene> {
    let glb = glb::read(source)?;
    let json = parse_json(glb::trim_json(&glb.json), options)?;

    let mut chunks = glb.chunks.into_iter();
    let buffers = json
        .buffers
        .iter()
        .enumerate()
        .map(|(index, buffer)| match &buffer.uri {
            Some(uri) => uri_to_bytes(uri, resolver),
            None => chunks.next().ok_or_else(|| {
                Error::format(format!("buffer {} has no binary chunk", index))
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    read_buffers(&json, &buffers, resolver, options)
}

fn parse_json(bytes: &[u8], options: &LoadOptions) -> Result<GltfJson> {
    if options.strict {
        GltfValidator.validate(bytes)?;
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn resolve(resolver: &dyn Resolver, uri: &str) -> Result<Vec<u8>> {
    resolver
        .get(uri)
        .map_err(|err| Error::ResourceResolution {
            uri: uri.to_string(),
            reason: format!("{:#}", err),
        })
}

/// Returns the bytes a URI refers to, decoding embedded base64 data or fetching anything else
/// through the resolver.
pub(crate) fn uri_to_bytes(uri: &str, resolver: Option<&dyn Resolver>) -> Result<Vec<u8>> {
    const BASE64_MARKER: &str = "base64,";

    if let Some(data_uri) = DataUri::parse(uri) {
        return Ok(data_uri.decode()?);
    }
    if let Some((_, data)) = uri.split_once(BASE64_MARKER) {
        return Ok(base64::decode(data)?);
    }

    match resolver {
        Some(resolver) => resolve(resolver, uri),
        None => Err(Error::ResourceResolution {
            uri: uri.to_string(),
            reason: "no resolver was provided".to_string(),
        }),
    }
}

// Adapted from https://github.com/bevyengine/bevy/blob/c6fec1f0c256597af9746050dd1a4dcd3b80fe24/crates/bevy_gltf/src/loader.rs#L742
struct DataUri<'a> {
    base64: bool,
    data: &'a str,
}

impl<'a> DataUri<'a> {
    fn parse(uri: &'a str) -> Option<DataUri<'a>> {
        let uri = uri.strip_prefix("data:")?;
        let (mime_type, data) = uri.split_once(',')?;

        Some(DataUri {
            base64: mime_type.ends_with(";base64"),
            data,
        })
    }

    fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.base64 {
            base64::decode(self.data)
        } else {
            Ok(self.data.as_bytes().to_owned())
        }
    }
}

/// Slices the buffers into views, decodes every accessor and assembles the meshes and the
/// transform hierarchy they describe.
fn read_buffers(
    json: &GltfJson,
    buffers: &[Vec<u8>],
    resolver: Option<&dyn Resolver>,
    options: &LoadOptions,
) -> Result<LoadedScene> {
    let views = json
        .buffer_views
        .iter()
        .enumerate()
        .map(|(index, view)| -> Result<ViewData> {
            let buffer = buffers.get(view.buffer).ok_or_else(|| {
                Error::format(format!(
                    "buffer view {} references missing buffer {}",
                    index, view.buffer
                ))
            })?;
            let bytes = view
                .byte_offset
                .checked_add(view.byte_length)
                .and_then(|end| buffer.get(view.byte_offset..end))
                .ok_or_else(|| {
                    Error::truncation(
                        format!("buffer view {}", index),
                        view.byte_offset.saturating_add(view.byte_length),
                        buffer.len(),
                    )
                })?;
            Ok(ViewData {
                bytes,
                stride: view.byte_stride,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let accessors = json
        .accessors
        .iter()
        .map(|accessor| accessor::decode(accessor, &views))
        .collect::<Result<Vec<_>>>()?;

    let materials = read_materials(json, &views, resolver, options.image_codec.as_deref());

    let mut names = UniqueNames::new();
    let mut geometry = Vec::new();
    let mut mesh_geometries = Vec::with_capacity(json.meshes.len());
    for (index, mesh) in json.meshes.iter().enumerate() {
        let units = mesh_units(mesh);
        let base_name = match &mesh.name {
            Some(name) => name.clone(),
            None if json.meshes.len() > 1 => format!("GLTF_geometry_{}", index),
            None => "GLTF_geometry".to_string(),
        };

        let mut primitives = Vec::new();
        for (j, primitive) in mesh.primitives.iter().enumerate() {
            if primitive.mode.unwrap_or(MODE_TRIANGLES) != MODE_TRIANGLES {
                log::debug!("Skipping primitive {} of mesh {}: not triangles", j, index);
                continue;
            }

            let name = match mesh.primitives.len() {
                1 => base_name.clone(),
                _ => format!("{}_{}", base_name, j),
            };
            let name = names.claim(&name);

            let mut triangles = read_primitive(primitive, &accessors, &materials)?;
            triangles.units = Some(units.clone());

            geometry.push((name.clone(), triangles));
            primitives.push(name);
        }
        mesh_geometries.push(primitives);
    }

    let hierarchy = graph::reconstruct(&json.nodes, &json.scenes, json.scene, &mesh_geometries)?;

    Ok(LoadedScene {
        geometry,
        graph: hierarchy.edges,
        base_frame: hierarchy.base_frame,
    })
}

fn mesh_units(mesh: &GltfMesh) -> String {
    mesh.extras
        .as_ref()
        .and_then(|extras| extras.get("units"))
        .map(|units| match units.as_str() {
            Some(units) => units.to_string(),
            None => units.to_string(),
        })
        .unwrap_or_else(|| DEFAULT_UNITS.to_string())
}

fn read_primitive(
    primitive: &GltfPrimitive,
    accessors: &[TypedArray],
    materials: &[Option<Arc<PbrMaterial>>],
) -> Result<Mesh> {
    let accessor = |index: usize| {
        accessors
            .get(index)
            .ok_or_else(|| Error::format(format!("accessor {} does not exist", index)))
    };
    let attributes = &primitive.attributes;

    let position = attributes
        .position
        .ok_or_else(|| Error::format("a primitive has no POSITION attribute"))?;
    let vertices: Vec<_> = accessor(position)?
        .to_rows::<3>()?
        .into_iter()
        .map(Vec3::from)
        .collect();

    let faces = match primitive.indices {
        Some(indices) => accessor(indices)?
            .to_u32()?
            .chunks_exact(3)
            .map(|face| [face[0], face[1], face[2]])
            .collect(),
        // Like drawArrays, every three vertices are a triangle.
        None => (0..vertices.len() as u32 / 3)
            .map(|face| [face * 3, face * 3 + 1, face * 3 + 2])
            .collect(),
    };

    let vertex_normals = match attributes.normal {
        Some(normal) => Some(
            accessor(normal)?
                .to_rows::<3>()?
                .into_iter()
                .map(Vec3::from)
                .collect(),
        ),
        None => None,
    };

    let visual = match (attributes.color_0, primitive.material) {
        (Some(color), _) => Visual::VertexColor(accessor(color)?.to_rgba8()?),
        (None, Some(material)) => {
            let material = materials
                .get(material)
                .ok_or_else(|| Error::format(format!("material {} does not exist", material)))?;
            let uv = match attributes.tex_coord_0 {
                Some(uv) => {
                    let uv: Vec<_> = accessor(uv)?
                        .to_rows::<2>()?
                        .into_iter()
                        .map(Vec2::from)
                        .collect();
                    Some(flip_uv(&uv))
                }
                None => None,
            };
            Visual::Textured(TextureVisual {
                uv,
                material: material.clone(),
            })
        }
        (None, None) => Visual::None,
    };

    Ok(Mesh {
        vertices,
        faces,
        visual,
        vertex_normals,
        units: None,
    })
}
