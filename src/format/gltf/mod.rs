//! glTF 2.0, both as a `.gltf` file with side buffers and as a single binary `.glb` file.
//!
//! https://www.khronos.org/registry/glTF/specs/2.0/glTF-2.0.html

use std::sync::Arc;

use serde_json::Value;

use crate::conversion::{ImageCodec, RasterCodec};

pub use self::{
    error::{Error, Result},
    exporter::{export_glb, export_gltf, GlbExporter, GltfExporter},
    importer::{load_glb, load_gltf, GlbImporter, GltfImporter, LoadedScene},
    validate::{GltfValidator, SchemaValidator},
};

pub mod accessor;
pub mod buffer;
mod camera;
mod error;
mod exporter;
pub mod glb;
pub mod graph;
mod importer;
pub mod internal;
mod material;
mod validate;

/// The name of the JSON document of a multi-file export.
pub const MODEL_FILE_NAME: &str = "model.gltf";

/// Options of [`export_gltf`] and [`export_glb`].
#[derive(Clone)]
pub struct ExportOptions {
    /// Stored as is in the `extras` of the document.
    pub extras: Option<Value>,
    /// Whether to export vertex normals. If `None`, they're only exported if the mesh has them
    /// already, so that they're never computed.
    pub include_normals: Option<bool>,
    /// Validates the document against the glTF schema before it's written.
    pub strict: bool,
    /// Encodes textures that can't be written as they are. Without it, such textures are left
    /// out.
    pub image_codec: Option<Arc<dyn ImageCodec>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            extras: None,
            include_normals: None,
            strict: false,
            image_codec: Some(Arc::new(RasterCodec)),
        }
    }
}

/// Options of [`load_gltf`] and [`load_glb`].
#[derive(Clone)]
pub struct LoadOptions {
    /// Validates the document against the glTF schema before it's read.
    pub strict: bool,
    /// Decodes textures. Without it, no material is loaded.
    pub image_codec: Option<Arc<dyn ImageCodec>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strict: false,
            image_codec: Some(Arc::new(RasterCodec)),
        }
    }
}
