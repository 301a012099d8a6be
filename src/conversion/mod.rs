use std::{collections::HashMap, fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::format::gltf::{GlbExporter, GlbImporter, GltfExporter, GltfImporter};

pub use self::{
    asset::Asset,
    image::{Image, ImageCodec, RasterCodec},
    material::{AlphaMode, PbrMaterial},
    resolver::{FileResolver, MapResolver, Resolver},
    scene::{
        bounds, Camera, Geometry, GraphEdge, Mesh, Path, Scene, SceneGraph,
        TextureVisual, Visual, DEFAULT_BASE_FRAME,
    },
};

mod asset;
pub mod color;
mod image;
mod material;
pub mod names;
mod resolver;
mod scene;

/// Defines a type that can import asset files into a scene.
pub trait Importer {
    /// Imports an asset file into a scene.
    fn import(&self, asset: &Asset, scene: &mut Scene) -> Result<()>;
    /// Returns the file extensions supported by the importer. These extensions are used to
    /// select the appropriate importer given an asset file.
    ///
    /// The extension should not include the period (e.g "zip", not ".zip").
    fn extensions(&self) -> &[&str];
}

/// Defines a type that can export a scene into asset files.
pub trait Exporter {
    /// Exports a scene into one or more asset files.
    fn export(&self, scene: &Scene) -> Result<Vec<Asset>>;
}

/// The converter for certain asset format.
/// A converter will convert any available input format to a specific set of output formats.
pub struct Converter {
    /// The display name of the output asset format.
    pub name: &'static str,
    exporters: Vec<Box<dyn Exporter>>,
}

impl Converter {
    /// Imports every supported file, merges them into one scene and exports it into `out_path`.
    /// Files that fail to import are skipped.
    pub fn convert(&self, files: &[String], out_path: &str) -> Result<()> {
        let importers = importers();
        let importers: HashMap<_, _> = importers
            .iter()
            .flat_map(|importer| importer.extensions().iter().map(move |ext| (*ext, importer)))
            .collect();

        let scenes = files
            .iter()
            // Read asset bytes.
            .filter_map(|file| match Asset::from_path(file) {
                Ok(asset) => Some(asset),
                Err(err) => {
                    log::error!("{:#}", err);
                    None
                }
            })
            // Import supported formats.
            .filter_map(|asset| {
                let extension = asset.extension().to_lowercase();
                match importers.get(extension.as_str()) {
                    Some(importer) => {
                        let mut scene = Scene::default();
                        match importer.import(&asset, &mut scene) {
                            Ok(_) => {
                                log::info!("Imported \"{}\"", asset.path().display());
                                Some(scene)
                            }
                            Err(err) => {
                                log::error!(
                                    "Failed to import \"{}\": {:#}",
                                    asset.path().display(),
                                    err
                                );
                                None
                            }
                        }
                    }
                    None => {
                        log::warn!(
                            "Skipped \"{}\": unsupported extension",
                            asset.path().display()
                        );
                        None
                    }
                }
            });

        // Merge imported scenes.
        let scene = match scenes.reduce(|a, b| a.merge(b)) {
            Some(scene) => scene,
            None => {
                log::warn!("No assets were exported");
                return Ok(());
            }
        };

        fs::create_dir_all(out_path).context("Failed to create the output directory")?;

        for exporter in &self.exporters {
            let assets = exporter.export(&scene).context("Failed to export the scene")?;
            for asset in assets {
                let path = output_path(std::path::Path::new(out_path), &asset);
                match fs::write(&path, &asset.bytes) {
                    Ok(_) => log::info!("Exported \"{}\"", path.display()),
                    Err(err) => log::error!("Failed to export \"{}\": {}", path.display(), err),
                }
            }
        }

        Ok(())
    }
}

/// Returns where to write an asset, adding a random suffix to its name if the file exists.
fn output_path(out_path: &std::path::Path, asset: &Asset) -> PathBuf {
    let path = out_path.join(asset.path());
    if !path.exists() {
        return path;
    }

    let name = format!("{}_{}", asset.name(), names::short_id());
    match asset.extension() {
        "" => out_path.join(name),
        extension => out_path.join(format!("{}.{}", name, extension)),
    }
}

// Returns all importers available.
fn importers() -> Vec<Box<dyn Importer>> {
    vec![
        Box::new(GltfImporter::default()),
        Box::new(GlbImporter::default()),
    ]
}

/// Returns all converters available.
pub fn converters() -> Vec<Converter> {
    vec![
        Converter {
            name: ".GLB (binary glTF)",
            exporters: vec![Box::new(GlbExporter::default())],
        },
        Converter {
            name: ".GLTF + .BIN (glTF)",
            exporters: vec![Box::new(GltfExporter::default())],
        },
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn extensions_are_unique() {
        let importers = importers();
        let mut extensions: Vec<_> = importers
            .iter()
            .flat_map(|importer| importer.extensions().to_vec())
            .collect();
        let count = extensions.len();
        extensions.dedup();

        assert_eq!(count, extensions.len());
        assert_eq!(vec!["gltf", "glb"], extensions);
    }

    #[test]
    fn free_output_path() {
        let asset = Asset::new(Vec::new(), "definitely_not_a_file.glb");
        assert_eq!(
            PathBuf::from("out/definitely_not_a_file.glb"),
            output_path(std::path::Path::new("out"), &asset)
        );
    }
}
