use std::{collections::HashMap, sync::Arc};

use image::ImageFormat;

use crate::conversion::{AlphaMode, Image, ImageCodec, PbrMaterial, Resolver};

use super::{
    accessor::ViewData,
    error::Error,
    exporter::Document,
    importer::uri_to_bytes,
    internal::{
        GltfImage, GltfJson, GltfMaterial, GltfPbrMetallicRoughness, GltfSampler, GltfTexture,
        GltfTextureInfo,
    },
};

/// Returns the MIME type glTF uses for an image format, if glTF supports it.
pub fn mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        _ => None,
    }
}

/// Writes materials into a document. Images shared between materials are written once.
pub struct MaterialWriter<'a> {
    codec: Option<&'a dyn ImageCodec>,
    /// Texture index of every image written so far, by address. `None` marks images that
    /// failed to encode.
    textures: HashMap<*const Image, Option<usize>>,
}

impl<'a> MaterialWriter<'a> {
    pub fn new(codec: Option<&'a dyn ImageCodec>) -> Self {
        Self {
            codec,
            textures: HashMap::new(),
        }
    }

    /// Appends a material along with its textures. Returns the material index.
    pub fn append(&mut self, document: &mut Document, material: &PbrMaterial) -> usize {
        let mut texture = |image: &Option<Arc<Image>>| {
            image
                .as_ref()
                .and_then(|image| self.append_texture(document, image))
                .map(|index| GltfTextureInfo {
                    index,
                    ..Default::default()
                })
        };

        let pbr = GltfPbrMetallicRoughness {
            base_color_factor: material.base_color_factor,
            base_color_texture: texture(&material.base_color_texture),
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
            metallic_roughness_texture: texture(&material.metallic_roughness_texture),
        };
        let gltf_material = GltfMaterial {
            name: material.name.clone(),
            emissive_texture: texture(&material.emissive_texture),
            normal_texture: texture(&material.normal_texture),
            occlusion_texture: texture(&material.occlusion_texture),
            pbr_metallic_roughness: (!pbr.is_empty()).then(|| pbr),
            emissive_factor: material.emissive_factor,
            alpha_mode: material.alpha_mode.map(|mode| mode.as_str().to_string()),
            alpha_cutoff: material.alpha_cutoff,
            double_sided: material.double_sided,
        };

        document.root.materials.push(gltf_material);
        document.root.materials.len() - 1
    }

    fn append_texture(&mut self, document: &mut Document, image: &Arc<Image>) -> Option<usize> {
        let key = Arc::as_ptr(image);
        if let Some(&texture) = self.textures.get(&key) {
            return texture;
        }

        let texture = match encode_image(image, self.codec) {
            Ok((bytes, mime_type)) => {
                let root = &mut document.root;
                if root.samplers.is_empty() {
                    root.samplers.push(GltfSampler {});
                }

                let view = document.push_view(bytes);
                let root = &mut document.root;
                root.images.push(GltfImage {
                    buffer_view: Some(view),
                    mime_type: Some(mime_type.to_string()),
                    uri: None,
                });
                root.textures.push(GltfTexture {
                    sampler: Some(0),
                    source: Some(root.images.len() - 1),
                });
                Some(root.textures.len() - 1)
            }
            Err(err) => {
                log::warn!("Skipping a texture that could not be encoded: {:#}", err);
                None
            }
        };

        self.textures.insert(key, texture);
        texture
    }
}

/// Returns the encoded bytes of an image and their MIME type. PNG and JPEG images keep their
/// original encoding, anything else is encoded as PNG.
fn encode_image(
    image: &Image,
    codec: Option<&dyn ImageCodec>,
) -> anyhow::Result<(Vec<u8>, &'static str)> {
    if let (Some(mime_type), Some(source)) = (image.format().and_then(mime_type), image.source()) {
        return Ok((source.to_vec(), mime_type));
    }

    let codec = codec.ok_or(Error::CapabilityUnavailable("image encoding"))?;
    Ok((codec.encode_png(image)?, "image/png"))
}

/// Reconstructs every material of a document.
///
/// Images that fail to load, and textures that don't exist, are logged and left out of the
/// materials that use them. Without an image codec no material is loaded at all.
pub fn read_materials(
    json: &GltfJson,
    views: &[ViewData],
    resolver: Option<&dyn Resolver>,
    codec: Option<&dyn ImageCodec>,
) -> Vec<Option<Arc<PbrMaterial>>> {
    let codec = match codec {
        Some(codec) => codec,
        None => {
            if !json.materials.is_empty() {
                log::warn!("{}, materials are skipped", Error::CapabilityUnavailable("image decoding"));
            }
            return vec![None; json.materials.len()];
        }
    };

    let images: Vec<_> = json
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| match read_image(image, views, resolver, codec) {
            Ok(image) => Some(Arc::new(image)),
            Err(err) => {
                log::warn!("Skipping image {}: {:#}", index, err);
                None
            }
        })
        .collect();

    json.materials
        .iter()
        .map(|material| Some(Arc::new(read_material(material, json, &images))))
        .collect()
}

fn read_image(
    image: &GltfImage,
    views: &[ViewData],
    resolver: Option<&dyn Resolver>,
    codec: &dyn ImageCodec,
) -> anyhow::Result<Image> {
    let bytes = match (image.buffer_view, &image.uri) {
        (Some(index), _) => views
            .get(index)
            .map(|view| view.bytes.to_vec())
            .ok_or_else(|| {
                Error::format(format!("image references missing buffer view {}", index))
            })?,
        (None, Some(uri)) => uri_to_bytes(uri, resolver)?,
        (None, None) => anyhow::bail!("the image has neither a buffer view nor a URI"),
    };
    codec.decode(&bytes)
}

/// Flattens a glTF material, replacing texture references with the images they point to.
fn read_material(
    material: &GltfMaterial,
    json: &GltfJson,
    images: &[Option<Arc<Image>>],
) -> PbrMaterial {
    let texture = |info: &Option<GltfTextureInfo>| {
        let index = info.as_ref()?.index;
        match json.textures.get(index) {
            Some(texture) => images.get(texture.source?).cloned().flatten(),
            None => {
                log::warn!("Skipping texture {}: it does not exist", index);
                None
            }
        }
    };

    let pbr = material.pbr_metallic_roughness.clone().unwrap_or_default();
    let alpha_mode = material.alpha_mode.as_deref().and_then(|mode| {
        let parsed = AlphaMode::parse(mode);
        if parsed.is_none() {
            log::warn!("Ignoring unknown alpha mode \"{}\"", mode);
        }
        parsed
    });

    PbrMaterial {
        name: material.name.clone(),
        base_color_factor: pbr.base_color_factor,
        base_color_texture: texture(&pbr.base_color_texture),
        metallic_factor: pbr.metallic_factor,
        roughness_factor: pbr.roughness_factor,
        metallic_roughness_texture: texture(&pbr.metallic_roughness_texture),
        normal_texture: texture(&material.normal_texture),
        occlusion_texture: texture(&material.occlusion_texture),
        emissive_texture: texture(&material.emissive_texture),
        emissive_factor: material.emissive_factor,
        alpha_mode,
        alpha_cutoff: material.alpha_cutoff,
        double_sided: material.double_sided,
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    use crate::conversion::RasterCodec;

    use super::*;

    fn pixels() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 255])))
    }

    #[test]
    fn shared_images_are_written_once() {
        let image = Arc::new(Image::new(pixels()));
        let a = PbrMaterial::from_texture(image.clone());
        let b = PbrMaterial {
            emissive_texture: Some(image),
            ..PbrMaterial::from_texture(Arc::new(Image::new(pixels())))
        };

        let mut document = Document::new(None);
        let mut writer = MaterialWriter::new(Some(&RasterCodec));
        writer.append(&mut document, &a);
        writer.append(&mut document, &b);

        let root = &document.root;
        assert_eq!(2, root.images.len());
        assert_eq!(2, root.textures.len());
        assert_eq!(1, root.samplers.len());

        let index = |info: &Option<GltfTextureInfo>| info.as_ref().unwrap().index;
        let pbr = |m: &GltfMaterial| m.pbr_metallic_roughness.clone().unwrap();
        assert_eq!(0, index(&pbr(&root.materials[0]).base_color_texture));
        assert_eq!(1, index(&pbr(&root.materials[1]).base_color_texture));
        assert_eq!(0, index(&root.materials[1].emissive_texture));
    }

    #[test]
    fn source_bytes_are_reused() {
        let bytes = RasterCodec.encode_png(&Image::new(pixels())).unwrap();
        let image = Image::with_source(pixels(), ImageFormat::Png, bytes.clone());

        let (encoded, mime_type) = encode_image(&image, None).unwrap();

        assert_eq!(bytes, encoded);
        assert_eq!("image/png", mime_type);
    }

    #[test]
    fn missing_codec_skips_texture() {
        let material = PbrMaterial {
            roughness_factor: Some(0.5),
            ..PbrMaterial::from_texture(Arc::new(Image::new(pixels())))
        };

        let mut document = Document::new(None);
        MaterialWriter::new(None).append(&mut document, &material);

        let root = &document.root;
        assert!(root.images.is_empty());
        assert!(root.textures.is_empty());
        assert!(root.samplers.is_empty());
        assert_eq!(
            Some(GltfPbrMetallicRoughness {
                roughness_factor: Some(0.5),
                ..Default::default()
            }),
            root.materials[0].pbr_metallic_roughness
        );
    }

    #[test]
    fn empty_pbr_is_omitted() {
        let material = PbrMaterial {
            emissive_factor: Some([1., 0., 0.]),
            ..Default::default()
        };

        let mut document = Document::new(None);
        MaterialWriter::new(None).append(&mut document, &material);

        assert_eq!(None, document.root.materials[0].pbr_metallic_roughness);
        assert_eq!(Some([1., 0., 0.]), document.root.materials[0].emissive_factor);
    }

    #[test]
    fn read_shared_image() {
        let png = RasterCodec.encode_png(&Image::new(pixels())).unwrap();
        let json: GltfJson = serde_json::from_value(serde_json::json!({
            "asset": {"version": "2.0"},
            "images": [{"bufferView": 0, "mimeType": "image/png"}],
            "textures": [{"sampler": 0, "source": 0}],
            "materials": [
                {"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}, "metallicFactor": 0.25}},
                {"emissiveTexture": {"index": 0}, "alphaMode": "BLEND", "doubleSided": true},
            ],
        }))
        .unwrap();
        let views = [ViewData {
            bytes: &png,
            stride: None,
        }];

        let materials = read_materials(&json, &views, None, Some(&RasterCodec));

        let a = materials[0].as_ref().unwrap();
        let b = materials[1].as_ref().unwrap();
        assert_eq!(Some(0.25), a.metallic_factor);
        assert_eq!(Some(AlphaMode::Blend), b.alpha_mode);
        assert_eq!(Some(true), b.double_sided);
        assert!(Arc::ptr_eq(
            a.base_color_texture.as_ref().unwrap(),
            b.emissive_texture.as_ref().unwrap()
        ));
    }

    #[test]
    fn broken_image_is_skipped() {
        let json: GltfJson = serde_json::from_value(serde_json::json!({
            "images": [{"bufferView": 0}],
            "textures": [{"source": 0}],
            "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
        }))
        .unwrap();
        let views = [ViewData {
            bytes: b"not an image",
            stride: None,
        }];

        let materials = read_materials(&json, &views, None, Some(&RasterCodec));

        assert_eq!(None, materials[0].as_ref().unwrap().base_color_texture);
    }

    #[test]
    fn no_codec() {
        let json: GltfJson = serde_json::from_value(serde_json::json!({
            "materials": [{}, {}],
        }))
        .unwrap();

        assert_eq!(vec![None, None], read_materials(&json, &[], None, None));
    }

    #[test]
    fn missing_texture() {
        let json: GltfJson = serde_json::from_value(serde_json::json!({
            "materials": [{
                "normalTexture": {"index": 4},
                "pbrMetallicRoughness": {"roughnessFactor": 0.5},
            }],
        }))
        .unwrap();

        let materials = read_materials(&json, &[], None, Some(&RasterCodec));

        let material = materials[0].as_ref().unwrap();
        assert_eq!(None, material.normal_texture);
        assert_eq!(Some(0.5), material.roughness_factor);
    }
}
