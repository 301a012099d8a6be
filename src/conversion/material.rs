use std::sync::Arc;

use super::{color, image::Image};

/// How the alpha channel of the base color is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AlphaMode::Opaque => "OPAQUE",
            AlphaMode::Mask => "MASK",
            AlphaMode::Blend => "BLEND",
        }
    }

    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "OPAQUE" => Some(AlphaMode::Opaque),
            "MASK" => Some(AlphaMode::Mask),
            "BLEND" => Some(AlphaMode::Blend),
            _ => None,
        }
    }
}

/// A physically based material using the metallic-roughness model.
///
/// Textures are shared through [`Arc`] so that materials which use the same image can be
/// recognized and written only once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PbrMaterial {
    pub name: Option<String>,
    pub base_color_factor: Option<[f64; 4]>,
    pub base_color_texture: Option<Arc<Image>>,
    pub metallic_factor: Option<f64>,
    pub roughness_factor: Option<f64>,
    pub metallic_roughness_texture: Option<Arc<Image>>,
    pub normal_texture: Option<Arc<Image>>,
    pub occlusion_texture: Option<Arc<Image>>,
    pub emissive_texture: Option<Arc<Image>>,
    pub emissive_factor: Option<[f64; 3]>,
    pub alpha_mode: Option<AlphaMode>,
    pub alpha_cutoff: Option<f64>,
    pub double_sided: Option<bool>,
}

impl PbrMaterial {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a material that only has a base color texture.
    pub fn from_texture(image: Arc<Image>) -> Self {
        Self {
            base_color_texture: Some(image),
            ..Default::default()
        }
    }

    /// Sets the base color factor from an 8-bit color.
    pub fn with_base_color(mut self, rgba: [u8; 4]) -> Self {
        self.base_color_factor = Some(color::to_float(rgba));
        self
    }
}
