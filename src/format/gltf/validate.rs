use super::error::{Error, Result};

/// Checks a glTF JSON document against the glTF 2.0 schema.
pub trait SchemaValidator {
    fn validate(&self, json: &[u8]) -> Result<()>;
}

/// Validates documents with the `gltf` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfValidator;

impl SchemaValidator for GltfValidator {
    fn validate(&self, json: &[u8]) -> Result<()> {
        match gltf::Gltf::from_slice(json) {
            Ok(_) => Ok(()),
            Err(gltf::Error::Validation(errors)) => {
                let errors: Vec<_> = errors
                    .iter()
                    .map(|(path, error)| format!("{}: {}", path, error))
                    .collect();
                Err(Error::Validation(errors.join("; ")))
            }
            Err(err) => Err(Error::Validation(err.to_string())),
        }
    }
}
