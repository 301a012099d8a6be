use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};

/// Looks up the contents of external resources, such as the `.bin` buffers and images that a
/// `.gltf` file refers to by URI.
pub trait Resolver {
    fn get(&self, name: &str) -> Result<Vec<u8>>;
}

/// Resolves names relative to a directory on disk.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
}

impl FileResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Resolver for FileResolver {
    fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        fs::read(&path).with_context(|| format!("Could not read \"{}\"", path.display()))
    }
}

/// Resolves names from an in-memory set of files, e.g. the output of a multi-file export.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    files: HashMap<String, Vec<u8>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }
}

impl From<BTreeMap<String, Vec<u8>>> for MapResolver {
    fn from(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }
}

impl Resolver for MapResolver {
    fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("No file named \"{}\"", name))
    }
}
