use std::env;

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Select};
use sceneconv::conversion::converters;

const OUTPUT_DIR: &str = "./sceneconv_output";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let files: Vec<String> = env::args().skip(1).collect();
    if files.is_empty() {
        bail!("Usage: sceneconv <FILE>...\nDrop .gltf or .glb files to convert them");
    }

    let converters = converters();
    let names: Vec<_> = converters.iter().map(|converter| converter.name).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the output format")
        .items(&names)
        .default(0)
        .interact()
        .context("Failed to read the output format")?;

    converters[selection].convert(&files, OUTPUT_DIR)
}
