use std::path::Path;
use std::{fs, path::PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "NFSWHDReflections.json";

const DEFAULT_CONFIG: &str = r#"{"ReflectionResolution":1024,"BetterReflectionLODs":true,"BetterReflectionDrawDistance":true,"BetterChrome":{"Enabled":true,"Saturation":0.075,"ReflectionIntensity":6.75}}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    // This is not part of the config, but rather used for
    // at runtime to remember where to save to
    #[serde(skip)]
    path: PathBuf,

    /// edge length of the reflection render target
    pub reflection_resolution: u32,
    #[serde(rename = "BetterReflectionLODs")]
    pub better_reflection_lods: bool,
    pub better_reflection_draw_distance: bool,
    pub better_chrome: BetterChrome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BetterChrome {
    pub enabled: bool,
    /// clamped to -1..=1 before it is written
    pub saturation: f64,
    /// clamped to -10..=10 before it is written
    pub reflection_intensity: f64,
}

impl Config {
    /// Load a config file
    /// If path doesn't exist, creates and saves default config
    /// otherwise loads what's already there
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // if path doesn't exist, create default config,
        // save it, and return it
        if !path.exists() {
            let mut config = Self::defaults()?;
            path.clone_into(&mut config.path);

            // patching goes ahead on the defaults even if they can't be persisted
            match config.save() {
                Ok(()) => info!(path = %path.display(), "created default config"),
                Err(error) => {
                    warn!(path = %path.display(), "failed to save default config: {error:?}")
                }
            }

            return Ok(config);
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = serde_json::from_str::<Self>(&data)
            .with_context(|| format!("malformed config {}", path.display()))?;

        // set the plugin config path
        path.clone_into(&mut config.path);

        Ok(config)
    }

    /// Where the config was loaded from, or created at
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let mut serialized = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"   ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut serialized, formatter);
        self.serialize(&mut serializer)?;

        fs::write(&self.path, serialized)?;

        Ok(())
    }

    fn defaults() -> Result<Self> {
        serde_json::from_str(DEFAULT_CONFIG).context("malformed default config")
    }
}
