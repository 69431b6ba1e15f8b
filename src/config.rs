use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Filename prefix of the single structure document in a source directory.
    #[serde(default = "default_structure_prefix")]
    pub structure_prefix: String,
    /// Filename prefix of content documents in a source directory.
    #[serde(default = "default_content_prefix")]
    pub content_prefix: String,
    /// Subdirectory of the source directory holding image assets.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
    /// Maximum structure nesting depth accepted during materialization.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            structure_prefix: default_structure_prefix(),
            content_prefix: default_content_prefix(),
            media_dir: default_media_dir(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_structure_prefix() -> String {
    "PMC-".to_string()
}
fn default_content_prefix() -> String {
    "DMC-".to_string()
}
fn default_media_dir() -> String {
    "media".to_string()
}
fn default_max_depth() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.ingest.structure_prefix.is_empty() {
        anyhow::bail!("ingest.structure_prefix must not be empty");
    }
    if config.ingest.content_prefix.is_empty() {
        anyhow::bail!("ingest.content_prefix must not be empty");
    }
    if config.ingest.structure_prefix == config.ingest.content_prefix {
        anyhow::bail!("ingest.structure_prefix and ingest.content_prefix must differ");
    }
    if config.ingest.max_depth == 0 {
        anyhow::bail!("ingest.max_depth must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("techpub.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_gets_ingest_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/techpub.sqlite"

[server]
bind = "127.0.0.1:7430"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.ingest.structure_prefix, "PMC-");
        assert_eq!(cfg.ingest.content_prefix, "DMC-");
        assert_eq!(cfg.ingest.media_dir, "media");
        assert_eq!(cfg.ingest.max_depth, 64);
    }

    #[test]
    fn equal_prefixes_are_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/techpub.sqlite"

[ingest]
structure_prefix = "X-"
content_prefix = "X-"

[server]
bind = "127.0.0.1:7430"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn zero_max_depth_is_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/techpub.sqlite"

[ingest]
max_depth = 0

[server]
bind = "127.0.0.1:7430"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
