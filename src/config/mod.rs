mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./mediaconv.toml",
        "~/.config/mediaconv/config.toml",
        "/etc/mediaconv/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.conversion.consecutive_error_limit == 0 {
        anyhow::bail!("conversion.consecutive_error_limit must be at least 1");
    }

    if config.conversion.chunk_size == 0 {
        anyhow::bail!("conversion.chunk_size cannot be 0");
    }

    let media = &config.media;
    for (name, value) in [
        ("media.blob_field", &media.blob_field),
        ("media.file_path_field", &media.file_path_field),
        ("media.extension_field", &media.extension_field),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} cannot be empty", name);
        }
    }

    if media.blob_field.eq_ignore_ascii_case(&media.file_path_field) {
        anyhow::bail!("media.blob_field and media.file_path_field must differ");
    }

    if !media.data_root.exists() {
        tracing::warn!("Media data root does not exist yet: {:?}", media.data_root);
    }

    Ok(())
}
