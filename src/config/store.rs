use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "ISODRIVE_CONFIG";

/// Configuration file read when nothing else is specified
pub const DEFAULT_CONFIG_PATH: &str = "/etc/isodrive.toml";

/// Configuration loaded from a TOML file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: AppConfig,
}

impl ConfigStore {
    /// Load configuration
    ///
    /// Lookup order: `explicit`, then `$ISODRIVE_CONFIG`, then
    /// `/etc/isodrive.toml` if it exists, then built-in defaults. A file that
    /// was named explicitly must exist.
    pub fn open(explicit: Option<&Path>) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match named {
            Some(path) => Self::from_file(&path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    debug!("No configuration file, using defaults");
                    Ok(Self {
                        config: AppConfig::default(),
                    })
                }
            }
        }
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = toml::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(Self { config })
    }

    /// Parse configuration text
    pub fn parse(text: &str) -> Result<AppConfig> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Get current configuration
    pub fn get(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otg::MsdBackendType;
    use tempfile::tempdir;

    #[test]
    fn test_parse_partial() {
        let config = ConfigStore::parse(
            r#"
            [configfs]
            mount_point = "/sys/kernel/config"

            [windows]
            vendor_id = 0x1234
            product = "Installer"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.configfs.mount_point.as_deref(),
            Some(Path::new("/sys/kernel/config"))
        );
        assert_eq!(config.configfs.function, "mass_storage.0");
        assert_eq!(config.windows.vendor_id, 0x1234);
        assert_eq!(config.windows.product_id, 0x6387);
        assert_eq!(config.windows.product, "Installer");
        assert_eq!(config.android.default_functions, "mtp");
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(ConfigStore::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_parse_invalid() {
        let err = ConfigStore::parse("[windows]\nvendor_id = \"abc\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("isodrive.toml");
        std::fs::write(&path, "[configfs]\nlun = 1\n").unwrap();

        let store = ConfigStore::open(Some(&path)).unwrap();
        assert_eq!(store.get().configfs.lun, 1);
        assert_eq!(store.get().backend, MsdBackendType::Auto);
    }

    #[test]
    fn test_backend_key() {
        let config = ConfigStore::parse("backend = \"android_usb\"\n").unwrap();
        assert_eq!(config.backend, MsdBackendType::AndroidUsb);

        let err = ConfigStore::parse("backend = \"usb3\"\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_parse_error_message() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[configfs]\nlun = [\n").unwrap();

        let message = ConfigStore::from_file(&path).unwrap_err().to_string();
        assert!(message.starts_with("Configuration error: "));
        assert_eq!(message.matches("Configuration error").count(), 1);
        assert!(message.contains(&path.display().to_string()));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let err = ConfigStore::open(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
