//! MSD backend trait definition

use serde::{Deserialize, Serialize};

use super::android::AndroidUsbBackend;
use super::service::ConfigfsBackend;
use crate::config::AppConfig;
use crate::error::Result;
use crate::msd::MountDecision;

/// MSD backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum MsdBackendType {
    /// Prefer configfs, fall back to android_usb
    #[default]
    Auto,
    /// Gadget configfs
    Configfs,
    /// Legacy android_usb sysfs
    AndroidUsb,
}

impl MsdBackendType {
    /// Detect the best available backend
    pub fn detect(config: &AppConfig) -> Self {
        if ConfigfsBackend::from_config(config).is_supported() {
            return Self::Configfs;
        }
        if AndroidUsbBackend::from_config(config).is_supported() {
            return Self::AndroidUsb;
        }
        Self::Auto
    }

    /// Get backend name as string
    pub fn name_str(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::Configfs => "configfs",
            Self::AndroidUsb => "android_usb",
        }
    }

    /// Instantiate the backend
    ///
    /// `Auto` resolves through [`detect`](Self::detect). When nothing is
    /// supported the configfs backend is returned and reports itself
    /// unsupported.
    pub fn create(self, config: &AppConfig) -> Box<dyn MsdBackend> {
        let resolved = match self {
            Self::Auto => Self::detect(config),
            other => other,
        };

        match resolved {
            Self::AndroidUsb => Box::new(AndroidUsbBackend::from_config(config)),
            Self::Configfs | Self::Auto => Box::new(ConfigfsBackend::from_config(config)),
        }
    }
}

/// Backend able to expose an image as USB mass storage
pub trait MsdBackend {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Check whether the running kernel provides this backend
    fn is_supported(&self) -> bool;

    /// Whether CD-ROM, read-only and Windows settings take effect
    fn supports_lun_flags(&self) -> bool;

    /// Expose `decision.target_file()`, or detach when it is `None`
    fn apply(&self, decision: &MountDecision) -> Result<()>;
}
