//! Legacy android_usb sysfs backend
//!
//! Older Android kernels expose a single fixed gadget under
//! `/sys/devices/virtual/android_usb/android0`. It has no LUN flags: the
//! image is always presented as a plain disk. `enable` gates writes to the
//! other attributes.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::backend::MsdBackend;
use super::configfs::{read_attr, write_file};
use crate::config::AppConfig;
use crate::error::Result;
use crate::msd::MountDecision;

/// Function list selecting mass storage
const MASS_STORAGE_FUNCTION: &str = "mass_storage";

/// Mass storage through the android_usb sysfs device
#[derive(Debug, Clone)]
pub struct AndroidUsbBackend {
    root: PathBuf,
    default_functions: String,
}

impl AndroidUsbBackend {
    pub fn new(root: impl Into<PathBuf>, default_functions: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            default_functions: default_functions.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.android.sysfs_root.clone(),
            config.android.default_functions.clone(),
        )
    }

    fn enable_path(&self) -> PathBuf {
        self.root.join("enable")
    }

    fn functions_path(&self) -> PathBuf {
        self.root.join("functions")
    }

    fn lun_file_path(&self) -> PathBuf {
        self.root.join("f_mass_storage/lun/file")
    }

    /// Check if the gadget is enabled
    pub fn is_enabled(&self) -> bool {
        read_attr(&self.enable_path()) == "1"
    }

    /// Enable or disable the gadget
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        write_file(&self.enable_path(), if enabled { "1" } else { "0" })
    }

    /// Re-enable after a failed step, keeping the original error
    fn restore_enabled(&self) {
        if let Err(e) = self.set_enabled(true) {
            warn!("Failed to re-enable android_usb: {}", e);
        }
    }

    /// Expose an image as a disk
    pub fn mount_image(&self, image: &Path) -> Result<()> {
        debug!("Mounting {} via android_usb", image.display());

        if self.is_enabled() {
            self.set_enabled(false)?;
        }

        if let Err(e) = write_file(&self.lun_file_path(), &image.to_string_lossy()) {
            self.restore_enabled();
            return Err(e);
        }

        if let Err(e) = write_file(&self.functions_path(), MASS_STORAGE_FUNCTION) {
            self.restore_enabled();
            return Err(e);
        }

        self.set_enabled(true)?;
        info!("Mounted {} via android_usb", image.display());
        Ok(())
    }

    /// Detach the image and restore the default function list
    pub fn reset(&self) -> Result<()> {
        debug!("Resetting android_usb to {}", self.default_functions);

        if let Err(e) = write_file(&self.lun_file_path(), "") {
            warn!("Failed to clear image file: {}", e);
        }

        if self.is_enabled() {
            self.set_enabled(false)?;
        }

        if let Err(e) = write_file(&self.functions_path(), &self.default_functions) {
            self.restore_enabled();
            return Err(e);
        }

        self.set_enabled(true)?;
        info!("android_usb reset to {}", self.default_functions);
        Ok(())
    }
}

impl MsdBackend for AndroidUsbBackend {
    fn name(&self) -> &'static str {
        "android_usb"
    }

    fn is_supported(&self) -> bool {
        self.enable_path().is_file()
    }

    fn supports_lun_flags(&self) -> bool {
        false
    }

    fn apply(&self, decision: &MountDecision) -> Result<()> {
        match decision.target_file() {
            Some(image) => self.mount_image(image),
            None => self.reset(),
        }
    }
}
