use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::otg::MsdBackendType;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend used when none is forced on the command line
    pub backend: MsdBackendType,
    /// Gadget configfs settings
    pub configfs: ConfigfsConfig,
    /// Legacy android_usb sysfs settings
    pub android: AndroidConfig,
    /// Descriptors presented in Windows mode
    pub windows: WindowsProfileConfig,
}

/// Gadget configfs configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigfsConfig {
    /// Use this configfs mount point instead of looking it up
    pub mount_point: Option<PathBuf>,
    /// Mount table consulted to find configfs
    pub mounts_file: PathBuf,
    /// Fallback configfs root used by Android
    pub android_root: PathBuf,
    /// Mass storage function directory name
    pub function: String,
    /// LUN index inside the function
    pub lun: u8,
}

impl Default for ConfigfsConfig {
    fn default() -> Self {
        Self {
            mount_point: None,
            mounts_file: PathBuf::from(crate::otg::configfs::PROC_MOUNTS),
            android_root: PathBuf::from(crate::otg::configfs::ANDROID_CONFIGFS_ROOT),
            function: "mass_storage.0".to_string(),
            lun: 0,
        }
    }
}

/// Legacy android_usb configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// android0 device directory
    pub sysfs_root: PathBuf,
    /// Functions restored on unmount
    pub default_functions: String,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/devices/virtual/android_usb/android0"),
            default_functions: "mtp".to_string(),
        }
    }
}

/// Windows compatibility descriptors
///
/// The defaults present a generic Alcor Micro mass storage device, which
/// Windows Setup binds to its in-box storage driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsProfileConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
    /// SCSI INQUIRY vendor/product/revision string
    pub inquiry_string: String,
}

impl Default for WindowsProfileConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x058f,
            product_id: 0x6387,
            device_version: 0x0100,
            manufacturer: "Generic".to_string(),
            product: "USB Mass Storage".to_string(),
            serial_number: "000000000001".to_string(),
            inquiry_string: "Generic  USB CD-ROM       1.00".to_string(),
        }
    }
}
