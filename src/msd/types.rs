//! MSD data types and structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Windows release detected on (or forced for) an installation image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum WindowsVersion {
    /// Not a Windows image
    #[default]
    None,
    Win10,
    Win11,
    /// Windows media whose label carries no version
    Unknown,
}

impl WindowsVersion {
    pub fn is_windows(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for WindowsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "Not Windows",
            Self::Win10 => "Windows 10",
            Self::Win11 => "Windows 11",
            Self::Unknown => "Windows (unknown version)",
        })
    }
}

/// Classification of a candidate image
///
/// Produced from a single read of the image prefix. The default value is the
/// conservative "not classified" result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub is_windows: bool,
    pub version: WindowsVersion,
    pub has_uefi_boot: bool,
    pub has_legacy_boot: bool,
    /// ISO9660 volume identifier, trailing spaces removed
    pub volume_label: String,
    /// MBR boot signature present at offset 510
    pub is_hybrid_bootable: bool,
}

/// Windows compatibility settings for one mount
///
/// A version other than [`WindowsVersion::None`] is only representable on an
/// enabled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowsMountOptions {
    enabled: bool,
    version: WindowsVersion,
    use_usb3: bool,
    has_uefi_boot: bool,
    has_legacy_boot: bool,
}

impl WindowsMountOptions {
    /// Windows profile off
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Windows profile on; an absent version is recorded as `Unknown`
    pub fn enabled(version: WindowsVersion) -> Self {
        let version = match version {
            WindowsVersion::None => WindowsVersion::Unknown,
            v => v,
        };
        Self {
            enabled: true,
            version,
            ..Self::default()
        }
    }

    pub fn with_usb3(mut self, use_usb3: bool) -> Self {
        self.use_usb3 = use_usb3;
        self
    }

    pub fn with_boot_support(mut self, uefi: bool, legacy: bool) -> Self {
        self.has_uefi_boot = uefi;
        self.has_legacy_boot = legacy;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn version(&self) -> WindowsVersion {
        self.version
    }

    pub fn use_usb3(&self) -> bool {
        self.use_usb3
    }

    pub fn has_uefi_boot(&self) -> bool {
        self.has_uefi_boot
    }

    pub fn has_legacy_boot(&self) -> bool {
        self.has_legacy_boot
    }
}

/// Effective LUN presentation computed by the mount policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDecision {
    target_file: Option<PathBuf>,
    cdrom: bool,
    read_only: bool,
    windows: WindowsMountOptions,
}

impl MountDecision {
    /// Detach whatever is currently exposed
    pub fn unmount() -> Self {
        Self {
            target_file: None,
            cdrom: false,
            read_only: false,
            windows: WindowsMountOptions::disabled(),
        }
    }

    /// Expose `target` with the given flags
    ///
    /// Windows mode always presents an optical, read-only medium. Without it
    /// a writable CD-ROM is rejected since the LUN cannot express one.
    pub fn mount(
        target: impl Into<PathBuf>,
        cdrom: bool,
        read_only: bool,
        windows: WindowsMountOptions,
    ) -> Result<Self> {
        let target = target.into();
        if target.as_os_str().is_empty() {
            return Err(AppError::BadRequest("Empty image path".to_string()));
        }

        if windows.is_enabled() {
            return Ok(Self {
                target_file: Some(target),
                cdrom: true,
                read_only: true,
                windows,
            });
        }

        if cdrom && !read_only {
            return Err(AppError::BadRequest(
                "A CD-ROM cannot be mounted read-write".to_string(),
            ));
        }

        Ok(Self {
            target_file: Some(target),
            cdrom,
            read_only,
            windows,
        })
    }

    pub fn target_file(&self) -> Option<&Path> {
        self.target_file.as_deref()
    }

    pub fn is_cdrom(&self) -> bool {
        self.cdrom
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn windows(&self) -> &WindowsMountOptions {
        &self.windows
    }
}

/// Windows handling requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowsRequest {
    /// Force Windows mode even if the image is not detected as Windows
    pub enabled: bool,
    /// Override the detected version
    pub version: Option<WindowsVersion>,
    /// Present SuperSpeed descriptors
    pub use_usb3: bool,
}

/// Mount request as issued by the command line layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountRequest {
    pub cdrom: bool,
    pub read_only: bool,
    /// Present as a hard disk and skip image classification
    pub force_hdd: bool,
    pub windows: WindowsRequest,
}

impl Default for MountRequest {
    fn default() -> Self {
        Self {
            cdrom: false,
            read_only: true,
            force_hdd: false,
            windows: WindowsRequest::default(),
        }
    }
}

impl MountRequest {
    /// Reject flag combinations before touching the filesystem
    pub fn validate(&self) -> Result<()> {
        let windows_forced = self.windows.enabled || self.windows.version.is_some();

        if self.cdrom && !self.read_only && !windows_forced {
            return Err(AppError::BadRequest(
                "Incompatible options: cdrom and read-write".to_string(),
            ));
        }
        if self.cdrom && self.force_hdd {
            return Err(AppError::BadRequest(
                "Incompatible options: cdrom and hdd".to_string(),
            ));
        }
        if self.force_hdd && windows_forced {
            return Err(AppError::BadRequest(
                "Incompatible options: windows and hdd".to_string(),
            ));
        }
        Ok(())
    }
}
