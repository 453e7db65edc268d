//! MSD Controller
//!
//! Turns a mount request into a [`MountDecision`] and hands it to a backend:
//! - caller flags are validated before anything is read
//! - the image is classified unless a hard disk is forced
//! - Windows media switches to the Windows profile
//! - non-hybrid, non-Windows images default to CD-ROM

use std::path::Path;
use tracing::{debug, info, warn};

use super::image;
use super::types::{ImageInfo, MountDecision, MountRequest, WindowsMountOptions, WindowsVersion};
use crate::error::{AppError, Result};
use crate::otg::MsdBackend;

/// MSD Controller
pub struct MsdController {
    backend: Box<dyn MsdBackend>,
}

impl MsdController {
    /// Create new MSD controller on top of a backend
    pub fn new(backend: Box<dyn MsdBackend>) -> Self {
        Self { backend }
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check whether the backend is usable on this system
    pub fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    /// Whether CD-ROM, read-only and Windows settings take effect
    pub fn supports_lun_flags(&self) -> bool {
        self.backend.supports_lun_flags()
    }

    /// Compute the effective presentation of an image
    ///
    /// `info` is `None` when classification was skipped (forced hard disk).
    pub fn decide(
        image: &Path,
        request: &MountRequest,
        info: Option<&ImageInfo>,
    ) -> Result<MountDecision> {
        request.validate()?;

        let detected = info.cloned().unwrap_or_default();
        let windows_requested = request.windows.enabled || request.windows.version.is_some();

        let windows = if windows_requested || detected.is_windows {
            let version = request
                .windows
                .version
                .or(detected.is_windows.then_some(detected.version))
                .unwrap_or(WindowsVersion::Unknown);

            if detected.is_windows && !windows_requested {
                info!("Windows ISO detected: {}", detected.volume_label);
                info!("Auto-enabling Windows mode.");
            }

            WindowsMountOptions::enabled(version)
                .with_usb3(request.windows.use_usb3)
                .with_boot_support(detected.has_uefi_boot, detected.has_legacy_boot)
        } else {
            WindowsMountOptions::disabled()
        };

        let mut cdrom = request.cdrom;
        let mut read_only = request.read_only;

        if !windows.is_enabled() && !cdrom && info.is_some_and(|i| !i.is_hybrid_bootable) {
            info!("Non-hybrid ISO detected. Mounting as CD-ROM.");
            if !read_only {
                warn!("Read-write ignored for CD-ROM presentation");
            }
            cdrom = true;
            read_only = true;
        }

        if windows.is_enabled() {
            if !request.cdrom || !request.read_only {
                debug!("Windows mode forces CD-ROM and read-only");
            }
            info!("Windows mode: {}", windows.version());
        }

        MountDecision::mount(image, cdrom, read_only, windows)
    }

    /// Mount an image
    ///
    /// Returns the decision that was applied.
    pub fn mount(&self, image: &Path, request: &MountRequest) -> Result<MountDecision> {
        request.validate()?;

        if !image.is_file() {
            return Err(AppError::NotFound(image.to_path_buf()));
        }

        let info = if request.force_hdd {
            debug!("Hard disk mode forced, skipping image detection");
            None
        } else {
            Some(image::classify(image))
        };

        let decision = Self::decide(image, request, info.as_ref())?;
        self.ensure_supported()?;

        if !self.backend.supports_lun_flags() {
            if decision.windows().is_enabled() {
                warn!("Windows mode is only supported with configfs backend");
            }
            if decision.is_cdrom() || !decision.is_read_only() {
                warn!(
                    "cdrom/ro flags ignored. (this is expected for {} backend)",
                    self.backend.name()
                );
            }
        }

        self.backend.apply(&decision)?;
        Ok(decision)
    }

    /// Detach the current image
    pub fn unmount(&self) -> Result<()> {
        self.ensure_supported()?;
        self.backend.apply(&MountDecision::unmount())
    }

    fn ensure_supported(&self) -> Result<()> {
        if self.backend.is_supported() {
            Ok(())
        } else {
            Err(AppError::Unsupported(format!(
                "{} is not supported on this device",
                self.backend.name()
            )))
        }
    }
}
