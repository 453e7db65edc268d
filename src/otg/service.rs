//! Configfs mass storage backend
//!
//! Ties discovery, UDC bracketing and LUN configuration together:
//!
//! ```text
//! ConfigfsBackend::apply
//!     ├── GadgetTopology::discover   (fresh on every call)
//!     └── with_unbound               (unbind → mutate → rebind)
//!             └── MsdFunction::apply (descriptors, function, link, LUN)
//! ```

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::backend::MsdBackend;
use super::configfs::configfs_mount_point;
use super::msd::MsdFunction;
use super::topology::GadgetTopology;
use super::udc::{with_unbound, SysfsUdc, UdcControl};
use crate::config::{AppConfig, WindowsProfileConfig};
use crate::error::{AppError, Result};
use crate::msd::MountDecision;

/// Mass storage through the gadget configfs
pub struct ConfigfsBackend<U: UdcControl = SysfsUdc> {
    /// configfs mount point, `None` if configfs is not mounted
    configfs_root: Option<PathBuf>,
    function: MsdFunction,
    profile: WindowsProfileConfig,
    udc: U,
}

impl ConfigfsBackend<SysfsUdc> {
    /// Create a backend from configuration, locating the configfs mount
    pub fn from_config(config: &AppConfig) -> Self {
        let configfs = &config.configfs;
        let configfs_root = configfs.mount_point.clone().or_else(|| {
            configfs_mount_point(&configfs.mounts_file, &configfs.android_root)
        });

        Self::new(
            configfs_root,
            MsdFunction::new(configfs.function.clone(), configfs.lun),
            config.windows.clone(),
            SysfsUdc,
        )
    }
}

impl<U: UdcControl> ConfigfsBackend<U> {
    pub fn new(
        configfs_root: Option<PathBuf>,
        function: MsdFunction,
        profile: WindowsProfileConfig,
        udc: U,
    ) -> Self {
        Self {
            configfs_root,
            function,
            profile,
            udc,
        }
    }

    pub fn configfs_root(&self) -> Option<&Path> {
        self.configfs_root.as_deref()
    }

    pub fn function(&self) -> &MsdFunction {
        &self.function
    }

    pub fn udc(&self) -> &U {
        &self.udc
    }

    fn topology(&self) -> Option<GadgetTopology> {
        self.configfs_root.as_deref().map(GadgetTopology::new)
    }
}

impl<U: UdcControl> MsdBackend for ConfigfsBackend<U> {
    fn name(&self) -> &'static str {
        "configfs"
    }

    fn is_supported(&self) -> bool {
        self.topology().is_some_and(|t| t.is_available())
    }

    fn supports_lun_flags(&self) -> bool {
        true
    }

    fn apply(&self, decision: &MountDecision) -> Result<()> {
        let topology = self
            .topology()
            .ok_or_else(|| AppError::Unsupported("configfs is not mounted".to_string()))?;

        let gadget = topology.discover()?;
        debug!("Using function {} on {}", self.function.name(), gadget.root.display());

        with_unbound(&self.udc, &gadget, || {
            self.function.apply(&gadget, decision, &self.profile)
        })?;

        match decision.target_file() {
            Some(file) => info!("Mounted {} via configfs", file.display()),
            None => info!("Unmounted image via configfs"),
        }
        Ok(())
    }
}
