//! Gadget discovery in the configfs tree
//!
//! Nothing here is cached: the active gadget may change between invocations,
//! so every operation walks the live tree again.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::configfs::{read_attr, visible_entries, USB_GADGET_DIR};
use crate::error::{AppError, Result};

/// The active gadget as found in the configfs tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GadgetDescriptor {
    /// `usb_gadget/<g>`
    pub root: PathBuf,
    /// `usb_gadget/<g>/configs/<c>`
    pub config_dir: PathBuf,
    /// Contents of `UDC`, empty while unbound
    pub controller_name: String,
}

/// Read-only view of `<configfs>/usb_gadget`
#[derive(Debug, Clone)]
pub struct GadgetTopology {
    registry: PathBuf,
}

impl GadgetTopology {
    /// Create a view for the given configfs mount point
    pub fn new(configfs_root: &Path) -> Self {
        Self {
            registry: configfs_root.join(USB_GADGET_DIR),
        }
    }

    /// Check if the gadget registry exists
    pub fn is_available(&self) -> bool {
        self.registry.is_dir()
    }

    /// Find the gadget that is bound to a controller
    ///
    /// Tie-break rule: when several gadgets are bound, the first one in
    /// directory iteration order wins. Dotfiles are ignored.
    pub fn discover_gadget_root(&self) -> Option<PathBuf> {
        visible_entries(&self.registry)
            .into_iter()
            .find(|gadget| !Self::current_controller(gadget).is_empty())
    }

    /// First configuration of a gadget, in directory iteration order
    pub fn discover_config_root(gadget_root: &Path) -> Option<PathBuf> {
        visible_entries(&gadget_root.join("configs"))
            .into_iter()
            .next()
    }

    /// Controller the gadget is bound to, empty if unbound
    pub fn current_controller(gadget_root: &Path) -> String {
        read_attr(&gadget_root.join("UDC"))
    }

    /// Discover the bound gadget, its configuration and controller
    pub fn discover(&self) -> Result<GadgetDescriptor> {
        if !self.is_available() {
            return Err(AppError::Unsupported(format!(
                "Gadget registry {} not found",
                self.registry.display()
            )));
        }

        let root = self.discover_gadget_root().ok_or_else(|| {
            AppError::Unsupported("No active gadget found (no gadget bound to a UDC)".to_string())
        })?;

        let config_dir = Self::discover_config_root(&root).ok_or_else(|| {
            AppError::Unsupported(format!(
                "Gadget {} has no configuration",
                root.display()
            ))
        })?;

        let controller_name = Self::current_controller(&root);
        if controller_name.is_empty() {
            // Unbound between discovery steps
            return Err(AppError::Unsupported(format!(
                "Failed to get UDC of {}",
                root.display()
            )));
        }

        debug!(
            "Found gadget {} (config {}, UDC {})",
            root.display(),
            config_dir.display(),
            controller_name
        );

        Ok(GadgetDescriptor {
            root,
            config_dir,
            controller_name,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::make_gadget;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_registry() {
        let dir = TempDir::new().unwrap();
        let topology = GadgetTopology::new(dir.path());

        assert!(!topology.is_available());
        assert!(matches!(
            topology.discover(),
            Err(AppError::Unsupported(_))
        ));
    }

    #[test]
    fn test_discover_bound_gadget() {
        let dir = TempDir::new().unwrap();
        make_gadget(dir.path(), "idle", "");
        let bound = make_gadget(dir.path(), "g1", "musb-hdrc.0");

        let topology = GadgetTopology::new(dir.path());
        assert_eq!(topology.discover_gadget_root(), Some(bound.clone()));

        let gadget = topology.discover().unwrap();
        assert_eq!(gadget.root, bound);
        assert_eq!(gadget.config_dir, bound.join("configs/c.1"));
        assert_eq!(gadget.controller_name, "musb-hdrc.0");
    }

    #[test]
    fn test_no_bound_gadget() {
        let dir = TempDir::new().unwrap();
        make_gadget(dir.path(), "g1", "");

        let topology = GadgetTopology::new(dir.path());
        assert_eq!(topology.discover_gadget_root(), None);
        assert!(matches!(
            topology.discover(),
            Err(AppError::Unsupported(_))
        ));
    }

    #[test]
    fn test_dotfiles_ignored() {
        let dir = TempDir::new().unwrap();
        make_gadget(dir.path(), ".shadow", "dummy_udc.0");

        let topology = GadgetTopology::new(dir.path());
        assert_eq!(topology.discover_gadget_root(), None);
    }

    #[test]
    fn test_gadget_without_config() {
        let dir = TempDir::new().unwrap();
        let gadget = make_gadget(dir.path(), "g1", "musb-hdrc.0");
        fs::remove_dir(gadget.join("configs/c.1")).unwrap();

        let topology = GadgetTopology::new(dir.path());
        assert_eq!(GadgetTopology::discover_config_root(&gadget), None);
        assert!(matches!(
            topology.discover(),
            Err(AppError::Unsupported(_))
        ));
    }

    #[test]
    fn test_current_controller_unbound() {
        let dir = TempDir::new().unwrap();
        let gadget = make_gadget(dir.path(), "g1", "");
        assert_eq!(GadgetTopology::current_controller(&gadget), "");

        fs::remove_file(gadget.join("UDC")).unwrap();
        assert_eq!(GadgetTopology::current_controller(&gadget), "");
    }
}
