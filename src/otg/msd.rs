//! MSD (Mass Storage Device) function configuration for USB Gadget

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::configfs::{
    create_dir, create_symlink, link_exists, read_attr, remove_file, write_file, write_optional,
};
use super::topology::GadgetDescriptor;
use super::windows::{lun_config, DeviceDescriptor};
use crate::config::WindowsProfileConfig;
use crate::error::Result;
use crate::msd::MountDecision;

/// MSD LUN configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LunConfig {
    /// Image to expose, `None` when unmounted
    pub backing_file: Option<PathBuf>,
    /// Mount as CD-ROM
    pub is_cdrom: bool,
    /// Read-only mode
    pub is_read_only: bool,
    /// Removable media
    pub removable: bool,
    /// Disable Force Unit Access
    pub no_force_unit_access: bool,
    /// SCSI INQUIRY string override
    pub inquiry_string: Option<String>,
}

impl LunConfig {
    /// Plain LUN settings for a decision, without Windows quirks
    pub fn from_decision(decision: &MountDecision) -> Self {
        Self {
            backing_file: decision.target_file().map(Path::to_path_buf),
            is_cdrom: decision.is_cdrom(),
            is_read_only: decision.is_read_only(),
            ..Self::default()
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Mass storage function of a gadget
#[derive(Debug, Clone)]
pub struct MsdFunction {
    /// Function directory name (e.g., "mass_storage.0")
    name: String,
    /// LUN index
    lun: u8,
}

impl Default for MsdFunction {
    fn default() -> Self {
        Self::new("mass_storage.0", 0)
    }
}

impl MsdFunction {
    /// Create a new MSD function handle
    pub fn new(name: impl Into<String>, lun: u8) -> Self {
        Self {
            name: name.into(),
            lun,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get function path in gadget
    pub fn function_path(&self, gadget_root: &Path) -> PathBuf {
        gadget_root.join("functions").join(&self.name)
    }

    /// Get LUN path
    pub fn lun_path(&self, gadget_root: &Path) -> PathBuf {
        self.function_path(gadget_root)
            .join(format!("lun.{}", self.lun))
    }

    /// Get path of the function link inside a configuration
    pub fn link_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.name)
    }

    /// Check whether the function is linked into the configuration
    pub fn is_linked(&self, config_dir: &Path) -> bool {
        link_exists(&self.link_path(config_dir))
    }

    /// Get current LUN backing file
    pub fn get_lun_file(&self, gadget_root: &Path) -> Option<PathBuf> {
        let content = read_attr(&self.lun_path(gadget_root).join("file"));
        if content.is_empty() {
            None
        } else {
            Some(PathBuf::from(content))
        }
    }

    /// Apply a mount decision to the gadget
    ///
    /// Must run while the gadget is unbound. Every creation step is guarded
    /// by an existence check, so applying the same decision twice leaves the
    /// same attribute state.
    pub fn apply(
        &self,
        gadget: &GadgetDescriptor,
        decision: &MountDecision,
        profile: &WindowsProfileConfig,
    ) -> Result<()> {
        if decision.target_file().is_some() && decision.windows().is_enabled() {
            DeviceDescriptor::windows(profile, decision.windows().use_usb3())
                .apply(&gadget.root)?;
        }

        let func_path = self.function_path(&gadget.root);
        let lun_path = self.lun_path(&gadget.root);

        if !func_path.exists() {
            create_dir(&func_path)?;
            debug!("Created MSD function: {}", self.name);
        }
        // The kernel creates lun.0 with the function; other LUNs are explicit
        if !lun_path.exists() {
            create_dir(&lun_path)?;
        }

        // Stalling breaks some hosts, Windows Setup among them
        write_file(&func_path.join("stall"), "0")?;

        // Detach the old image before any flag changes
        write_file(&lun_path.join("file"), "")?;

        let lun = lun_config(decision, profile);
        let link_path = self.link_path(&gadget.config_dir);

        match &lun.backing_file {
            Some(file) => {
                if !link_exists(&link_path) {
                    create_symlink(&func_path, &link_path)?;
                    debug!("Linked MSD function {} to config", self.name);
                }

                self.write_lun_flags(&lun_path, &lun)?;

                // Setting the file is what makes the medium visible to the host
                write_file(&lun_path.join("file"), &file.to_string_lossy())?;
                info!(
                    "LUN {} configured with file: {} (cdrom={}, ro={})",
                    self.lun,
                    file.display(),
                    lun.is_cdrom,
                    lun.is_read_only
                );
            }
            None => {
                if link_exists(&link_path) {
                    remove_file(&link_path)?;
                    debug!("Unlinked MSD function {}", self.name);
                }
                info!("LUN {} disconnected", self.lun);
            }
        }

        Ok(())
    }

    fn write_lun_flags(&self, lun_path: &Path, lun: &LunConfig) -> Result<()> {
        write_file(&lun_path.join("cdrom"), flag(lun.is_cdrom))?;
        write_file(&lun_path.join("ro"), flag(lun.is_read_only))?;

        if lun.removable {
            write_file(&lun_path.join("removable"), "1")?;
        }
        if lun.no_force_unit_access {
            write_optional(&lun_path.join("nofua"), "1")?;
        }
        if let Some(inquiry) = &lun.inquiry_string {
            write_optional(&lun_path.join("inquiry_string"), inquiry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msd::{WindowsMountOptions, WindowsVersion};
    use crate::otg::configfs::testutil::record_writes;
    use crate::otg::configfs::STRINGS_LOCALE;
    use crate::otg::topology::testutil::make_gadget;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn gadget(dir: &TempDir) -> GadgetDescriptor {
        let root = make_gadget(dir.path(), "g1", "musb-hdrc.0");
        GadgetDescriptor {
            config_dir: root.join("configs/c.1"),
            root,
            controller_name: "musb-hdrc.0".to_string(),
        }
    }

    /// Every regular file and link under `root` with its trimmed content/target
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
        let mut out = BTreeMap::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap().flatten() {
                let path = entry.path();
                let meta = fs::symlink_metadata(&path).unwrap();
                if meta.file_type().is_symlink() {
                    let target = fs::read_link(&path).unwrap();
                    out.insert(path, format!("-> {}", target.display()));
                } else if meta.is_dir() {
                    stack.push(path);
                } else {
                    out.insert(path.clone(), read_attr(&path));
                }
            }
        }
        out
    }

    #[test]
    fn test_msd_function_paths() {
        let msd = MsdFunction::default();
        let root = Path::new("/cfg/usb_gadget/g1");
        assert_eq!(msd.name(), "mass_storage.0");
        assert_eq!(
            msd.lun_path(root),
            PathBuf::from("/cfg/usb_gadget/g1/functions/mass_storage.0/lun.0")
        );
        assert_eq!(
            msd.link_path(&root.join("configs/c.1")),
            PathBuf::from("/cfg/usb_gadget/g1/configs/c.1/mass_storage.0")
        );
    }

    #[test]
    fn test_mount_plain_image() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let decision =
            MountDecision::mount("/data/disk.img", false, false, WindowsMountOptions::disabled())
                .unwrap();

        msd.apply(&gadget, &decision, &WindowsProfileConfig::default())
            .unwrap();

        let func = msd.function_path(&gadget.root);
        let lun = msd.lun_path(&gadget.root);
        assert_eq!(read_attr(&func.join("stall")), "0");
        assert_eq!(read_attr(&lun.join("cdrom")), "0");
        assert_eq!(read_attr(&lun.join("ro")), "0");
        assert_eq!(
            msd.get_lun_file(&gadget.root),
            Some(PathBuf::from("/data/disk.img"))
        );
        assert!(!lun.join("removable").exists());
        assert!(!gadget.root.join("idVendor").exists());

        let link = msd.link_path(&gadget.config_dir);
        assert_eq!(fs::read_link(&link).unwrap(), func);
    }

    #[test]
    fn test_mount_windows_image() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let lun = msd.lun_path(&gadget.root);

        // Kernel exposes nofua but not inquiry_string
        fs::create_dir_all(&lun).unwrap();
        fs::write(lun.join("nofua"), "0\n").unwrap();

        let windows = WindowsMountOptions::enabled(WindowsVersion::Win11).with_usb3(true);
        let decision = MountDecision::mount("/data/win11.iso", false, false, windows).unwrap();
        msd.apply(&gadget, &decision, &WindowsProfileConfig::default())
            .unwrap();

        assert_eq!(read_attr(&lun.join("cdrom")), "1");
        assert_eq!(read_attr(&lun.join("ro")), "1");
        assert_eq!(read_attr(&lun.join("removable")), "1");
        assert_eq!(read_attr(&lun.join("nofua")), "1");
        assert!(!lun.join("inquiry_string").exists());
        assert_eq!(read_attr(&gadget.root.join("idVendor")), "0x058f");
        assert_eq!(read_attr(&gadget.root.join("bcdUSB")), "0x0300");
        assert_eq!(
            read_attr(&gadget.root.join(STRINGS_LOCALE).join("product")),
            "USB Mass Storage"
        );
        assert_eq!(read_attr(&lun.join("file")), "/data/win11.iso");
    }

    #[test]
    fn test_inquiry_string_written_when_present() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let lun = msd.lun_path(&gadget.root);
        fs::create_dir_all(&lun).unwrap();
        fs::write(lun.join("inquiry_string"), "\n").unwrap();

        let decision = MountDecision::mount(
            "/data/win.iso",
            true,
            true,
            WindowsMountOptions::enabled(WindowsVersion::Unknown),
        )
        .unwrap();
        msd.apply(&gadget, &decision, &WindowsProfileConfig::default())
            .unwrap();

        assert_eq!(
            fs::read_to_string(lun.join("inquiry_string")).unwrap(),
            "Generic  USB CD-ROM       1.00\n"
        );
        assert!(!lun.join("nofua").exists());
    }

    #[test]
    fn test_mount_write_order() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let lun = msd.lun_path(&gadget.root);
        fs::create_dir_all(&lun).unwrap();
        fs::write(lun.join("nofua"), "0\n").unwrap();

        let decision = MountDecision::mount(
            "/data/win10.iso",
            false,
            false,
            WindowsMountOptions::enabled(WindowsVersion::Win10),
        )
        .unwrap();
        let writes = record_writes(|| {
            msd.apply(&gadget, &decision, &WindowsProfileConfig::default())
                .unwrap()
        });

        let position = |path: PathBuf, content: &str| {
            writes
                .iter()
                .position(|(p, c)| *p == path && c == content)
                .unwrap_or_else(|| panic!("no write of {:?} to {}", content, path.display()))
        };

        let stall = position(msd.function_path(&gadget.root).join("stall"), "0");
        let cleared = position(lun.join("file"), "");
        let linked = position(
            msd.link_path(&gadget.config_dir),
            &format!("-> {}", msd.function_path(&gadget.root).display()),
        );
        let cdrom = position(lun.join("cdrom"), "1");
        let ro = position(lun.join("ro"), "1");
        let removable = position(lun.join("removable"), "1");
        let nofua = position(lun.join("nofua"), "1");
        let vendor = position(gadget.root.join("idVendor"), "0x058f");

        assert!(vendor < stall);
        assert!(stall < cleared);
        assert!(cleared < linked);
        assert!(linked < cdrom);
        assert!(cdrom < ro);
        assert!(ro < removable);
        assert!(removable < nofua);
        assert_eq!(
            writes.last(),
            Some(&(lun.join("file"), "/data/win10.iso".to_string()))
        );
    }

    #[test]
    fn test_unmount_write_order() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let profile = WindowsProfileConfig::default();
        let decision =
            MountDecision::mount("/data/live.iso", true, true, WindowsMountOptions::disabled())
                .unwrap();
        msd.apply(&gadget, &decision, &profile).unwrap();

        let writes = record_writes(|| {
            msd.apply(&gadget, &MountDecision::unmount(), &profile)
                .unwrap()
        });

        let lun = msd.lun_path(&gadget.root);
        assert_eq!(
            writes,
            vec![
                (msd.function_path(&gadget.root).join("stall"), "0".to_string()),
                (lun.join("file"), String::new()),
            ]
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let profile = WindowsProfileConfig::default();
        let decision = MountDecision::mount(
            "/data/win10.iso",
            false,
            true,
            WindowsMountOptions::enabled(WindowsVersion::Win10),
        )
        .unwrap();

        msd.apply(&gadget, &decision, &profile).unwrap();
        let first = snapshot(&gadget.root);
        msd.apply(&gadget, &decision, &profile).unwrap();
        let second = snapshot(&gadget.root);

        assert_eq!(first, second);
    }

    #[test]
    fn test_unmount_restores_fresh_state() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();
        let profile = WindowsProfileConfig::default();

        let decision =
            MountDecision::mount("/data/live.iso", true, true, WindowsMountOptions::disabled())
                .unwrap();
        msd.apply(&gadget, &decision, &profile).unwrap();
        assert!(msd.is_linked(&gadget.config_dir));

        msd.apply(&gadget, &MountDecision::unmount(), &profile)
            .unwrap();

        assert!(!msd.is_linked(&gadget.config_dir));
        assert_eq!(msd.get_lun_file(&gadget.root), None);
        assert_eq!(read_attr(&msd.lun_path(&gadget.root).join("file")), "");
        // Function definition stays for reuse
        assert!(msd.function_path(&gadget.root).is_dir());
    }

    #[test]
    fn test_unmount_without_link() {
        let dir = TempDir::new().unwrap();
        let gadget = gadget(&dir);
        let msd = MsdFunction::default();

        msd.apply(&gadget, &MountDecision::unmount(), &WindowsProfileConfig::default())
            .unwrap();
        assert!(!msd.is_linked(&gadget.config_dir));
        assert_eq!(msd.get_lun_file(&gadget.root), None);
    }
}
