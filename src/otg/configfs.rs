//! ConfigFS/sysfs attribute helpers and mount point discovery

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{AppError, Result};

/// Default mount table consulted for the configfs mount point
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Filesystem type name of the kernel configuration filesystem
pub const CONFIGFS_TYPE: &str = "configfs";

/// Gadget registry directory below the configfs mount point
pub const USB_GADGET_DIR: &str = "usb_gadget";

/// Android mounts configfs at `/config` without always listing it
pub const ANDROID_CONFIGFS_ROOT: &str = "/config";

/// Locale directory used for every USB string descriptor
pub const STRINGS_LOCALE: &str = "strings/0x409";

/// Find where a filesystem of the given type is mounted
///
/// Scans a `/proc/mounts` formatted table and returns the mount directory of
/// the first entry whose source or type matches `fs_type`.
pub fn find_mount_point(mounts_file: &Path, fs_type: &str) -> Option<PathBuf> {
    let table = fs::read_to_string(mounts_file).ok()?;

    table.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let source = fields.next()?;
        let dir = fields.next()?;
        let kind = fields.next()?;
        if source == fs_type || kind == fs_type {
            Some(PathBuf::from(unescape_mount_field(dir)))
        } else {
            None
        }
    })
}

/// Resolve the configfs mount point
///
/// Falls back to `android_root` when the mount table has no configfs entry
/// but `<android_root>/usb_gadget` exists.
pub fn configfs_mount_point(mounts_file: &Path, android_root: &Path) -> Option<PathBuf> {
    if let Some(mount) = find_mount_point(mounts_file, CONFIGFS_TYPE) {
        return Some(mount);
    }

    if android_root.join(USB_GADGET_DIR).is_dir() {
        debug!(
            "configfs not in {}, using {}",
            mounts_file.display(),
            android_root.display()
        );
        return Some(android_root.to_path_buf());
    }

    None
}

/// Decode the octal escapes (`\040` and friends) the kernel uses in mount tables
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Write string content to an attribute file
///
/// The value is terminated with a newline and written in a single call, the
/// kernel acts on the first write() it receives for an attribute.
///
/// The file is opened with O_TRUNC. configfs and sysfs attributes ignore it,
/// while a regular file standing in for an attribute would otherwise keep the
/// tail of a longer previous value (`file` going from an image path to empty).
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    trace!("Write: {:?} -> {}", content, path.display());
    #[cfg(test)]
    testutil::record(path, content);

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .or_else(|e| {
            // Only regular files can be created; attributes are provided by the kernel
            if path.exists() {
                Err(e)
            } else {
                File::create(path)
            }
        })
        .map_err(|e| AppError::Internal(format!("Failed to open {}: {}", path.display(), e)))?;

    let data: std::borrow::Cow<[u8]> = if content.ends_with('\n') {
        content.as_bytes().into()
    } else {
        let mut buf = content.as_bytes().to_vec();
        buf.push(b'\n');
        buf.into()
    };

    file.write_all(&data)
        .map_err(|e| AppError::Internal(format!("Failed to write to {}: {}", path.display(), e)))?;

    file.flush()
        .map_err(|e| AppError::Internal(format!("Failed to flush {}: {}", path.display(), e)))?;

    Ok(())
}

/// Write an attribute only if the running kernel exposes it
///
/// Returns whether the attribute was present.
pub fn write_optional(path: &Path, content: &str) -> Result<bool> {
    if !path.exists() {
        debug!("Attribute {} not present, skipping", path.display());
        return Ok(false);
    }
    write_file(path, content)?;
    Ok(true)
}

/// Read string content from a file, trimmed
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", path.display(), e)))
}

/// Read an attribute, treating anything unreadable as empty
pub fn read_attr(path: &Path) -> String {
    read_file(path).unwrap_or_default()
}

/// Create directory if not exists
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        AppError::Internal(format!(
            "Failed to create directory {}: {}",
            path.display(),
            e
        ))
    })
}

/// Check whether a link exists, dangling links included
pub fn link_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove a symlink or file if present
pub fn remove_file(path: &Path) -> Result<()> {
    if link_exists(path) {
        fs::remove_file(path).map_err(|e| {
            AppError::Internal(format!("Failed to remove {}: {}", path.display(), e))
        })?;
    }
    Ok(())
}

/// Create symlink
pub fn create_symlink(src: &Path, dest: &Path) -> Result<()> {
    #[cfg(test)]
    testutil::record(dest, &format!("-> {}", src.display()));

    std::os::unix::fs::symlink(src, dest).map_err(|e| {
        AppError::Internal(format!(
            "Failed to create symlink {} -> {}: {}",
            dest.display(),
            src.display(),
            e
        ))
    })
}

/// Non-hidden directory entries of `dir`, in directory iteration order
///
/// Configfs returns entries in creation order; callers that pick the first
/// match inherit that order as their tie-break rule.
pub fn visible_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    thread_local! {
        static WRITES: RefCell<Option<Vec<(PathBuf, String)>>> = const { RefCell::new(None) };
    }

    pub(super) fn record(path: &Path, content: &str) {
        WRITES.with(|w| {
            if let Some(log) = w.borrow_mut().as_mut() {
                log.push((path.to_path_buf(), content.to_string()));
            }
        });
    }

    /// Run `f` and return every attribute write and symlink creation it made
    /// on this thread, in order. Links are logged as `-> <target>`.
    pub fn record_writes<F: FnOnce()>(f: F) -> Vec<(PathBuf, String)> {
        WRITES.with(|w| *w.borrow_mut() = Some(Vec::new()));
        f();
        WRITES.with(|w| w.borrow_mut().take()).unwrap_or_default()
    }
}
