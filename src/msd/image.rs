//! Image classifier
//!
//! Inspects the first sectors of a candidate image without modifying it:
//! - MBR boot signature (hybrid boot)
//! - ISO9660 primary volume descriptor (volume label, Windows media)
//! - El Torito boot record (legacy BIOS boot)
//!
//! Classification is advisory. Unreadable or truncated images produce the
//! default [`ImageInfo`] instead of an error.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

use super::types::{ImageInfo, WindowsVersion};

/// ISO9660 logical sector size
pub const ISO_SECTOR_SIZE: usize = 2048;

/// Sector holding the primary volume descriptor (after the 16-sector system area)
const PVD_SECTOR: usize = 16;

/// Sector inspected for an El Torito boot record
const BOOT_RECORD_SECTOR: usize = 17;

/// Bytes read from the image for a full classification
pub const CLASSIFY_PREFIX_LEN: usize = (BOOT_RECORD_SECTOR + 1) * ISO_SECTOR_SIZE;

/// MBR boot signature location and value
const MBR_SIGNATURE_OFFSET: usize = 510;
const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Volume descriptor type codes
const DESCRIPTOR_BOOT_RECORD: u8 = 0;
const DESCRIPTOR_PRIMARY: u8 = 1;

/// Standard identifier and version shared by all volume descriptors
const ISO_STANDARD_ID: &[u8; 5] = b"CD001";
const DESCRIPTOR_VERSION: u8 = 1;

/// Volume identifier field of the PVD (32 bytes, space padded)
const VOLUME_ID_OFFSET: usize = 40;
const VOLUME_ID_LEN: usize = 32;

/// Boot system identifier field of a boot record (32 bytes)
const BOOT_SYSTEM_ID_OFFSET: usize = 7;
const BOOT_SYSTEM_ID_LEN: usize = 32;

const EL_TORITO_ID: &[u8] = b"EL TORITO SPECIFICATION";

/// Label tokens in priority order; `CCCOMA` is what the Media Creation Tool writes
const WINDOWS_LABEL_TOKENS: [(&str, WindowsVersion); 3] = [
    ("WIN11", WindowsVersion::Win11),
    ("WIN10", WindowsVersion::Win10),
    ("CCCOMA", WindowsVersion::Unknown),
];

/// Check for the `55 AA` boot signature at offset 510
pub fn has_mbr_signature(buf: &[u8]) -> bool {
    buf.get(MBR_SIGNATURE_OFFSET..MBR_SIGNATURE_OFFSET + MBR_SIGNATURE.len())
        == Some(&MBR_SIGNATURE[..])
}

fn is_volume_descriptor(sector: &[u8], kind: u8) -> bool {
    sector.len() > 6
        && sector[0] == kind
        && &sector[1..6] == ISO_STANDARD_ID
        && sector[6] == DESCRIPTOR_VERSION
}

/// Extract the volume label from a primary volume descriptor sector
///
/// Returns `None` when the sector does not carry the PVD signature.
pub fn volume_label(sector: &[u8]) -> Option<String> {
    if !is_volume_descriptor(sector, DESCRIPTOR_PRIMARY) {
        return None;
    }

    let field = sector.get(VOLUME_ID_OFFSET..VOLUME_ID_OFFSET + VOLUME_ID_LEN)?;
    let len = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);

    Some(String::from_utf8_lossy(&field[..len]).into_owned())
}

/// Check whether a sector is an El Torito boot record
pub fn is_el_torito_boot_record(sector: &[u8]) -> bool {
    if !is_volume_descriptor(sector, DESCRIPTOR_BOOT_RECORD) {
        return false;
    }

    sector
        .get(BOOT_SYSTEM_ID_OFFSET..BOOT_SYSTEM_ID_OFFSET + BOOT_SYSTEM_ID_LEN)
        .is_some_and(|field| {
            field
                .windows(EL_TORITO_ID.len())
                .any(|w| w == EL_TORITO_ID)
        })
}

/// Infer the Windows version from a volume label (case-insensitive)
pub fn windows_version_from_label(label: &str) -> WindowsVersion {
    let label = label.to_ascii_uppercase();

    WINDOWS_LABEL_TOKENS
        .iter()
        .find(|(token, _)| label.contains(token))
        .map_or(WindowsVersion::None, |&(_, version)| version)
}

fn sector(prefix: &[u8], index: usize) -> Option<&[u8]> {
    prefix.get(index * ISO_SECTOR_SIZE..(index + 1) * ISO_SECTOR_SIZE)
}

/// Classify an image from its leading bytes
pub fn classify_bytes(prefix: &[u8]) -> ImageInfo {
    let mut info = ImageInfo {
        is_hybrid_bootable: has_mbr_signature(prefix),
        ..ImageInfo::default()
    };

    let Some(label) = sector(prefix, PVD_SECTOR).and_then(volume_label) else {
        return info;
    };

    info.version = windows_version_from_label(&label);
    info.is_windows = info.version.is_windows();
    info.has_legacy_boot = sector(prefix, BOOT_RECORD_SECTOR).is_some_and(is_el_torito_boot_record);
    // UEFI boot is never detected
    info.has_uefi_boot = false;
    info.volume_label = label;

    info
}

fn read_prefix(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit);
    File::open(path)?.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Classify the image at `path`
pub fn classify(path: &Path) -> ImageInfo {
    let prefix = match read_prefix(path, CLASSIFY_PREFIX_LEN) {
        Ok(prefix) => prefix,
        Err(e) => {
            debug!("Cannot read {} for classification: {}", path.display(), e);
            return ImageInfo::default();
        }
    };

    let info = classify_bytes(&prefix);
    debug!(
        "Classified {}: label={:?} windows={} ({}) hybrid={} legacy_boot={}",
        path.display(),
        info.volume_label,
        info.is_windows,
        info.version,
        info.is_hybrid_bootable,
        info.has_legacy_boot
    );
    info
}
