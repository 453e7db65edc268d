//! Windows compatibility profile
//!
//! Windows Setup only accepts installation media that enumerates as a plain
//! removable optical drive. The profile has two independent parts:
//! - device descriptors on the gadget root
//! - LUN quirks (removable, nofua, inquiry string), see [`LunConfig`]

use std::path::Path;
use tracing::{debug, info};

use super::configfs::{create_dir, write_file, STRINGS_LOCALE};
use super::msd::LunConfig;
use crate::config::WindowsProfileConfig;
use crate::error::Result;
use crate::msd::MountDecision;

/// USB spec version (USB 2.0)
pub const USB_BCD_USB2: u16 = 0x0200;

/// USB spec version (USB 3.0, SuperSpeed)
pub const USB_BCD_USB3: u16 = 0x0300;

/// USB device descriptor and string values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_usb: u16,
    pub device_version: u16,
    /// 0x00: class defined at interface level
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
}

impl DeviceDescriptor {
    /// Descriptor presented in Windows mode
    pub fn windows(profile: &WindowsProfileConfig, use_usb3: bool) -> Self {
        Self {
            vendor_id: profile.vendor_id,
            product_id: profile.product_id,
            bcd_usb: if use_usb3 { USB_BCD_USB3 } else { USB_BCD_USB2 },
            device_version: profile.device_version,
            device_class: 0x00,
            device_subclass: 0x00,
            device_protocol: 0x00,
            manufacturer: profile.manufacturer.clone(),
            product: profile.product.clone(),
            serial_number: profile.serial_number.clone(),
        }
    }

    /// Write descriptors and strings to a gadget
    ///
    /// Must only be called while the gadget is unbound.
    pub fn apply(&self, gadget_root: &Path) -> Result<()> {
        info!("Configuring Windows-compatible USB descriptors");
        self.set_device_descriptors(gadget_root)?;
        self.create_strings(gadget_root)?;
        Ok(())
    }

    fn set_device_descriptors(&self, gadget_root: &Path) -> Result<()> {
        write_file(
            &gadget_root.join("idVendor"),
            &format!("0x{:04x}", self.vendor_id),
        )?;
        write_file(
            &gadget_root.join("idProduct"),
            &format!("0x{:04x}", self.product_id),
        )?;
        write_file(
            &gadget_root.join("bcdUSB"),
            &format!("0x{:04x}", self.bcd_usb),
        )?;
        write_file(
            &gadget_root.join("bcdDevice"),
            &format!("0x{:04x}", self.device_version),
        )?;
        write_file(
            &gadget_root.join("bDeviceClass"),
            &format!("0x{:02x}", self.device_class),
        )?;
        write_file(
            &gadget_root.join("bDeviceSubClass"),
            &format!("0x{:02x}", self.device_subclass),
        )?;
        write_file(
            &gadget_root.join("bDeviceProtocol"),
            &format!("0x{:02x}", self.device_protocol),
        )?;
        debug!("Set device descriptors");
        Ok(())
    }

    fn create_strings(&self, gadget_root: &Path) -> Result<()> {
        let strings_path = gadget_root.join(STRINGS_LOCALE);
        if !strings_path.exists() {
            create_dir(&strings_path)?;
        }

        write_file(&strings_path.join("manufacturer"), &self.manufacturer)?;
        write_file(&strings_path.join("product"), &self.product)?;
        write_file(&strings_path.join("serialnumber"), &self.serial_number)?;
        debug!("Created USB strings");
        Ok(())
    }
}

/// LUN settings for a decision, with the Windows quirks folded in
pub fn lun_config(decision: &MountDecision, profile: &WindowsProfileConfig) -> LunConfig {
    let mut lun = LunConfig::from_decision(decision);
    if decision.windows().is_enabled() {
        lun.removable = true;
        lun.no_force_unit_access = true;
        lun.inquiry_string = Some(profile.inquiry_string.clone());
    }
    lun
}
