//! isodrive - expose disk and ISO images as USB mass storage
//!
//! This crate drives the Linux USB gadget subsystem (configfs, or the
//! legacy android_usb sysfs device) to present an image file to a USB host
//! as a hard disk or CD-ROM, with a Windows installer compatibility profile.

pub mod config;
pub mod error;
pub mod msd;
pub mod otg;

pub use error::{AppError, Result};
