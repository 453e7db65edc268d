//! MSD (Mass Storage Device) module
//!
//! Decides how an image is presented to the host:
//! - Image classification: ISO9660 label, El Torito, MBR signature
//! - Mount policy: Windows profile, CD-ROM default, flag validation
//!
//! Architecture:
//! ```text
//! CLI --> MSD Controller --> MsdBackend --> Target PC
//!             |
//!       Image classifier
//!       (ISO9660 / MBR)
//! ```

pub mod controller;
pub mod image;
pub mod types;

pub use controller::MsdController;
pub use types::{
    ImageInfo, MountDecision, MountRequest, WindowsMountOptions, WindowsRequest, WindowsVersion,
};
