//! USB gadget mass storage backends
//!
//! Exposes an image file to a USB host through whichever gadget interface the
//! kernel offers.
//!
//! Architecture:
//! ```text
//! MsdBackend (trait)
//!     ├── ConfigfsBackend (usb_gadget configfs)
//!     │       ├── GadgetTopology (gadget + config discovery)
//!     │       ├── UdcControl     (unbind / rebind bracket)
//!     │       └── MsdFunction    (function, link, LUN attributes)
//!     │               └── DeviceDescriptor (Windows profile)
//!     └── AndroidUsbBackend (legacy android_usb sysfs)
//! ```
//!
//! Every mutation of a bound configfs gadget happens between an unbind and a
//! rebind of its UDC.

pub mod android;
pub mod backend;
pub mod configfs;
pub mod msd;
pub mod service;
pub mod topology;
pub mod udc;
pub mod windows;

pub use android::AndroidUsbBackend;
pub use backend::{MsdBackend, MsdBackendType};
pub use msd::{LunConfig, MsdFunction};
pub use service::ConfigfsBackend;
pub use topology::{GadgetDescriptor, GadgetTopology};
pub use udc::{with_unbound, SysfsUdc, UdcControl};
pub use windows::DeviceDescriptor;
