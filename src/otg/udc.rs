//! UDC binding
//!
//! Writing a controller name to a gadget's `UDC` attribute enumerates it on
//! the host; writing an empty string detaches it. Nothing under a gadget's
//! functions or configs may change while it is bound, so every mutation runs
//! inside [`with_unbound`].

use std::path::Path;
use tracing::{error, info};

use super::configfs::write_file;
use super::topology::GadgetDescriptor;
use crate::error::Result;

/// Bind/unbind a gadget to its USB device controller
pub trait UdcControl {
    /// Detach the gadget from its controller
    fn unbind(&self, gadget_root: &Path) -> Result<()>;

    /// Attach the gadget to `controller`, making the host enumerate it
    fn bind(&self, gadget_root: &Path, controller: &str) -> Result<()>;
}

/// UDC control through the gadget's `UDC` attribute
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsUdc;

impl UdcControl for SysfsUdc {
    fn unbind(&self, gadget_root: &Path) -> Result<()> {
        write_file(&gadget_root.join("UDC"), "")?;
        info!("Unbound gadget {} from UDC", gadget_root.display());
        Ok(())
    }

    fn bind(&self, gadget_root: &Path, controller: &str) -> Result<()> {
        write_file(&gadget_root.join("UDC"), controller)?;
        info!("Bound gadget {} to UDC {}", gadget_root.display(), controller);
        Ok(())
    }
}

/// Run `mutate` with the gadget unbound, then rebind it
///
/// If unbinding fails nothing else happens. If `mutate` fails the gadget is
/// still rebound to its original controller before the error is returned.
pub fn with_unbound<U, T, F>(udc: &U, gadget: &GadgetDescriptor, mutate: F) -> Result<T>
where
    U: UdcControl + ?Sized,
    F: FnOnce() -> Result<T>,
{
    udc.unbind(&gadget.root)?;

    let result = mutate();
    let rebind = udc.bind(&gadget.root, &gadget.controller_name);

    match (result, rebind) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(bind_err)) => {
            error!(
                "Failed to restore UDC {} after error: {}",
                gadget.controller_name, bind_err
            );
            Err(e)
        }
    }
}
