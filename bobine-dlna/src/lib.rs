//! LAN discovery and browsing: SSDP advertisement plus a minimal UPnP
//! ContentDirectory / ConnectionManager SOAP surface.

pub mod description;
pub mod didl;
pub mod error;
pub mod soap;
pub mod ssdp;

pub use error::{DlnaError, Result};
pub use soap::{router, DlnaState};
pub use ssdp::SsdpDevice;
