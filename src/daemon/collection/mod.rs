//! Everything that brings information from the host into the daemon and back.

pub mod host_link;
pub mod idle;
