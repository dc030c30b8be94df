//! In-process memory patching primitives
//!
//! Everything here operates on the memory of the calling process. Addresses handed
//! to this crate are never tracked by Rust; callers are responsible for them being
//! correct for the loaded image.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]

pub mod image;
pub mod memory;

pub use image::{Addr, Image};
pub use memory::{alloc, is_readable, query, Alloc, MemError, ProtectGuard};

use region::Protection;

/// The protection status of some memory
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
pub enum Prot {
    /// none
    None,
    /// read
    R,
    /// write
    W,
    /// execute
    X,
    /// execute + read
    XR,
    /// execute + write
    XW,
    /// read + write
    RW,
    /// execute + read + write
    XRW,
}

impl From<Prot> for Protection {
    fn from(value: Prot) -> Self {
        match value {
            Prot::None => Protection::NONE,
            Prot::R => Protection::READ,
            Prot::W => Protection::WRITE,
            Prot::X => Protection::EXECUTE,
            Prot::XR => Protection::READ_EXECUTE,
            Prot::XW => Protection::WRITE_EXECUTE,
            Prot::RW => Protection::READ_WRITE,
            Prot::XRW => Protection::READ_WRITE_EXECUTE,
        }
    }
}

impl From<Protection> for Prot {
    fn from(value: Protection) -> Self {
        let r = value.contains(Protection::READ);
        let w = value.contains(Protection::WRITE);
        let x = value.contains(Protection::EXECUTE);

        match (r, w, x) {
            (false, false, false) => Self::None,
            (true, false, false) => Self::R,
            (false, true, false) => Self::W,
            (false, false, true) => Self::X,
            (true, false, true) => Self::XR,
            (false, true, true) => Self::XW,
            (true, true, false) => Self::RW,
            (true, true, true) => Self::XRW,
        }
    }
}
