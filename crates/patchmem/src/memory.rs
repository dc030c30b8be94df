//! This module allows one to read and write underlying process memory

use std::{mem, ptr};

use region::Protection;
use tracing::trace;

use crate::Prot;

/// An error for the [memory](crate::memory) module
#[derive(Debug, thiserror::Error)]
pub enum MemError {
    /// address is invalid
    #[error("bad address")]
    BadAddress,
    /// a protection change was requested over zero bytes
    #[error("range must not be empty")]
    EmptyRange,
    /// failed to query, protect or allocate pages
    #[error(transparent)]
    Region(#[from] region::Error),
    /// a windows error
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

/// Elevated protection over a range of memory. The protection that was in place
/// before the guard was created is put back when it is dropped.
///
/// The guard owns no memory, only the protection state of the range.
///
/// # Note
/// Protection is tracked as read/write/execute only. Windows modifiers such as
/// `PAGE_WRITECOPY` or `PAGE_GUARD` are not carried over to the restored flags. A
/// copy-on-write page has already been copied by the time the guard drops.
#[must_use = "protection is restored as soon as the guard is dropped"]
pub struct ProtectGuard {
    addr: *const u8,
    len: usize,
    prior: Prot,
    _handle: region::ProtectGuard,
}

impl ProtectGuard {
    /// Change the protection of `addr..addr + len` to `prot` until the guard drops.
    ///
    /// Every page the range touches is affected, and each gets its own prior
    /// protection back on drop.
    ///
    /// # Safety
    /// - `addr` must be valid for up to `len` bytes
    /// - nothing may rely on the current protection of those pages while the guard lives
    pub unsafe fn new(addr: *const u8, len: usize, prot: Prot) -> Result<Self, MemError> {
        if addr.is_null() {
            return Err(MemError::BadAddress);
        }

        if len == 0 {
            return Err(MemError::EmptyRange);
        }

        let prior = region::query(addr)?.protection().into();
        let handle = unsafe { region::protect_with_handle(addr, len, prot.into())? };

        trace!(addr = ?addr, len, %prior, %prot, "elevated protection");

        Ok(Self {
            addr,
            len,
            prior,
            _handle: handle,
        })
    }

    /// The protection of the first page before the guard was created
    pub fn prior(&self) -> Prot {
        self.prior
    }
}

impl std::fmt::Debug for ProtectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectGuard")
            .field("addr", &self.addr)
            .field("len", &self.len)
            .field("prior", &self.prior)
            .finish()
    }
}

impl Drop for ProtectGuard {
    fn drop(&mut self) {
        // the region handle puts the old flags back when it drops right after this
        trace!(addr = ?self.addr, len = self.len, prior = %self.prior, "restoring protection");
    }
}

/// A page backed allocation which is freed when this type is dropped
pub struct Alloc(region::Allocation);

impl Alloc {
    /// Get the address of the allocation. This ptr is valid up to the size of the allocation
    pub fn addr(&self) -> *mut u8 {
        self.0.as_ptr::<u8>().cast_mut()
    }

    /// Size of the allocation, rounded up to whole pages
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the allocation is empty. Never true for a successful allocation
    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }
}

impl std::fmt::Debug for Alloc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alloc")
            .field("addr", &self.addr())
            .field("len", &self.len())
            .finish()
    }
}

/// Allocate at least `len` bytes of fresh pages with protection `prot`
pub fn alloc(len: usize, prot: Prot) -> Result<Alloc, MemError> {
    if len == 0 {
        return Err(MemError::EmptyRange);
    }

    Ok(Alloc(region::alloc(len, prot.into())?))
}

/// The current protection of the page containing `addr`
pub fn query(addr: *const u8) -> Result<Prot, MemError> {
    if addr.is_null() {
        return Err(MemError::BadAddress);
    }

    Ok(region::query(addr)?.protection().into())
}

/// Whether every page in `addr..addr + len` is mapped and readable
pub fn is_readable(addr: *const u8, len: usize) -> bool {
    if addr.is_null() || len == 0 {
        return false;
    }

    let Ok(mut regions) = region::query_range(addr, len) else {
        return false;
    };

    regions.all(|found| {
        found.is_ok_and(|r| r.protection().contains(Protection::READ) && !r.is_guarded())
    })
}

/// Read a T from memory address
///
/// # Safety
/// - Addr must be valid for reads up to T bytes
/// - Memory at location must be initialized
/// - Memory at location must contain a valid bitpattern for T
pub unsafe fn read<T: Copy>(addr: *const T) -> T {
    if cfg!(debug_assertions) {
        let align = mem::align_of::<T>();
        assert!(addr as usize % align == 0, "addr is not aligned to T");
    }

    debug_assert!(!addr.is_null(), "ptr must not be null");

    unsafe { ptr::read_volatile(addr) }
}

/// Read bytes from address
///
/// # Safety
/// - Memory at location must be initialized
/// - Address must be valid for reads up to addr+count bytes
pub unsafe fn read_bytes(src: *const u8, count: usize) -> Vec<u8> {
    debug_assert!(!src.is_null(), "src must not be null");

    let mut buffer = Vec::with_capacity(count);

    unsafe {
        ptr::copy_nonoverlapping(src, buffer.as_mut_ptr(), count);
        buffer.set_len(count);
    }

    buffer
}

/// Write T to dst. Patched slots are frequently in the middle of an instruction,
/// so no alignment is required.
///
/// # Safety
/// - dst must be valid for writes up to T bytes
pub unsafe fn write<T: Copy>(dst: *mut T, src: T) {
    debug_assert!(!dst.is_null(), "dst must not be null");

    unsafe {
        ptr::write_unaligned(dst, src);
    }
}

/// Write bytes to dst
///
/// # Safety
/// - dst must be valid for writes up to src.len() bytes
/// - addresses must not overlap
pub unsafe fn write_bytes(src: &[u8], dst: *mut u8) {
    debug_assert!(!dst.is_null(), "dst must not be null");

    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_size() -> usize {
        region::page::size()
    }

    #[test]
    fn guard_restores_prior_protection() {
        for prot in [Prot::R, Prot::RW, Prot::None, Prot::XRW] {
            let page = alloc(page_size(), prot).unwrap();
            let addr = page.addr();

            assert_eq!(query(addr).unwrap(), prot);

            {
                let guard = unsafe { ProtectGuard::new(addr.wrapping_add(0x10), 4, Prot::XRW) }
                    .unwrap();
                assert_eq!(guard.prior(), prot);
                assert_eq!(query(addr).unwrap(), Prot::XRW);
            }

            assert_eq!(query(addr).unwrap(), prot, "starting from {prot}");
        }
    }

    #[test]
    fn guard_restores_on_early_return() {
        fn patch_then_bail(addr: *mut u8) -> Result<(), &'static str> {
            let _guard = unsafe { ProtectGuard::new(addr, 4, Prot::XRW) }.unwrap();
            unsafe { write(addr.cast::<u32>(), 0xDEADBEEF) };
            Err("bail")
        }

        let page = alloc(page_size(), Prot::R).unwrap();
        assert!(patch_then_bail(page.addr()).is_err());

        assert_eq!(query(page.addr()).unwrap(), Prot::R);
        assert_eq!(unsafe { read(page.addr().cast::<u32>()) }, 0xDEADBEEF);
    }

    #[test]
    fn guard_rejects_bad_ranges() {
        let page = alloc(page_size(), Prot::RW).unwrap();

        let err = unsafe { ProtectGuard::new(ptr::null(), 4, Prot::XRW) }.unwrap_err();
        assert!(matches!(err, MemError::BadAddress));

        let err = unsafe { ProtectGuard::new(page.addr(), 0, Prot::XRW) }.unwrap_err();
        assert!(matches!(err, MemError::EmptyRange));
    }

    #[test]
    fn guard_spanning_two_pages() {
        let pages = alloc(page_size() * 2, Prot::R).unwrap();
        let straddle = pages.addr().wrapping_add(page_size() - 2);

        {
            let _guard = unsafe { ProtectGuard::new(straddle, 4, Prot::XRW) }.unwrap();
            unsafe { write(straddle.cast::<u32>(), 0x11223344) };
            assert_eq!(query(pages.addr().wrapping_add(page_size())).unwrap(), Prot::XRW);
        }

        assert_eq!(query(pages.addr()).unwrap(), Prot::R);
        assert_eq!(query(pages.addr().wrapping_add(page_size())).unwrap(), Prot::R);
    }

    #[test]
    fn guard_across_mixed_protections() {
        let pages = alloc(page_size() * 2, Prot::RW).unwrap();
        let second = pages.addr().wrapping_add(page_size());
        unsafe { region::protect(second, page_size(), Protection::READ) }.unwrap();

        let straddle = pages.addr().wrapping_add(page_size() - 2);

        {
            let guard = unsafe { ProtectGuard::new(straddle, 4, Prot::XRW) }.unwrap();
            assert_eq!(guard.prior(), Prot::RW);
            assert_eq!(query(pages.addr()).unwrap(), Prot::XRW);
            assert_eq!(query(second).unwrap(), Prot::XRW);
        }

        assert_eq!(query(pages.addr()).unwrap(), Prot::RW);
        assert_eq!(query(second).unwrap(), Prot::R);
    }

    #[test]
    fn readability() {
        let readable = alloc(page_size(), Prot::R).unwrap();
        let locked = alloc(page_size(), Prot::None).unwrap();

        assert!(is_readable(readable.addr(), 7));
        assert!(!is_readable(locked.addr(), 7));
        assert!(!is_readable(ptr::null(), 7));
        assert!(!is_readable(readable.addr(), 0));
    }

    #[test]
    fn unaligned_write_and_bytes() {
        let page = alloc(page_size(), Prot::RW).unwrap();
        let addr = page.addr();

        unsafe {
            write(addr.wrapping_add(3).cast::<u32>(), 0x0102_0304);
            write_bytes(&[0x90, 0x90], addr);
        }

        let bytes = unsafe { read_bytes(addr, 7) };
        let mut expected = vec![0x90, 0x90, 0];
        expected.extend_from_slice(&0x0102_0304u32.to_ne_bytes());
        assert_eq!(bytes, expected);
    }
}
