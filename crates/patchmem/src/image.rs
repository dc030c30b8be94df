//! Addressing inside a loaded module image

use std::mem;

use tracing::warn;

use crate::{memory, Prot, ProtectGuard};

/// Where a patch target lives
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Addr {
    /// offset from the image's load base
    Rel(u32),
    /// process address, used verbatim
    Abs(usize),
}

/// A module image mapped somewhere in the current process
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Image {
    base: usize,
}

impl Image {
    /// The image of the host executable.
    ///
    /// The load base is looked up once and cached for the life of the process.
    #[cfg(windows)]
    pub fn current() -> Result<Self, memory::MemError> {
        use std::sync::OnceLock;

        use windows::{core::PCWSTR, Win32::System::LibraryLoader::GetModuleHandleW};

        static BASE: OnceLock<usize> = OnceLock::new();

        if let Some(&base) = BASE.get() {
            return Ok(Self { base });
        }

        // a race here is harmless, every caller computes the same value
        let module = unsafe { GetModuleHandleW(PCWSTR::null())? };
        let base = *BASE.get_or_init(|| module.0 as usize);

        Ok(Self { base })
    }

    /// An image loaded at `base`
    pub fn from_base(base: usize) -> Self {
        Self { base }
    }

    /// The load base of the image
    pub fn base(&self) -> usize {
        self.base
    }

    /// Turn `addr` into a process address
    pub fn resolve(&self, addr: Addr) -> usize {
        match addr {
            Addr::Rel(offset) => self.base.wrapping_add(offset as usize),
            Addr::Abs(addr) => addr,
        }
    }

    /// Read a T at `addr` without touching its protection
    ///
    /// # Safety
    /// - resolved address must be readable, aligned, and hold a valid T
    pub unsafe fn read<T: Copy>(&self, addr: Addr) -> T {
        unsafe { memory::read(self.resolve(addr) as *const T) }
    }

    /// Write `value` to `addr`, holding full access over exactly `size_of::<T>()`
    /// bytes for the duration of the write.
    ///
    /// A failed protection change is not an error; the write is attempted anyway.
    ///
    /// # Safety
    /// - resolved address must be valid for `size_of::<T>()` bytes
    /// - the host must tolerate the new bytes appearing at any moment
    pub unsafe fn write<T: Copy>(&self, addr: Addr, value: T) {
        let dst = self.resolve(addr) as *mut u8;
        let _guard = unsafe { elevate(dst, mem::size_of::<T>()) };

        unsafe { memory::write(dst.cast::<T>(), value) };
    }

    /// Write `bytes` to `addr` under the same rules as [`Image::write`]
    ///
    /// # Safety
    /// - resolved address must be valid for `bytes.len()` bytes
    /// - the host must tolerate the new bytes appearing at any moment
    pub unsafe fn write_bytes(&self, addr: Addr, bytes: &[u8]) {
        let dst = self.resolve(addr) as *mut u8;
        let _guard = unsafe { elevate(dst, bytes.len()) };

        unsafe { memory::write_bytes(bytes, dst) };
    }
}

unsafe fn elevate(addr: *mut u8, len: usize) -> Option<ProtectGuard> {
    match unsafe { ProtectGuard::new(addr, len, Prot::XRW) } {
        Ok(guard) => Some(guard),
        Err(error) => {
            warn!(%error, addr = ?addr, len, "failed to change protection, writing anyway");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{alloc, query};

    #[test]
    fn resolve_modes() {
        let image = Image::from_base(0x40_0000);

        assert_eq!(image.resolve(Addr::Rel(0x22CA04)), 0x62CA04);
        assert_eq!(image.resolve(Addr::Abs(0x1234_5678)), 0x1234_5678);
        assert_eq!(image.resolve(Addr::Rel(0)), image.base());
    }

    #[test]
    fn write_relative_restores_protection() {
        let buf = alloc(0x100, Prot::XR).unwrap();
        let image = Image::from_base(buf.addr() as usize);

        unsafe {
            image.write(Addr::Rel(0x13), 1024u32);
            image.write_bytes(Addr::Rel(0x10), &[0x90, 0x90]);
        }

        assert_eq!(query(buf.addr()).unwrap(), Prot::XR);

        let bytes = unsafe { memory::read_bytes(buf.addr().wrapping_add(0x10), 7) };
        assert_eq!(&bytes[..3], &[0x90, 0x90, 0]);
        assert_eq!(&bytes[3..], &1024u32.to_ne_bytes());
    }

    #[test]
    fn write_absolute_ignores_base() {
        let buf = alloc(0x100, Prot::RW).unwrap();
        let target = buf.addr() as usize + 0x40;
        let image = Image::from_base(0xDEAD_0000);

        unsafe {
            image.write(Addr::Abs(target), 6.75f32);
        }

        let value = unsafe { image.read::<f32>(Addr::Abs(target)) };
        assert_eq!(value, 6.75);
    }

    #[cfg(windows)]
    #[test]
    fn current_is_cached() {
        let first = Image::current().unwrap();
        let second = Image::current().unwrap();

        assert_eq!(first, second);
        assert_ne!(first.base(), 0);
    }
}
