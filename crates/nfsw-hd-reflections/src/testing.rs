//! Stand-in game memory for tests

use std::ptr;

use patchmem::{memory, Alloc, Image, Prot};

use crate::layout::Layout;

/// Same slots as the real game packed into a small image
pub const LAYOUT: Layout = Layout {
    resolution_branch: 0x10,
    resolution_size: 0x13,
    lod_toggle: 0x20,
    lod_mode: 0x24,
    lod_flags: 0x29,
    draw_distance: 0x30,
    chrome_slot: 0x40,
    chrome: Layout::WORLD.chrome,
};

pub const SENTINEL: u8 = 0xCC;

/// Where the published chrome pointer lands inside the heap allocation
pub const CHROME_BASE: usize = 0xE30;

const EXE_LEN: usize = 0x100;

pub struct FakeGame {
    exe: Alloc,
    heap: Alloc,
}

impl FakeGame {
    pub fn new() -> Self {
        let exe = patchmem::alloc(EXE_LEN, Prot::RW).unwrap();
        let heap = patchmem::alloc(0x1000, Prot::RW).unwrap();

        unsafe {
            ptr::write_bytes(exe.addr(), SENTINEL, EXE_LEN);
            // chrome slot starts out null
            memory::write(exe.addr().add(LAYOUT.chrome_slot as usize).cast::<usize>(), 0);
        }

        Self { exe, heap }
    }

    pub fn image(&self) -> Image {
        Image::from_base(self.exe.addr() as usize)
    }

    pub fn chrome_base(&self) -> usize {
        self.heap.addr() as usize + CHROME_BASE
    }

    pub fn write_signature(&self, signature: &[u8]) {
        let name = self.chrome_base() - LAYOUT.chrome.signature;
        unsafe { memory::write_bytes(signature, name as *mut u8) };
    }

    pub fn publish(&self) {
        self.publish_raw(self.chrome_base());
    }

    pub fn publish_raw(&self, ptr: usize) {
        let slot = unsafe { self.exe.addr().add(LAYOUT.chrome_slot as usize) };
        unsafe { memory::write(slot.cast::<usize>(), ptr) };
    }

    pub fn exe_bytes(&self, offset: u32, len: usize) -> Vec<u8> {
        unsafe { memory::read_bytes(self.exe.addr().add(offset as usize), len) }
    }

    pub fn exe_read<T: Copy>(&self, offset: u32) -> T {
        unsafe { ptr::read_unaligned(self.exe.addr().add(offset as usize).cast::<T>()) }
    }

    pub fn set_chrome_f32(&self, offset_below_base: usize, value: f32) {
        let addr = self.chrome_base() - offset_below_base;
        unsafe { memory::write(addr as *mut f32, value) };
    }

    pub fn chrome_f32(&self, offset_below_base: usize) -> f32 {
        let addr = self.chrome_base() - offset_below_base;
        unsafe { memory::read(addr as *const f32) }
    }
}
