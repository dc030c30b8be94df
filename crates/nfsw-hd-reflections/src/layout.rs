//! Addresses and values for the supported game build.
//!
//! None of these are derived; they only hold for the one `nfsw.exe` this plugin targets.

/// Module relative slots patched in the game executable
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// 2 byte conditional jump guarding the resolution store
    pub resolution_branch: u32,
    /// u32 immediate holding the reflection render target size
    pub resolution_size: u32,
    /// bool, cleared to unlock the high quality reflection LODs
    pub lod_toggle: u32,
    /// u8 LOD selection code
    pub lod_mode: u32,
    /// u32 reflection pass flags
    pub lod_flags: u32,
    /// f32 reflection view distance
    pub draw_distance: u32,
    /// pointer to the chrome effect block, null until the game creates it
    pub chrome_slot: u32,
    pub chrome: ChromeLayout,
}

/// Offsets below the pointer published in [`Layout::chrome_slot`]
#[derive(Debug, Clone, Copy)]
pub struct ChromeLayout {
    pub signature: usize,
    pub saturation: [usize; 2],
    pub reflection_intensity: [usize; 2],
}

impl Layout {
    pub const WORLD: Self = Self {
        resolution_branch: 0x22CA04,
        resolution_size: 0x22CA07,
        lod_toggle: 0x89E48C,
        lod_mode: 0x33D8BF,
        lod_flags: 0x33DEBD,
        draw_distance: 0x882D44,
        chrome_slot: 0x8B4208,
        chrome: ChromeLayout {
            signature: 0xE24,
            saturation: [0xDC0, 0xDD0],
            reflection_intensity: [0xD60, 0xD70],
        },
    };
}

/// `nop; nop` over the resolution branch
pub const RESOLUTION_BRANCH_NOP: [u8; 2] = [0x90, 0x90];
pub const LOD_MODE: u8 = 0x10;
pub const LOD_FLAGS: u32 = 0x8002;
pub const DRAW_DISTANCE: f32 = 16000.0;

/// Name stored at the head of the chrome block, nul included
pub const CHROME_SIGNATURE: &[u8; 7] = b"CHROME\0";
