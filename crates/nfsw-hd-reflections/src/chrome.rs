//! Finding and tuning the chrome effect block.
//!
//! The game allocates the block some time after startup and publishes a pointer to it
//! in a fixed slot. Nothing signals when that happens, so the slot is polled until the
//! pointer is set and the block's name matches.

use std::time::Duration;

use patchmem::{memory, Addr, Image};
use tracing::{debug, info, trace};

use crate::{
    config::BetterChrome,
    layout::{ChromeLayout, Layout, CHROME_SIGNATURE},
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn clamp_saturation(value: f64) -> f32 {
    value.clamp(-1.0, 1.0) as f32
}

pub fn clamp_reflection_intensity(value: f64) -> f32 {
    value.clamp(-10.0, 10.0) as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// `misses` polls have come up empty so far
    Searching { misses: u32 },
    /// terminal
    Found { base: usize },
}

#[derive(Debug)]
pub struct ChromeSearch {
    image: Image,
    slot: u32,
    layout: ChromeLayout,
    state: State,
}

impl ChromeSearch {
    pub fn new(image: Image, layout: &Layout) -> Self {
        Self {
            image,
            slot: layout.chrome_slot,
            layout: layout.chrome,
            state: State::Searching { misses: 0 },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    /// Poll the slot once
    ///
    /// # Safety
    /// - the chrome slot must be a readable, pointer aligned location in `image`
    /// - once the signature matches, the block must really be the chrome block
    pub unsafe fn step(&mut self) -> Option<ChromeBlock> {
        let misses = match self.state {
            State::Found { base } => return Some(self.block(base)),
            State::Searching { misses } => misses,
        };

        let base = unsafe { self.image.read::<usize>(Addr::Rel(self.slot)) };

        if base != 0 && self.signature_matches(base) {
            info!(base = format_args!("{base:#x}"), misses, "found chrome block");

            self.state = State::Found { base };
            return Some(self.block(base));
        }

        if misses == 0 {
            debug!("chrome block not ready yet, polling");
        }

        trace!(base = format_args!("{base:#x}"), misses, "chrome block not found");

        self.state = State::Searching { misses: misses + 1 };

        None
    }

    /// Poll until the block shows up, calling `wait` between attempts. Never gives up.
    ///
    /// # Safety
    /// Same as [`ChromeSearch::step`]
    pub unsafe fn run(&mut self, mut wait: impl FnMut()) -> ChromeBlock {
        loop {
            if let Some(block) = unsafe { self.step() } {
                return block;
            }

            wait();
        }
    }

    fn signature_matches(&self, base: usize) -> bool {
        let Some(name) = base.checked_sub(self.layout.signature) else {
            return false;
        };

        let name = name as *const u8;

        // the slot may briefly hold garbage while the game sets it up
        if !memory::is_readable(name, CHROME_SIGNATURE.len()) {
            return false;
        }

        let bytes = unsafe { memory::read_bytes(name, CHROME_SIGNATURE.len()) };
        bytes[..] == CHROME_SIGNATURE[..]
    }

    fn block(&self, base: usize) -> ChromeBlock {
        ChromeBlock {
            image: self.image,
            base,
            layout: self.layout,
        }
    }
}

/// A located chrome block
#[derive(Debug, Clone, Copy)]
pub struct ChromeBlock {
    image: Image,
    base: usize,
    layout: ChromeLayout,
}

impl ChromeBlock {
    pub fn base(&self) -> usize {
        self.base
    }

    /// Write the clamped settings into both copies of each field
    ///
    /// # Safety
    /// - the block at `base` must be the live chrome block
    pub unsafe fn apply(&self, settings: &BetterChrome) {
        let saturation = clamp_saturation(settings.saturation);
        let reflection_intensity = clamp_reflection_intensity(settings.reflection_intensity);

        for offset in self.layout.saturation {
            unsafe { self.image.write(Addr::Abs(self.base - offset), saturation) };
        }

        for offset in self.layout.reflection_intensity {
            unsafe { self.image.write(Addr::Abs(self.base - offset), reflection_intensity) };
        }

        info!(saturation, reflection_intensity, "applied chrome settings");
    }
}
