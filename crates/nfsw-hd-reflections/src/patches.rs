use std::{thread, time::Duration};

use patchmem::{Addr, Image};
use tracing::{debug, info, info_span};

use crate::{
    chrome::{ChromeSearch, POLL_INTERVAL},
    config::{BetterChrome, Config},
    layout::{Layout, DRAW_DISTANCE, LOD_FLAGS, LOD_MODE, RESOLUTION_BRANCH_NOP},
};

/// Applies every configured patch to one image, in a fixed order
#[derive(Debug)]
pub struct Patcher<'a> {
    image: Image,
    layout: &'a Layout,
    interval: Duration,
}

impl<'a> Patcher<'a> {
    pub fn new(image: Image, layout: &'a Layout) -> Self {
        Self {
            image,
            layout,
            interval: POLL_INTERVAL,
        }
    }

    /// How long to sleep between chrome block polls
    #[cfg(test)]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run every patch the config asks for.
    ///
    /// With chrome enabled this does not return until the game creates the chrome block.
    ///
    /// # Safety
    /// - `image` must be the game build `layout` describes
    pub unsafe fn apply(&self, config: &Config) {
        info!(base = format_args!("{:#x}", self.image.base()), "patching");

        unsafe {
            self.reflection_resolution(config.reflection_resolution);

            if config.better_reflection_lods {
                self.reflection_lods();
            }

            if config.better_reflection_draw_distance {
                self.reflection_draw_distance();
            }

            if config.better_chrome.enabled {
                self.chrome(&config.better_chrome);
            }
        }
    }

    unsafe fn reflection_resolution(&self, resolution: u32) {
        let _span = info_span!("resolution").entered();

        let branch = Addr::Rel(self.layout.resolution_branch);
        let size = Addr::Rel(self.layout.resolution_size);
        self.trace_addr("branch", branch);
        self.trace_addr("size", size);

        unsafe {
            self.image.write_bytes(branch, &RESOLUTION_BRANCH_NOP);
            self.image.write(size, resolution);
        }

        info!(resolution, "applied reflection resolution");
    }

    unsafe fn reflection_lods(&self) {
        let _span = info_span!("lods").entered();

        let toggle = Addr::Rel(self.layout.lod_toggle);
        let mode = Addr::Rel(self.layout.lod_mode);
        let flags = Addr::Rel(self.layout.lod_flags);
        self.trace_addr("toggle", toggle);
        self.trace_addr("mode", mode);
        self.trace_addr("flags", flags);

        unsafe {
            self.image.write(toggle, false);
            self.image.write(mode, LOD_MODE);
            self.image.write(flags, LOD_FLAGS);
        }

        info!("applied better reflection LODs");
    }

    unsafe fn reflection_draw_distance(&self) {
        let _span = info_span!("draw_distance").entered();

        let distance = Addr::Rel(self.layout.draw_distance);
        self.trace_addr("distance", distance);

        unsafe { self.image.write(distance, DRAW_DISTANCE) };

        info!(distance = DRAW_DISTANCE, "applied reflection draw distance");
    }

    unsafe fn chrome(&self, settings: &BetterChrome) {
        let _span = info_span!("chrome").entered();

        let mut search = ChromeSearch::new(self.image, self.layout);
        let block = unsafe { search.run(|| thread::sleep(self.interval)) };
        debug!(base = format_args!("{:#x}", block.base()), "patching chrome block");

        unsafe { block.apply(settings) };
    }

    fn trace_addr(&self, name: &str, addr: Addr) {
        debug!(
            slot = name,
            addr = format_args!("{:#x}", self.image.resolve(addr)),
            "resolved"
        );
    }
}
