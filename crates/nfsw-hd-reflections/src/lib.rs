// only the entry point is windows specific
#![cfg_attr(not(windows), allow(dead_code))]

mod chrome;
mod config;
mod console;
mod layout;
#[cfg(windows)]
mod logging;
mod patches;
#[cfg(windows)]
mod paths;
#[cfg(test)]
mod testing;

#[cfg(windows)]
mod entry {
    use std::{ffi::c_void, panic, thread};

    use eyre::{Context, Result};
    use patchmem::Image;
    use tracing::{debug, error};
    use windows::Win32::Foundation::{BOOL, HINSTANCE, TRUE};
    use windows::Win32::System::LibraryLoader::DisableThreadLibraryCalls;
    use windows::Win32::System::SystemServices::DLL_PROCESS_ATTACH;

    use crate::config::{Config, CONFIG_FILE_NAME};
    use crate::layout::Layout;
    use crate::logging::setup_logging;
    use crate::patches::Patcher;
    use crate::paths::get_dll_dir_filepath;

    // Dll entry point
    #[no_mangle]
    extern "system" fn DllMain(
        module: HINSTANCE,
        fdw_reason: u32,
        _lpv_reserved: *const c_void,
    ) -> BOOL {
        #[allow(clippy::single_match)]
        match fdw_reason {
            DLL_PROCESS_ATTACH => {
                _ = unsafe { DisableThreadLibraryCalls(module) };

                // IMPORTANT to run this code in another thread since we're not allowed to do much in dllmain.
                // the chrome patch can also wait on the game for as long as it takes.
                // the handle is dropped, nothing ever joins it
                thread::spawn(move || {
                    // make sure we catch panics so they don't propagate up any further
                    // we already handle panic logging, so we don't care about the return value
                    _ = panic::catch_unwind(move || {
                        if let Err(e) = pre_init(module) {
                            // whether this prints or not depends on which point it failed
                            error!("\nError:{e:?}");
                            return;
                        }

                        if let Err(error) = init(module) {
                            error!("\nError:{error:?}");
                        }
                    });
                });
            }

            _ => (),
        }

        TRUE
    }

    fn pre_init(module: HINSTANCE) -> Result<()> {
        // always spawn debug console when in debug mode
        #[cfg(debug_assertions)]
        crate::console::alloc_console().context("failed to alloc console")?;

        // set up our actual log file handling
        setup_logging(module).context("failed to setup logging")?;

        Ok(())
    }

    fn init(module: HINSTANCE) -> Result<()> {
        let config_path =
            get_dll_dir_filepath(module, CONFIG_FILE_NAME).context("failed to get dir path")?;
        let config = Config::load(config_path).context("failed to load config")?;
        debug!("\n{}", crate::console::summary(&config));

        let image = Image::current().context("failed to find game image")?;

        unsafe { Patcher::new(image, &Layout::WORLD).apply(&config) };

        Ok(())
    }
}
