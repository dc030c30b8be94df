//! Debug build console: a banner plus what the loaded config is about to patch

use std::fmt::Write;

use crate::{
    chrome::{clamp_reflection_intensity, clamp_saturation},
    config::Config,
};

/// Open a console for the game process and print the banner
///
/// Not meant to be run in production
#[cfg(all(windows, debug_assertions))]
pub fn alloc_console() -> ::windows::core::Result<()> {
    use windows::{
        core::w,
        Win32::System::Console::{
            AllocConsole, GetStdHandle, SetConsoleMode, SetConsoleTitleW,
            ENABLE_PROCESSED_OUTPUT, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
            ENABLE_WRAP_AT_EOL_OUTPUT, STD_OUTPUT_HANDLE,
        },
    };

    unsafe {
        AllocConsole()?;

        // ansi output from the tracing stdout layer
        let stdout = GetStdHandle(STD_OUTPUT_HANDLE)?;
        SetConsoleMode(
            stdout,
            ENABLE_PROCESSED_OUTPUT | ENABLE_WRAP_AT_EOL_OUTPUT | ENABLE_VIRTUAL_TERMINAL_PROCESSING,
        )?;

        SetConsoleTitleW(w!("NFSW HD Reflections"))?;
    }

    println!("{}", banner());

    Ok(())
}

#[cfg(any(test, all(windows, debug_assertions)))]
fn banner() -> String {
    let sha = env!("VERGEN_GIT_SHA");
    let sha = sha.get(..8).unwrap_or(sha);

    format!(
        "NFSW HD Reflections {}@{sha} built {}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_BUILD_DATE"),
    )
}

fn toggle(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// One line per patch step, with the values that will actually be written
pub fn summary(config: &Config) -> String {
    let chrome = &config.better_chrome;
    let mut out = String::new();

    _ = writeln!(out, "config {}", config.path().display());
    _ = writeln!(out, "  reflection resolution  {}", config.reflection_resolution);
    _ = writeln!(out, "  reflection LODs        {}", toggle(config.better_reflection_lods));
    _ = writeln!(
        out,
        "  draw distance          {}",
        toggle(config.better_reflection_draw_distance)
    );

    if chrome.enabled {
        _ = writeln!(
            out,
            "  chrome                 on (saturation {} -> {}, intensity {} -> {})",
            chrome.saturation,
            clamp_saturation(chrome.saturation),
            chrome.reflection_intensity,
            clamp_reflection_intensity(chrome.reflection_intensity),
        );
    } else {
        _ = writeln!(out, "  chrome                 off");
    }

    out
}
