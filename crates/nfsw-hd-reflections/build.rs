use std::{env, error::Error};

use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn Error>> {
    // some useful info about git and the environment
    EmitBuilder::builder()
        .all_build()
        .all_cargo()
        .all_git()
        .emit()?;

    // stamp dll with project metadata, only possible when building for windows
    if env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows") {
        let res = winres::WindowsResource::new();
        res.compile()?;
    }

    Ok(())
}
