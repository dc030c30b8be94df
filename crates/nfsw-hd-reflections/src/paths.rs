use std::{
    ffi::OsString,
    os::windows::prelude::OsStringExt,
    path::{Path, PathBuf},
};

use windows::Win32::{
    Foundation::{HINSTANCE, MAX_PATH},
    System::LibraryLoader::GetModuleFileNameW,
};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("{0} dir not found")]
    NotFound(String),
    #[error("module path does not fit in {0} characters")]
    Truncated(usize),
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

/// Get path to dll `<dll_dir>\NFSWHDReflections.asi`
pub fn get_dll_path(module: HINSTANCE) -> Result<PathBuf, PathError> {
    const PATH_SIZE: usize = (MAX_PATH * 2) as usize;

    // create pre-allocated stack array of correct size
    let mut path = vec![0; PATH_SIZE];
    // returns how many characters written, not counting the nul
    let written_len = unsafe { GetModuleFileNameW(module, &mut path) as usize };

    // 0 is failure, a full buffer means the path was cut off
    if written_len == 0 {
        return Err(windows::core::Error::from_win32().into());
    }

    if written_len >= PATH_SIZE {
        return Err(PathError::Truncated(PATH_SIZE));
    }

    let path = OsString::from_wide(&path[..written_len]);
    Ok(PathBuf::from(path))
}

/// Get path to dll's parent dir
pub fn get_dll_dir(module: HINSTANCE) -> Result<PathBuf, PathError> {
    let dll_folder = get_dll_path(module)?
        .parent()
        .ok_or_else(|| PathError::NotFound("parent".into()))?
        .to_path_buf();

    Ok(dll_folder)
}

/// Get path to `<dll_dir>\<filename>`
pub fn get_dll_dir_filepath<P: AsRef<Path>>(
    module: HINSTANCE,
    path: P,
) -> Result<PathBuf, PathError> {
    Ok(get_dll_dir(module)?.join(path))
}
