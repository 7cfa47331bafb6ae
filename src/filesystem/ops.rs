// src/filesystem/ops.rs

//! Directory-level filesystem primitives
//!
//! Every function takes explicit source/destination paths and holds no
//! state, so the switch engine and the pack store can compose them freely.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copy `src` to `dst`, returning the number of files copied
///
/// `dst` is created if needed. Symlinks are recreated, not followed.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<u64> {
    copy_dir_filtered(src, dst, &[])
}

/// Recursively copy `src` to `dst`, skipping top-level entries named in `exclude`
pub fn copy_dir_filtered(src: &Path, dst: &Path, exclude: &[&str]) -> io::Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0u64;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() != 1
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| exclude.contains(&name))
        });

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copy a single entry (file or directory) from `src` to `dst`
pub fn copy_entry(src: &Path, dst: &Path) -> io::Result<u64> {
    let metadata = fs::symlink_metadata(src)?;
    if metadata.is_dir() {
        copy_dir_recursive(src, dst)
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        Ok(1)
    }
}

/// Move a directory, atomically when source and destination share a volume
///
/// Falls back to copy + delete on `EXDEV`. The fallback is not atomic, so
/// callers journal the move before issuing it.
pub fn move_dir(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            log::debug!(
                "Cross-filesystem move detected ({} -> {}), using copy fallback",
                src.display(),
                dst.display()
            );
            copy_entry(src, dst)?;
            remove_entry(src)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Remove a file or directory tree. Returns false if nothing was there.
pub fn remove_entry(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Names of the entries directly inside `dir`, sorted. A missing directory is empty.
pub fn list_entries(dir: &Path) -> io::Result<Vec<String>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => log::warn!("Skipping non UTF-8 entry {:?} in {}", raw, dir.display()),
        }
    }
    names.sort();
    Ok(names)
}

/// Whether a path exists without following a trailing symlink
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
