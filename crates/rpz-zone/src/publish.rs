//! Atomic zone file replacement.
//!
//! The zone is written to `<target>.tmp`, synced, then renamed over the
//! target. Readers see either the old file or the new one, never a mix.

use rpz_core::RenderError;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Temporary path used while writing `target`
#[must_use]
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Atomically replace `target` with `content`
pub fn write_atomically(target: &Path, content: &[u8]) -> Result<(), RenderError> {
    write_atomically_with(target, content, |file, bytes| file.write_all(bytes))
}

/// Atomically replace `target`, using `write` to fill the temporary file.
///
/// On any failure the temporary file is removed and `target` is left as it
/// was.
pub fn write_atomically_with<W>(target: &Path, content: &[u8], write: W) -> Result<(), RenderError>
where
    W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let tmp = temp_path(target);
    debug!(path = %tmp.display(), bytes = content.len(), "writing temporary zone file");

    let result = File::create(&tmp).and_then(|mut file| {
        write(&mut file, content)?;
        file.flush()?;
        file.sync_all()
    });
    let result = result.and_then(|()| std::fs::rename(&tmp, target));

    if let Err(source) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(RenderError::IoFailure {
            path: target.to_path_buf(),
            source,
        });
    }

    sync_parent(target);
    Ok(())
}

/// Persist the rename itself; failure here does not undo the publish
#[cfg(unix)]
fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            debug!(path = %parent.display(), error = %e, "directory sync failed");
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}
