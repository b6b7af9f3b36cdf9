//! Configuration file resolution.
//!
//! Exactly one candidate is chosen: `--config`, else `$RPZ_UPDATER_CONFIG`,
//! else `config.yml` next to the executable. A missing file at the chosen
//! path is an error; there is no search through further locations.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "RPZ_UPDATER_CONFIG";

/// File name looked up next to the executable
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Pick the configuration file for this process.
pub fn resolve(cli: Option<&Path>) -> Result<PathBuf> {
    let env = std::env::var_os(CONFIG_ENV);
    let exe = std::env::current_exe().ok();
    resolve_from(cli, env, exe.as_deref())
}

/// Resolution with its inputs passed in
pub fn resolve_from(cli: Option<&Path>, env: Option<OsString>, exe: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let dir = exe
        .and_then(Path::parent)
        .context("cannot locate the executable to find its configuration; pass --config")?;
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if !path.is_file() {
        bail!(
            "no configuration given and {} does not exist\n\n\
             Provide one with:\n  \
             1. --config <PATH>\n  \
             2. {CONFIG_ENV} environment variable\n  \
             3. {DEFAULT_CONFIG_FILE} next to the rpz-updater binary",
            path.display()
        );
    }
    Ok(path)
}
