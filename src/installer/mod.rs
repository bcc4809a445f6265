//! Places the `habits` executable into `${DESTDIR}${PREFIX}/bin` and removes it again.
//! Both operations are idempotent.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

pub const INSTALLED_NAME: &str = "habits";
pub const DEFAULT_PREFIX: &str = "/usr/local";

#[cfg(unix)]
const INSTALLED_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Staging root used by package builders. Prepended to `prefix` as is.
    pub destdir: String,
    pub prefix: String,
}

impl Default for InstallTarget {
    fn default() -> Self {
        Self {
            destdir: String::new(),
            prefix: DEFAULT_PREFIX.into(),
        }
    }
}

impl InstallTarget {
    pub fn new(destdir: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            destdir: destdir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        // Plain concatenation, `prefix` is normally absolute and joining would drop `destdir`.
        PathBuf::from(format!("{}{}", self.destdir, self.prefix)).join("bin")
    }

    pub fn binary_path(&self) -> PathBuf {
        self.bin_dir().join(INSTALLED_NAME)
    }
}

/// Copies `source` into the target bin directory, replacing whatever is there. Returns the
/// installed path.
pub fn install(source: &Path, target: &InstallTarget) -> Result<PathBuf> {
    if !source.is_file() {
        bail!("Source {} doesn't exist", source.display());
    }

    let bin_dir = target.bin_dir();
    fs::create_dir_all(&bin_dir).with_context(|| format!("create {}", bin_dir.display()))?;

    let dest = target.binary_path();
    copy_file_atomic(source, &dest)?;
    set_executable(&dest)?;

    info!("Installed {source:?} to {dest:?}");
    Ok(dest)
}

/// Removes the installed executable. Returns whether there was anything to remove.
pub fn uninstall(target: &InstallTarget) -> Result<bool> {
    let dest = target.binary_path();
    match fs::remove_file(&dest) {
        Ok(()) => {
            info!("Removed {dest:?}");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{dest:?} is not installed");
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("remove {}", dest.display())),
    }
}

fn temp_path_for(dest: &Path) -> Result<PathBuf> {
    let parent = dest.parent().context("dest has no parent")?;
    let name = dest
        .file_name()
        .context("dest has no filename")?
        .to_string_lossy();
    Ok(parent.join(format!(".{name}.tmp-{}", std::process::id())))
}

/// The copy goes through a temporary sibling so that a running `habits` is never left
/// half-written.
fn copy_file_atomic(src: &Path, dest: &Path) -> Result<()> {
    let tmp = temp_path_for(dest)?;
    fs::copy(src, &tmp)
        .with_context(|| format!("copy {} -> {}", src.display(), tmp.display()))
        .and_then(|_| {
            fs::rename(&tmp, dest)
                .with_context(|| format!("rename {} -> {}", tmp.display(), dest.display()))
        })
        .inspect_err(|_| {
            // A failed copy or rename must not leave the temporary file in the bin dir.
            let _ = fs::remove_file(&tmp);
        })
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(INSTALLED_MODE))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
