use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

pub const APPLICATION_DIR: &str = "microhabits";
pub const HABITS_FILE_NAME: &str = "habits.yml";
pub const LOG_FILE_NAME: &str = "log.csv";

/// Resolves an XDG base directory. `fallback` is relative to `$HOME` and is used when `xdg_var`
/// is unset or empty.
fn xdg_dir(xdg_var: &str, fallback: &str) -> Result<PathBuf> {
    env::var(xdg_var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            env::var("HOME").ok().map(|home| {
                let mut path = PathBuf::from(home);
                path.push(fallback);
                path
            })
        })
        .ok_or_else(|| anyhow!("Couldn't find neither {xdg_var} nor HOME"))
}

pub fn default_habits_file() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_CONFIG_HOME", ".config")?
        .join(APPLICATION_DIR)
        .join(HABITS_FILE_NAME))
}

pub fn default_log_file() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_DATA_HOME", ".local/share")?
        .join(APPLICATION_DIR)
        .join(LOG_FILE_NAME))
}

/// Directory for application logs. Created if missing.
pub fn create_application_state_path() -> Result<PathBuf> {
    let path = xdg_dir("XDG_STATE_HOME", ".local/state")?.join(APPLICATION_DIR);
    ensure_dir(&path)?;
    Ok(path)
}

pub fn ensure_parent_dir(file: &Path) -> Result<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(_) => Ok(()),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(v) => Err(v.into()),
    }
}

/// Expands a leading `~` into `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), env::var_os("HOME")) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            let mut expanded = PathBuf::from(home);
            expanded.push(rest.trim_start_matches('/'));
            expanded
        }
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard(Vec<(&'static str, Option<String>)>);

    impl EnvGuard {
        fn set(vars: &[(&'static str, Option<&str>)]) -> Self {
            let prior = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();
            for (k, v) in vars {
                match v {
                    Some(v) => env::set_var(k, v),
                    None => env::remove_var(k),
                }
            }
            Self(prior)
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (k, v) in &self.0 {
                match v {
                    Some(v) => env::set_var(k, v),
                    None => env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn xdg_variables_take_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _env = EnvGuard::set(&[
            ("XDG_CONFIG_HOME", Some("/tmp/cfg")),
            ("XDG_DATA_HOME", Some("/tmp/data")),
            ("HOME", Some("/home/someone")),
        ]);

        assert_eq!(
            default_habits_file().unwrap(),
            PathBuf::from("/tmp/cfg/microhabits/habits.yml")
        );
        assert_eq!(
            default_log_file().unwrap(),
            PathBuf::from("/tmp/data/microhabits/log.csv")
        );
    }

    #[test]
    fn home_is_used_as_fallback() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _env = EnvGuard::set(&[
            ("XDG_CONFIG_HOME", None),
            ("XDG_DATA_HOME", Some("")),
            ("HOME", Some("/home/someone")),
        ]);

        assert_eq!(
            default_habits_file().unwrap(),
            PathBuf::from("/home/someone/.config/microhabits/habits.yml")
        );
        assert_eq!(
            default_log_file().unwrap(),
            PathBuf::from("/home/someone/.local/share/microhabits/log.csv")
        );
    }

    #[test]
    fn tilde_is_expanded() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _env = EnvGuard::set(&[("HOME", Some("/home/someone"))]);

        assert_eq!(expand_home("~/file.txt"), PathBuf::from("/home/someone/file.txt"));
        assert_eq!(expand_home("~"), PathBuf::from("/home/someone"));
        assert_eq!(expand_home("~other/x"), PathBuf::from("~other/x"));
        assert_eq!(expand_home("/abs/x"), PathBuf::from("/abs/x"));
    }
}
