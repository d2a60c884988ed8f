//! Resolution of the external executables the supervisor drives.
use std::{
    env,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{config::ToolsConfig, error::ControlError};

/// Candidate names for the server binary, in preference order.
pub const SERVER_CANDIDATES: &[&str] = &["mysqld", "mariadbd"];
/// Candidate names for the data-directory initialization tool.
pub const INSTALL_DB_CANDIDATES: &[&str] = &["mysql_install_db", "mariadb-install-db"];
/// Candidate names for the administrative client.
pub const ADMIN_CANDIDATES: &[&str] = &["mysqladmin", "mariadb-admin"];

/// Resolved executable paths handed to a [`crate::supervisor::Supervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Long-running server binary.
    pub server: PathBuf,
    /// One-shot data-directory initializer.
    pub install_db: PathBuf,
    /// Administrative client; only needed for database creation.
    pub admin: Option<PathBuf>,
    /// Installation prefix passed to the initializer as `--basedir`.
    pub basedir: Option<PathBuf>,
    /// Extra arguments appended to every initializer run.
    pub init_args: Vec<String>,
}

impl Toolchain {
    /// Builds a toolchain from explicit paths, without any lookup.
    pub fn new(server: impl Into<PathBuf>, install_db: impl Into<PathBuf>) -> Self {
        Self {
            server: server.into(),
            install_db: install_db.into(),
            admin: None,
            basedir: None,
            init_args: Vec::new(),
        }
    }

    /// Resolves every tool, preferring explicit paths from `config` and falling
    /// back to a search of `search_dirs`.
    pub fn resolve(
        config: &ToolsConfig,
        search_dirs: &[PathBuf],
    ) -> Result<Self, ControlError> {
        let server = match &config.server {
            Some(path) => explicit("server", path)?,
            None => discover("server", SERVER_CANDIDATES, search_dirs)?,
        };
        let install_db = match &config.install_db {
            Some(path) => explicit("install_db", path)?,
            None => discover("install_db", INSTALL_DB_CANDIDATES, search_dirs)?,
        };
        let admin = match &config.admin {
            Some(path) => Some(explicit("admin", path)?),
            None => discover("admin", ADMIN_CANDIDATES, search_dirs).ok(),
        };

        Ok(Self {
            server,
            install_db,
            admin,
            basedir: config.basedir.clone(),
            init_args: config.init_args.clone(),
        })
    }

    /// The admin tool, or `ToolNotFound` when none was resolved.
    pub fn admin(&self) -> Result<&Path, ControlError> {
        self.admin
            .as_deref()
            .ok_or_else(|| ControlError::ToolNotFound {
                tool: "admin".to_string(),
                searched: Vec::new(),
            })
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn explicit(tool: &str, path: &Path) -> Result<PathBuf, ControlError> {
    if is_executable(path) {
        Ok(path.to_path_buf())
    } else {
        Err(ControlError::ToolNotFound {
            tool: tool.to_string(),
            searched: vec![path.to_path_buf()],
        })
    }
}

/// Returns the first executable named in `candidates` found in `search_dirs`.
///
/// Directories are searched in order; within a directory, candidates are tried in
/// order.
pub fn discover(
    tool: &str,
    candidates: &[&str],
    search_dirs: &[PathBuf],
) -> Result<PathBuf, ControlError> {
    for dir in search_dirs {
        for name in candidates {
            let path = dir.join(name);
            if is_executable(&path) {
                debug!("Resolved {tool} to {}", path.display());
                return Ok(path);
            }
        }
    }

    Err(ControlError::ToolNotFound {
        tool: tool.to_string(),
        searched: search_dirs.to_vec(),
    })
}

/// Search directories: the usual subdirectories of `basedir` first, then `PATH`.
///
/// This is the only place that reads process-wide lookup state; callers invoke
/// it once during setup and pass the result on.
pub fn default_search_dirs(basedir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(base) = basedir {
        for sub in ["bin", "sbin", "libexec", "scripts"] {
            dirs.push(base.join(sub));
        }
    }
    if let Some(path) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&path));
    }
    for fallback in ["/usr/sbin", "/usr/libexec", "/usr/local/sbin"] {
        let fallback = PathBuf::from(fallback);
        if !dirs.contains(&fallback) {
            dirs.push(fallback);
        }
    }
    dirs
}
