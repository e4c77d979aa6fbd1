use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;

pub use app::{
    run_app, AppError, InputAction, InputSnapshot, LoopConfig, LoopMetricsSnapshot, Renderer,
    Scene, SceneCommand, Sprite, SpriteId, Stage, TileLayer, Vec2, CELL_SIZE_PX,
    EDGE_MASK_DEPTH_PX, GRID_COLS, GRID_ROWS, PLACEHOLDER_HALF_SIZE_PX,
};

pub const ROOT_ENV_VAR: &str = "CRAWL_ROOT";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain an assets/ directory.",
        env_var = ROOT_ENV_VAR
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/tile-crawler\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Resolves the directory textures are loaded from: `<project root>/assets`.
pub fn resolve_asset_root() -> Result<PathBuf, StartupError> {
    resolve_root().map(|root| root.join("assets"))
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_project_root(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_project_root(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_project_root(path: &Path) -> bool {
    path.join("assets").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn project_root_requires_assets_dir() {
        let dir = TempDir::new().expect("temp dir");
        assert!(!is_project_root(dir.path()));

        fs::create_dir(dir.path().join("assets")).expect("create assets");
        assert!(is_project_root(dir.path()));
    }

    #[test]
    fn normalize_path_keeps_missing_paths_verbatim() {
        let missing = Path::new("definitely/not/a/real/path");
        assert_eq!(normalize_path(missing), missing.to_path_buf());
    }
}
