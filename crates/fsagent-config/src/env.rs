use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

/// Load `KEY=VALUE` pairs from a dotenv file into the process environment.
///
/// With an explicit `path` the file must exist.  Without one, `.env` is
/// searched from the current directory upwards and silently skipped when
/// absent.  Variables already present in the environment are not overridden.
///
/// Returns the path of the file that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    match path {
        Some(p) => {
            dotenvy::from_path(p)
                .with_context(|| format!("loading environment file {}", p.display()))?;
            debug!(path = %p.display(), "loaded environment file");
            Ok(Some(p.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => {
                debug!(path = %found.display(), "loaded environment file");
                Ok(Some(found))
            }
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e).context("loading .env"),
        },
    }
}
