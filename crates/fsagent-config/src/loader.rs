use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Config files consulted on every start, lowest priority first.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/fsagent/config.toml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/fsagent/config.toml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("fsagent/config.toml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".fsagent/config.toml"));
    paths.push(PathBuf::from("fsagent.toml"));

    paths.dedup();
    paths
}

/// Build the effective [`Config`]: built-in defaults, then each discovered
/// file, then `extra` (the `--config` flag), which must exist.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_toml(&mut merged, read_layer(&path)?);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_toml(&mut merged, read_layer(p)?);
    }

    let config: Config = merged
        .try_into()
        .context("invalid configuration")?;
    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<toml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Tables merge key by key; any other value in `src` replaces `dst`.
fn merge_toml(dst: &mut toml::Value, src: toml::Value) {
    match (dst, src) {
        (toml::Value::Table(d), toml::Value::Table(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(toml::Value::Table(toml::map::Map::new()));
                merge_toml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val(r#"x = 1"#);
        let src = val(r#"x = 2"#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["x"].as_integer(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val(r#"a = 1
b = 2"#);
        let src = val(r#"b = 99"#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["a"].as_integer(), Some(1));
        assert_eq!(dst["b"].as_integer(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val(r#"[model]
provider = "google"
name = "gemini-2.0-flash""#);
        let src = val(r#"[model]
name = "gemini-2.5-pro""#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["model"]["provider"].as_str(), Some("google"));
        assert_eq!(dst["model"]["name"].as_str(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn merge_replaces_arrays_wholesale() {
        let mut dst = val(r#"[mcp]
args = ["-y", "a"]"#);
        let src = val(r#"[mcp]
args = ["b"]"#);
        merge_toml(&mut dst, src);
        let args = dst["mcp"]["args"].as_array().unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].as_str(), Some("b"));
    }

    #[test]
    fn load_fails_for_missing_explicit_path() {
        let result = load(Some(Path::new("/tmp/fsagent_nonexistent_config_xyz.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"[model]
provider = "mock"
name = "test-model"

[workspace]
target_folder = "/srv/files""#).unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "mock");
        assert_eq!(cfg.model.name, "test-model");
        assert_eq!(cfg.workspace.target_folder, "/srv/files");
        // untouched sections keep their defaults
        assert_eq!(cfg.agent.app_name, "mcp_filesystem_app");
    }

    #[test]
    fn load_rejects_malformed_toml() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[model\nprovider = ").unwrap();
        assert!(load(Some(f.path())).is_err());
    }
}
