//! Site data - `_data/` files exposed to templates as `site.data`

use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::content::loader::relative_id;
use crate::content::Value;
use crate::error::BuildError;

/// Load every data file under `dir`.
///
/// `_data/authors.yml` becomes `data.authors`; `_data/team/leads.json`
/// becomes `data.team.leads`. Files that fail to parse are reported and
/// left out.
pub fn load_data(dir: &Path) -> (IndexMap<String, Value>, Vec<BuildError>) {
    let mut data = IndexMap::new();
    let mut errors = Vec::new();
    if !dir.is_dir() {
        return (data, errors);
    }

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if !matches!(ext.as_str(), "yml" | "yaml" | "json" | "toml") {
            tracing::debug!("Ignoring data file {:?}", path);
            continue;
        }

        match parse_file(path, &ext) {
            Ok(value) => {
                let id = relative_id(dir, path);
                let key_path: Vec<&str> = id.split('/').collect();
                insert_nested(&mut data, &key_path, value);
            }
            Err(e) => errors.push(e),
        }
    }

    tracing::debug!("Loaded {} site data entries", data.len());
    (data, errors)
}

fn parse_file(path: &Path, ext: &str) -> Result<Value, BuildError> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    let config_err = |message: String| BuildError::Config {
        path: path.to_path_buf(),
        message,
    };
    match ext {
        "json" => serde_json::from_str(&content).map_err(|e| config_err(e.to_string())),
        "toml" => toml::from_str(&content).map_err(|e| config_err(e.to_string())),
        _ if content.trim().is_empty() => Ok(Value::Null),
        _ => serde_yaml::from_str(&content).map_err(|e| config_err(e.to_string())),
    }
}

/// Insert under directory keys; the last segment's extension is dropped
fn insert_nested(map: &mut IndexMap<String, Value>, key_path: &[&str], value: Value) {
    match key_path {
        [] => {}
        [file] => {
            let file: &str = file;
            let key = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
            map.insert(key.to_string(), value);
        }
        [dir, rest @ ..] => {
            let child = map
                .entry(dir.to_string())
                .or_insert_with(|| Value::Map(IndexMap::new()));
            if !matches!(child, Value::Map(_)) {
                *child = Value::Map(IndexMap::new());
            }
            if let Value::Map(child) = child {
                insert_nested(child, rest, value);
            }
        }
    }
}
