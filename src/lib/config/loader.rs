use super::character::{CharacterConfig, default_config};
use super::error::ConfigError;
use super::merge::merge;
use crate::constants::{CHARACTERS_DIR, CONFIG_DIR, GLOBAL_CONFIG_FILE};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Variables available to `${...}` substitution: every environment variable
/// under an `env_` prefix (`${env_GITHUB_TOKEN}`).
pub fn substitution_context<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .map(|(key, value)| (format!("env_{key}"), value))
        .collect()
}

/// Replace `${name}` / `$name` references known to `context`; unknown
/// references are left untouched.
pub fn substitute(content: &str, context: &HashMap<String, String>) -> String {
    shellexpand::env_with_context_no_errors(content, |name: &str| context.get(name))
        .into_owned()
}

/// Parse a YAML document (after substitution) into a JSON tree.
pub fn parse_yaml(
    path: &Path,
    content: &str,
    context: &HashMap<String, String>,
) -> Result<Value, ConfigError> {
    let expanded = substitute(content, context);
    let parsed: Value = serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match parsed {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(parsed),
        _ => Err(ConfigError::NotAMapping {
            path: path.to_path_buf(),
        }),
    }
}

/// Global configuration merged over the built-in defaults.
///
/// A missing `.dewhale/config.yaml` yields the defaults.
pub fn load_global_config(
    workspace: &Path,
    context: &HashMap<String, String>,
) -> Result<Value, ConfigError> {
    let path = workspace.join(CONFIG_DIR).join(GLOBAL_CONFIG_FILE);
    debug!(path = %path.display(), "Reading global configuration");
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No global configuration, using defaults");
            return Ok(default_config());
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    let global = parse_yaml(&path, &content, context)?;
    Ok(merge(&default_config(), &global))
}

/// Load every character under `.dewhale/characters`, in file-name order.
///
/// A character that fails to load is logged and skipped; only an unreadable
/// global configuration is an error.
pub fn load_characters(
    workspace: &Path,
    context: &HashMap<String, String>,
) -> Result<Vec<CharacterConfig>, ConfigError> {
    let global = load_global_config(workspace, context)?;
    let dir = workspace.join(CONFIG_DIR).join(CHARACTERS_DIR);
    if !dir.is_dir() {
        warn!(path = %dir.display(), "Characters config folder does not exist");
        return Ok(Vec::new());
    }

    let mut files = character_files(&dir).map_err(|source| ConfigError::Io {
        path: dir.clone(),
        source,
    })?;
    files.sort();

    let mut characters = Vec::new();
    for path in files {
        match load_character(&path, &global, context) {
            Ok(character) => {
                info!(character = %character.name, "Character loaded");
                characters.push(character);
            }
            Err(err) => {
                error!(path = %path.display(), %err, "Failed to load character");
            }
        }
    }
    Ok(characters)
}

fn load_character(
    path: &Path,
    global: &Value,
    context: &HashMap<String, String>,
) -> Result<CharacterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let character = parse_yaml(path, &content, context)?;
    CharacterConfig::resolve(global, &character)
}

fn character_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if entry.file_type()?.is_file() && is_yaml {
            files.push(path);
        }
    }
    Ok(files)
}
