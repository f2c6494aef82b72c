use std::fs;
use std::path::Path;

use crate::io::vault_io::{VaultError, atomic_write};
use crate::model::config::Config;
use crate::parse::field_format::FieldFormat;

/// Config file name at the vault root
pub const CONFIG_FILE: &str = ".dayplan.toml";

/// Read the vault config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing. A vault without a config
/// file gets the defaults and an empty document.
pub fn read_config(root: &Path) -> Result<(Config, toml_edit::DocumentMut), VaultError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok((Config::default(), toml_edit::DocumentMut::new()));
    }
    let text = fs::read_to_string(&path).map_err(|e| VaultError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let config: Config = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Just the parsed config.
pub fn load_config(root: &Path) -> Result<Config, VaultError> {
    read_config(root).map(|(config, _)| config)
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(root: &Path, doc: &toml_edit::DocumentMut) -> Result<(), VaultError> {
    let path = root.join(CONFIG_FILE);
    atomic_write(&path, doc.to_string().as_bytes())
        .map_err(|e| VaultError::WriteError { path, source: e })
}

/// Set `[tasks] field_format` in the config document
pub fn set_field_format(doc: &mut toml_edit::DocumentMut, format: FieldFormat) {
    if !doc.contains_key("tasks") {
        doc["tasks"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["tasks"]["field_format"] = toml_edit::value(format.name());
}
