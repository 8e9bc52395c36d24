pub mod clarify;
pub mod detect;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result, bail};

/// Reads the schema blob handed verbatim to every prompt.
pub fn load_schema(path: &Path) -> Result<String> {
    let schema = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file: {}", path.display()))?;
    if schema.trim().is_empty() {
        bail!("schema file is empty: {}", path.display());
    }
    Ok(schema)
}
