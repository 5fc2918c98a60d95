//! Pre-submission template rendering.
//!
//! When a settings file carries a non-empty `meta_parameters` mapping the
//! template is expanded against it before classification. The rendered
//! output is written to a kept temporary file so the rest of the flow
//! (classification, archival) reads it like any other template.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, TemplateError};

/// Renders the template at `path` against `context` and returns the path
/// of the rendered copy.
///
/// # Errors
///
/// Returns `TemplateError::RenderFailed` if the template cannot be read
/// or expanded; failures here are fatal to the whole run.
pub fn render(path: impl AsRef<Path>, context: &BTreeMap<String, String>) -> Result<PathBuf> {
    let path = path.as_ref();

    let body = std::fs::read_to_string(path).map_err(|e| TemplateError::RenderFailed {
        message: format!("cannot read {}: {e}", path.display()),
    })?;

    let mut tera_context = tera::Context::new();
    for (key, value) in context {
        tera_context.insert(key, value);
    }

    let rendered =
        tera::Tera::one_off(&body, &tera_context, false).map_err(|e| TemplateError::RenderFailed {
            message: e.to_string(),
        })?;

    let mut file = tempfile::Builder::new()
        .prefix("cumulus-")
        .suffix(".rendered")
        .tempfile()?;
    file.write_all(rendered.as_bytes())?;

    let (_handle, kept) = file.keep().map_err(|e| TemplateError::RenderFailed {
        message: format!("cannot keep rendered template: {e}"),
    })?;

    info!("template rendered into {}", kept.display());
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_expands_context() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source
            .write_all(b"Resources:\n  Fleet:\n    Size: {{ az_count }}\n")
            .unwrap();

        let mut context = BTreeMap::new();
        context.insert(String::from("az_count"), String::from("3"));

        let rendered = render(source.path(), &context).unwrap();
        let body = std::fs::read_to_string(&rendered).unwrap();
        std::fs::remove_file(&rendered).unwrap();

        assert!(body.contains("Size: 3"));
    }

    #[test]
    fn test_render_missing_file_is_fatal() {
        assert!(render("/nonexistent/stack.yaml", &BTreeMap::new()).is_err());
    }
}
