//! Template encoding classification.
//!
//! A stack template arrives as a file that is either JSON or YAML. The
//! classifier decides which by trial decoding: JSON first, then YAML.
//! A decode only counts if the document is a mapping with a `Resources`
//! section; a well-formed document without one is "not a template" for
//! that encoding and classification falls through to the other. Both
//! failing is fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TemplateError};

/// Key whose presence makes a decoded document a stack template.
const RESOURCES_KEY: &str = "Resources";

/// Key holding the template's parameter declarations.
const PARAMETERS_KEY: &str = "Parameters";

/// Key holding a parameter's default value.
const DEFAULT_KEY: &str = "Default";

/// Template encodings understood by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEncoding {
    /// JSON-encoded template.
    Json,
    /// YAML-encoded template.
    Yaml,
}

impl TemplateEncoding {
    /// Returns the file suffix conventionally used for this encoding.
    #[must_use]
    pub const fn file_suffix(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// A parameter declared by the template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterDeclaration {
    /// Declared default value, if any. Parameters without a default are
    /// required.
    pub default: Option<String>,
}

/// A classified template, ready for parameter resolution and archival.
#[derive(Debug, Clone)]
pub struct TemplateDescriptor {
    /// The encoding the template decoded in.
    pub encoding: TemplateEncoding,
    /// Parameters declared by the template.
    pub parameters: BTreeMap<String, ParameterDeclaration>,
    /// The raw template text.
    pub body: String,
    /// Where the template was read from.
    pub path: PathBuf,
}

impl TemplateDescriptor {
    /// Returns the names of parameters with no declared default.
    #[must_use]
    pub fn required_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(_, decl)| decl.default.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Loads and classifies the template at `path`.
///
/// # Errors
///
/// Returns `TemplateError::FileNotFound` if the file cannot be read and
/// `TemplateError::Unreadable` if it decodes in neither encoding.
pub fn classify(path: impl AsRef<Path>) -> Result<TemplateDescriptor> {
    let path = path.as_ref();

    let body = std::fs::read_to_string(path).map_err(|_| TemplateError::FileNotFound {
        path: path.to_path_buf(),
    })?;

    if let Some(parameters) = decode_json(&body) {
        info!("template is JSON");
        return Ok(TemplateDescriptor {
            encoding: TemplateEncoding::Json,
            parameters,
            body,
            path: path.to_path_buf(),
        });
    }
    debug!("template is not JSON");

    if let Some(parameters) = decode_yaml(&body) {
        info!("template is YAML");
        return Ok(TemplateDescriptor {
            encoding: TemplateEncoding::Yaml,
            parameters,
            body,
            path: path.to_path_buf(),
        });
    }
    debug!("template is not YAML");

    Err(TemplateError::Unreadable {
        path: path.to_path_buf(),
    }
    .into())
}

/// Attempts a JSON decode, accepting only mappings with a resources
/// section.
fn decode_json(body: &str) -> Option<BTreeMap<String, ParameterDeclaration>> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let root = value.as_object()?;
    if !root.contains_key(RESOURCES_KEY) {
        return None;
    }

    let mut parameters = BTreeMap::new();
    if let Some(declared) = root.get(PARAMETERS_KEY).and_then(|p| p.as_object()) {
        for (name, decl) in declared {
            parameters.insert(
                name.clone(),
                ParameterDeclaration {
                    default: decl.get(DEFAULT_KEY).and_then(json_scalar),
                },
            );
        }
    }

    Some(parameters)
}

/// Attempts a YAML decode, accepting only mappings with a resources
/// section.
fn decode_yaml(body: &str) -> Option<BTreeMap<String, ParameterDeclaration>> {
    let value: serde_yaml::Value = serde_yaml::from_str(body).ok()?;
    if !value.is_mapping() {
        return None;
    }
    value.get(RESOURCES_KEY)?;

    let mut parameters = BTreeMap::new();
    if let Some(declared) = value.get(PARAMETERS_KEY).and_then(|p| p.as_mapping()) {
        for (name, decl) in declared {
            let Some(name) = name.as_str() else { continue };
            parameters.insert(
                name.to_string(),
                ParameterDeclaration {
                    default: decl.get(DEFAULT_KEY).and_then(yaml_scalar),
                },
            );
        }
    }

    Some(parameters)
}

/// Stringifies a scalar JSON default value.
fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Stringifies a scalar YAML default value.
fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
