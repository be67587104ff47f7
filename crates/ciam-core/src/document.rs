//! Typed scenario documents and the parsing stage that produces them.
//!
//! A scenario document is a YAML or JSON file with a single `scenario` root:
//!
//! ```yaml
//! scenario:
//!   name: reference
//!   nodes:
//!     - summary: "Reference run"
//!     - modeltime: { start_year: 2000, timesteps: [{ until_year: 2020, step: 10 }] }
//!     - world: { ... }
//! ```
//!
//! `nodes` is an ordered list of single-key maps. Parsing never rejects a
//! node: bodies that fail to deserialize become [`ScenarioNode::Malformed`]
//! and unknown tags become [`ScenarioNode::Unrecognized`], so the scenario
//! can report and skip them while applying the rest.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::modeltime::ModeltimeSpec;

/// Errors that can occur when reading a scenario document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Failed to read the document from disk.
    #[error("failed to read scenario document: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The YAML content could not be parsed.
    #[error("failed to parse scenario YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// The JSON content could not be parsed.
    #[error("failed to parse scenario JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// The document has no `scenario` root.
    #[error("document has no scenario root")]
    MissingRoot,

    /// The file extension names no supported format.
    #[error("unsupported scenario document format: {}", path.display())]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },
}

/// One direct child of the scenario root.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioNode<S> {
    /// Free-text description of the scenario.
    Summary(String),
    /// Period index definition.
    Modeltime(ModeltimeSpec),
    /// World model definition (or augmentation).
    World(S),
    /// A known tag whose body could not be read.
    Malformed {
        /// The node's tag.
        tag: String,
        /// Why the body was rejected.
        reason: String,
    },
    /// A tag the scenario does not understand.
    Unrecognized {
        /// The node's tag.
        tag: String,
    },
}

impl<S> ScenarioNode<S> {
    /// The tag the node was read from.
    pub fn tag(&self) -> &str {
        match self {
            Self::Summary(_) => "summary",
            Self::Modeltime(_) => "modeltime",
            Self::World(_) => "world",
            Self::Malformed { tag, .. } | Self::Unrecognized { tag } => tag,
        }
    }
}

/// A parsed scenario document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDocument<S> {
    /// Scenario name; empty when the document does not set one.
    pub name: String,
    /// Child nodes in document order.
    pub nodes: Vec<ScenarioNode<S>>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    scenario: Option<RawScenario>,
}

#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(default)]
    name: String,
    #[serde(default)]
    nodes: Vec<Map<String, Value>>,
}

impl<S: DeserializeOwned> ScenarioDocument<S> {
    /// Read a document, choosing the format from the file extension
    /// (`.yaml`, `.yml`, or `.json`).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] for any other
    /// extension, [`DocumentError::Io`] if the file cannot be read, and a
    /// parse error if the content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml_str(&std::fs::read_to_string(path)?),
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?),
            _ => Err(DocumentError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Yaml`] on invalid YAML and
    /// [`DocumentError::MissingRoot`] if there is no `scenario` key.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DocumentError> {
        let raw: RawDocument = serde_yml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] on invalid JSON and
    /// [`DocumentError::MissingRoot`] if there is no `scenario` key.
    pub fn from_json_str(json: &str) -> Result<Self, DocumentError> {
        let raw: RawDocument = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self, DocumentError> {
        let scenario = raw.scenario.ok_or(DocumentError::MissingRoot)?;
        Ok(Self {
            name: scenario.name,
            nodes: scenario.nodes.into_iter().map(node_from_entry).collect(),
        })
    }
}

fn node_from_entry<S: DeserializeOwned>(entry: Map<String, Value>) -> ScenarioNode<S> {
    if entry.len() != 1 {
        let tag = entry.keys().cloned().collect::<Vec<_>>().join(",");
        return ScenarioNode::Malformed {
            tag,
            reason: format!("expected exactly one tag per node, found {}", entry.len()),
        };
    }
    let Some((tag, body)) = entry.into_iter().next() else {
        return ScenarioNode::Malformed {
            tag: String::new(),
            reason: "empty node".to_owned(),
        };
    };

    match tag.as_str() {
        "summary" => match body {
            Value::String(text) => ScenarioNode::Summary(text),
            other => ScenarioNode::Malformed {
                tag,
                reason: format!("summary must be text, found {other}"),
            },
        },
        "modeltime" => match serde_json::from_value::<ModeltimeSpec>(body) {
            Ok(spec) => ScenarioNode::Modeltime(spec),
            Err(e) => ScenarioNode::Malformed {
                tag,
                reason: e.to_string(),
            },
        },
        "world" => match serde_json::from_value::<S>(body) {
            Ok(spec) => ScenarioNode::World(spec),
            Err(e) => ScenarioNode::Malformed {
                tag,
                reason: e.to_string(),
            },
        },
        _ => ScenarioNode::Unrecognized { tag },
    }
}
