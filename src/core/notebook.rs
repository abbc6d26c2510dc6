//! Purpose: nbformat v4 document model plus the plotting setup cell.
//! Exports: `Notebook`, `Cell`, `CellType`, `Source`, `SetupInjection`.
//! Role: The only place notebook JSON is parsed or produced.
//! Invariants: Fields this crate does not model survive a load/serialize round-trip.
//! Invariants: At most one setup cell is ever present, and it is always first.
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::error::{Error, ErrorKind};

pub const NBFORMAT_MAJOR: u32 = 4;

/// Cell tag stripped from rendered output.
pub const REMOVE_CELL_TAG: &str = "remove_cell";

pub const SETUP_CELL_ID: &str = "nbpdf-plot-setup";

/// Metadata key marking the setup cell; cell ids only exist from nbformat 4.5.
const SETUP_MARKER: &str = "nbpdf_setup";
const FIRST_MINOR_WITH_IDS: u32 = 5;

const SETUP_SOURCE: &str = r#"import warnings
try:
    import matplotlib
    matplotlib.use("Agg")
    from IPython import get_ipython
    _ip = get_ipython()
    if _ip is not None:
        _ip.run_line_magic("matplotlib", "inline")
except ImportError:
    pass
except Exception as exc:
    warnings.warn(f"matplotlib setup skipped: {exc}")
try:
    import plotly.io as pio
    pio.renderers.default = "png"
except ImportError:
    pass
except Exception as exc:
    warnings.warn(f"plotly setup skipped: {exc}")
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub nbformat: u32,
    pub nbformat_minor: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub cells: Vec<Cell>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub source: Source,
    /// `outputs`, `execution_count`, `attachments`, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
        };
        write!(f, "{s}")
    }
}

/// nbformat "multiline string": one string or a list of line fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Text(String),
    Lines(Vec<String>),
}

impl Source {
    pub fn text(&self) -> String {
        match self {
            Source::Text(text) => text.clone(),
            Source::Lines(lines) => lines.concat(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupInjection {
    Inserted,
    AlreadyPresent,
    /// Kernel language is declared and is not Python.
    SkippedLanguage(String),
}

impl Notebook {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read notebook")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_slice(&bytes).map_err(|err| err.with_path(path))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let header: Header = serde_json::from_slice(bytes).map_err(parse_error)?;
        if header.nbformat != NBFORMAT_MAJOR {
            return Err(Error::new(ErrorKind::Parse)
                .with_message(format!(
                    "unsupported nbformat {}.{} (expected {NBFORMAT_MAJOR}.x)",
                    header.nbformat, header.nbformat_minor
                ))
                .with_hint("Upgrade it with `jupyter nbconvert --to notebook --inplace`."));
        }
        serde_json::from_slice(bytes).map_err(parse_error)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode notebook")
                .with_source(err)
        })
    }

    /// Declared kernel language, from `kernelspec.language` or `language_info.name`.
    pub fn language(&self) -> Option<&str> {
        let from_kernelspec = self
            .metadata
            .get("kernelspec")
            .and_then(|kernelspec| kernelspec.get("language"))
            .and_then(Value::as_str);
        from_kernelspec.or_else(|| {
            self.metadata
                .get("language_info")
                .and_then(|info| info.get("name"))
                .and_then(Value::as_str)
        })
    }

    pub fn has_setup_cell(&self) -> bool {
        self.cells.first().is_some_and(|cell| {
            cell.metadata.get(SETUP_MARKER).and_then(Value::as_bool) == Some(true)
        })
    }

    /// Prepend the hidden cell that switches plotting libraries to static rendering.
    pub fn inject_plotting_setup(&mut self) -> SetupInjection {
        if self.has_setup_cell() {
            return SetupInjection::AlreadyPresent;
        }
        if let Some(language) = self.language() {
            if !language.eq_ignore_ascii_case("python") {
                return SetupInjection::SkippedLanguage(language.to_string());
            }
        }
        let with_id = self.nbformat_minor >= FIRST_MINOR_WITH_IDS;
        self.cells.insert(0, setup_cell(with_id));
        SetupInjection::Inserted
    }
}

/// Version fields only, read before the full document so pre-v4 layouts fail clearly.
#[derive(Deserialize)]
struct Header {
    nbformat: u32,
    #[serde(default)]
    nbformat_minor: u32,
}

fn parse_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Parse)
        .with_message(format!("invalid notebook JSON: {err}"))
        .with_source(err)
}

fn setup_cell(with_id: bool) -> Cell {
    let mut metadata = Map::new();
    metadata.insert(SETUP_MARKER.to_string(), json!(true));
    metadata.insert("tags".to_string(), json!([REMOVE_CELL_TAG]));
    metadata.insert("editable".to_string(), json!(false));
    metadata.insert("deletable".to_string(), json!(false));
    metadata.insert(
        "jupyter".to_string(),
        json!({ "source_hidden": true, "outputs_hidden": true }),
    );

    let mut extra = Map::new();
    extra.insert("execution_count".to_string(), Value::Null);
    extra.insert("outputs".to_string(), json!([]));

    Cell {
        cell_type: CellType::Code,
        id: with_id.then(|| SETUP_CELL_ID.to_string()),
        metadata,
        source: Source::Text(SETUP_SOURCE.to_string()),
        extra,
    }
}
