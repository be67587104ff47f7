//! Output sinks: where the run's write-only outputs go.
//!
//! The driver never opens files itself. It asks an [`OutputSinks`] value for
//! a writer per output, so a run can target real files ([`FileSinks`]) or
//! in-memory buffers ([`MemorySinks`]) without changing the loop.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use crate::config::FilesConfig;

/// Errors raised when an output cannot be opened.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The named output could not be opened.
    #[error("failed to open {name} at {}: {source}", path.display())]
    Open {
        /// Which output was requested.
        name: String,
        /// Where it was to be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Factory for every output the run writes.
pub trait OutputSinks {
    /// Debug trace, open for the whole run.
    fn debug_trace(&self) -> Result<Box<dyn Write>, SinkError>;

    /// Supply/demand CSV trace, open for the whole run.
    fn supply_demand_trace(&self) -> Result<Box<dyn Write>, SinkError>;

    /// Dependency graph for one period.
    fn dependency_graph(&self, period: usize) -> Result<Box<dyn Write>, SinkError>;

    /// Sector dependency report.
    fn sector_dependencies(&self) -> Result<Box<dyn Write>, SinkError>;

    /// Climate model input file.
    fn climate_data(&self) -> Result<Box<dyn Write>, SinkError>;

    /// Serialized scenario written after the run.
    fn scenario_output(&self) -> Result<Box<dyn Write>, SinkError>;

    /// Path handed to the climate model, if the climate data lands on disk.
    fn climate_data_path(&self) -> Option<PathBuf>;
}

/// File name of one period's dependency graph: `<base>_<period>.dot`.
pub fn graph_file_name(base: &str, period: usize) -> String {
    format!("{base}_{period}.dot")
}

/// Buffered files under `files.output_dir`.
#[derive(Debug, Clone)]
pub struct FileSinks {
    files: FilesConfig,
}

impl FileSinks {
    /// Create sinks that write under the configured output directory.
    pub fn new(files: &FilesConfig) -> Self {
        Self {
            files: files.clone(),
        }
    }

    fn open(&self, name: &str, file_name: &str) -> Result<Box<dyn Write>, SinkError> {
        let path = self.files.output_dir.join(file_name);
        match File::create(&path) {
            Ok(file) => Ok(Box::new(BufWriter::new(file))),
            Err(source) => Err(SinkError::Open {
                name: name.to_owned(),
                path,
                source,
            }),
        }
    }
}

impl OutputSinks for FileSinks {
    fn debug_trace(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("debug trace", &self.files.xml_debug_file_name)
    }

    fn supply_demand_trace(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("supply/demand trace", &self.files.sd_curve_file_name)
    }

    fn dependency_graph(&self, period: usize) -> Result<Box<dyn Write>, SinkError> {
        self.open(
            "dependency graph",
            &graph_file_name(&self.files.dependency_graph_name, period),
        )
    }

    fn sector_dependencies(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("sector dependencies", &self.files.sector_dependencies_file_name)
    }

    fn climate_data(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("climate data", &self.files.climate_data_file_name)
    }

    fn scenario_output(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("scenario output", &self.files.xml_output_file_name)
    }

    fn climate_data_path(&self) -> Option<PathBuf> {
        Some(self.files.output_dir.join(&self.files.climate_data_file_name))
    }
}

type Buffers = Rc<RefCell<BTreeMap<String, Vec<u8>>>>;

/// In-memory outputs keyed by file name, shared between the sinks and
/// every writer they hand out.
#[derive(Debug, Clone, Default)]
pub struct MemorySinks {
    files: FilesConfig,
    buffers: Buffers,
    failing: BTreeSet<String>,
}

impl MemorySinks {
    /// Create in-memory sinks that name their buffers like [`FileSinks`]
    /// would name its files.
    pub fn new(files: &FilesConfig) -> Self {
        Self {
            files: files.clone(),
            buffers: Rc::default(),
            failing: BTreeSet::new(),
        }
    }

    /// Make every later attempt to open `file_name` fail.
    #[must_use]
    pub fn fail_on(mut self, file_name: impl Into<String>) -> Self {
        self.failing.insert(file_name.into());
        self
    }

    /// Everything written to `file_name` so far, as UTF-8 text.
    pub fn contents(&self, file_name: &str) -> Option<String> {
        self.buffers
            .borrow()
            .get(file_name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Names of every output opened so far.
    pub fn names(&self) -> Vec<String> {
        self.buffers.borrow().keys().cloned().collect()
    }

    fn open(&self, name: &str, file_name: &str) -> Result<Box<dyn Write>, SinkError> {
        if self.failing.contains(file_name) {
            return Err(SinkError::Open {
                name: name.to_owned(),
                path: PathBuf::from(file_name),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "sink disabled"),
            });
        }
        self.buffers
            .borrow_mut()
            .insert(file_name.to_owned(), Vec::new());
        Ok(Box::new(MemoryWriter {
            file_name: file_name.to_owned(),
            buffers: Rc::clone(&self.buffers),
        }))
    }
}

impl OutputSinks for MemorySinks {
    fn debug_trace(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("debug trace", &self.files.xml_debug_file_name)
    }

    fn supply_demand_trace(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("supply/demand trace", &self.files.sd_curve_file_name)
    }

    fn dependency_graph(&self, period: usize) -> Result<Box<dyn Write>, SinkError> {
        self.open(
            "dependency graph",
            &graph_file_name(&self.files.dependency_graph_name, period),
        )
    }

    fn sector_dependencies(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("sector dependencies", &self.files.sector_dependencies_file_name)
    }

    fn climate_data(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("climate data", &self.files.climate_data_file_name)
    }

    fn scenario_output(&self) -> Result<Box<dyn Write>, SinkError> {
        self.open("scenario output", &self.files.xml_output_file_name)
    }

    fn climate_data_path(&self) -> Option<PathBuf> {
        Some(PathBuf::from(&self.files.climate_data_file_name))
    }
}

struct MemoryWriter {
    file_name: String,
    buffers: Buffers,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffers
            .borrow_mut()
            .entry(self.file_name.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
