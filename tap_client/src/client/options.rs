//! Options shared by job launching operations.

use std::path::PathBuf;

use crate::results::OutputFormat;

/// How a query job is launched and where its results go.
///
/// ```
/// use tap_client::client::JobOptions;
/// use tap_client::OutputFormat;
///
/// let options = JobOptions::new()
///     .with_name("bright_stars")
///     .with_format(OutputFormat::Csv)
///     .dump_to_file(true);
/// assert_eq!(options.name.as_deref(), Some("bright_stars"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Job name, sent as `jobname`.
    pub name: Option<String>,
    /// Result file. A name is generated when unset.
    pub output_file: Option<PathBuf>,
    pub output_format: OutputFormat,
    /// Write the results to `output_file` instead of keeping them in memory.
    pub dump_to_file: bool,
    /// Return an asynchronous job as soon as it is accepted.
    pub background: bool,
    /// Local table sent along with the query.
    pub upload_resource: Option<PathBuf>,
    /// Name under which the uploaded table is referenced (`TAP_UPLOAD.<name>`).
    pub upload_table_name: Option<String>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<OutputFormat>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn dump_to_file(mut self, dump: bool) -> Self {
        self.dump_to_file = dump;
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn with_upload(mut self, resource: impl Into<PathBuf>, table_name: impl Into<String>) -> Self {
        self.upload_resource = Some(resource.into());
        self.upload_table_name = Some(table_name.into());
        self
    }
}
