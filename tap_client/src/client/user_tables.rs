//! User space table management (TAP+ upload and table edit services).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use log::info;

use super::plus::TapPlus;
use crate::conn::{
    check_response_status, encode_multipart, url_encode, HttpResponse, MultipartFile,
    CONTENT_TYPE_FORM,
};
use crate::error::{ErrorContext, TapError, TapResult};
use crate::model::{ColumnFlag, Job, TapColumn, TapTable};

/// Table to upload to the user space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// Local file, sent as the `FILE` part.
    File(PathBuf),
    /// Remote resource fetched by the server.
    Url(String),
    /// In-memory content with the file name used for the `FILE` part.
    Bytes { file_name: String, content: Vec<u8> },
}

impl UploadSource {
    fn name(&self) -> String {
        match self {
            UploadSource::File(path) => path.to_string_lossy().into_owned(),
            UploadSource::Url(url) => url.clone(),
            UploadSource::Bytes { file_name, .. } => file_name.clone(),
        }
    }

    /// Upload format implied by the resource extension.
    pub fn guess_format(&self) -> Option<&'static str> {
        let name = self.name().to_ascii_lowercase();
        let name = name.split('?').next().unwrap_or_default();
        if name.ends_with(".vot") || name.ends_with(".votable") || name.ends_with(".xml") {
            Some("VOTable")
        } else if name.ends_with(".csv") {
            Some("CSV")
        } else if name.ends_with(".fits") || name.ends_with(".fit") {
            Some("FITS")
        } else if name.ends_with(".json") {
            Some("JSON")
        } else {
            None
        }
    }
}

/// Column metadata field changed by [`TapPlus::update_user_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnField {
    Utype,
    Ucd,
    Flags,
    Indexed,
}

impl ColumnField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnField::Utype => "utype",
            ColumnField::Ucd => "ucd",
            ColumnField::Flags => "flags",
            ColumnField::Indexed => "indexed",
        }
    }
}

impl FromStr for ColumnField {
    type Err = TapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "utype" => Ok(ColumnField::Utype),
            "ucd" => Ok(ColumnField::Ucd),
            "flags" => Ok(ColumnField::Flags),
            "indexed" => Ok(ColumnField::Indexed),
            _ => Err(TapError::invalid_argument(
                "Position 2 of all changes must be 'utype', 'ucd', 'flags' or 'indexed'",
            )),
        }
    }
}

impl fmt::Display for ColumnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value of one metadata field of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChange {
    pub column: String,
    pub field: ColumnField,
    pub value: String,
}

impl ColumnChange {
    pub fn new(column: impl Into<String>, field: ColumnField, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            field,
            value: value.into(),
        }
    }

    /// Build a change from `[column_name, field_name, value]`.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> TapResult<Self> {
        let [column, field, value] = parts else {
            return Err(TapError::invalid_argument(
                "All of the changes must have three elements: [column_name, field_name, value]",
            ));
        };
        Ok(Self::new(column.as_ref(), field.as_ref().parse()?, value.as_ref()))
    }

    fn sets_flag(&self, flag: ColumnFlag) -> bool {
        self.field == ColumnField::Flags && self.value.parse::<ColumnFlag>().ok() == Some(flag)
    }
}

/// Per column values sent to the table edit service.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnEdit {
    name: String,
    flags: Option<String>,
    indexed: bool,
    ucd: String,
    utype: String,
}

impl ColumnEdit {
    fn from_column(column: &TapColumn) -> Self {
        Self {
            name: column.name.clone(),
            flags: column.column_flag().map(|f| f.as_str().to_string()),
            indexed: column.is_indexed(),
            ucd: column.ucd.clone().unwrap_or_default(),
            utype: column.utype.clone().unwrap_or_default(),
        }
    }

    fn apply(&mut self, change: &ColumnChange) {
        match change.field {
            ColumnField::Flags => self.flags = Some(change.value.clone()),
            ColumnField::Indexed => self.indexed = change.value.eq_ignore_ascii_case("true"),
            ColumnField::Ucd => self.ucd = change.value.clone(),
            ColumnField::Utype => self.utype = change.value.clone(),
        }
    }

    fn forces_index(&self) -> bool {
        self.flags
            .as_deref()
            .and_then(|f| f.parse::<ColumnFlag>().ok())
            .is_some_and(|f| f.forces_index())
    }
}

fn title_case_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Check the changes against the current table and build the edit request.
fn build_table_edit(
    table_name: &str,
    table: &TapTable,
    changes: &[ColumnChange],
) -> TapResult<Vec<(String, String)>> {
    if table.columns.is_empty() {
        return Err(TapError::invalid_argument("Table has no columns"));
    }
    if let Some(missing) = changes.iter().find(|c| table.column(&c.column).is_none()) {
        return Err(TapError::invalid_argument(format!(
            "Column name introduced {} was not found in the table",
            missing.column
        )));
    }

    let current_ra = table.column_with_flag(ColumnFlag::Ra);
    let current_dec = table.column_with_flag(ColumnFlag::Dec);
    let new_ra = changes.iter().any(|c| c.sets_flag(ColumnFlag::Ra));
    let new_dec = changes.iter().any(|c| c.sets_flag(ColumnFlag::Dec));

    match (current_ra, current_dec) {
        (None, None) if new_ra != new_dec => {
            return Err(TapError::invalid_argument(
                "Both Ra and Dec must be specified when updating one of them.",
            ));
        }
        (None, Some(_)) | (Some(_), None) => {
            return Err(TapError::invalid_argument(
                "One of (Ra, Dec) is not present but the other is. Wrong initial configuration of the table.",
            ));
        }
        (Some(_), Some(_)) if new_ra || new_dec => {
            return Err(TapError::invalid_argument(
                "Both Ra and Dec are already present in this table. Only one of each is allowed.",
            ));
        }
        _ => {}
    }

    let mut args = vec![
        ("ACTION".to_string(), "edit".to_string()),
        ("NUMTABLES".to_string(), "1".to_string()),
        ("TABLE0_NUMCOLS".to_string(), table.columns.len().to_string()),
        ("TABLE0".to_string(), table_name.to_string()),
    ];
    for (i, column) in table.columns.iter().enumerate() {
        let mut edit = ColumnEdit::from_column(column);
        for change in changes.iter().filter(|c| c.column == column.name) {
            edit.apply(change);
        }
        if edit.forces_index() {
            edit.indexed = true;
        }
        let prefix = format!("TABLE0_COL{}", i);
        args.push((prefix.clone(), edit.name));
        args.push((
            format!("{}_FLAGS", prefix),
            edit.flags.unwrap_or_else(|| "None".to_string()),
        ));
        args.push((
            format!("{}_INDEXED", prefix),
            title_case_bool(edit.indexed).to_string(),
        ));
        args.push((format!("{}_UCD", prefix), edit.ucd));
        args.push((format!("{}_UTYPE", prefix), edit.utype));
    }
    Ok(args)
}

impl TapPlus {
    /// Upload a table to the user space.
    ///
    /// The format is guessed from the resource extension when not given and
    /// defaults to VOTable.
    pub async fn upload_table(
        &self,
        source: UploadSource,
        table_name: &str,
        description: Option<&str>,
        format: Option<&str>,
    ) -> TapResult<HttpResponse> {
        if table_name.trim().is_empty() {
            return Err(TapError::invalid_argument(
                "Missing mandatory argument 'table_name'",
            ));
        }
        let format = format
            .or_else(|| source.guess_format())
            .unwrap_or("VOTable");
        let description = description.unwrap_or_default();
        let mut fields = vec![
            ("TASKID", "1"),
            ("TABLE_NAME", table_name),
            ("TABLE_DESC", description),
            ("FORMAT", format),
        ];

        let file = match &source {
            UploadSource::File(path) => {
                let content = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read table file {}", path.display()))?;
                MultipartFile::new("FILE", file_name_of(path), content)
            }
            UploadSource::Url(url) => {
                fields.push(("URL", url.as_str()));
                MultipartFile::new("FILE", "", Vec::new())
            }
            UploadSource::Bytes { file_name, content } => {
                MultipartFile::new("FILE", file_name.as_str(), content.clone())
            }
        };

        let (content_type, body) = encode_multipart(&fields, &[file]);
        let response = self.conn().execute_upload(&content_type, body).await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new("upload_table")
                .with_entity("table")
                .with_entity_id(table_name),
        )?;
        info!("Uploaded table '{}'", table_name);
        Ok(response)
    }

    /// Create the user table `t<jobid>` from the results of a job.
    pub async fn upload_table_from_job(&self, job: &Job) -> TapResult<HttpResponse> {
        let jobid = job
            .jobid()
            .ok_or_else(|| TapError::invalid_argument("Missing mandatory argument 'job'"))?;
        let table_name = format!("t{}", jobid);
        let fields = [
            ("TASKID", "1"),
            ("JOBID", jobid),
            ("TABLE_NAME", table_name.as_str()),
            ("TABLE_DESC", job.query().unwrap_or_default()),
        ];
        let (content_type, body) =
            encode_multipart(&fields, &[MultipartFile::new("FILE", "", Vec::new())]);
        let response = self.conn().execute_upload(&content_type, body).await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new("upload_table_from_job")
                .with_entity("job")
                .with_entity_id(jobid),
        )?;
        info!("Created table '{}' from job {}", table_name, jobid);
        Ok(response)
    }

    /// Same as [`upload_table_from_job`](Self::upload_table_from_job), loading
    /// the job first.
    pub async fn upload_table_from_jobid(&self, jobid: &str) -> TapResult<HttpResponse> {
        let job = self.load_async_job(jobid).await?;
        self.upload_table_from_job(&job).await
    }

    pub async fn delete_user_table(
        &self,
        table_name: &str,
        force_removal: bool,
    ) -> TapResult<HttpResponse> {
        if table_name.trim().is_empty() {
            return Err(TapError::invalid_argument("Table name cannot be null"));
        }
        let data = url_encode(&[
            ("TABLE_NAME", table_name),
            ("DELETE", "TRUE"),
            ("FORCE_REMOVAL", if force_removal { "TRUE" } else { "FALSE" }),
        ]);
        let response = self
            .conn()
            .execute_upload(CONTENT_TYPE_FORM, data.into_bytes())
            .await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new("delete_user_table")
                .with_entity("table")
                .with_entity_id(table_name),
        )?;
        info!("Deleted table '{}'", table_name);
        Ok(response)
    }

    /// Edit column metadata of a user table.
    ///
    /// Every column is sent back with its current metadata merged with the
    /// changes. Setting `Ra`, `Dec` or `PK` forces the column to be indexed.
    pub async fn update_user_table(
        &self,
        table_name: &str,
        changes: &[ColumnChange],
    ) -> TapResult<HttpResponse> {
        if table_name.trim().is_empty() {
            return Err(TapError::invalid_argument("Table name cannot be null"));
        }
        if changes.is_empty() {
            return Err(TapError::invalid_argument("List of changes cannot be empty"));
        }
        let context = ErrorContext::new("update_user_table")
            .with_entity("table")
            .with_entity_id(table_name);
        let table = match self.load_table(table_name).await {
            Ok(table) => table,
            Err(TapError::Parse { .. }) => {
                return Err(TapError::invalid_argument("Table name not found"))
            }
            Err(e) => return Err(e),
        };

        let args = build_table_edit(table_name, &table, changes)?;
        let response = self.conn().execute_table_edit(&url_encode(&args)).await?;
        check_response_status(&response, 200, context)?;
        info!("Updated table '{}' ({} changes)", table_name, changes.len());
        Ok(response)
    }

    /// Flag the position columns of a user table.
    pub async fn set_ra_dec_columns(
        &self,
        table_name: &str,
        ra_column: &str,
        dec_column: &str,
    ) -> TapResult<HttpResponse> {
        if table_name.trim().is_empty() {
            return Err(TapError::invalid_argument("Table name cannot be null"));
        }
        if ra_column.trim().is_empty() || dec_column.trim().is_empty() {
            return Err(TapError::invalid_argument(
                "Both Ra and Dec column names are mandatory",
            ));
        }
        let data = url_encode(&[
            ("ACTION", "radec"),
            ("TABLE_NAME", table_name),
            ("RA", ra_column),
            ("DEC", dec_column),
        ]);
        let response = self.conn().execute_table_edit(&data).await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new("set_ra_dec_columns")
                .with_entity("table")
                .with_entity_id(table_name),
        )?;
        info!(
            "Table '{}' position columns set to ({}, {})",
            table_name, ra_column, dec_column
        );
        Ok(response)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
