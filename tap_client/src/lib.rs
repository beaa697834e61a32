//! # TAP client
//!
//! Client library for astronomical archives exposed through the IVOA Table
//! Access Protocol (TAP) and the ESA TAP+ extensions.
//!
//! ## Features
//!
//! - **Queries**: synchronous and asynchronous ADQL jobs, cone and box searches
//! - **Job lifecycle**: submission, phase polling, result download and removal
//! - **Metadata**: VOSI table sets, UWS job descriptors and job lists
//! - **TAP+**: data and datalink retrieval, login sessions, user table upload
//!   and edition, table sharing
//!
//! ## Architecture
//!
//! - [`conn`]: endpoints, HTTP transport and the request handler
//! - [`xmlparser`]: streaming parsers of the XML documents returned by the services
//! - [`model`]: tables, jobs, job filters and sharing entities
//! - [`client`]: the [`Tap`] and [`TapPlus`] clients
//! - [`adql`]: query builders
//! - [`config`]: TOML and environment configuration
//!
//! ```no_run
//! use tap_client::{JobOptions, Tap};
//!
//! # async fn run() -> tap_client::TapResult<()> {
//! let tap = Tap::new("https://gea.esac.esa.int/tap-server/tap")?;
//! let job = tap
//!     .launch_job("SELECT TOP 10 * FROM gaiadr3.gaia_source", JobOptions::new())
//!     .await?;
//! println!("{}", job);
//! # Ok(())
//! # }
//! ```

// TapError carries structured context for every HTTP failure
#![allow(clippy::result_large_err)]

pub mod adql;
pub mod client;
pub mod config;
pub mod conn;
pub mod error;
pub mod model;
pub mod results;
pub mod xmlparser;

pub use client::{ColumnChange, ColumnField, JobOptions, Tap, TapPlus, UploadSource};
pub use config::{Credentials, TapConfig};
pub use error::{ErrorContext, TapError, TapResult};
pub use model::{Job, JobFilter, JobPhase, PhaseAction, TapColumn, TapTable};
pub use results::{OutputFormat, QueryResults};
