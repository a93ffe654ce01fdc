//! Client side of the smart groups service: turns form input into a
//! constraint payload, finds and calls the solver backend, and renders or
//! re-exports the grouping it sends back.

pub mod cli;
pub mod config;
pub mod constraints;
pub mod data;
pub mod error;
pub mod export;
pub mod locator;
pub mod render;
pub mod transport;

pub use constraints::{ConstraintBuilder, ConstraintSpec};
pub use data::{Group, GroupingResult, Student};
pub use error::UploadError;
pub use export::export_csv;
pub use locator::{BackendLocation, LocationSource, ServiceLocator};
pub use transport::{UploadFile, UploadTransport};
