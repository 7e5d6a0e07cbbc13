//! OLTP to OLAP star-schema pipeline
//!
//! Extract reads the operational tables, transform reshapes them into four
//! dimensions and one fact, load upserts the result into the warehouse.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;
pub mod table;
pub mod transform;

pub use config::Config;
pub use error::{EtlError, Result};
pub use report::RunSummary;
pub use source::SourceConnector;
pub use store::Warehouse;
