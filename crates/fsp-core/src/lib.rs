#![deny(missing_docs)]
#![doc = "Core error and provenance types for the fragment-screening pipeline."]

pub mod errors;
pub mod provenance;

pub use errors::{ErrorInfo, FspError};
pub use provenance::RunProvenance;
