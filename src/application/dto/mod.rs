//! Data transfer objects for the application layer.

mod export_dto;

pub use export_dto::{ExportRequest, ExportResponse};
