pub mod error;
pub mod config;
pub mod path;
pub mod wait;
pub mod export;
pub mod warehouse;
pub mod pipeline;

pub use error::{Ds2BqError, Result, BigQueryError, DatastoreError};
pub use config::{PipelineConfig, ConfigOverrides};
pub use path::{ExportTimestamp, NamespaceScope, source_uri, source_uri_in};
pub use wait::{WaitOptions, WaitConfig, bounded};
pub use export::{ExportEntities, ExportRequest, ExportResponse, EntityFilter, DatastoreAdminClient, Credentials};
pub use warehouse::{BqClient, DeleteTable, LoadFromUri, LoadRequest, LoadOutcome, SourceFormat};
pub use pipeline::{Pipeline, PipelineReport, Plan, DeleteOutcome, StepRow, StepTimings};
