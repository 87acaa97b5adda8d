#![doc = include_str!("../README.md")]

pub mod detect;
pub mod license;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod schema;

pub use detect::{DetectedFormat, detect, parse_json};
pub use license::parse_license;
pub use normalize::normalize;
pub use pipeline::IngestPipeline;
pub use registry::{SchemaRegistry, SchemaValidator, ValidatedDocument};
