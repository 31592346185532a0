pub mod analyzer;
pub mod crs;
pub mod error;
#[cfg(feature = "gdal")]
pub mod fallback;
pub mod inference;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod resolver;
pub mod serializer;
pub mod validator;

pub use error::{Error, Result};
#[cfg(feature = "gdal")]
pub use fallback::GdalExtractor;
pub use model::{BoundingBox, ExtractionResult, GeometryType, InferredFields};
pub use pipeline::{build_record, extract, extract_with_fallback, Extraction, FallbackExtractor};
pub use record::{MetadataRecord, RecordDefaults};
pub use resolver::{collect_uploads, UploadedFile};
pub use serializer::{file_name, serialize, OutputFormat};
pub use validator::{validate, ValidationReport};
