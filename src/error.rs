use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// 付随ファイル（.dbf / .prj など）だけがアップロードされた
    #[error(
        "shapefile bundle is incomplete: {found} uploaded without a .shp file; \
         upload the .shp together with its .dbf/.prj or as a single .zip"
    )]
    BundleIncomplete { found: String },

    #[error("archive '{archive}' does not contain a .shp file")]
    MissingPrimaryMember { archive: String },

    #[error("no files were uploaded")]
    EmptyUpload,

    #[error("failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown output format '{0}' (expected iso19139, sni-json or sni-xml)")]
    UnknownOutputFormat(String),

    #[error("fallback extraction failed: {0}")]
    Fallback(String),
}

/// バイナリ形式（.shp / .dbf）のデコードエラー。
///
/// 抽出段階の外には出さず、`tag()` で dataFormat の注記に変換する。
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid file code {0} (expected 9994)")]
    InvalidFileCode(i32),

    #[error("unsupported shapefile version {0} (expected 1000)")]
    UnsupportedVersion(i32),

    #[error("unknown shape type {0}")]
    UnknownShapeType(i32),

    #[error("unexpected end of data while reading {0}")]
    Truncated(&'static str),

    #[error("invalid attribute table: {0}")]
    InvalidAttributeTable(String),
}

impl DecodeError {
    pub fn tag(&self) -> &'static str {
        match self {
            DecodeError::InvalidFileCode(_) | DecodeError::Truncated(_) => "corrupted",
            DecodeError::UnsupportedVersion(_) => "unsupported version",
            DecodeError::UnknownShapeType(_) => "unsupported shape type",
            DecodeError::InvalidAttributeTable(_) => "corrupted attribute table",
        }
    }
}
