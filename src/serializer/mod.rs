pub mod json;
pub mod tree;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, Result};
use crate::record::MetadataRecord;

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Iso19139,
    SniJson,
    SniXml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::Iso19139, Self::SniJson, Self::SniXml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iso19139 => "iso19139",
            Self::SniJson => "sni-json",
            Self::SniXml => "sni-xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Iso19139 | Self::SniXml => "xml",
            Self::SniJson => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Iso19139 | Self::SniXml => "application/xml",
            Self::SniJson => "application/json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso19139" => Ok(Self::Iso19139),
            "sni-json" => Ok(Self::SniJson),
            "sni-xml" => Ok(Self::SniXml),
            other => Err(Error::UnknownOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// レコードを指定形式の文書にする。検証は呼び出し側で済ませておくこと
pub fn serialize(record: &MetadataRecord, format: OutputFormat) -> Result<String> {
    debug!("Serializing {} as {}", record.file_identifier, format);
    match format {
        OutputFormat::Iso19139 => tree::render(&xml::build(record, &xml::ISO19139)),
        OutputFormat::SniXml => tree::render(&xml::build(record, &xml::SNI_XML)),
        OutputFormat::SniJson => Ok(serde_json::to_string_pretty(&json::build(record))?),
    }
}

/// ダウンロード時のファイル名
pub fn file_name(record: &MetadataRecord, format: OutputFormat) -> String {
    let id = match record.file_identifier.trim() {
        "" => "metadata",
        id => id,
    };
    match format {
        OutputFormat::Iso19139 => format!("{}.{}", id, format.extension()),
        OutputFormat::SniJson | OutputFormat::SniXml => {
            format!("{}_sni.{}", id, format.extension())
        }
    }
}
