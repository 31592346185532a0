pub mod dbf;
pub mod geojson;
pub mod shp;

use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::model::Feature;
use crate::resolver::{ResolvedInput, SourceFormat};

pub use dbf::DbfReader;
pub use geojson::parse_geojson;
pub use shp::ShapeReader;

/// Parser の結果。デコード失敗も明示的な分岐として返す
#[derive(Debug)]
pub enum ParseOutcome {
    Features(Vec<Feature>),
    /// デコードに失敗した。dataFormat に付ける注記を持つ
    Degraded(&'static str),
    /// 構造を読まない形式（ラスター・未対応形式）
    PassThrough,
}

pub fn parse(input: &ResolvedInput) -> ParseOutcome {
    match input.format {
        SourceFormat::GeoJson => match parse_geojson(&input.primary) {
            Ok(features) => ParseOutcome::Features(features),
            Err(e) => {
                warn!("Failed to parse GeoJSON {}: {}", input.original_file_name, e);
                ParseOutcome::Degraded("invalid JSON")
            }
        },
        SourceFormat::Shapefile | SourceFormat::ZippedShapefile => {
            match read_shapefile(&input.primary, input.attributes.as_deref()) {
                Ok(features) => ParseOutcome::Features(features),
                Err(e) => {
                    warn!("Failed to decode {}: {}", input.original_file_name, e);
                    ParseOutcome::Degraded(e.tag())
                }
            }
        }
        SourceFormat::CorruptArchive => ParseOutcome::Degraded("corrupted"),
        SourceFormat::Raster | SourceFormat::Unsupported => ParseOutcome::PassThrough,
    }
}

/// .shp と（あれば）.dbf を同時に読み進め、位置で属性を対応付ける
pub fn read_shapefile(shp: &[u8], dbf: Option<&[u8]>) -> Result<Vec<Feature>, DecodeError> {
    let shapes = ShapeReader::new(shp)?;
    debug!("Shapefile header: {:?}", shapes.header());

    let mut records = match dbf {
        Some(bytes) => Some(DbfReader::new(bytes)?),
        None => None,
    };

    let mut features = Vec::new();
    for shape in shapes {
        let geometry = shape?;
        let attributes = match records.as_mut().and_then(|r| r.next()) {
            Some(record) => record?,
            None => Vec::new(),
        };
        features.push(Feature {
            geometry,
            attributes,
        });
    }

    Ok(features)
}
