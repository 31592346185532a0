use anyhow::{Context, Result};
use gdal::vector::{geometry_type_to_name, LayerAccess, OGRFieldType};
use gdal::Dataset;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::{Attribute, AttributeType, BoundingBox, ExtractionResult, GeometryType};
use crate::pipeline::FallbackExtractor;
use crate::resolver::{ResolvedInput, SourceFormat};

/// GDAL で開き直して抽出する
#[derive(Default)]
pub struct GdalExtractor {}

impl GdalExtractor {
    pub fn new() -> Self {
        Self {}
    }

    /// 入力を一時ディレクトリに書き出し、GDAL が開けるパスを返す
    fn stage(&self, input: &ResolvedInput, dir: &Path) -> Result<PathBuf> {
        let stem = if input.layer_name.is_empty() {
            "upload"
        } else {
            input.layer_name.as_str()
        };

        let primary = match input.format {
            SourceFormat::Shapefile | SourceFormat::ZippedShapefile => {
                let path = dir.join(format!("{}.shp", stem));
                if let Some(dbf) = &input.attributes {
                    fs::write(dir.join(format!("{}.dbf", stem)), dbf)
                        .context("Failed to stage attribute table")?;
                }
                if let Some(prj) = &input.projection {
                    fs::write(dir.join(format!("{}.prj", stem)), prj)
                        .context("Failed to stage projection")?;
                }
                path
            }
            _ => {
                let name = Path::new(&input.original_file_name)
                    .file_name()
                    .map(|n| n.to_owned())
                    .unwrap_or_else(|| stem.into());
                dir.join(name)
            }
        };

        fs::write(&primary, &input.primary).context("Failed to stage primary member")?;
        Ok(primary)
    }

    fn extract_vector(&self, dataset: &Dataset, input: &ResolvedInput) -> Result<ExtractionResult> {
        let mut layer = dataset.layer(0).context("Dataset has no layer")?;

        let mut result = ExtractionResult::empty(
            input.layer_name.clone(),
            input.original_file_name.clone(),
            input.file_size,
            format!("{} (GDAL)", input.format.tag()),
        );
        result.feature_count = layer.feature_count();

        if let Ok(envelope) = layer.get_extent() {
            result.bounding_box =
                BoundingBox::new(envelope.MinX, envelope.MinY, envelope.MaxX, envelope.MaxY);
        }
        if let Some(srs) = layer.spatial_ref() {
            if let (Ok(name), Ok(code)) = (srs.auth_name(), srs.auth_code()) {
                result.coordinate_system = format!("{}:{}", name, code);
            }
        }

        result.attributes = layer
            .defn()
            .fields()
            .map(|field| Attribute {
                name: field.name(),
                kind: attribute_type(field.field_type()),
            })
            .collect();

        result.geometry_type = layer
            .features()
            .find_map(|feature| feature.geometry().map(|g| g.geometry_type()))
            .map(|ty| {
                let name = geometry_type_to_name(ty).replace("3D ", "").replace(' ', "");
                GeometryType::from_name(&name)
            })
            .unwrap_or_default();

        Ok(result)
    }

    fn extract_raster(&self, dataset: &Dataset, input: &ResolvedInput) -> Result<ExtractionResult> {
        let (width, height) = dataset.raster_size();
        let transform = dataset
            .geo_transform()
            .context("Raster has no geotransform")?;

        let mut result = ExtractionResult::empty(
            input.layer_name.clone(),
            input.original_file_name.clone(),
            input.file_size,
            format!("Raster ({})", dataset.driver().short_name()),
        );
        result.geometry_type = GeometryType::Raster;
        result.feature_count = 1;

        let x0 = transform[0];
        let y0 = transform[3];
        let x1 = x0 + transform[1] * width as f64;
        let y1 = y0 + transform[5] * height as f64;
        result.bounding_box = BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1));

        if let Ok(srs) = dataset.spatial_ref() {
            if let (Ok(name), Ok(code)) = (srs.auth_name(), srs.auth_code()) {
                result.coordinate_system = format!("{}:{}", name, code);
            }
        }

        Ok(result)
    }
}

impl FallbackExtractor for GdalExtractor {
    fn extract(&self, input: &ResolvedInput) -> Result<ExtractionResult> {
        let dir = tempfile::tempdir().context("Failed to create staging directory")?;
        let path = self.stage(input, dir.path())?;
        debug!("Opening {:?} with GDAL", path);

        let dataset =
            Dataset::open(&path).with_context(|| format!("GDAL could not open {:?}", path))?;

        let result = if dataset.layer_count() > 0 {
            self.extract_vector(&dataset, input)?
        } else {
            self.extract_raster(&dataset, input)?
        };

        info!(
            "GDAL extracted {} features from {}",
            result.feature_count, result.original_file_name
        );
        Ok(result)
    }
}

fn attribute_type(kind: u32) -> AttributeType {
    match kind {
        OGRFieldType::OFTInteger | OGRFieldType::OFTInteger64 => AttributeType::Integer,
        OGRFieldType::OFTReal => AttributeType::Real,
        OGRFieldType::OFTDate | OGRFieldType::OFTDateTime => AttributeType::Date,
        _ => AttributeType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{resolve, UploadedFile};
    use gdal::DriverManager;

    fn driver_available(name: &str) -> bool {
        DriverManager::get_driver_by_name(name).is_ok()
    }

    #[test]
    fn test_geojson_through_gdal() {
        if !driver_available("GeoJSON") {
            eprintln!("Skipping test: GeoJSON driver not available");
            return;
        }

        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"kode":1,"nama":"a"},"geometry":{"type":"Point","coordinates":[106.0,-6.0]}},
            {"type":"Feature","properties":{"kode":2,"nama":"b"},"geometry":{"type":"Point","coordinates":[107.0,-7.0]}}
        ]}"#;
        let input = resolve(vec![UploadedFile::new("titik.geojson", text.as_bytes().to_vec())]).unwrap();
        let result = GdalExtractor::new().extract(&input).unwrap();

        assert_eq!(result.feature_count, 2);
        assert_eq!(result.geometry_type, GeometryType::Point);
        assert_eq!(result.bounding_box, BoundingBox::new(106.0, -7.0, 107.0, -6.0));
        assert_eq!(result.attributes.len(), 2);
        assert_eq!(result.attributes[0].kind, AttributeType::Integer);
    }

    #[test]
    fn test_unreadable_input_is_error() {
        let input = resolve(vec![UploadedFile::new("dem.tif", vec![0u8; 8])]).unwrap();
        assert!(GdalExtractor::new().extract(&input).is_err());
    }
}
