use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::inference::DEFAULT_TOPIC_CATEGORY;
use crate::model::{BoundingBox, ExtractionResult, GeometryType, InferredFields, DEFAULT_CRS};

/// レコード生成時の既定値
#[derive(Debug, Clone)]
pub struct RecordDefaults {
    pub language: String,
    pub character_set: String,
    pub hierarchy_level: String,
    pub metadata_standard_name: String,
    pub metadata_standard_version: String,
    pub national_standard_name: String,
    pub national_standard_version: String,
    pub topic_category: String,
    pub coordinate_system: String,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            language: "ind".to_string(),
            character_set: "utf8".to_string(),
            hierarchy_level: "dataset".to_string(),
            metadata_standard_name: "ISO 19115:2003/19139".to_string(),
            metadata_standard_version: "1.0".to_string(),
            national_standard_name: "SNI ISO 19115:2019".to_string(),
            national_standard_version: "2019".to_string(),
            topic_category: DEFAULT_TOPIC_CATEGORY.to_string(),
            coordinate_system: DEFAULT_CRS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponsibleParty {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Option<String>,
}

impl ResponsibleParty {
    pub fn is_empty(&self) -> bool {
        [
            &self.name,
            &self.organization,
            &self.position,
            &self.email,
            &self.phone,
            &self.address,
        ]
        .iter()
        .all(|v| present(v).is_none())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identification {
    pub title: String,
    pub alternate_title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub purpose: Option<String>,
    pub status: Option<String>,
    pub citation_date: Option<NaiveDate>,
    pub keywords: Vec<String>,
    pub topic_category: Option<String>,
    pub spatial_resolution: Option<String>,
    pub attribute_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpatialInfo {
    pub bounding_box: BoundingBox,
    pub coordinate_system: String,
    pub geometry_type: GeometryType,
    pub feature_count: u64,
    pub extent_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemporalExtent {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Distribution {
    pub format: Option<String>,
    pub format_version: Option<String>,
    pub online_resource: Option<String>,
    pub transfer_size: Option<u64>,
    pub transfer_options: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataQuality {
    pub lineage: Option<String>,
    pub positional_accuracy: Option<String>,
    pub completeness: Option<String>,
    pub logical_consistency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    pub use_limitation: Option<String>,
    pub access_constraints: Option<String>,
    pub other_constraints: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NationalProfile {
    pub compliant: bool,
    pub standard_name: String,
    pub standard_version: String,
    pub language_code: String,
}

/// Serializer が読む統合メタデータレコード。Serializer からは変更しない
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataRecord {
    pub file_identifier: String,
    pub parent_identifier: Option<String>,
    pub language: String,
    pub character_set: String,
    pub hierarchy_level: String,
    pub hierarchy_level_name: Option<String>,
    pub date_stamp: Option<NaiveDate>,
    pub metadata_standard_name: String,
    pub metadata_standard_version: String,
    pub identification: Identification,
    pub spatial: SpatialInfo,
    pub temporal: TemporalExtent,
    pub contact: ResponsibleParty,
    pub metadata_contact: ResponsibleParty,
    pub distribution: Distribution,
    pub quality: DataQuality,
    pub constraints: Constraints,
    pub national_profile: NationalProfile,
    pub original_file_name: String,
    pub data_format: String,
}

impl MetadataRecord {
    /// 抽出結果と推定値から初期レコードを作る
    pub fn from_extraction(
        result: &ExtractionResult,
        inferred: &InferredFields,
        defaults: &RecordDefaults,
    ) -> Self {
        let coordinate_system = if result.coordinate_system.is_empty() {
            defaults.coordinate_system.clone()
        } else {
            result.coordinate_system.clone()
        };

        Self {
            file_identifier: file_identifier(&result.layer_name, result.file_size),
            parent_identifier: None,
            language: defaults.language.clone(),
            character_set: defaults.character_set.clone(),
            hierarchy_level: defaults.hierarchy_level.clone(),
            hierarchy_level_name: None,
            date_stamp: Some(Utc::now().date_naive()),
            metadata_standard_name: defaults.metadata_standard_name.clone(),
            metadata_standard_version: defaults.metadata_standard_version.clone(),
            identification: Identification {
                title: inferred.inferred_title.clone().unwrap_or_default(),
                alternate_title: None,
                abstract_text: inferred.inferred_abstract.clone().unwrap_or_default(),
                purpose: None,
                status: Some("completed".to_string()),
                citation_date: None,
                keywords: inferred.inferred_descriptive_keywords.clone(),
                topic_category: inferred
                    .inferred_topic_category
                    .clone()
                    .or_else(|| Some(defaults.topic_category.clone())),
                spatial_resolution: inferred.inferred_spatial_resolution.clone(),
                attribute_description: inferred.inferred_attribute_description.clone(),
            },
            spatial: SpatialInfo {
                bounding_box: result.bounding_box,
                coordinate_system,
                geometry_type: result.geometry_type,
                feature_count: result.feature_count,
                extent_description: inferred.inferred_extent.clone(),
            },
            temporal: TemporalExtent::default(),
            contact: ResponsibleParty {
                role: Some("pointOfContact".to_string()),
                ..Default::default()
            },
            metadata_contact: ResponsibleParty {
                role: Some("author".to_string()),
                ..Default::default()
            },
            distribution: Distribution {
                format: inferred.inferred_resource_format.clone(),
                transfer_size: Some(result.file_size).filter(|s| *s > 0),
                ..Default::default()
            },
            quality: DataQuality::default(),
            constraints: Constraints::default(),
            national_profile: NationalProfile {
                compliant: true,
                standard_name: defaults.national_standard_name.clone(),
                standard_version: defaults.national_standard_version.clone(),
                language_code: defaults.language.clone(),
            },
            original_file_name: result.original_file_name.clone(),
            data_format: result.data_format.clone(),
        }
    }

    /// 利用者の編集（部分的な JSON オブジェクト）を重ねる。`null` は上書きしない
    pub fn with_overrides(self, overrides: &Value) -> Result<Self> {
        let mut base = serde_json::to_value(&self)?;
        merge(&mut base, overrides);
        Ok(serde_json::from_value(base)?)
    }
}

fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                match base.get_mut(key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

fn file_identifier(layer_name: &str, file_size: u64) -> String {
    let slug: String = layer_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    if slug.is_empty() {
        format!("dataset-{}-{}", stamp, file_size)
    } else {
        format!("{}-{}-{}", slug, stamp, file_size)
    }
}

/// 空白のみの文字列は未入力とみなす
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::infer;
    use serde_json::json;

    fn sample() -> MetadataRecord {
        let mut result = ExtractionResult::empty("batas_desa", "batas_desa.zip", 2048, "Shapefile (ZIP)");
        result.feature_count = 10;
        result.geometry_type = GeometryType::Polygon;
        result.bounding_box = BoundingBox::new(106.0, -7.0, 107.0, -6.0);
        let inferred = infer(&result);
        MetadataRecord::from_extraction(&result, &inferred, &RecordDefaults::default())
    }

    #[test]
    fn test_from_extraction_uses_inferred_defaults() {
        let record = sample();
        assert_eq!(record.identification.title, "Batas Desa");
        assert_eq!(record.spatial.feature_count, 10);
        assert_eq!(record.spatial.coordinate_system, "EPSG:4326");
        assert_eq!(record.distribution.format.as_deref(), Some("Shapefile (ZIP)"));
        assert_eq!(record.distribution.transfer_size, Some(2048));
        assert_eq!(record.language, "ind");
        assert!(record.file_identifier.starts_with("batas-desa-"));
        assert!(record.national_profile.compliant);
    }

    #[test]
    fn test_overrides_win_and_null_keeps_value() {
        let record = sample();
        let overrides = json!({
            "identification": {"title": "Batas Desa Jawa Barat", "purpose": null},
            "contact": {"name": "Siti", "email": "siti@example.go.id"},
            "temporal": {"start": "2020-01-01"}
        });
        let edited = record.clone().with_overrides(&overrides).unwrap();
        assert_eq!(edited.identification.title, "Batas Desa Jawa Barat");
        assert_eq!(edited.identification.abstract_text, record.identification.abstract_text);
        assert_eq!(edited.contact.name.as_deref(), Some("Siti"));
        assert_eq!(edited.contact.role.as_deref(), Some("pointOfContact"));
        assert_eq!(edited.temporal.start, NaiveDate::from_ymd_opt(2020, 1, 1));
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = sample();
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.contains("\"abstract\""));
        let back: MetadataRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_responsible_party_emptiness() {
        let mut party = ResponsibleParty {
            role: Some("author".into()),
            ..Default::default()
        };
        assert!(party.is_empty());
        party.email = Some("  ".into());
        assert!(party.is_empty());
        party.organization = Some("BIG".into());
        assert!(!party.is_empty());
    }
}
