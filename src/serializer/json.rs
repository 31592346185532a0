use chrono::NaiveDate;
use serde_json::{json, Value};

use super::xml::scale_denominator;
use crate::record::{present, MetadataRecord, ResponsibleParty};

/// 国内プロファイルの JSON 表現。キーは常に出力し、未入力は空文字かゼロにする
pub fn build(record: &MetadataRecord) -> Value {
    let ident = &record.identification;
    let spatial = &record.spatial;
    let bbox = &spatial.bounding_box;
    let profile = &record.national_profile;

    json!({
        "sniMetadata": {
            "compliance": {
                "sniCompliant": profile.compliant,
                "standardName": profile.standard_name,
                "standardVersion": profile.standard_version,
                "languageCode": profile.language_code,
            },
            "fileIdentifier": record.file_identifier,
            "parentIdentifier": text(&record.parent_identifier),
            "language": record.language,
            "characterSet": record.character_set,
            "hierarchyLevel": record.hierarchy_level,
            "hierarchyLevelName": text(&record.hierarchy_level_name),
            "dateStamp": date(record.date_stamp),
            "metadataStandard": {
                "name": record.metadata_standard_name,
                "version": record.metadata_standard_version,
            },
            "contact": party(&record.contact, "pointOfContact"),
            "metadataContact": party(&record.metadata_contact, "author"),
            "identificationInfo": {
                "title": ident.title,
                "alternateTitle": text(&ident.alternate_title),
                "abstract": ident.abstract_text,
                "purpose": text(&ident.purpose),
                "status": text(&ident.status),
                "citationDate": date(ident.citation_date.or(record.date_stamp)),
                "keywords": ident
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .collect::<Vec<_>>(),
                "topicCategory": text(&ident.topic_category),
                "spatialResolution": {
                    "scale": text(&ident.spatial_resolution),
                    "denominator": present(&ident.spatial_resolution)
                        .and_then(scale_denominator)
                        .unwrap_or(0)
                        .to_string(),
                },
                "attributeDescription": text(&ident.attribute_description),
            },
            "spatialInfo": {
                "geometryType": spatial.geometry_type.as_str(),
                "featureCount": spatial.feature_count.to_string(),
                "coordinateSystem": spatial.coordinate_system,
                "boundingBox": {
                    "westBoundLongitude": bbox.min_x,
                    "eastBoundLongitude": bbox.max_x,
                    "southBoundLatitude": bbox.min_y,
                    "northBoundLatitude": bbox.max_y,
                },
                "extentDescription": text(&spatial.extent_description),
            },
            "temporalExtent": {
                "startDate": date(record.temporal.start),
                "endDate": date(record.temporal.end),
            },
            "distributionInfo": {
                "format": text(&record.distribution.format),
                "formatVersion": text(&record.distribution.format_version),
                "onlineResource": text(&record.distribution.online_resource),
                "transferOptions": text(&record.distribution.transfer_options),
                "fileSize": record.distribution.transfer_size.unwrap_or(0).to_string(),
                "originalFileName": record.original_file_name,
                "dataFormat": record.data_format,
            },
            "dataQualityInfo": {
                "lineage": text(&record.quality.lineage),
                "positionalAccuracy": text(&record.quality.positional_accuracy),
                "completeness": text(&record.quality.completeness),
                "logicalConsistency": text(&record.quality.logical_consistency),
            },
            "legalConstraints": {
                "useLimitation": text(&record.constraints.use_limitation),
                "accessConstraints": text(&record.constraints.access_constraints),
                "otherConstraints": text(&record.constraints.other_constraints),
            },
        }
    })
}

fn text(value: &Option<String>) -> &str {
    present(value).unwrap_or("")
}

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn party(party: &ResponsibleParty, default_role: &str) -> Value {
    json!({
        "individualName": text(&party.name),
        "organisationName": text(&party.organization),
        "positionName": text(&party.position),
        "email": text(&party.email),
        "phone": text(&party.phone),
        "address": text(&party.address),
        "role": present(&party.role).unwrap_or(default_role),
    })
}
