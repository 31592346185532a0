use serde::{Deserialize, Serialize};

use crate::record::{present, MetadataRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// 必須項目と項目間の整合を検査し、違反をすべて返す
pub fn validate(record: &MetadataRecord) -> ValidationReport {
    let mut errors = Vec::new();
    let ident = &record.identification;

    if ident.title.trim().is_empty() {
        errors.push("Title is required".to_string());
    }
    if ident.abstract_text.trim().is_empty() {
        errors.push("Abstract is required".to_string());
    }
    if present(&record.contact.name).is_none() && present(&record.contact.organization).is_none() {
        errors.push("Contact name or organization is required".to_string());
    }
    if present(&record.contact.email).is_none() {
        errors.push("Contact email is required".to_string());
    }

    // ゼロ値の範囲は未計算を表すので検査しない
    let bbox = &record.spatial.bounding_box;
    if !bbox.is_empty() {
        if bbox.min_x >= bbox.max_x {
            errors.push(format!(
                "West bound longitude ({}) must be less than east bound longitude ({})",
                bbox.min_x, bbox.max_x
            ));
        }
        if bbox.min_y >= bbox.max_y {
            errors.push(format!(
                "South bound latitude ({}) must be less than north bound latitude ({})",
                bbox.min_y, bbox.max_y
            ));
        }
    }

    if let (Some(start), Some(end)) = (record.temporal.start, record.temporal.end) {
        if start > end {
            errors.push(format!(
                "Temporal extent start ({}) must not be after end ({})",
                start, end
            ));
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;
    use chrono::NaiveDate;

    fn valid() -> MetadataRecord {
        let mut record = MetadataRecord::default();
        record.identification.title = "Batas Desa".into();
        record.identification.abstract_text = "Batas administrasi desa".into();
        record.contact.organization = Some("BIG".into());
        record.contact.email = Some("info@big.go.id".into());
        record.spatial.bounding_box = BoundingBox::new(106.0, -7.0, 107.0, -6.0);
        record
    }

    #[test]
    fn test_valid_record() {
        let report = validate(&valid());
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_reports_every_violation() {
        let mut record = valid();
        record.identification.title = String::new();
        record.spatial.bounding_box = BoundingBox::new(10.0, 0.0, 5.0, 1.0);
        let report = validate(&record);
        assert!(!report.is_valid);
        assert!(report.errors.len() >= 2);
        assert_eq!(report.errors[0], "Title is required");
        assert!(report.errors[1].starts_with("West bound longitude (10)"));
    }

    #[test]
    fn test_contact_rules() {
        let mut record = valid();
        record.contact.organization = None;
        record.contact.email = Some(" ".into());
        let report = validate(&record);
        assert_eq!(
            report.errors,
            vec![
                "Contact name or organization is required",
                "Contact email is required"
            ]
        );

        record.contact.name = Some("Siti".into());
        record.contact.email = Some("siti@example.go.id".into());
        assert!(validate(&record).is_valid);
    }

    #[test]
    fn test_zero_bbox_skips_bound_rules() {
        let mut record = valid();
        record.spatial.bounding_box = BoundingBox::EMPTY;
        assert!(validate(&record).is_valid);
    }

    #[test]
    fn test_temporal_order() {
        let mut record = valid();
        record.temporal.start = NaiveDate::from_ymd_opt(2021, 1, 1);
        record.temporal.end = NaiveDate::from_ymd_opt(2020, 1, 1);
        let report = validate(&record);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("2021-01-01"));

        record.temporal.end = record.temporal.start;
        assert!(validate(&record).is_valid);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let text = serde_json::to_string(&validate(&MetadataRecord::default())).unwrap();
        assert!(text.starts_with("{\"isValid\":false,\"errors\":["));
    }
}
