use serde_json::Value;
use tracing::debug;

use crate::model::{AttributeValue, Feature, Geometry, GeometryType, Nested};

/// GeoJSON 文書から地物列を取り出す。
///
/// `FeatureCollection` は `features` を、単独の `Feature` は1要素の列として扱う。
/// それ以外の文書は空の列になる。
pub fn parse_geojson(bytes: &[u8]) -> Result<Vec<Feature>, serde_json::Error> {
    // UTF-8 BOM を除去
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let document: Value = serde_json::from_slice(bytes)?;

    let features = match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => document
            .get("features")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(to_feature).collect())
            .unwrap_or_default(),
        Some("Feature") => vec![to_feature(&document)],
        other => {
            debug!("GeoJSON document of type {:?} carries no features", other);
            Vec::new()
        }
    };

    Ok(features)
}

fn to_feature(value: &Value) -> Feature {
    let geometry = value.get("geometry").and_then(to_geometry);
    let attributes = value
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, v)| (name.clone(), AttributeValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default();

    Feature {
        geometry,
        attributes,
    }
}

fn to_geometry(value: &Value) -> Option<Geometry> {
    let kind = value.get("type")?.as_str()?;

    if kind == "GeometryCollection" {
        // 構成ジオメトリの座標を1つの入れ子列にまとめる
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(to_geometry)
                    .map(|g| g.coordinates)
                    .collect()
            })
            .unwrap_or_default();
        return Some(Geometry {
            kind: GeometryType::Unknown,
            coordinates: Nested::List(members),
        });
    }

    let coordinates = value.get("coordinates").and_then(Nested::from_json)?;
    Some(Geometry {
        kind: GeometryType::from_name(kind),
        coordinates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_collection() {
        let doc = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [106.8, -6.2]},
                 "properties": {"nama": "Jakarta", "penduduk": 10562088}},
                {"type": "Feature", "geometry": null, "properties": null}
            ]
        }"#;
        let features = parse_geojson(doc).unwrap();
        assert_eq!(features.len(), 2);

        let first = &features[0];
        let geometry = first.geometry.as_ref().unwrap();
        assert_eq!(geometry.kind, GeometryType::Point);
        assert_eq!(geometry.coordinates.as_position(), Some((106.8, -6.2)));
        assert_eq!(first.attributes[0].0, "nama");
        assert_eq!(first.attributes[1].1, AttributeValue::Integer(10562088));

        assert!(features[1].geometry.is_none());
        assert!(features[1].attributes.is_empty());
    }

    #[test]
    fn test_bare_feature_is_single_element() {
        let doc = br#"{"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1]]}, "properties": {}}"#;
        let features = parse_geojson(doc).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(
            features[0].geometry.as_ref().unwrap().kind,
            GeometryType::LineString
        );
    }

    #[test]
    fn test_other_documents_have_no_features() {
        let doc = br#"{"type": "Polygon", "coordinates": [[[0,0],[0,1],[1,1],[0,0]]]}"#;
        assert!(parse_geojson(doc).unwrap().is_empty());
    }

    #[test]
    fn test_properties_keep_source_order() {
        let doc = br#"{"type": "Feature", "geometry": null,
            "properties": {"zeta": 1, "alpha": "a", "mid": 2.5}}"#;
        let features = parse_geojson(doc).unwrap();
        let names: Vec<_> = features[0].attributes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_bom_and_invalid_json() {
        let doc = b"\xEF\xBB\xBF{\"type\": \"FeatureCollection\", \"features\": []}";
        assert!(parse_geojson(doc).unwrap().is_empty());
        assert!(parse_geojson(b"{not json").is_err());
    }

    #[test]
    fn test_geometry_collection_members_feed_bounds() {
        let doc = br#"{"type": "Feature", "properties": {},
            "geometry": {"type": "GeometryCollection", "geometries": [
                {"type": "Point", "coordinates": [110.4, -7.0]},
                {"type": "LineString", "coordinates": [[110.0, -7.5], [111.2, -6.8]]},
                {"type": "Bogus"}
            ]}}"#;
        let features = parse_geojson(doc).unwrap();
        let geometry = features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.kind, GeometryType::Unknown);
        match &geometry.coordinates {
            Nested::List(members) => assert_eq!(members.len(), 2),
            other => panic!("unexpected: {:?}", other),
        }

        assert_eq!(crate::analyzer::geometry_type(&features), GeometryType::Unknown);
        assert_eq!(
            crate::analyzer::bounding_box(&features),
            crate::model::BoundingBox::new(110.0, -7.5, 111.2, -6.8)
        );
    }
}
