use crate::model::{
    Attribute, AttributeType, AttributeValue, BoundingBox, Feature, GeometryType, Nested,
};

/// 再帰走査で受け渡す範囲の累積値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub const INITIAL: Bounds = Bounds {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub fn include(self, x: f64, y: f64) -> Self {
        if !x.is_finite() || !y.is_finite() {
            return self;
        }
        Bounds {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
        }
    }

    /// 一度も更新されていなければゼロ値の範囲になる
    pub fn finish(self) -> BoundingBox {
        if self == Bounds::INITIAL {
            BoundingBox::EMPTY
        } else {
            BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
        }
    }
}

/// 入れ子座標を畳み込む。位置なら範囲を広げ、列なら子要素へ降りる
pub fn fold_bounds(acc: Bounds, node: &Nested) -> Bounds {
    if let Some((x, y)) = node.as_position() {
        return acc.include(x, y);
    }
    match node {
        Nested::List(children) => children.iter().fold(acc, fold_bounds),
        Nested::Number(_) => acc,
    }
}

pub fn bounding_box(features: &[Feature]) -> BoundingBox {
    features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .fold(Bounds::INITIAL, |acc, g| fold_bounds(acc, &g.coordinates))
        .finish()
}

/// 最初にジオメトリを持つ地物の種別
pub fn geometry_type(features: &[Feature]) -> GeometryType {
    features
        .iter()
        .find_map(|f| f.geometry.as_ref())
        .map(|g| g.kind)
        .unwrap_or(GeometryType::Unknown)
}

/// 値から属性型を決める。空値は型の手掛かりにならないので `None`
pub fn classify(value: &AttributeValue) -> Option<AttributeType> {
    match value {
        AttributeValue::Integer(_) => Some(AttributeType::Integer),
        AttributeValue::Real(v) if v.is_finite() && v.fract() == 0.0 => Some(AttributeType::Integer),
        AttributeValue::Real(_) => Some(AttributeType::Real),
        AttributeValue::Date(_) => Some(AttributeType::Date),
        // 真偽値は出力規格上テキストとして扱う
        AttributeValue::Bool(_) | AttributeValue::Text(_) => Some(AttributeType::String),
        AttributeValue::Null => None,
    }
}

/// 属性を持つ最初の地物から属性名を取り、各属性の型は最初の非空値で決める。
///
/// すべて空値の属性は文字列とする。
pub fn infer_attribute_types(features: &[Feature]) -> Vec<Attribute> {
    let Some(first) = features.iter().find(|f| !f.attributes.is_empty()) else {
        return Vec::new();
    };

    first
        .attributes
        .iter()
        .map(|(name, _)| {
            let kind = features
                .iter()
                .filter_map(|f| f.attributes.iter().find(|(n, _)| n == name))
                .find_map(|(_, value)| classify(value))
                .unwrap_or(AttributeType::String);
            Attribute {
                name: name.clone(),
                kind,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Geometry;
    use chrono::NaiveDate;
    use serde_json::json;

    fn feature(kind: GeometryType, coords: serde_json::Value) -> Feature {
        Feature {
            geometry: Some(Geometry {
                kind,
                coordinates: Nested::from_json(&coords).unwrap(),
            }),
            attributes: Vec::new(),
        }
    }

    fn all_positions(node: &Nested, out: &mut Vec<(f64, f64)>) {
        if let Some(p) = node.as_position() {
            out.push(p);
        } else if let Nested::List(children) = node {
            for child in children {
                all_positions(child, out);
            }
        }
    }

    #[test]
    fn test_two_polygons_bounding_box() {
        let features = vec![
            feature(
                GeometryType::Polygon,
                json!([[[0, 0], [0, 2], [2, 2], [2, 0], [0, 0]]]),
            ),
            feature(
                GeometryType::Polygon,
                json!([[[5, 5], [5, 6], [6, 6], [6, 5], [5, 5]]]),
            ),
        ];
        assert_eq!(
            bounding_box(&features),
            BoundingBox::new(0.0, 0.0, 6.0, 6.0)
        );
        assert_eq!(geometry_type(&features), GeometryType::Polygon);
    }

    #[test]
    fn test_bounding_box_contains_every_coordinate() {
        let features = vec![
            feature(GeometryType::Point, json!([106.8, -6.2])),
            feature(
                GeometryType::MultiLineString,
                json!([[[100.1, 2.5], [101.0, -0.5]], [[99.0, 1.0], [98.5, 4.25, 12.0]]]),
            ),
            feature(
                GeometryType::MultiPolygon,
                json!([[[[120, -10], [121, -10], [121, -9], [120, -10]]]]),
            ),
        ];
        let bbox = bounding_box(&features);
        for f in &features {
            let mut points = Vec::new();
            all_positions(&f.geometry.as_ref().unwrap().coordinates, &mut points);
            for (x, y) in points {
                assert!(bbox.contains(x, y), "({}, {}) outside {:?}", x, y, bbox);
            }
        }
        assert_eq!(bbox, BoundingBox::new(98.5, -10.0, 121.0, 4.25));
    }

    #[test]
    fn test_no_coordinates_gives_zero_box() {
        let features = vec![
            Feature::default(),
            feature(GeometryType::Polygon, json!([])),
        ];
        assert_eq!(bounding_box(&features), BoundingBox::EMPTY);
        assert_eq!(bounding_box(&[]), BoundingBox::EMPTY);
    }

    #[test]
    fn test_non_finite_points_ignored() {
        let acc = Bounds::INITIAL.include(f64::NAN, 1.0).include(2.0, f64::INFINITY);
        assert_eq!(acc, Bounds::INITIAL);
        assert_eq!(acc.finish(), BoundingBox::EMPTY);
    }

    #[test]
    fn test_geometry_type_from_first_non_null() {
        let features = vec![
            Feature::default(),
            feature(GeometryType::LineString, json!([[0, 0], [1, 1]])),
            feature(GeometryType::Point, json!([0, 0])),
        ];
        assert_eq!(geometry_type(&features), GeometryType::LineString);
        assert_eq!(geometry_type(&[]), GeometryType::Unknown);
    }

    #[test]
    fn test_attribute_type_inference() {
        let mut first = Feature::default();
        let mut second = Feature::default();
        second.attributes = vec![
            ("kode".into(), AttributeValue::Integer(31)),
            ("luas".into(), AttributeValue::Real(12.5)),
            ("skor".into(), AttributeValue::Real(3.0)),
            ("nama".into(), AttributeValue::Text("Bandung".into())),
            ("aktif".into(), AttributeValue::Bool(true)),
            (
                "tanggal".into(),
                AttributeValue::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()),
            ),
        ];
        first.attributes = Vec::new();
        let features = vec![first, second];

        let attrs = infer_attribute_types(&features);
        let kinds: Vec<_> = attrs.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AttributeType::Integer,
                AttributeType::Real,
                AttributeType::Integer,
                AttributeType::String,
                AttributeType::String,
                AttributeType::Date,
            ]
        );
        // 同じ入力なら同じ結果
        assert_eq!(infer_attribute_types(&features), attrs);
    }

    #[test]
    fn test_null_values_do_not_decide_type() {
        let mut first = Feature::default();
        first.attributes = vec![
            ("luas".into(), AttributeValue::Null),
            ("nama".into(), AttributeValue::Text("x".into())),
            ("kosong".into(), AttributeValue::Null),
        ];
        let mut second = Feature::default();
        second.attributes = vec![
            ("nama".into(), AttributeValue::Null),
            ("luas".into(), AttributeValue::Real(1.5)),
            ("kosong".into(), AttributeValue::Null),
        ];
        let features = vec![first, second];

        let attrs = infer_attribute_types(&features);
        let pairs: Vec<_> = attrs.iter().map(|a| (a.name.as_str(), a.kind)).collect();
        assert_eq!(
            pairs,
            vec![
                ("luas", AttributeType::Real),
                ("nama", AttributeType::String),
                ("kosong", AttributeType::String),
            ]
        );
        assert_eq!(infer_attribute_types(&features), attrs);
        assert_eq!(classify(&AttributeValue::Null), None);
    }
}
