use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CRS: &str = "EPSG:4326";

/// 任意の深さで入れ子になった座標列。
///
/// GeoJSON の `coordinates` と同じ形をしており、ジオメトリ種別ごとの分岐なしで走査できる。
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Number(f64),
    List(Vec<Nested>),
}

impl Nested {
    pub fn point(x: f64, y: f64) -> Self {
        Nested::List(vec![Nested::Number(x), Nested::Number(y)])
    }

    /// 先頭2要素が数値で残り（z, m）も数値なら位置とみなし (x, y) を返す
    pub fn as_position(&self) -> Option<(f64, f64)> {
        let Nested::List(items) = self else {
            return None;
        };
        if items.len() < 2 {
            return None;
        }
        let mut numbers = items.iter().map(|item| match item {
            Nested::Number(n) => Some(*n),
            Nested::List(_) => None,
        });
        let x = numbers.next()??;
        let y = numbers.next()??;
        if numbers.all(|n| n.is_some()) {
            Some((x, y))
        } else {
            None
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(Nested::Number),
            serde_json::Value::Array(items) => Some(Nested::List(
                items.iter().filter_map(Nested::from_json).collect(),
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    Raster,
    #[default]
    Unknown,
}

impl GeometryType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Point" => GeometryType::Point,
            "MultiPoint" => GeometryType::MultiPoint,
            "LineString" => GeometryType::LineString,
            "MultiLineString" => GeometryType::MultiLineString,
            "Polygon" => GeometryType::Polygon,
            "MultiPolygon" => GeometryType::MultiPolygon,
            "Raster" => GeometryType::Raster,
            _ => GeometryType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::LineString => "LineString",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::Raster => "Raster",
            GeometryType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryType,
    pub coordinates: Nested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Date(NaiveDate),
    Text(String),
}

impl AttributeValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => n
                    .as_f64()
                    .map(AttributeValue::Real)
                    .unwrap_or(AttributeValue::Null),
            },
            Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

/// 1件の地物。属性は出現順を保持する
#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub attributes: Vec<(String, AttributeValue)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Integer,
    Real,
    Date,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeType::String => "String",
            AttributeType::Integer => "Integer",
            AttributeType::Real => "Real",
            AttributeType::Date => "Date",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub const EMPTY: BoundingBox = BoundingBox {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 0.0,
        max_y: 0.0,
    };

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// 座標が一つも観測されなかったことを表すゼロ値か
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }
}

/// Parser + Analyzer + CRS Resolver の出力
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub feature_count: u64,
    pub geometry_type: GeometryType,
    pub bounding_box: BoundingBox,
    pub coordinate_system: String,
    pub attributes: Vec<Attribute>,
    pub layer_name: String,
    pub file_size: u64,
    pub original_file_name: String,
    pub data_format: String,
    /// デコード失敗などで構造情報がゼロ埋めされた
    #[serde(default)]
    pub degraded: bool,
}

impl ExtractionResult {
    /// 構造情報をゼロ埋めした記録。ファイル名・サイズ・形式は保持する
    pub fn empty(
        layer_name: impl Into<String>,
        original_file_name: impl Into<String>,
        file_size: u64,
        data_format: impl Into<String>,
    ) -> Self {
        Self {
            feature_count: 0,
            geometry_type: GeometryType::Unknown,
            bounding_box: BoundingBox::EMPTY,
            coordinate_system: DEFAULT_CRS.to_string(),
            attributes: Vec::new(),
            layer_name: layer_name.into(),
            file_size,
            original_file_name: original_file_name.into(),
            data_format: data_format.into(),
            degraded: false,
        }
    }

    /// 抽出が実質的に成功したかどうか。偽ならフォールバック抽出の対象になる
    pub fn is_complete(&self) -> bool {
        self.feature_count > 0 && !self.bounding_box.is_empty() && !self.degraded
    }
}

/// 抽出結果から推定した記述項目。抽出結果の値を上書きすることはない
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredFields {
    pub inferred_title: Option<String>,
    pub inferred_abstract: Option<String>,
    pub inferred_topic_category: Option<String>,
    pub inferred_descriptive_keywords: Vec<String>,
    pub inferred_attribute_description: Option<String>,
    pub inferred_extent: Option<String>,
    pub inferred_spatial_resolution: Option<String>,
    pub inferred_resource_format: Option<String>,
}
