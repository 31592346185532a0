use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::model::DEFAULT_CRS;

static WGS84_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)WGS[\s_-]*(?:19)?84").expect("WGS84 regex should compile")
});

static EPSG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)EPSG["'\s]*[,:]+\s*["']?(\d{4,6})"#).expect("EPSG regex should compile")
});

static UTM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)UTM[\s_]*zone[\s_]*(\d{1,2})").expect("UTM regex should compile")
});

/// 国内測地系の名称と EPSG コード
const NATIONAL_DATUMS: &[(&str, &str)] = &[
    ("SRGI2013", "EPSG:9471"),
    ("SRGI_2013", "EPSG:9471"),
    ("DGN95", "EPSG:4755"),
    ("DGN_1995", "EPSG:4755"),
    ("ID74", "EPSG:4238"),
    ("INDONESIAN_1974", "EPSG:4238"),
    ("BATAVIA", "EPSG:4211"),
];

/// 投影法の記述から座標参照系の識別子を決める。エラーにはならない
pub fn resolve_crs(projection: Option<&str>) -> String {
    let Some(text) = projection.map(str::trim).filter(|t| !t.is_empty()) else {
        return DEFAULT_CRS.to_string();
    };

    if WGS84_PATTERN.is_match(text) {
        return DEFAULT_CRS.to_string();
    }

    // WKT では最も外側の AUTHORITY が末尾に来る
    if let Some(code) = EPSG_PATTERN.captures_iter(text).last().and_then(|c| c.get(1)) {
        return format!("EPSG:{}", code.as_str());
    }

    if let Some(zone) = UTM_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|z| (1..=60).contains(z))
    {
        return format!("EPSG:326{:02}", zone);
    }

    let upper = text.to_ascii_uppercase();
    if let Some((_, code)) = NATIONAL_DATUMS.iter().find(|(name, _)| upper.contains(name)) {
        return code.to_string();
    }

    debug!("Unrecognized projection, defaulting to {}", DEFAULT_CRS);
    DEFAULT_CRS.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_projection_defaults() {
        assert_eq!(resolve_crs(None), "EPSG:4326");
        assert_eq!(resolve_crs(Some("   ")), "EPSG:4326");
    }

    #[test]
    fn test_wgs84_variants() {
        assert_eq!(resolve_crs(Some(r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984"]]"#)), "EPSG:4326");
        assert_eq!(resolve_crs(Some("WGS 84")), "EPSG:4326");
        assert_eq!(resolve_crs(Some("wgs84")), "EPSG:4326");
    }

    #[test]
    fn test_explicit_authority_code() {
        let wkt = r#"PROJCS["DGN95 / Indonesia TM-3 zone 48.2",AUTHORITY["EPSG","23836"]]"#;
        assert_eq!(resolve_crs(Some(wkt)), "EPSG:23836");
        assert_eq!(resolve_crs(Some("urn:ogc:def:crs:EPSG::3857")), "EPSG:3857");
        assert_eq!(resolve_crs(Some("EPSG:32749")), "EPSG:32749");
    }

    #[test]
    fn test_outermost_authority_wins() {
        let wkt = r#"PROJCS["DGN95 / UTM zone 50S",GEOGCS["DGN95",AUTHORITY["EPSG","4755"]],AUTHORITY["EPSG","23880"]]"#;
        assert_eq!(resolve_crs(Some(wkt)), "EPSG:23880");
    }

    #[test]
    fn test_utm_zone_synthesized() {
        assert_eq!(resolve_crs(Some("PROJCS[\"UTM_Zone_48N\"]")), "EPSG:32648");
        assert_eq!(resolve_crs(Some("UTM zone 7")), "EPSG:32607");
    }

    #[test]
    fn test_national_datum() {
        assert_eq!(resolve_crs(Some("GEOGCS[\"GCS_DGN_1995\"]")), "EPSG:4755");
        assert_eq!(resolve_crs(Some("GEOGCS[\"SRGI2013\"]")), "EPSG:9471");
    }

    #[test]
    fn test_unknown_text_defaults() {
        assert_eq!(resolve_crs(Some("LOCAL_CS[\"site grid\"]")), "EPSG:4326");
    }
}
