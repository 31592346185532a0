use crate::model::{BoundingBox, ExtractionResult, InferredFields};

pub const DEFAULT_TOPIC_CATEGORY: &str = "environment";
pub const MAX_KEYWORDS: usize = 10;

const DOMAIN_KEYWORDS: [&str; 3] = ["geospasial", "data spasial", "Indonesia"];

/// 識別子的で記述に役立たない語
const KEYWORD_STOPLIST: &[&str] = &[
    "fid", "oid", "gid", "objectid", "shape", "leng", "len", "kode", "code", "the", "and",
];

const ABSTRACT_BOILERPLATE: &str = "Metadata ini dihasilkan secara otomatis dari berkas yang diunggah \
     dan perlu ditinjau sebelum dipublikasikan.";

/// 先に一致したものを採用する（ISO 19115 の主題分類コード）
const TOPIC_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "boundaries",
        &["batas", "boundary", "admin", "prov", "kab", "kota", "kec", "desa", "kel", "wilayah"],
    ),
    (
        "transportation",
        &["jalan", "road", "rel", "rail", "transport", "bandara", "airport", "pelabuhan", "port"],
    ),
    (
        "inlandWaters",
        &["sungai", "river", "danau", "lake", "waduk", "das", "hidro", "water"],
    ),
    (
        "elevation",
        &["elev", "tinggi", "height", "kontur", "contour", "dem", "altitude"],
    ),
    (
        "climatologyMeteorologyAtmosphere",
        &["hujan", "rain", "suhu", "temp", "iklim", "climate", "angin", "wind"],
    ),
    (
        "biota",
        &["hutan", "forest", "vegetasi", "flora", "fauna", "spesies", "species", "mangrove"],
    ),
    (
        "society",
        &["penduduk", "population", "sekolah", "school", "budaya", "agama", "pddk"],
    ),
    (
        "economy",
        &["ekonomi", "economy", "industri", "industry", "pasar", "market", "tambang", "pdrb"],
    ),
    (
        "health",
        &["kesehatan", "health", "puskesmas", "rumah_sakit", "hospital", "klinik"],
    ),
    (
        "utilitiesCommunication",
        &["listrik", "power", "telekomunikasi", "telecom", "pipa", "pipe", "utilitas", "utility"],
    ),
];

/// 属性名に含まれる語から付ける説明
const ATTRIBUTE_SEMANTICS: &[(&[&str], &str)] = &[
    (&["id", "kode", "code", "fid"], "kode identifikasi unik"),
    (&["nama", "name"], "nama objek"),
    (
        &["prov", "kab", "kota", "kec", "desa", "kel"],
        "nama unit administrasi",
    ),
    (&["luas", "area"], "ukuran luas"),
    (&["panjang", "length", "len"], "ukuran panjang"),
    (
        &["lat", "lon", "lintang", "bujur", "koord", "coord"],
        "nilai koordinat",
    ),
];

const GENERIC_SEMANTIC: &str = "atribut data";

/// 抽出結果から記述項目を推定する
pub fn infer(result: &ExtractionResult) -> InferredFields {
    let name = if result.layer_name.trim().is_empty() {
        crate::resolver::stem(&result.original_file_name)
    } else {
        result.layer_name.clone()
    };

    let attribute_names: Vec<String> = result
        .attributes
        .iter()
        .map(|a| a.name.to_lowercase())
        .collect();

    InferredFields {
        inferred_title: Some(humanize(&name)).filter(|t| !t.is_empty()),
        inferred_abstract: Some(infer_abstract(result)),
        inferred_topic_category: Some(topic_category(&attribute_names).to_string()),
        inferred_descriptive_keywords: keywords(&name, &attribute_names),
        inferred_attribute_description: attribute_description(result),
        inferred_extent: extent_text(&result.bounding_box),
        inferred_spatial_resolution: spatial_resolution(result.feature_count, &result.bounding_box)
            .map(str::to_string),
        inferred_resource_format: Some(result.data_format.clone()).filter(|f| !f.is_empty()),
    }
}

/// 区切り文字を空白にし、各語の先頭を大文字にする
pub fn humanize(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 3桁区切りの件数表記
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

fn infer_abstract(result: &ExtractionResult) -> String {
    let kind = result.geometry_type.as_str().to_lowercase();
    let count = format_count(result.feature_count);

    let mut text = if kind.contains("point") {
        format!("Dataset titik yang memuat {} fitur lokasi", count)
    } else if kind.contains("line") {
        format!("Dataset garis yang memuat {} fitur jaringan atau batas linear", count)
    } else if kind.contains("polygon") {
        format!("Dataset poligon yang memuat {} fitur area", count)
    } else if kind.contains("raster") {
        "Dataset raster yang merepresentasikan data spasial dalam bentuk grid".to_string()
    } else {
        format!("Dataset geospasial yang memuat {} fitur", count)
    };

    if !result.coordinate_system.is_empty() {
        text.push_str(&format!(
            " dengan sistem koordinat {}",
            result.coordinate_system
        ));
    }
    text.push_str(". ");
    text.push_str(ABSTRACT_BOILERPLATE);
    text
}

pub fn topic_category(attribute_names: &[String]) -> &'static str {
    TOPIC_CATEGORIES
        .iter()
        .find(|(_, needles)| {
            attribute_names
                .iter()
                .any(|name| needles.iter().any(|needle| name.contains(needle)))
        })
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_TOPIC_CATEGORY)
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > 2 && !KEYWORD_STOPLIST.contains(&t.as_str()))
}

/// レイヤー名の語、属性名の語、固定語の順に重複なく最大10件
pub fn keywords(layer_name: &str, attribute_names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let candidates = tokens(layer_name)
        .chain(attribute_names.iter().flat_map(|n| tokens(n)))
        .chain(DOMAIN_KEYWORDS.iter().map(|k| k.to_string()));

    for token in candidates {
        if out.len() >= MAX_KEYWORDS {
            break;
        }
        if !out.iter().any(|k| k.eq_ignore_ascii_case(&token)) {
            out.push(token);
        }
    }
    out
}

fn attribute_description(result: &ExtractionResult) -> Option<String> {
    if result.attributes.is_empty() {
        return None;
    }
    let lines: Vec<String> = result
        .attributes
        .iter()
        .map(|attr| {
            let lower = attr.name.to_lowercase();
            let semantic = ATTRIBUTE_SEMANTICS
                .iter()
                .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
                .map(|(_, s)| *s)
                .unwrap_or(GENERIC_SEMANTIC);
            format!("{}: {} - {}", attr.name, attr.kind, semantic)
        })
        .collect();
    Some(lines.join("\n"))
}

fn degrees(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value < 0.0 { negative } else { positive };
    format!("{:.6}°{}", value.abs(), hemisphere)
}

/// 範囲を度と半球記号で表す。ゼロ値の範囲には作らない
pub fn extent_text(bbox: &BoundingBox) -> Option<String> {
    if bbox.is_empty() {
        return None;
    }
    Some(format!(
        "{} - {}, {} - {}",
        degrees(bbox.min_x, 'E', 'W'),
        degrees(bbox.max_x, 'E', 'W'),
        degrees(bbox.min_y, 'N', 'S'),
        degrees(bbox.max_y, 'N', 'S'),
    ))
}

/// 単位面積あたりの地物数から縮尺を見積もる
pub fn spatial_resolution(feature_count: u64, bbox: &BoundingBox) -> Option<&'static str> {
    if bbox.is_empty() {
        return None;
    }
    let area = bbox.width() * bbox.height();
    if area.is_nan() || area <= 0.0 {
        return None;
    }
    let density = feature_count as f64 / area;
    let scale = if density > 1000.0 {
        "1:5000"
    } else if density > 100.0 {
        "1:25000"
    } else if density > 10.0 {
        "1:50000"
    } else {
        "1:250000"
    };
    Some(scale)
}
