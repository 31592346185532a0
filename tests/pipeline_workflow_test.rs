use geometa::error::Error;
use geometa::{
    build_record, collect_uploads, extract, file_name, serialize, validate, BoundingBox,
    GeometryType, OutputFormat, RecordDefaults, UploadedFile,
};
use serde_json::json;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const TWO_POLYGONS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"kode_prov": 32, "nama_kab": "Bogor"},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[0,2],[2,2],[2,0],[0,0]]]}},
    {"type": "Feature", "properties": {"kode_prov": 32, "nama_kab": "Depok"},
     "geometry": {"type": "Polygon", "coordinates": [[[5,5],[5,6],[6,6],[6,5],[5,5]]]}}
  ]
}"#;

const UTM_48S_WKT: &str = r#"PROJCS["WGS_1984_UTM_Zone_48S",AUTHORITY["EPSG","32748"]]"#;

// .shp を組み立てる（ポリゴン・1リング）
fn polygon_shp(rings: &[&[(f64, f64)]]) -> Vec<u8> {
    let records: Vec<Vec<u8>> = rings
        .iter()
        .map(|ring| {
            let mut record = 5i32.to_le_bytes().to_vec();
            record.extend_from_slice(&[0u8; 32]);
            record.extend_from_slice(&1i32.to_le_bytes());
            record.extend_from_slice(&(ring.len() as i32).to_le_bytes());
            record.extend_from_slice(&0i32.to_le_bytes());
            for (x, y) in ring.iter() {
                record.extend_from_slice(&x.to_le_bytes());
                record.extend_from_slice(&y.to_le_bytes());
            }
            record
        })
        .collect();

    let body_len: usize = records.iter().map(|r| r.len() + 8).sum();
    let mut out = 9994i32.to_be_bytes().to_vec();
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice((((100 + body_len) / 2) as i32).to_be_bytes().as_slice());
    out.extend_from_slice(&1000i32.to_le_bytes());
    out.extend_from_slice(&5i32.to_le_bytes());
    out.extend_from_slice(&[0u8; 64]);
    for (i, record) in records.iter().enumerate() {
        out.extend_from_slice(&((i + 1) as i32).to_be_bytes());
        out.extend_from_slice(&((record.len() / 2) as i32).to_be_bytes());
        out.extend_from_slice(record);
    }
    out
}

// 文字型1列の .dbf を組み立てる
fn name_dbf(names: &[&str]) -> Vec<u8> {
    let width = 20u8;
    let mut out = vec![0x03, 124, 1, 1];
    out.extend_from_slice(&(names.len() as u32).to_le_bytes());
    out.extend_from_slice(&(32u16 + 32 + 1).to_le_bytes());
    out.extend_from_slice(&(1u16 + width as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);

    let mut descriptor = [0u8; 32];
    descriptor[..8].copy_from_slice(b"NAMA_KAB");
    descriptor[11] = b'C';
    descriptor[16] = width;
    out.extend_from_slice(&descriptor);
    out.push(0x0D);

    for name in names {
        out.push(b' ');
        let mut cell = name.as_bytes().to_vec();
        cell.resize(width as usize, b' ');
        out.extend_from_slice(&cell);
    }
    out.push(0x1A);
    out
}

fn zip_of(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in members {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const SQUARE_A: &[(f64, f64)] = &[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0), (0.0, 0.0)];
const SQUARE_B: &[(f64, f64)] = &[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0), (6.0, 5.0), (5.0, 5.0)];

#[test]
fn test_geojson_two_polygons() {
    let files = vec![UploadedFile::new(
        "batas_kabupaten.geojson",
        TWO_POLYGONS.as_bytes().to_vec(),
    )];
    let extraction = extract(files).unwrap();
    let result = &extraction.result;

    assert_eq!(result.bounding_box, BoundingBox::new(0.0, 0.0, 6.0, 6.0));
    assert_eq!(result.feature_count, 2);
    assert_eq!(result.geometry_type, GeometryType::Polygon);
    assert_eq!(result.coordinate_system, "EPSG:4326");
    assert_eq!(
        extraction.inferred.inferred_topic_category.as_deref(),
        Some("boundaries")
    );
    assert_eq!(
        extraction.inferred.inferred_title.as_deref(),
        Some("Batas Kabupaten")
    );
}

#[test]
fn test_zipped_shapefile_end_to_end() {
    let archive = zip_of(&[
        ("data/kabupaten.shp", polygon_shp(&[SQUARE_A, SQUARE_B])),
        ("data/kabupaten.shx", vec![0u8; 4]),
        ("data/kabupaten.dbf", name_dbf(&["Bogor", "Depok"])),
        ("data/kabupaten.prj", UTM_48S_WKT.as_bytes().to_vec()),
        ("__MACOSX/data/._kabupaten.shp", vec![1, 2, 3]),
    ]);
    let size = archive.len() as u64;

    let extraction = extract(vec![UploadedFile::new("kabupaten.zip", archive)]).unwrap();
    let result = &extraction.result;
    assert_eq!(result.data_format, "Shapefile (ZIP)");
    assert_eq!(result.feature_count, 2);
    assert_eq!(result.geometry_type, GeometryType::Polygon);
    assert_eq!(result.bounding_box, BoundingBox::new(0.0, 0.0, 6.0, 6.0));
    // WGS84 の規則が UTM より先に適用される
    assert_eq!(result.coordinate_system, "EPSG:4326");
    assert_eq!(result.attributes.len(), 1);
    assert_eq!(result.attributes[0].name, "NAMA_KAB");
    assert_eq!(result.layer_name, "kabupaten");
    assert_eq!(result.original_file_name, "kabupaten.zip");
    assert_eq!(result.file_size, size);
    assert!(result.is_complete());
}

#[test]
fn test_loose_shapefile_members_in_any_order() {
    let files = vec![
        UploadedFile::new("JALAN.prj", br#"PROJCS["DGN95 / UTM zone 50S",AUTHORITY["EPSG","23880"]]"#.to_vec()),
        UploadedFile::new("JALAN.dbf", name_dbf(&["Ruas 1"])),
        UploadedFile::new("JALAN.shp", polygon_shp(&[SQUARE_B])),
    ];
    let result = extract(files).unwrap().result;
    assert_eq!(result.data_format, "Shapefile");
    assert_eq!(result.coordinate_system, "EPSG:23880");
    assert_eq!(result.original_file_name, "JALAN.shp");
    assert_eq!(result.bounding_box, BoundingBox::new(5.0, 5.0, 6.0, 6.0));
}

#[test]
fn test_sidecars_without_primary_are_rejected() {
    let files = vec![
        UploadedFile::new("desa.prj", UTM_48S_WKT.as_bytes().to_vec()),
        UploadedFile::new("desa.dbf", name_dbf(&["A"])),
    ];
    match extract(files) {
        Err(Error::BundleIncomplete { found }) => {
            assert!(found.contains("desa.prj"));
            assert!(found.contains("desa.dbf"));
        }
        other => panic!("expected bundle-incomplete error, got {:?}", other),
    }

    let archive = zip_of(&[("desa.dbf", name_dbf(&["A"]))]);
    assert!(matches!(
        extract(vec![UploadedFile::new("desa.zip", archive)]),
        Err(Error::MissingPrimaryMember { .. })
    ));
}

#[test]
fn test_corrupted_shapefile_degrades() {
    let mut shp = polygon_shp(&[SQUARE_A]);
    shp[28..32].copy_from_slice(&999i32.to_le_bytes());
    let archive = zip_of(&[("rusak.shp", shp)]);

    let result = extract(vec![UploadedFile::new("rusak.zip", archive)]).unwrap().result;
    assert!(result.degraded);
    assert_eq!(result.data_format, "Shapefile (ZIP) (unsupported version)");
    assert_eq!(result.feature_count, 0);
    assert_eq!(result.bounding_box, BoundingBox::EMPTY);
    assert!(!result.is_complete());
}

#[test]
fn test_unreadable_archive_degrades() {
    let bytes = b"PK\x03\x04 garbage that is not a zip".to_vec();
    let result = extract(vec![UploadedFile::new("batas.zip", bytes.clone())])
        .unwrap()
        .result;
    assert!(result.degraded);
    assert_eq!(result.data_format, "Shapefile (ZIP) (corrupted)");
    assert_eq!(result.feature_count, 0);
    assert_eq!(result.bounding_box, BoundingBox::EMPTY);
    assert_eq!(result.original_file_name, "batas.zip");
    assert_eq!(result.file_size, bytes.len() as u64);
}

#[test]
fn test_oversized_part_count_in_archive_degrades() {
    // パート数に i32::MAX を宣言するポリゴンレコード
    let mut record = 5i32.to_le_bytes().to_vec();
    record.extend_from_slice(&[0u8; 32]);
    record.extend_from_slice(&i32::MAX.to_le_bytes());
    record.extend_from_slice(&0i32.to_le_bytes());
    record.extend_from_slice(&[0u8; 8]);

    let mut shp = polygon_shp(&[]);
    let words = ((shp.len() + 8 + record.len()) / 2) as i32;
    shp[24..28].copy_from_slice(&words.to_be_bytes());
    shp.extend_from_slice(&1i32.to_be_bytes());
    shp.extend_from_slice(&((record.len() / 2) as i32).to_be_bytes());
    shp.extend_from_slice(&record);

    let archive = zip_of(&[("rusak.shp", shp)]);
    let result = extract(vec![UploadedFile::new("rusak.zip", archive)]).unwrap().result;
    assert!(result.degraded);
    assert_eq!(result.data_format, "Shapefile (ZIP) (corrupted)");
    assert_eq!(result.feature_count, 0);
}

#[test]
fn test_record_render_and_validate() {
    let files = vec![UploadedFile::new(
        "batas_kabupaten.geojson",
        TWO_POLYGONS.as_bytes().to_vec(),
    )];
    let extraction = extract(files).unwrap();
    let defaults = RecordDefaults::default();

    // 推定だけでは連絡先が埋まらない
    let draft = build_record(&extraction, &defaults, None).unwrap();
    let report = validate(&draft);
    assert!(!report.is_valid);
    assert_eq!(
        report.errors,
        vec![
            "Contact name or organization is required",
            "Contact email is required"
        ]
    );

    let overrides = json!({
        "contact": {"organization": "Badan Informasi Geospasial", "email": "info@big.go.id"},
        "distribution": {"onlineResource": "https://tanahair.indonesia.go.id"}
    });
    let record = build_record(&extraction, &defaults, Some(&overrides)).unwrap();
    assert!(validate(&record).is_valid);

    let iso = serialize(&record, OutputFormat::Iso19139).unwrap();
    assert!(iso.contains("<gmd:MD_TopicCategoryCode>boundaries</gmd:MD_TopicCategoryCode>"));
    assert!(iso.contains("<gmd:URL>https://tanahair.indonesia.go.id</gmd:URL>"));
    assert!(iso.contains("<gmd:distributionInfo>"));

    let sni = serialize(&record, OutputFormat::SniJson).unwrap();
    let value: serde_json::Value = serde_json::from_str(&sni).unwrap();
    assert_eq!(value["sniMetadata"]["spatialInfo"]["featureCount"], "2");
    assert_eq!(
        value["sniMetadata"]["contact"]["organisationName"],
        "Badan Informasi Geospasial"
    );

    assert!(file_name(&record, OutputFormat::SniJson).ends_with("_sni.json"));
}

#[test]
fn test_collect_uploads_groups_bundles() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sungai.shp"), polygon_shp(&[SQUARE_A])).unwrap();
    std::fs::write(dir.path().join("sungai.dbf"), name_dbf(&["Ciliwung"])).unwrap();
    std::fs::write(dir.path().join("titik.geojson"), TWO_POLYGONS).unwrap();

    let uploads = collect_uploads(dir.path()).unwrap();
    assert_eq!(uploads.len(), 2);

    let results: Vec<_> = uploads
        .into_iter()
        .map(|files| extract(files).unwrap().result)
        .collect();
    assert!(results.iter().any(|r| r.data_format == "Shapefile" && r.attributes.len() == 1));
    assert!(results.iter().any(|r| r.data_format == "GeoJSON" && r.feature_count == 2));
}
