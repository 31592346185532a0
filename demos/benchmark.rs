use anyhow::Result;
use geometa::{build_record, extract, serialize, OutputFormat, RecordDefaults, UploadedFile};
use std::path::Path;
use std::time::{Duration, Instant};

const RUNS: u32 = 3;

fn main() -> Result<()> {
    // 環境変数で計測対象のファイルを指定
    let target = std::env::var("BENCH_UPLOAD_PATH")
        .unwrap_or_else(|_| "test_dir/batas_desa.zip".to_string());

    let path = Path::new(&target);

    if !path.exists() {
        eprintln!("Benchmark upload not found: {}", target);
        eprintln!("Set BENCH_UPLOAD_PATH environment variable to specify a .zip or .geojson file");
        return Ok(());
    }

    println!("Benchmarking extraction: {}", target);
    let upload = UploadedFile::from_path(path)?;

    let mut total = Duration::ZERO;
    let mut last = None;
    for run in 1..=RUNS {
        let start = Instant::now();
        let extraction = extract(vec![upload.clone()])?;
        let record = build_record(&extraction, &RecordDefaults::default(), None)?;
        for format in OutputFormat::ALL {
            serialize(&record, format)?;
        }
        let elapsed = start.elapsed();

        println!(
            "Run {}: {:?} ({} features)",
            run, elapsed, extraction.result.feature_count
        );
        total += elapsed;
        last = Some(extraction);
    }

    println!("Average processing time: {:?}", total / RUNS);

    if let Some(extraction) = last {
        let result = &extraction.result;
        println!("Sample result:");
        println!("  Format: {}", result.data_format);
        println!("  Geometry: {}", result.geometry_type);
        println!("  Bounding box: {:?}", result.bounding_box);
        println!("  CRS: {}", result.coordinate_system);
        println!("  Attributes: {}", result.attributes.len());
    }

    Ok(())
}
