use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use geometa::{
    build_record, collect_uploads, file_name, serialize, validate, Extraction, MetadataRecord,
    OutputFormat, RecordDefaults, UploadedFile,
};
use rayon::ThreadPoolBuilder;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// アップロードされたファイル群からメタデータレコード（JSON）を作る
    Extract(ExtractArgs),
    /// レコードを検証し、指定形式の文書を書き出す
    Render(RenderArgs),
    /// レコードの必須項目と整合性を検査する
    Validate {
        /// レコード JSON
        #[arg(value_name = "RECORD")]
        record: PathBuf,
    },
    /// ディレクトリ内の各データセットを並列に処理する
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// 1つのデータセットを構成するファイル（.shp/.dbf/.prj、.zip、.geojson など）
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// 出力先（省略時は標準出力）
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// 推定値に重ねる編集内容（部分的なレコード JSON）
    #[arg(long, value_name = "FILE")]
    overrides: Option<PathBuf>,

    /// 抽出が不完全なとき GDAL で再抽出する
    #[cfg(feature = "gdal")]
    #[arg(long)]
    fallback: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// レコード JSON
    #[arg(value_name = "RECORD")]
    record: PathBuf,

    /// 出力ディレクトリ
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// 出力形式（iso19139, sni-json, sni-xml）。省略時はすべて
    #[arg(short, long = "format", value_name = "FORMAT")]
    formats: Vec<String>,

    /// 検証エラーがあっても書き出す
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// 入力ディレクトリ
    #[arg(value_name = "DIR")]
    input: PathBuf,

    /// 出力ディレクトリ
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// 出力形式（iso19139, sni-json, sni-xml）。省略時はすべて
    #[arg(short, long = "format", value_name = "FORMAT")]
    formats: Vec<String>,

    /// すべてのレコードに重ねる編集内容
    #[arg(long, value_name = "FILE")]
    overrides: Option<PathBuf>,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    match cli.command {
        Command::Extract(args) => run_extract(&args)?,
        Command::Render(args) => run_render(&args)?,
        Command::Validate { record } => run_validate(&record)?,
        Command::Batch(args) => run_batch(&args)?,
    }

    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    let files = args
        .files
        .iter()
        .map(|path| UploadedFile::from_path(path).with_context(|| format!("Failed to read {:?}", path)))
        .collect::<Result<Vec<_>>>()?;

    let extraction = extract_files(files, args)?;
    let overrides = read_overrides(args.overrides.as_deref())?;
    let record = build_record(&extraction, &RecordDefaults::default(), overrides.as_ref())?;

    let text = serde_json::to_string_pretty(&record)?;
    match &args.output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Written record: {:?}", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

#[cfg(feature = "gdal")]
fn extract_files(files: Vec<UploadedFile>, args: &ExtractArgs) -> Result<Extraction> {
    if args.fallback {
        let extractor = geometa::GdalExtractor::new();
        return Ok(geometa::extract_with_fallback(files, &extractor)?);
    }
    Ok(geometa::extract(files)?)
}

#[cfg(not(feature = "gdal"))]
fn extract_files(files: Vec<UploadedFile>, _args: &ExtractArgs) -> Result<Extraction> {
    Ok(geometa::extract(files)?)
}

fn run_render(args: &RenderArgs) -> Result<()> {
    let record = read_record(&args.record)?;
    let formats = parse_formats(&args.formats)?;

    let report = validate(&record);
    if !report.is_valid {
        for err in &report.errors {
            warn!("  {}", err);
        }
        if !args.force {
            anyhow::bail!(
                "{} has {} validation errors; fix them or pass --force",
                args.record.display(),
                report.errors.len()
            );
        }
    }

    fs::create_dir_all(&args.output)?;
    for format in formats {
        let path = write_document(&record, format, &args.output)?;
        info!("Written {}: {:?}", format, path);
    }
    Ok(())
}

fn run_validate(path: &Path) -> Result<()> {
    let record = read_record(path)?;
    let report = validate(&record);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_valid {
        anyhow::bail!("{} validation errors", report.errors.len());
    }
    Ok(())
}

fn run_batch(args: &BatchArgs) -> Result<()> {
    use rayon::prelude::*;

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    let formats = parse_formats(&args.formats)?;
    let overrides = read_overrides(args.overrides.as_deref())?;
    fs::create_dir_all(&args.output)?;

    let uploads = collect_uploads(&args.input)?;
    info!("Found {} datasets in {:?}", uploads.len(), args.input);

    // データセットごとに独立して処理する
    let results: Vec<(String, Result<()>)> = uploads
        .into_par_iter()
        .map(|files| {
            let label = files
                .first()
                .map(|f| f.name.clone())
                .unwrap_or_default();
            let result = process_upload(files, &formats, overrides.as_ref(), &args.output);
            (label, result)
        })
        .collect();

    let errors: Vec<String> = results
        .into_iter()
        .filter_map(|(label, result)| result.err().map(|e| format!("{}: {:#}", label, e)))
        .collect();

    if !errors.is_empty() {
        error!("Failed to process {} datasets:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} datasets failed to process", errors.len());
    }

    Ok(())
}

fn process_upload(
    files: Vec<UploadedFile>,
    formats: &[OutputFormat],
    overrides: Option<&Value>,
    output: &Path,
) -> Result<()> {
    let extraction = geometa::extract(files)?;
    let record = build_record(&extraction, &RecordDefaults::default(), overrides)?;

    let record_path = output.join(format!("{}.record.json", record.file_identifier));
    fs::write(&record_path, serde_json::to_string_pretty(&record)?)?;

    let report = validate(&record);
    if !report.is_valid {
        // 推定だけでは連絡先などが埋まらないので、文書は書き出して警告に留める
        warn!(
            "{}: {} validation errors",
            record.file_identifier,
            report.errors.len()
        );
    }

    for format in formats {
        write_document(&record, *format, output)?;
    }
    info!("Processed {}", record.original_file_name);
    Ok(())
}

fn write_document(record: &MetadataRecord, format: OutputFormat, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(file_name(record, format));
    let document = serialize(record, format)?;
    fs::write(&path, document).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

fn parse_formats(names: &[String]) -> Result<Vec<OutputFormat>> {
    if names.is_empty() {
        return Ok(OutputFormat::ALL.to_vec());
    }
    Ok(names
        .iter()
        .map(|name| name.parse::<OutputFormat>())
        .collect::<geometa::Result<Vec<_>>>()?)
}

fn read_record(path: &Path) -> Result<MetadataRecord> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid record JSON in {:?}", path))
}

fn read_overrides(path: Option<&Path>) -> Result<Option<Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid overrides JSON in {:?}", path))?;
    if !value.is_object() {
        anyhow::bail!("Overrides in {:?} must be a JSON object", path);
    }
    Ok(Some(value))
}
