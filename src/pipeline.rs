use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analyzer::{bounding_box, geometry_type, infer_attribute_types};
use crate::crs::resolve_crs;
use crate::error::{Error, Result};
use crate::inference::infer;
use crate::model::{ExtractionResult, GeometryType, InferredFields};
use crate::parser::{parse, ParseOutcome};
use crate::record::{MetadataRecord, RecordDefaults};
use crate::resolver::{resolve, ResolvedInput, SourceFormat, UploadedFile};

/// 抽出の成功結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub result: ExtractionResult,
    pub inferred: InferredFields,
}

impl Extraction {
    pub fn new(result: ExtractionResult) -> Self {
        let inferred = infer(&result);
        Self { result, inferred }
    }
}

/// 主経路で十分な結果が得られなかったときに使う外部抽出器
pub trait FallbackExtractor {
    fn extract(&self, input: &ResolvedInput) -> anyhow::Result<ExtractionResult>;
}

/// アップロードされたファイル群から抽出結果と推定値を作る。
///
/// 返す `Err` はバンドル不備と空のアップロードだけで、
/// 壊れたアーカイブやデコード失敗、未対応形式はゼロ埋めの記録として返す。
pub fn extract(files: Vec<UploadedFile>) -> Result<Extraction> {
    let input = resolve(files)?;
    Ok(Extraction::new(extract_resolved(&input)))
}

/// 解決済みの入力を解析する。失敗しない
pub fn extract_resolved(input: &ResolvedInput) -> ExtractionResult {
    info!(
        "Extracting {} as {}",
        input.original_file_name,
        input.format.tag()
    );

    let features = match parse(input) {
        ParseOutcome::Features(features) => features,
        ParseOutcome::Degraded(note) => {
            warn!(
                "Extraction of {} degraded: {}",
                input.original_file_name, note
            );
            let mut result = empty_result(input, format!("{} ({})", input.format.tag(), note));
            result.degraded = true;
            return result;
        }
        ParseOutcome::PassThrough => {
            let mut result = empty_result(input, input.format.tag());
            if input.format == SourceFormat::Raster {
                result.geometry_type = GeometryType::Raster;
                result.coordinate_system = resolve_crs(input.projection.as_deref());
            } else {
                warn!("Unsupported format: {}", input.original_file_name);
            }
            return result;
        }
    };

    let result = ExtractionResult {
        feature_count: features.len() as u64,
        geometry_type: geometry_type(&features),
        bounding_box: bounding_box(&features),
        coordinate_system: resolve_crs(input.projection.as_deref()),
        attributes: infer_attribute_types(&features),
        layer_name: input.layer_name.clone(),
        file_size: input.file_size,
        original_file_name: input.original_file_name.clone(),
        data_format: input.format.tag().to_string(),
        degraded: false,
    };

    info!(
        "Extracted {} features ({}) from {}",
        result.feature_count, result.geometry_type, result.original_file_name
    );
    debug!("Bounding box: {:?}", result.bounding_box);
    result
}

fn empty_result(input: &ResolvedInput, data_format: impl Into<String>) -> ExtractionResult {
    ExtractionResult::empty(
        input.layer_name.clone(),
        input.original_file_name.clone(),
        input.file_size,
        data_format,
    )
}

/// 主経路の結果が不完全なときだけ外部抽出器を呼ぶ。
///
/// 外部抽出器が失敗した場合は主経路の結果を返す。
pub fn extract_with_fallback(
    files: Vec<UploadedFile>,
    fallback: &dyn FallbackExtractor,
) -> Result<Extraction> {
    let input = resolve(files)?;
    let primary = extract_resolved(&input);
    if primary.is_complete() {
        return Ok(Extraction::new(primary));
    }

    info!(
        "Primary extraction of {} incomplete, trying fallback extractor",
        input.original_file_name
    );
    match run_fallback(fallback, &input) {
        Ok(result) => Ok(Extraction::new(result)),
        Err(e) => {
            warn!("{}", e);
            Ok(Extraction::new(primary))
        }
    }
}

/// 外部抽出器を実行し、エラーをクレートのエラー型に変換する
pub fn run_fallback(
    fallback: &dyn FallbackExtractor,
    input: &ResolvedInput,
) -> Result<ExtractionResult> {
    fallback
        .extract(input)
        .map_err(|e| Error::Fallback(format!("{:#}", e)))
}

/// 抽出結果・推定値・利用者の編集を統合してレコードを作る
pub fn build_record(
    extraction: &Extraction,
    defaults: &RecordDefaults,
    overrides: Option<&Value>,
) -> Result<MetadataRecord> {
    let record = MetadataRecord::from_extraction(&extraction.result, &extraction.inferred, defaults);
    match overrides {
        Some(overrides) => record.with_overrides(overrides),
        None => Ok(record),
    }
}
