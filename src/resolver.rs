use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// アップロードされた1ファイル
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self { name, bytes })
    }

    fn role(&self) -> MemberRole {
        MemberRole::of(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    Shapefile,
    ZippedShapefile,
    /// 展開できなかったアーカイブ。primary には元の .zip が入る
    CorruptArchive,
    Raster,
    Unsupported,
}

impl SourceFormat {
    pub fn tag(&self) -> &'static str {
        match self {
            SourceFormat::GeoJson => "GeoJSON",
            SourceFormat::Shapefile => "Shapefile",
            SourceFormat::ZippedShapefile | SourceFormat::CorruptArchive => "Shapefile (ZIP)",
            SourceFormat::Raster => "Raster",
            SourceFormat::Unsupported => "Unknown",
        }
    }
}

/// 解決済みの入力。Parser は常に primary から読み始める
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub format: SourceFormat,
    pub primary: Vec<u8>,
    pub attributes: Option<Vec<u8>>,
    pub projection: Option<String>,
    pub layer_name: String,
    pub original_file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberRole {
    Primary,
    AttributeTable,
    Projection,
    Encoding,
    Index,
    GeoJson,
    Archive,
    Raster,
    Other,
}

impl MemberRole {
    fn of(name: &str) -> Self {
        match extension(name).as_str() {
            "shp" => MemberRole::Primary,
            "dbf" => MemberRole::AttributeTable,
            "prj" => MemberRole::Projection,
            "cpg" => MemberRole::Encoding,
            "shx" => MemberRole::Index,
            "geojson" | "json" => MemberRole::GeoJson,
            "zip" => MemberRole::Archive,
            "tif" | "tiff" | "img" | "asc" => MemberRole::Raster,
            _ => MemberRole::Other,
        }
    }

    fn is_sidecar(&self) -> bool {
        matches!(
            self,
            MemberRole::AttributeTable
                | MemberRole::Projection
                | MemberRole::Encoding
                | MemberRole::Index
        )
    }
}

/// 小文字化した拡張子
pub fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// 拡張子を除いたファイル名（パス区切りも除去）
pub fn stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base)
        .to_string()
}

/// アップロードされたファイル群を解決する
pub fn resolve(files: Vec<UploadedFile>) -> Result<ResolvedInput> {
    if files.is_empty() {
        return Err(Error::EmptyUpload);
    }

    let file_size: u64 = files.iter().map(|f| f.bytes.len() as u64).sum();

    if files.iter().any(|f| f.role() == MemberRole::Primary) {
        // 順序に関係なく1つのバンドルとして扱う
        let original = files
            .iter()
            .find(|f| f.role() == MemberRole::Primary)
            .map(|f| f.name.clone())
            .unwrap_or_default();
        let members = files.into_iter().map(|f| (f.name, f.bytes)).collect();
        return assemble_bundle(members, SourceFormat::Shapefile, original, file_size);
    }

    if files.iter().all(|f| f.role().is_sidecar()) {
        let found = files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        warn!("Rejected upload without primary member: {}", found);
        return Err(Error::BundleIncomplete { found });
    }

    let count = files.len();
    let Some(file) = files.into_iter().find(|f| !f.role().is_sidecar()) else {
        return Err(Error::EmptyUpload);
    };
    if count > 1 {
        warn!(
            "Multiple files without a .shp member; using {} and ignoring the rest",
            file.name
        );
    }
    resolve_single(file, file_size)
}

fn resolve_single(file: UploadedFile, file_size: u64) -> Result<ResolvedInput> {
    let role = file.role();
    debug!("Resolving single upload {} as {:?}", file.name, role);

    let format = match role {
        MemberRole::Archive => return resolve_archive(file, file_size),
        MemberRole::GeoJson => SourceFormat::GeoJson,
        MemberRole::Raster => SourceFormat::Raster,
        _ => {
            warn!("Unsupported file type: {}", file.name);
            SourceFormat::Unsupported
        }
    };

    Ok(ResolvedInput {
        format,
        layer_name: stem(&file.name),
        original_file_name: file.name,
        primary: file.bytes,
        attributes: None,
        projection: None,
        file_size,
    })
}

fn resolve_archive(file: UploadedFile, file_size: u64) -> Result<ResolvedInput> {
    info!("Unpacking archive: {}", file.name);

    let members = match read_archive_members(&file.bytes) {
        Ok(members) => members,
        Err(e) => {
            warn!("Failed to unpack {}: {}", file.name, e);
            return Ok(ResolvedInput {
                format: SourceFormat::CorruptArchive,
                layer_name: stem(&file.name),
                original_file_name: file.name,
                primary: file.bytes,
                attributes: None,
                projection: None,
                file_size,
            });
        }
    };

    if !members
        .iter()
        .any(|(name, _)| MemberRole::of(name) == MemberRole::Primary)
    {
        return Err(Error::MissingPrimaryMember {
            archive: file.name,
        });
    }

    assemble_bundle(members, SourceFormat::ZippedShapefile, file.name, file_size)
}

/// アーカイブから .shp / .dbf / .prj の中身を取り出す
fn read_archive_members(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut members = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().to_string();
        let base = path.rsplit('/').next().unwrap_or(&path).to_string();
        // macOS のリソースフォークは無視
        if path.contains("__MACOSX/") || base.starts_with("._") {
            continue;
        }
        match MemberRole::of(&base) {
            MemberRole::Primary | MemberRole::AttributeTable | MemberRole::Projection => {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                debug!("Archive member {} ({} bytes)", path, content.len());
                members.push((path, content));
            }
            _ => debug!("Skipping archive member {}", path),
        }
    }

    Ok(members)
}

/// primary を先頭に置き、同じ stem の付随ファイルを優先して組み立てる
fn assemble_bundle(
    mut members: Vec<(String, Vec<u8>)>,
    format: SourceFormat,
    original_file_name: String,
    file_size: u64,
) -> Result<ResolvedInput> {
    let Some(index) = members
        .iter()
        .position(|(name, _)| MemberRole::of(name) == MemberRole::Primary)
    else {
        return Err(Error::MissingPrimaryMember {
            archive: original_file_name,
        });
    };
    members.swap(0, index);

    let mut members = members.into_iter();
    let Some((primary_name, primary)) = members.next() else {
        return Err(Error::EmptyUpload);
    };
    let layer_name = stem(&primary_name);
    let key = layer_name.to_lowercase();

    let mut attributes: Option<(bool, Vec<u8>)> = None;
    let mut projection: Option<(bool, Vec<u8>)> = None;
    for (name, bytes) in members {
        let same_stem = stem(&name).to_lowercase() == key;
        let slot = match MemberRole::of(&name) {
            MemberRole::AttributeTable => &mut attributes,
            MemberRole::Projection => &mut projection,
            _ => continue,
        };
        // 同名の付随ファイルが見つかれば置き換える
        if slot.as_ref().map_or(true, |(matched, _)| !matched && same_stem) {
            *slot = Some((same_stem, bytes));
        }
    }

    info!(
        "Resolved bundle {} (attributes: {}, projection: {})",
        primary_name,
        attributes.is_some(),
        projection.is_some()
    );

    Ok(ResolvedInput {
        format,
        primary,
        attributes: attributes.map(|(_, bytes)| bytes),
        projection: projection.map(|(_, bytes)| String::from_utf8_lossy(&bytes).into_owned()),
        layer_name,
        original_file_name,
        file_size,
    })
}

/// ディレクトリ内のファイルをアップロード単位にまとめる。
///
/// Shapefile の構成ファイルはディレクトリごとに stem でまとめ、それ以外は1ファイル1件。
pub fn collect_uploads(dir: &Path) -> Result<Vec<Vec<UploadedFile>>> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut uploads = Vec::new();
    let mut bundles: BTreeMap<String, Vec<UploadedFile>> = BTreeMap::new();

    for path in entries {
        if path.is_dir() {
            uploads.extend(collect_uploads(&path)?);
            continue;
        }
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if name.starts_with('.') {
            continue;
        }
        let role = MemberRole::of(&name);
        match role {
            MemberRole::Primary
            | MemberRole::AttributeTable
            | MemberRole::Projection
            | MemberRole::Encoding
            | MemberRole::Index => {
                bundles
                    .entry(stem(&name).to_lowercase())
                    .or_default()
                    .push(UploadedFile::from_path(&path)?);
            }
            MemberRole::GeoJson | MemberRole::Archive | MemberRole::Raster => {
                uploads.push(vec![UploadedFile::from_path(&path)?]);
            }
            MemberRole::Other => debug!("Skipping non-dataset file {:?}", path),
        }
    }

    uploads.extend(bundles.into_values());
    Ok(uploads)
}
