use std::io::Read;

use crate::error::DecodeError;
use crate::model::{Geometry, GeometryType, Nested};

pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;
const HEADER_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHeader {
    /// ファイル長（バイト）
    pub file_length: u64,
    pub shape_type: i32,
    pub bbox: [f64; 4],
}

/// .shp のレコードを1件ずつ読み出すストリーミングリーダー。
///
/// 各要素は地物1件に対応し、NULL シェイプは `Ok(None)` になる。
pub struct ShapeReader<R> {
    reader: R,
    header: ShapeHeader,
    consumed: u64,
    finished: bool,
}

impl<R: Read> ShapeReader<R> {
    pub fn new(mut reader: R) -> Result<Self, DecodeError> {
        let mut buf = [0u8; HEADER_LEN];
        if read_fully(&mut reader, &mut buf) != HEADER_LEN {
            return Err(DecodeError::Truncated("file header"));
        }

        // ファイルコードと長さはビッグエンディアン、それ以外はリトルエンディアン
        let file_code = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if file_code != FILE_CODE {
            return Err(DecodeError::InvalidFileCode(file_code));
        }
        let words = i32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]);
        let version = i32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let mut cursor = ByteCursor::new(&buf[32..68]);
        let shape_type = cursor.i32_le("file header")?;
        let bbox = [
            cursor.f64_le("file header")?,
            cursor.f64_le("file header")?,
            cursor.f64_le("file header")?,
            cursor.f64_le("file header")?,
        ];

        Ok(Self {
            reader,
            header: ShapeHeader {
                file_length: words.max(0) as u64 * 2,
                shape_type,
                bbox,
            },
            consumed: HEADER_LEN as u64,
            finished: false,
        })
    }

    pub fn header(&self) -> &ShapeHeader {
        &self.header
    }

    fn read_record(&mut self) -> Option<Result<Option<Geometry>, DecodeError>> {
        // ヘッダーに記録された長さを超えたら終了（末尾のゴミは無視する）
        if self.header.file_length > 0 && self.consumed >= self.header.file_length {
            return None;
        }

        let mut record_header = [0u8; 8];
        match read_fully(&mut self.reader, &mut record_header) {
            0 => return None,
            8 => {}
            _ => return Some(Err(DecodeError::Truncated("record header"))),
        }
        let words = i32::from_be_bytes([
            record_header[4],
            record_header[5],
            record_header[6],
            record_header[7],
        ]);
        if words < 2 {
            return Some(Err(DecodeError::Truncated("record header")));
        }

        let len = words as usize * 2;
        if self.header.file_length > 0 && self.consumed + 8 + len as u64 > self.header.file_length {
            return Some(Err(DecodeError::Truncated("record content")));
        }
        // 宣言長ではなく実際に読めた分だけ確保する
        let mut content = Vec::new();
        match (&mut self.reader).take(len as u64).read_to_end(&mut content) {
            Ok(n) if n == len => {}
            _ => return Some(Err(DecodeError::Truncated("record content"))),
        }
        self.consumed += 8 + len as u64;

        Some(decode_shape(&content))
    }
}

impl<R: Read> Iterator for ShapeReader<R> {
    type Item = Result<Option<Geometry>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.read_record();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

/// レコード本体を1つのジオメトリにデコードする
pub fn decode_shape(content: &[u8]) -> Result<Option<Geometry>, DecodeError> {
    let mut cursor = ByteCursor::new(content);
    let shape_type = cursor.i32_le("shape type")?;

    let geometry = match shape_type {
        0 => return Ok(None),
        1 | 11 | 21 => {
            let x = cursor.f64_le("point")?;
            let y = cursor.f64_le("point")?;
            Geometry {
                kind: GeometryType::Point,
                coordinates: Nested::point(x, y),
            }
        }
        8 | 18 | 28 => {
            cursor.skip(32, "bounding box")?;
            let count = cursor.count("multipoint")?;
            let points = cursor.points(count)?;
            Geometry {
                kind: GeometryType::MultiPoint,
                coordinates: Nested::List(points),
            }
        }
        3 | 13 | 23 => {
            let parts = read_parts(&mut cursor)?;
            if parts.len() == 1 {
                Geometry {
                    kind: GeometryType::LineString,
                    coordinates: parts.into_iter().next().unwrap_or(Nested::List(Vec::new())),
                }
            } else {
                Geometry {
                    kind: GeometryType::MultiLineString,
                    coordinates: Nested::List(parts),
                }
            }
        }
        5 | 15 | 25 | 31 => {
            let rings = read_parts(&mut cursor)?;
            group_rings(rings)
        }
        other => return Err(DecodeError::UnknownShapeType(other)),
    };

    Ok(Some(geometry))
}

/// PolyLine / Polygon 共通のパート構造を読む
fn read_parts(cursor: &mut ByteCursor<'_>) -> Result<Vec<Nested>, DecodeError> {
    cursor.skip(32, "bounding box")?;
    let num_parts = cursor.count("part count")?;
    let num_points = cursor.count("point count")?;

    // 件数はファイル由来なので、確保の前に残りバイト数と突き合わせる
    let needed = num_parts
        .saturating_mul(4)
        .saturating_add(num_points.saturating_mul(16));
    if needed > cursor.remaining() {
        return Err(DecodeError::Truncated("parts"));
    }

    let mut starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        starts.push(cursor.count("part index")?);
    }
    let points = cursor.points(num_points)?;

    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(num_points);
        if start > end || end > points.len() {
            return Err(DecodeError::Truncated("part index"));
        }
        parts.push(Nested::List(points[start..end].to_vec()));
    }
    Ok(parts)
}

/// 時計回りのリングを外周として、後続の反時計回りリングを穴として束ねる
fn group_rings(rings: Vec<Nested>) -> Geometry {
    let mut polygons: Vec<Vec<Nested>> = Vec::new();
    for ring in rings {
        match polygons.last_mut() {
            Some(current) if !is_clockwise(&ring) => current.push(ring),
            _ => polygons.push(vec![ring]),
        }
    }

    if polygons.len() == 1 {
        let rings = polygons.into_iter().next().unwrap_or_default();
        Geometry {
            kind: GeometryType::Polygon,
            coordinates: Nested::List(rings),
        }
    } else {
        Geometry {
            kind: GeometryType::MultiPolygon,
            coordinates: Nested::List(polygons.into_iter().map(Nested::List).collect()),
        }
    }
}

fn is_clockwise(ring: &Nested) -> bool {
    let Nested::List(points) = ring else {
        return false;
    };
    let coords: Vec<(f64, f64)> = points.iter().filter_map(Nested::as_position).collect();
    let twice_area: f64 = coords
        .windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum();
    twice_area < 0.0
}

/// EOF までに読めたバイト数を返す
pub(crate) fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    filled
}

pub(crate) struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DecodeError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or(DecodeError::Truncated(what))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn skip(&mut self, n: usize, what: &'static str) -> Result<(), DecodeError> {
        if self.pos + n > self.data.len() {
            return Err(DecodeError::Truncated(what));
        }
        self.pos += n;
        Ok(())
    }

    pub(crate) fn i32_le(&mut self, what: &'static str) -> Result<i32, DecodeError> {
        self.take::<4>(what).map(i32::from_le_bytes)
    }

    pub(crate) fn f64_le(&mut self, what: &'static str) -> Result<f64, DecodeError> {
        self.take::<8>(what).map(f64::from_le_bytes)
    }

    /// 非負の件数。負値は破損とみなす
    fn count(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let n = self.i32_le(what)?;
        usize::try_from(n).map_err(|_| DecodeError::Truncated(what))
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn points(&mut self, count: usize) -> Result<Vec<Nested>, DecodeError> {
        if count.saturating_mul(16) > self.remaining() {
            return Err(DecodeError::Truncated("points"));
        }
        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            let x = self.f64_le("points")?;
            let y = self.f64_le("points")?;
            points.push(Nested::point(x, y));
        }
        Ok(points)
    }
}
