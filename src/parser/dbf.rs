use chrono::NaiveDate;
use std::io::Read;

use super::shp::read_fully;
use crate::error::DecodeError;
use crate::model::AttributeValue;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const EOF_MARKER: u8 = 0x1A;
const DELETED: u8 = b'*';

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: char,
    pub length: usize,
    pub decimals: u8,
}

/// dBase 属性テーブルのストリーミングリーダー。
///
/// 1レコードごとにフィールド定義順の `(名前, 値)` 列を返す。削除済みレコードは空の列になる。
pub struct DbfReader<R> {
    reader: R,
    fields: Vec<FieldDescriptor>,
    record_length: usize,
    remaining: u32,
}

impl<R: Read> DbfReader<R> {
    pub fn new(mut reader: R) -> Result<Self, DecodeError> {
        let mut header = [0u8; HEADER_LEN];
        if read_fully(&mut reader, &mut header) != HEADER_LEN {
            return Err(DecodeError::Truncated("attribute table header"));
        }

        let record_count = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let header_length = u16::from_le_bytes([header[8], header[9]]) as usize;
        let record_length = u16::from_le_bytes([header[10], header[11]]) as usize;
        if header_length <= HEADER_LEN || record_length == 0 {
            return Err(DecodeError::InvalidAttributeTable(format!(
                "header length {} / record length {}",
                header_length, record_length
            )));
        }

        let mut descriptors = vec![0u8; header_length - HEADER_LEN];
        if read_fully(&mut reader, &mut descriptors) != descriptors.len() {
            return Err(DecodeError::Truncated("field descriptors"));
        }

        let mut fields = Vec::new();
        for chunk in descriptors.chunks(DESCRIPTOR_LEN) {
            if chunk[0] == HEADER_TERMINATOR || chunk.len() < DESCRIPTOR_LEN {
                break;
            }
            let name_end = chunk[..11].iter().position(|&b| b == 0).unwrap_or(11);
            fields.push(FieldDescriptor {
                name: String::from_utf8_lossy(&chunk[..name_end]).trim().to_string(),
                kind: chunk[11] as char,
                length: chunk[16] as usize,
                decimals: chunk[17],
            });
        }

        // 先頭1バイトは削除フラグ
        let declared: usize = 1 + fields.iter().map(|f| f.length).sum::<usize>();
        if declared > record_length {
            return Err(DecodeError::InvalidAttributeTable(format!(
                "fields span {} bytes but records are {} bytes",
                declared, record_length
            )));
        }

        Ok(Self {
            reader,
            fields,
            record_length,
            remaining: record_count,
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn read_record(&mut self) -> Option<Result<Vec<(String, AttributeValue)>, DecodeError>> {
        if self.remaining == 0 {
            return None;
        }

        let mut record = vec![0u8; self.record_length];
        let filled = read_fully(&mut self.reader, &mut record);
        if filled == 0 || (filled >= 1 && record[0] == EOF_MARKER) {
            return None;
        }
        if filled != self.record_length {
            self.remaining = 0;
            return Some(Err(DecodeError::Truncated("attribute record")));
        }
        self.remaining -= 1;

        if record[0] == DELETED {
            return Some(Ok(Vec::new()));
        }

        let mut offset = 1;
        let values = self
            .fields
            .iter()
            .map(|field| {
                let raw = &record[offset..offset + field.length];
                offset += field.length;
                (field.name.clone(), decode_value(field, raw))
            })
            .collect();
        Some(Ok(values))
    }
}

impl<R: Read> Iterator for DbfReader<R> {
    type Item = Result<Vec<(String, AttributeValue)>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record()
    }
}

fn decode_value(field: &FieldDescriptor, raw: &[u8]) -> AttributeValue {
    match field.kind {
        'I' if raw.len() >= 4 => {
            AttributeValue::Integer(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
        }
        'O' if raw.len() >= 8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[..8]);
            AttributeValue::Real(f64::from_le_bytes(bytes))
        }
        kind => {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
            if text.is_empty() {
                return AttributeValue::Null;
            }
            match kind {
                'N' | 'F' => {
                    if field.decimals == 0 {
                        if let Ok(i) = text.parse::<i64>() {
                            return AttributeValue::Integer(i);
                        }
                    }
                    text.parse::<f64>()
                        .map(AttributeValue::Real)
                        .unwrap_or(AttributeValue::Null)
                }
                'L' => match text {
                    "T" | "t" | "Y" | "y" => AttributeValue::Bool(true),
                    "F" | "f" | "N" | "n" => AttributeValue::Bool(false),
                    _ => AttributeValue::Null,
                },
                'D' => NaiveDate::parse_from_str(text, "%Y%m%d")
                    .map(AttributeValue::Date)
                    .unwrap_or_else(|_| AttributeValue::Text(text.to_string())),
                _ => AttributeValue::Text(text.to_string()),
            }
        }
    }
}
