//! 名冊 CSV 解析。
//!
//! 欄位依標題文字對應而非位置；缺少的選填欄位給空字串。
//! 單列解碼失敗只記警告並略過，整份無法解析才回傳 `ParseError`。

use crate::domain::model::Participant;
use crate::utils::error::{CertError, Result};
use csv::StringRecord;

const CODE_HEADERS: &[&str] = &["code", "código", "codigo"];
const NAME_HEADERS: &[&str] = &["name", "nome", "full name"];
const REGISTRATION_HEADERS: &[&str] = &["registration", "matrícula", "matricula"];
const EMAIL_HEADERS: &[&str] = &["email", "e-mail", "email address"];

/// 去掉前後空白與引號
pub fn clean_cell(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    code: Option<usize>,
    name: Option<usize>,
    registration: Option<usize>,
    email: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut map = ColumnMap::default();

        for (index, raw) in headers.iter().enumerate() {
            let header = clean_cell(raw).to_lowercase();
            let slot = if CODE_HEADERS.contains(&header.as_str()) {
                &mut map.code
            } else if NAME_HEADERS.contains(&header.as_str()) {
                &mut map.name
            } else if REGISTRATION_HEADERS.contains(&header.as_str()) {
                &mut map.registration
            } else if EMAIL_HEADERS.contains(&header.as_str()) {
                &mut map.email
            } else {
                continue;
            };

            // 重複標題時以第一個為準
            if slot.is_none() {
                *slot = Some(index);
            }
        }

        map
    }

    fn cell(record: &StringRecord, column: Option<usize>) -> String {
        column
            .and_then(|index| record.get(index))
            .map(|value| clean_cell(value).to_string())
            .unwrap_or_default()
    }

    fn participant(&self, record: &StringRecord) -> Participant {
        Participant {
            code: Self::cell(record, self.code),
            name: Self::cell(record, self.name),
            registration: Self::cell(record, self.registration),
            email: Self::cell(record, self.email),
        }
    }
}

pub fn parse_roster(payload: &[u8]) -> Result<Vec<Participant>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload);

    let headers = reader
        .headers()
        .map_err(|e| CertError::parse(format!("cannot read header row: {}", e)))?
        .clone();

    if headers.iter().all(|h| clean_cell(h).is_empty()) {
        return Err(CertError::parse("roster payload has no header row"));
    }

    let columns = ColumnMap::from_headers(&headers);
    if columns.name.is_none() && columns.email.is_none() {
        return Err(CertError::parse(format!(
            "no name or email column among headers: {}",
            headers.iter().collect::<Vec<_>>().join(", ")
        )));
    }

    tracing::debug!("Roster column mapping: {:?}", columns);

    let mut participants = Vec::new();
    let mut skipped = 0usize;

    for (index, row) in reader.records().enumerate() {
        match row {
            Ok(record) => {
                if record.iter().all(|cell| clean_cell(cell).is_empty()) {
                    continue;
                }
                participants.push(columns.participant(&record));
            }
            Err(e) => {
                // 標題是第 1 行
                let line = e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(index as u64 + 2);
                tracing::warn!("⚠️ Skipping malformed roster row at line {}: {}", line, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "Parsed {} participants, skipped {} malformed rows",
            participants.len(),
            skipped
        );
    }

    Ok(participants)
}
