//! Text result-set decoding
//!
//! The probe issues plain-text queries (SHOW PROCESSLIST, SHOW MASTER STATUS,
//! SHOW SLAVE STATUS) and needs the replies as rows with named columns. This
//! module holds the pure parsing: length-encoded values, column definitions,
//! text rows, and the `ResultSet` container the readers consume.

use thiserror::Error;

/// Error while decoding result-set packets
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated packet")]
    Truncated,
    #[error("invalid length encoding")]
    InvalidLength,
    #[error("invalid utf-8 in {0}")]
    Utf8(&'static str),
}

/// A complete text result set: column names plus rows of nullable strings
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Result set with no rows (e.g. server replied OK)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value of `column` in row `row`, if the row exists and the cell is
    /// non-NULL. Column names match the server's capitalization loosely
    /// ("File" and "file" are the same column).
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Iterate row indexes; used when scanning the whole processlist
    pub fn row_indexes(&self) -> std::ops::Range<usize> {
        0..self.rows.len()
    }
}

/// Parse a length-encoded integer, returning the value and bytes consumed
pub fn parse_lenenc_int(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    let Some(&header) = data.first() else {
        return Err(DecodeError::Truncated);
    };
    match header {
        b @ 0..=0xFA => Ok((b as u64, 1)),
        0xFC if data.len() >= 3 => Ok((u16::from_le_bytes([data[1], data[2]]) as u64, 3)),
        0xFD if data.len() >= 4 => {
            Ok((u32::from_le_bytes([data[1], data[2], data[3], 0]) as u64, 4))
        }
        0xFE if data.len() >= 9 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[1..9]);
            Ok((u64::from_le_bytes(bytes), 9))
        }
        0xFC..=0xFE => Err(DecodeError::Truncated),
        _ => Err(DecodeError::InvalidLength),
    }
}

/// Parse a length-encoded string; `None` is a NULL cell (0xFB marker).
/// Returns the value and total bytes consumed.
pub fn parse_lenenc_str(data: &[u8]) -> Result<(Option<String>, usize), DecodeError> {
    if data.first() == Some(&0xFB) {
        return Ok((None, 1));
    }

    let (len, header) = parse_lenenc_int(data)?;
    let len = len as usize;
    if data.len() < header + len {
        return Err(DecodeError::Truncated);
    }

    let s = String::from_utf8(data[header..header + len].to_vec())
        .map_err(|_| DecodeError::Utf8("string value"))?;
    Ok((Some(s), header + len))
}

/// Extract the column name from a ColumnDefinition41 packet
///
/// Layout is six length-encoded strings (catalog, schema, table, org_table,
/// name, org_name) followed by fixed fields the probe does not need.
pub fn parse_column_name(payload: &[u8]) -> Result<String, DecodeError> {
    let mut offset = 0;
    let mut name = None;

    for field in 0..5 {
        let (value, consumed) = parse_lenenc_str(&payload[offset..])?;
        offset += consumed;
        if field == 4 {
            name = value;
        }
    }

    name.ok_or(DecodeError::Utf8("column name"))
}

/// Parse one text-protocol row into `column_count` nullable cells
pub fn parse_text_row(
    payload: &[u8],
    column_count: usize,
) -> Result<Vec<Option<String>>, DecodeError> {
    let mut offset = 0;
    let mut cells = Vec::with_capacity(column_count);

    for _ in 0..column_count {
        let (value, consumed) = parse_lenenc_str(&payload[offset..])?;
        offset += consumed;
        cells.push(value);
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenenc(s: &str) -> Vec<u8> {
        let mut out = vec![s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_lenenc_int_one_byte() {
        assert_eq!(parse_lenenc_int(&[0x05]).unwrap(), (5, 1));
        assert_eq!(parse_lenenc_int(&[0xFA]).unwrap(), (0xFA, 1));
    }

    #[test]
    fn test_lenenc_int_wide_forms() {
        assert_eq!(parse_lenenc_int(&[0xFC, 0x10, 0x27]).unwrap(), (10000, 3));
        assert_eq!(
            parse_lenenc_int(&[0xFD, 0x01, 0x00, 0x10]).unwrap(),
            (0x10_0001, 4)
        );
        assert_eq!(
            parse_lenenc_int(&[0xFE, 1, 0, 0, 0, 0, 0, 0, 0]).unwrap(),
            (1, 9)
        );
    }

    #[test]
    fn test_lenenc_int_truncated() {
        assert!(matches!(
            parse_lenenc_int(&[0xFC, 0x10]),
            Err(DecodeError::Truncated)
        ));
        assert!(matches!(parse_lenenc_int(&[]), Err(DecodeError::Truncated)));
    }

    #[test]
    fn test_lenenc_str_null_cell() {
        let (value, consumed) = parse_lenenc_str(&[0xFB]).unwrap();
        assert!(value.is_none());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_parse_column_name_from_definition() {
        // catalog, schema, table, org_table, name
        let mut payload = Vec::new();
        payload.extend(lenenc("def"));
        payload.extend(lenenc(""));
        payload.extend(lenenc(""));
        payload.extend(lenenc(""));
        payload.extend(lenenc("Position"));
        payload.extend(lenenc("Position")); // org_name, ignored

        assert_eq!(parse_column_name(&payload).unwrap(), "Position");
    }

    #[test]
    fn test_parse_text_row_with_null() {
        let mut payload = Vec::new();
        payload.extend(lenenc("mysql-bin.000012"));
        payload.push(0xFB);
        payload.extend(lenenc("4711"));

        let row = parse_text_row(&payload, 3).unwrap();
        assert_eq!(row[0].as_deref(), Some("mysql-bin.000012"));
        assert!(row[1].is_none());
        assert_eq!(row[2].as_deref(), Some("4711"));
    }

    #[test]
    fn test_result_set_named_access() {
        let rs = ResultSet::new(
            vec!["File".into(), "Position".into()],
            vec![vec![Some("mysql-bin.000012".into()), Some("4711".into())]],
        );
        assert_eq!(rs.value(0, "File"), Some("mysql-bin.000012"));
        assert_eq!(rs.value(0, "position"), Some("4711"));
        assert_eq!(rs.value(0, "Missing"), None);
        assert_eq!(rs.value(1, "File"), None);
    }
}
