// ==========================================
// 生产序列号矩阵 - CSV 序列号矩阵解析器
// ==========================================
// 格式: 分号分隔, 固定方言
// 第 1 行: <成品编码>;<原材料编码1>;<原材料编码2>;...
// 第 N 行: <成品序列号>;<原材料序列号1>;<原材料序列号2>;...
// 红线: 列数不一致是解析错误, 不产生部分记录
// ==========================================

use crate::error::ParseError;
use csv::{ReaderBuilder, Trim};
use std::fmt;

/// 分隔符（固定为分号）
pub const CSV_DELIMITER: u8 = b';';

// ==========================================
// CsvSerialsMatrix - 解析结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CsvSerialsMatrix {
    product_fin: String,
    products_raw: Vec<String>,
    // 按 CSV 行顺序保存 (成品序列号, 原材料序列号列表)
    serials: Vec<(String, Vec<String>)>,
}

impl CsvSerialsMatrix {
    /// 解析 CSV 文本
    ///
    /// # 返回
    /// - Ok(CsvSerialsMatrix): 解析成功
    /// - Err(ParseError::ColumnCountMismatch): 某行列数与表头不一致
    /// - Err(ParseError): 其他格式错误
    pub fn parse(raw_txt: &str) -> Result<Self, ParseError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(CSV_DELIMITER)
            .has_headers(false)
            .flexible(true) // 列数由本函数自行校验
            .trim(Trim::All)
            .from_reader(raw_txt.as_bytes());

        let mut records = reader.records();

        let head = match records.next() {
            Some(result) => result.map_err(|e| ParseError::Unreadable(e.to_string()))?,
            None => return Err(ParseError::MissingHeader),
        };
        let mut head_fields = head.iter().map(|s| s.to_string());
        let product_fin = head_fields.next().ok_or(ParseError::MissingHeader)?;
        let products_raw: Vec<String> = head_fields.collect();

        let mut serials: Vec<(String, Vec<String>)> = Vec::new();
        for result in records {
            let record = result.map_err(|e| ParseError::Unreadable(e.to_string()))?;
            let mut fields = record.iter().map(|s| s.to_string());
            let serial_fin = match fields.next() {
                Some(s) => s,
                None => continue,
            };
            let serials_raw: Vec<String> = fields.collect();

            if serials_raw.len() != products_raw.len() {
                return Err(ParseError::ColumnCountMismatch {
                    found: serials_raw,
                    expected: products_raw.len(),
                });
            }
            if serials.iter().any(|(s, _)| *s == serial_fin) {
                return Err(ParseError::DuplicateFinishedSerial(serial_fin));
            }
            serials.push((serial_fin, serials_raw));
        }

        Ok(Self {
            product_fin,
            products_raw,
            serials,
        })
    }

    /// 成品编码
    pub fn product_fin(&self) -> &str {
        &self.product_fin
    }

    /// 原材料编码（按列顺序）
    pub fn products_raw(&self) -> &[String] {
        &self.products_raw
    }

    pub fn n_raw_products(&self) -> usize {
        self.products_raw.len()
    }

    pub fn n_lines(&self) -> usize {
        self.serials.len()
    }

    /// 表头非空且至少有一行数据
    pub fn is_valid(&self) -> bool {
        !self.serials.is_empty() && !self.products_raw.is_empty()
    }

    /// 成品序列号（按 CSV 行顺序）
    pub fn finished_serials(&self) -> impl Iterator<Item = &str> {
        self.serials.iter().map(|(s, _)| s.as_str())
    }

    /// 某成品序列号对应的 (原材料编码, 原材料序列号) 列表, 按列顺序
    ///
    /// # 返回
    /// - None: CSV 中不存在该成品序列号
    pub fn raw_serials_for_finished(&self, fin_serial: &str) -> Option<Vec<(&str, &str)>> {
        self.serials
            .iter()
            .find(|(s, _)| s == fin_serial)
            .map(|(_, raw)| {
                self.products_raw
                    .iter()
                    .map(|p| p.as_str())
                    .zip(raw.iter().map(|r| r.as_str()))
                    .collect()
            })
    }
}

impl fmt::Display for CsvSerialsMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} => {}: {} lines",
            self.products_raw,
            self.product_fin,
            self.n_lines()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let csv = CsvSerialsMatrix::parse("FIN;RAW-A;RAW-B\nSN1;A1;B1\nSN2;A2;B2\n").unwrap();

        assert_eq!(csv.product_fin(), "FIN");
        assert_eq!(csv.products_raw(), &["RAW-A".to_string(), "RAW-B".to_string()]);
        assert_eq!(csv.n_raw_products(), 2);
        assert_eq!(csv.n_lines(), 2);
        assert!(csv.is_valid());
        assert_eq!(csv.finished_serials().collect::<Vec<_>>(), vec!["SN1", "SN2"]);
        assert_eq!(
            csv.raw_serials_for_finished("SN2").unwrap(),
            vec![("RAW-A", "A2"), ("RAW-B", "B2")]
        );
        assert!(csv.raw_serials_for_finished("SN9").is_none());
    }

    #[test]
    fn test_parse_column_count_mismatch() {
        let err = CsvSerialsMatrix::parse("FIN;RAW-A;RAW-B\nSN1;A1;B1\nSN2;A2\n").unwrap_err();

        assert_eq!(
            err,
            ParseError::ColumnCountMismatch {
                found: vec!["A2".to_string()],
                expected: 2
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("A2"));
        assert!(msg.contains("期望 2"));
    }

    #[test]
    fn test_parse_empty_text_is_missing_header() {
        assert_eq!(CsvSerialsMatrix::parse("").unwrap_err(), ParseError::MissingHeader);
    }

    #[test]
    fn test_header_only_is_not_valid() {
        let csv = CsvSerialsMatrix::parse("FIN;RAW-A\n").unwrap();
        assert_eq!(csv.n_lines(), 0);
        assert!(!csv.is_valid());

        let csv = CsvSerialsMatrix::parse("FIN\nSN1\n").unwrap();
        assert_eq!(csv.n_raw_products(), 0);
        assert!(!csv.is_valid());
    }

    #[test]
    fn test_parse_trims_and_skips_blank_lines() {
        let csv = CsvSerialsMatrix::parse("FIN ; RAW-A\r\n\r\nSN1 ; A1\r\n").unwrap();
        assert_eq!(csv.product_fin(), "FIN");
        assert_eq!(csv.raw_serials_for_finished("SN1").unwrap(), vec![("RAW-A", "A1")]);
    }

    #[test]
    fn test_duplicate_finished_serial_rejected() {
        let err = CsvSerialsMatrix::parse("FIN;RAW-A\nSN1;A1\nSN1;A2\n").unwrap_err();
        assert_eq!(err, ParseError::DuplicateFinishedSerial("SN1".to_string()));
    }

    #[test]
    fn test_display() {
        let csv = CsvSerialsMatrix::parse("FIN;RAW-A\nSN1;A1\n").unwrap();
        assert_eq!(csv.to_string(), "[\"RAW-A\"] => FIN: 1 lines");
    }
}
