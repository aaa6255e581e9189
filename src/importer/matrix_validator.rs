// ==========================================
// 生产序列号矩阵 - CSV 结构校验器
// ==========================================
// 校验顺序（遇到第一个失败即返回）:
// 1) CSV 可解析
// 2) 成品编码与生产订单一致
// 3) 首个成品的组件编码集合（排序后）与 CSV 表头一致
// ==========================================

use crate::domain::matrix::ComponentSlot;
use crate::error::{MatrixError, MatrixResult};
use crate::importer::csv_matrix::CsvSerialsMatrix;

// ==========================================
// MatrixValidator - 结构校验器
// ==========================================
pub struct MatrixValidator<'a> {
    expected_product_code: &'a str,
    lines: &'a [ComponentSlot],
}

impl<'a> MatrixValidator<'a> {
    /// # 参数
    /// - expected_product_code: 生产订单成品编码
    /// - lines: 当前矩阵单元格
    pub fn new(expected_product_code: &'a str, lines: &'a [ComponentSlot]) -> Self {
        Self {
            expected_product_code,
            lines,
        }
    }

    /// 首个成品单元的组件编码（排序后）
    pub fn expected_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = match self.lines.first() {
            Some(first) => self
                .lines
                .iter()
                .filter(|line| line.finished_lot_name == first.finished_lot_name)
                .map(|line| line.component.default_code.clone())
                .collect(),
            None => Vec::new(),
        };
        codes.sort();
        codes
    }

    /// 解析并校验 CSV 文本
    ///
    /// # 返回
    /// - Ok(CsvSerialsMatrix): 可导入
    /// - Err: 解析错误或结构不一致
    pub fn check(&self, csv_data: &str) -> MatrixResult<CsvSerialsMatrix> {
        let csv = CsvSerialsMatrix::parse(csv_data)?;

        if csv.product_fin() != self.expected_product_code {
            return Err(MatrixError::ProductMismatch {
                found: csv.product_fin().to_string(),
                expected: self.expected_product_code.to_string(),
            });
        }

        let expected_codes = self.expected_codes();
        let mut codes_in_csv = csv.products_raw().to_vec();
        codes_in_csv.sort();
        if expected_codes != codes_in_csv {
            return Err(MatrixError::ComponentSetMismatch {
                found: codes_in_csv,
                expected: expected_codes,
            });
        }

        Ok(csv)
    }

    /// 校验结果消息（成功时为空字符串）
    pub fn validate(&self, csv_data: &str) -> String {
        match self.check(csv_data) {
            Ok(_) => String::new(),
            Err(err) => err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matrix::FinishedUnit;
    use crate::domain::product::Product;
    use crate::domain::types::Tracking;

    fn component(id: i64, code: &str) -> Product {
        Product {
            id,
            default_code: code.to_string(),
            name: code.to_string(),
            tracking: Tracking::Serial,
            uom_rounding: 1.0,
        }
    }

    fn lines() -> Vec<ComponentSlot> {
        let a = component(1, "RAW-A");
        let b = component(2, "RAW-B");
        let mut lines = Vec::new();
        for number in 1..=2 {
            let unit = FinishedUnit::Pending { number };
            lines.push(ComponentSlot::new(&unit, 10, 1, &b, 0, 1.0));
            lines.push(ComponentSlot::new(&unit, 11, 1, &a, 1, 1.0));
            lines.push(ComponentSlot::new(&unit, 11, 1, &a, 2, 1.0));
        }
        lines
    }

    #[test]
    fn test_valid_csv_column_order_irrelevant() {
        let lines = lines();
        let validator = MatrixValidator::new("FIN", &lines);
        assert_eq!(validator.validate("FIN;RAW-A;RAW-B;RAW-A\nSN1;A1;B1;A2\n"), "");
        assert_eq!(validator.expected_codes(), vec!["RAW-A", "RAW-A", "RAW-B"]);
    }

    #[test]
    fn test_product_mismatch_reported_regardless_of_rows() {
        let lines = lines();
        let validator = MatrixValidator::new("FIN", &lines);
        let err = validator.check("OTHER;RAW-A;RAW-B;RAW-A\nSN1;A1;B1;A2\n").unwrap_err();
        assert!(err.is_structural_mismatch());

        let msg = validator.validate("OTHER;RAW-A;RAW-B;RAW-A\n");
        assert!(msg.contains("OTHER"));
        assert!(msg.contains("FIN"));
    }

    #[test]
    fn test_component_set_mismatch() {
        let lines = lines();
        let validator = MatrixValidator::new("FIN", &lines);
        let msg = validator.validate("FIN;RAW-A;RAW-B\nSN1;A1;B1\n");
        assert!(msg.contains("[\"RAW-A\", \"RAW-B\"]"));
        assert!(msg.contains("[\"RAW-A\", \"RAW-A\", \"RAW-B\"]"));
    }

    #[test]
    fn test_parse_error_propagated_verbatim() {
        let lines = lines();
        let validator = MatrixValidator::new("FIN", &lines);
        let msg = validator.validate("FIN;RAW-A;RAW-B;RAW-A\nSN1;A1\n");
        assert!(msg.contains("期望 3"));
    }

    #[test]
    fn test_empty_matrix_expects_no_components() {
        let validator = MatrixValidator::new("FIN", &[]);
        assert_eq!(validator.validate("FIN\nSN1\n"), "");
        assert!(!validator.validate("FIN;RAW-A\nSN1;A1\n").is_empty());
    }
}
