// ==========================================
// 生产序列号矩阵 - 导入层
// ==========================================
// 职责: CSV 矩阵解析、结构校验、单元格对账
// 格式: 分号分隔, 首行表头 = 成品编码 + 组件编码
// ==========================================

pub mod csv_importer;
pub mod csv_matrix;
pub mod matrix_validator;

// 重导出
pub use csv_importer::CsvImporter;
pub use csv_matrix::CsvSerialsMatrix;
pub use matrix_validator::MatrixValidator;
