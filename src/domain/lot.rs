// ==========================================
// 生产序列号矩阵 - 批次/序列号实体
// ==========================================

use crate::domain::product::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LotId = i64;

/// 批次/序列号记录
/// 唯一性: (name, product_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub name: String,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}
