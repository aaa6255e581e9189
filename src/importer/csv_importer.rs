// ==========================================
// 生产序列号矩阵 - CSV 导入/对账
// ==========================================
// 阶段 1: 成品序列号解析（已有则复用, 没有则新建）
// 阶段 2: 单元格绑定（每个 CSV 单元格只消耗一个矩阵单元格）
// 红线: 任何无法解析的引用直接报错, 不做静默修复
// ==========================================

use crate::domain::lot::Lot;
use crate::domain::matrix::ComponentSlot;
use crate::domain::product::ProductId;
use crate::domain::production::LocationId;
use crate::error::{MatrixError, MatrixResult};
use crate::importer::csv_matrix::CsvSerialsMatrix;
use crate::repository::{LotRegistry, StockReservation};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

// ==========================================
// CsvImporter - CSV 导入器
// ==========================================
pub struct CsvImporter<'a> {
    lot_repo: &'a dyn LotRegistry,
    stock_repo: &'a dyn StockReservation,
}

impl<'a> CsvImporter<'a> {
    /// # 参数
    /// - lot_repo: 批次登记
    /// - stock_repo: 可选批次来源（按单元格所属需求的库位查询）
    pub fn new(lot_repo: &'a dyn LotRegistry, stock_repo: &'a dyn StockReservation) -> Self {
        Self { lot_repo, stock_repo }
    }

    /// 阶段 1: 解析 CSV 中全部成品序列号
    ///
    /// # 返回
    /// - 按 CSV 行顺序的成品批次（用于整体替换向导的成品选择）
    #[instrument(skip(self, csv), fields(n_lines = csv.n_lines()))]
    pub fn resolve_finished_lots(
        &self,
        csv: &CsvSerialsMatrix,
        product_id: ProductId,
    ) -> MatrixResult<Vec<Lot>> {
        let mut lots = Vec::with_capacity(csv.n_lines());
        for serial in csv.finished_serials() {
            let lot = self.lot_repo.resolve_or_create(serial, product_id)?;
            lots.push(lot);
        }
        info!(count = lots.len(), "成品序列号解析完成");
        Ok(lots)
    }

    /// 阶段 2: 将 CSV 单元格绑定到矩阵单元格
    ///
    /// 规则:
    /// 1) 按 CSV 行顺序处理成品序列号, 只匹配已分配成品批次的单元格
    /// 2) 每个 (组件编码, 原材料序列号) 找一个尚未使用的同组件单元格, 用后移出候选
    /// 3) 原材料序列号必须在该单元格的可选批次中（名称精确匹配, 库位取单元格所属需求）
    ///
    /// # 返回
    /// - Ok(usize): 绑定的单元格数量
    /// - Err: 找不到单元格或序列号不可用（已绑定部分保留, 由外部事务回滚）
    #[instrument(skip(self, csv, lines), fields(n_lines = csv.n_lines(), slots = lines.len()))]
    pub fn bind_slots(&self, csv: &CsvSerialsMatrix, lines: &mut [ComponentSlot]) -> MatrixResult<usize> {
        let mut allowed_cache: HashMap<(ProductId, LocationId), Vec<Lot>> = HashMap::new();
        let mut bound = 0usize;

        for serial in csv.finished_serials() {
            let mut candidates: Vec<usize> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.finished_lot_id.is_some() && line.finished_lot_name == serial)
                .map(|(idx, _)| idx)
                .collect();

            let pairs = csv.raw_serials_for_finished(serial).unwrap_or_default();
            for (prod, raw_serial) in pairs {
                let position = candidates
                    .iter()
                    .position(|&idx| lines[idx].component.default_code == prod)
                    .ok_or_else(|| MatrixError::SlotNotFound {
                        component: prod.to_string(),
                        finished_serial: serial.to_string(),
                    })?;
                let idx = candidates.remove(position);

                let key = (lines[idx].component.id, lines[idx].location_id);
                if !allowed_cache.contains_key(&key) {
                    let lots = self.stock_repo.allowed_lots(key.0, key.1)?;
                    allowed_cache.insert(key, lots);
                }
                let allowed = &allowed_cache[&key];

                let matching_lot = allowed
                    .iter()
                    .find(|lot| lot.name == raw_serial)
                    .ok_or_else(|| MatrixError::SerialNotEligible {
                        serial: raw_serial.to_string(),
                        component: prod.to_string(),
                    })?;

                debug!(
                    finished_serial = serial,
                    component = prod,
                    raw_serial,
                    column = %lines[idx].column_name,
                    "单元格绑定"
                );
                lines[idx].component_lot = Some(matching_lot.clone());
                bound += 1;
            }
        }

        info!(bound, "单元格绑定完成");
        Ok(bound)
    }
}
