// ==========================================
// 生产序列号矩阵 - 矩阵生成引擎
// ==========================================
// 输入: 生产订单原材料需求 + 成品序列号选择 + 是否包含批次组件
// 输出: 全量矩阵单元格列表
// 红线: 每次变更全量重建, 不做增量比对
// ==========================================

use crate::domain::float_utils::float_is_zero;
use crate::domain::lot::Lot;
use crate::domain::matrix::{ComponentSlot, FinishedUnit};
use crate::domain::product::Product;
use crate::domain::production::{LocationId, MoveId, RawMove};
use crate::domain::types::Tracking;
use tracing::{debug, instrument};

/// 每件成品的单元格模板
#[derive(Debug, Clone, PartialEq)]
pub struct SlotTemplate {
    pub move_id: MoveId,
    pub location_id: LocationId,
    pub component: Product,
    pub ordinal: u32,
    pub lot_qty: f64,
}

// ==========================================
// MatrixGenerator - 矩阵生成引擎
// ==========================================
pub struct MatrixGenerator {
    include_lots: bool,
}

impl MatrixGenerator {
    /// # 参数
    /// - include_lots: 是否包含批次追踪组件（序列号组件始终包含）
    pub fn new(include_lots: bool) -> Self {
        Self { include_lots }
    }

    /// 计算每件成品的单元格模板
    ///
    /// 规则:
    /// 1) 需求数量在舍入精度内为零 → 视为已移除的组件, 跳过
    /// 2) 有 BOM 行: 单件用量 = BOM 行数量 / BOM 基准数量
    ///    无 BOM 行: 单件用量 = 需求数量 / 订单数量
    /// 3) 序列号组件: 单件用量向下取整, 每个单位一个单元格（数量 1）
    /// 4) 批次组件: 仅当 include_lots 时生成一个单元格（数量 = 单件用量）
    pub fn component_template(&self, raw_moves: &[RawMove], production_qty: f64) -> Vec<SlotTemplate> {
        let mut templates = Vec::new();

        for mv in raw_moves {
            if float_is_zero(mv.product_qty, mv.product.uom_rounding) {
                continue;
            }

            // TODO: BOM/订单与产品默认计量单位不一致时需做单位换算
            let qty_per_finished_unit = match mv.bom_ratio {
                Some(ratio) => ratio.per_unit(),
                None if production_qty > 0.0 => mv.product_qty / production_qty,
                None => 0.0,
            };

            match mv.product.tracking {
                Tracking::Serial => {
                    let count = qty_per_finished_unit.floor().max(0.0) as u32;
                    for i in 1..=count {
                        templates.push(SlotTemplate {
                            move_id: mv.id,
                            location_id: mv.location_id,
                            component: mv.product.clone(),
                            // 单件只需一个时不编号
                            ordinal: if count > 1 { i } else { 0 },
                            lot_qty: 1.0,
                        });
                    }
                }
                Tracking::Lot => {
                    if self.include_lots {
                        templates.push(SlotTemplate {
                            move_id: mv.id,
                            location_id: mv.location_id,
                            component: mv.product.clone(),
                            ordinal: 0,
                            lot_qty: qty_per_finished_unit,
                        });
                    }
                }
                Tracking::None => {}
            }
        }

        templates
    }

    /// 生成全量矩阵
    ///
    /// 成品序列号按顺序依次占用, 用完后其余成品标记为 "(New Lot N)"
    ///
    /// # 参数
    /// - raw_moves: 原材料需求
    /// - production_qty: 订单数量（取整数部分作为成品件数）
    /// - finished_lots: 已选择的成品序列号
    #[instrument(skip(self, raw_moves, finished_lots), fields(
        moves_count = raw_moves.len(),
        finished_lots_count = finished_lots.len(),
        include_lots = self.include_lots
    ))]
    pub fn generate(
        &self,
        raw_moves: &[RawMove],
        production_qty: f64,
        finished_lots: &[Lot],
    ) -> Vec<ComponentSlot> {
        let templates = self.component_template(raw_moves, production_qty);
        let units = production_qty.max(0.0).trunc() as usize;

        let mut pool = finished_lots.iter();
        let mut new_lot_number = 0u32;
        let mut slots = Vec::with_capacity(units * templates.len());

        for _ in 0..units {
            let unit = match pool.next() {
                Some(lot) => FinishedUnit::Existing(lot.clone()),
                None => {
                    new_lot_number += 1;
                    FinishedUnit::Pending {
                        number: new_lot_number,
                    }
                }
            };
            for template in &templates {
                slots.push(ComponentSlot::new(
                    &unit,
                    template.move_id,
                    template.location_id,
                    &template.component,
                    template.ordinal,
                    template.lot_qty,
                ));
            }
        }

        debug!(
            units,
            slots_per_unit = templates.len(),
            slots_count = slots.len(),
            "矩阵生成完成"
        );
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::production::BomRatio;
    use chrono::Utc;

    fn product(id: i64, code: &str, tracking: Tracking) -> Product {
        Product {
            id,
            default_code: code.to_string(),
            name: code.to_string(),
            tracking,
            uom_rounding: 0.01,
        }
    }

    fn raw_move(id: i64, product: Product, qty: f64, bom: Option<(f64, f64)>) -> RawMove {
        RawMove {
            id,
            production_id: 1,
            product,
            product_qty: qty,
            bom_ratio: bom.map(|(line_qty, bom_qty)| BomRatio { line_qty, bom_qty }),
            location_id: 1,
        }
    }

    fn lot(id: i64, name: &str) -> Lot {
        Lot {
            id,
            name: name.to_string(),
            product_id: 100,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_two_serials_per_unit_three_units() {
        let moves = vec![raw_move(10, product(1, "A", Tracking::Serial), 6.0, Some((2.0, 1.0)))];
        let slots = MatrixGenerator::new(false).generate(&moves, 3.0, &[]);

        assert_eq!(slots.len(), 6);
        for unit in 1..=3 {
            let label = format!("(New Lot {})", unit);
            let names: Vec<_> = slots
                .iter()
                .filter(|s| s.finished_lot_name == label)
                .map(|s| s.column_name.as_str())
                .collect();
            assert_eq!(names, vec!["[A] A (1)", "[A] A (2)"]);
        }
        assert!(slots.iter().all(|s| s.lot_qty == 1.0 && s.finished_lot_id.is_none()));
        assert!(slots.iter().all(|s| s.move_id == 10 && s.location_id == 1));
    }

    #[test]
    fn test_zero_quantity_requirement_skipped() {
        let moves = vec![
            raw_move(10, product(1, "A", Tracking::Serial), 0.001, Some((1.0, 1.0))),
            raw_move(11, product(2, "B", Tracking::Serial), 2.0, None),
        ];
        let slots = MatrixGenerator::new(true).generate(&moves, 2.0, &[]);

        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.component.default_code == "B"));
        // 单件只需一个序列号时不编号
        assert_eq!(slots[0].column_name, "[B] B");
    }

    #[test]
    fn test_fractional_serial_ratio_rounds_down() {
        let moves = vec![raw_move(10, product(1, "A", Tracking::Serial), 2.3, None)];
        let slots = MatrixGenerator::new(false).generate(&moves, 1.0, &[]);
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_lot_components_only_when_included() {
        let moves = vec![
            raw_move(10, product(1, "A", Tracking::Serial), 2.0, None),
            raw_move(11, product(2, "GLUE", Tracking::Lot), 1.5, Some((0.75, 1.0))),
            raw_move(12, product(3, "SCREW", Tracking::None), 8.0, None),
        ];

        let without = MatrixGenerator::new(false).generate(&moves, 2.0, &[]);
        assert_eq!(without.len(), 2);

        let with = MatrixGenerator::new(true).generate(&moves, 2.0, &[]);
        assert_eq!(with.len(), 4);
        let glue: Vec<_> = with.iter().filter(|s| s.component.default_code == "GLUE").collect();
        assert_eq!(glue.len(), 2);
        assert_eq!(glue[0].ordinal, 0);
        assert_eq!(glue[0].column_name, "[GLUE] GLUE");
        assert!((glue[0].lot_qty - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_finished_lots_consumed_in_order_then_pending() {
        let moves = vec![raw_move(10, product(1, "A", Tracking::Serial), 3.0, None)];
        let lots = vec![lot(7, "SN-7"), lot(8, "SN-8")];
        let slots = MatrixGenerator::new(false).generate(&moves, 3.0, &lots);

        let labels: Vec<_> = slots.iter().map(|s| s.finished_lot_name.as_str()).collect();
        assert_eq!(labels, vec!["SN-7", "SN-8", "(New Lot 1)"]);
        assert_eq!(slots[0].finished_lot_id, Some(7));
        assert_eq!(slots[1].finished_lot_id, Some(8));
        assert_eq!(slots[2].finished_lot_id, None);
    }

    #[test]
    fn test_every_unit_has_same_component_set() {
        let moves = vec![
            raw_move(10, product(1, "A", Tracking::Serial), 4.0, None),
            raw_move(11, product(2, "B", Tracking::Serial), 2.0, None),
        ];
        let slots = MatrixGenerator::new(false).generate(&moves, 2.0, &[lot(1, "SN1")]);

        let codes_for = |label: &str| {
            let mut codes: Vec<_> = slots
                .iter()
                .filter(|s| s.finished_lot_name == label)
                .map(|s| s.component.default_code.clone())
                .collect();
            codes.sort();
            codes
        };
        assert_eq!(codes_for("SN1"), codes_for("(New Lot 1)"));
        assert_eq!(codes_for("SN1"), vec!["A", "A", "B"]);
    }
}
