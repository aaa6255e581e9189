// ==========================================
// 生产序列号矩阵 - 选择告警检查
// ==========================================
// 告警类型:
// 1) 序列号被选择多次（全部单元格范围内计数）
// 2) 批次可用数量不足（可用 + 本需求已预留 - 前序单元格已占用 < 单元格数量）
// 3) 成品存在未填写的单元格
// 红线: 告警不阻断编辑, 只阻断提交
// ==========================================

use crate::domain::lot::LotId;
use crate::domain::matrix::{ComponentSlot, ConsumptionWarning, LotRef, SelectionReport};
use crate::domain::types::{Tracking, WarningKind};
use crate::repository::{RepositoryResult, StockReservation};
use std::collections::HashMap;

// ==========================================
// SelectionChecker - 选择告警检查
// ==========================================
pub struct SelectionChecker<'a> {
    stock_repo: &'a dyn StockReservation,
}

impl<'a> SelectionChecker<'a> {
    pub fn new(stock_repo: &'a dyn StockReservation) -> Self {
        Self { stock_repo }
    }

    /// 检查全部单元格（可用数量按单元格所属需求的来源库位计算）
    pub fn check(&self, lines: &[ComponentSlot]) -> RepositoryResult<SelectionReport> {
        let mut warnings = duplicate_serial_warnings(lines);
        warnings.extend(self.lot_quantity_warnings(lines)?);
        warnings.extend(unfilled_warning(lines));
        Ok(SelectionReport { warnings })
    }

    fn lot_quantity_warnings(&self, lines: &[ComponentSlot]) -> RepositoryResult<Vec<ConsumptionWarning>> {
        let mut warnings = Vec::new();
        let mut lot_consumption: HashMap<LotId, f64> = HashMap::new();

        for line in lines {
            match line.component.tracking {
                Tracking::Lot => {}
                Tracking::Serial | Tracking::None => continue,
            }
            let Some(lot) = &line.component_lot else {
                continue;
            };

            let free_qty = self
                .stock_repo
                .available_quantity(line.component.id, line.location_id, lot.id)?;
            let reserved_qty = self.stock_repo.reserved_quantity(line.move_id, lot.id)?;
            let available_quantity = free_qty + reserved_qty;

            let consumed = lot_consumption.entry(lot.id).or_insert(0.0);
            if available_quantity - *consumed < line.lot_qty {
                warnings.push(ConsumptionWarning {
                    kind: WarningKind::InsufficientLotQuantity,
                    lots: vec![LotRef::from(lot)],
                    message: format!(
                        "批次 {} 可用数量不足 ({}/{})",
                        lot.name, available_quantity, line.lot_qty
                    ),
                });
            }
            *consumed += line.lot_qty;
        }

        Ok(warnings)
    }
}

/// 序列号重复选择
fn duplicate_serial_warnings(lines: &[ComponentSlot]) -> Vec<ConsumptionWarning> {
    // 保持首次出现顺序
    let mut counter: Vec<(LotRef, usize)> = Vec::new();
    for line in lines {
        match line.component.tracking {
            Tracking::Serial => {}
            Tracking::Lot | Tracking::None => continue,
        }
        let Some(lot) = &line.component_lot else {
            continue;
        };
        match counter.iter_mut().find(|(l, _)| l.id == lot.id) {
            Some((_, count)) => *count += 1,
            None => counter.push((LotRef::from(lot), 1)),
        }
    }

    counter
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(lot, _)| ConsumptionWarning {
            kind: WarningKind::DuplicateSerial,
            message: format!("序列号 {} 被选择多次", lot.name),
            lots: vec![lot],
        })
        .collect()
}

/// 已分配成品序列号但存在未填写单元格
fn unfilled_warning(lines: &[ComponentSlot]) -> Option<ConsumptionWarning> {
    let mut finished: Vec<LotRef> = Vec::new();
    for line in lines.iter().filter(|l| !l.is_filled()) {
        if let Some(lot_id) = line.finished_lot_id {
            if !finished.iter().any(|l| l.id == lot_id) {
                finished.push(LotRef {
                    id: lot_id,
                    name: line.finished_lot_name.clone(),
                });
            }
        }
    }

    if finished.is_empty() {
        return None;
    }

    let names: Vec<&str> = finished.iter().map(|l| l.name.as_str()).collect();
    Some(ConsumptionWarning {
        kind: WarningKind::UnfilledSlot,
        message: format!("部分成品序列号存在未填写的单元格 ({})", names.join(", ")),
        lots: finished,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lot::Lot;
    use crate::domain::matrix::FinishedUnit;
    use crate::domain::product::{Product, ProductId};
    use crate::domain::production::{LocationId, MoveId, MoveLine, MoveLineId, RawMove};
    use chrono::Utc;

    /// 固定可用量的库存桩
    struct FixedStock {
        free: f64,
        reserved: f64,
    }

    impl StockReservation for FixedStock {
        fn available_quantity(&self, _: ProductId, _: LocationId, _: LotId) -> RepositoryResult<f64> {
            Ok(self.free)
        }
        fn reserved_quantity(&self, _: MoveId, _: LotId) -> RepositoryResult<f64> {
            Ok(self.reserved)
        }
        fn allowed_lots(&self, _: ProductId, _: LocationId) -> RepositoryResult<Vec<Lot>> {
            Ok(Vec::new())
        }
        fn move_lines(&self, _: MoveId) -> RepositoryResult<Vec<MoveLine>> {
            Ok(Vec::new())
        }
        fn update_reserved_quantity(&self, _: &RawMove, _: f64, _: f64, _: LotId, _: bool) -> RepositoryResult<f64> {
            Ok(0.0)
        }
        fn unlink_move_lines(&self, _: &[MoveLineId]) -> RepositoryResult<()> {
            Ok(())
        }
        fn set_qty_done(&self, _: MoveLineId, _: f64) -> RepositoryResult<()> {
            Ok(())
        }
    }

    fn product(id: i64, code: &str, tracking: Tracking) -> Product {
        Product {
            id,
            default_code: code.to_string(),
            name: code.to_string(),
            tracking,
            uom_rounding: 0.01,
        }
    }

    fn lot(id: i64, name: &str) -> Lot {
        Lot {
            id,
            name: name.to_string(),
            product_id: 1,
            created_at: Utc::now(),
        }
    }

    fn slot(unit: &FinishedUnit, component: &Product, qty: f64, assigned: Option<Lot>) -> ComponentSlot {
        let mut slot = ComponentSlot::new(unit, 10, 1, component, 0, qty);
        slot.component_lot = assigned;
        slot
    }

    #[test]
    fn test_no_warnings_for_complete_selection() {
        let a = product(1, "A", Tracking::Serial);
        let unit = FinishedUnit::Existing(lot(100, "FIN-1"));
        let lines = vec![slot(&unit, &a, 1.0, Some(lot(1, "A-1")))];

        let stock = FixedStock { free: 1.0, reserved: 0.0 };
        let report = SelectionChecker::new(&stock).check(&lines).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.message(), "");
    }

    #[test]
    fn test_duplicate_serial_across_units() {
        let a = product(1, "A", Tracking::Serial);
        let unit1 = FinishedUnit::Existing(lot(100, "FIN-1"));
        let unit2 = FinishedUnit::Existing(lot(101, "FIN-2"));
        let lines = vec![
            slot(&unit1, &a, 1.0, Some(lot(1, "A-1"))),
            slot(&unit2, &a, 1.0, Some(lot(1, "A-1"))),
        ];

        let stock = FixedStock { free: 1.0, reserved: 0.0 };
        let report = SelectionChecker::new(&stock).check(&lines).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::DuplicateSerial);
        assert!(report.message().contains("A-1"));
    }

    #[test]
    fn test_lot_quantity_accumulates_across_slots() {
        let glue = product(2, "GLUE", Tracking::Lot);
        let unit1 = FinishedUnit::Existing(lot(100, "FIN-1"));
        let unit2 = FinishedUnit::Existing(lot(101, "FIN-2"));
        let lines = vec![
            slot(&unit1, &glue, 0.6, Some(lot(5, "GLUE-B1"))),
            slot(&unit2, &glue, 0.6, Some(lot(5, "GLUE-B1"))),
        ];

        // 可用 0.5 + 已预留 0.5 = 1.0: 第一个单元格满足, 第二个不足
        let stock = FixedStock { free: 0.5, reserved: 0.5 };
        let report = SelectionChecker::new(&stock).check(&lines).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::InsufficientLotQuantity);
        assert!(report.warnings[0].message.contains("GLUE-B1"));
    }

    #[test]
    fn test_unfilled_slots_only_for_assigned_finished_units() {
        let a = product(1, "A", Tracking::Serial);
        let unit = FinishedUnit::Existing(lot(100, "FIN-1"));
        let pending = FinishedUnit::Pending { number: 1 };
        let lines = vec![
            slot(&unit, &a, 1.0, None),
            slot(&unit, &a, 1.0, None),
            slot(&pending, &a, 1.0, None),
        ];

        let stock = FixedStock { free: 0.0, reserved: 0.0 };
        let report = SelectionChecker::new(&stock).check(&lines).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::UnfilledSlot);
        assert_eq!(report.warnings[0].lots.len(), 1);
        assert!(report.message().contains("FIN-1"));
        assert!(!report.message().contains("New Lot"));
    }
}
