// ==========================================
// 生产序列号矩阵 - 消耗计划引擎
// ==========================================
// 输入: 已绑定的矩阵单元格 + 成品序列号选择
// 输出: 每件成品一次完工（必要时拆分欠单并继续）
// ==========================================
// 每件成品:
// 1) 校验全部非零序列号/批次需求的新增预留可用量（只读）
// 2) 设置产出序列号, 产出数量 = 1
// 3) 对每个需求: 修正预留 → 标记消耗
// 4) 完工; 需要欠单时创建欠单并在欠单上继续
// 红线: 预留严格按批次, 不回落到其他批次; 可用量 ≤ 0 直接报错
// ==========================================

use crate::domain::float_utils::{digits_to_rounding, float_compare, float_is_zero};
use crate::domain::lot::{Lot, LotId};
use crate::domain::matrix::ComponentSlot;
use crate::domain::production::{MoveLineId, ProductionId, ProductionOrder, RawMove};
use crate::domain::types::{MarkDoneOutcome, Tracking};
use crate::engine::repositories::MatrixRepositories;
use crate::error::{MatrixError, MatrixResult};
use tracing::{debug, info, instrument, warn};

/// 单个需求的待执行调整
struct RequirementPlan<'l> {
    mv: RawMove,
    lines: Vec<&'l ComponentSlot>,
    // (批次, 预留数量, 可用量)
    reservations: Vec<(&'l Lot, f64, f64)>,
    to_unreserve: Vec<MoveLineId>,
}

// ==========================================
// ConsumptionPlanner - 消耗计划引擎
// ==========================================
pub struct ConsumptionPlanner<'a> {
    repos: &'a MatrixRepositories,
    precision_digits: u32,
    label_fallback: bool,
}

impl<'a> ConsumptionPlanner<'a> {
    /// # 参数
    /// - repos: 仓储集合
    /// - precision_digits: 数量比较精度（小数位数）
    /// - label_fallback: 成品主键不一致时是否允许按标签匹配单元格
    pub fn new(repos: &'a MatrixRepositories, precision_digits: u32, label_fallback: bool) -> Self {
        Self {
            repos,
            precision_digits,
            label_fallback,
        }
    }

    /// 按成品序列号逐件完工
    ///
    /// # 返回
    /// - 涉及的生产订单（原订单及其欠单）; 未处理任何成品时返回原订单
    #[instrument(skip(self, production, finished_lots, lines), fields(
        production_id = production.id,
        units = finished_lots.len(),
        slots = lines.len()
    ))]
    pub fn apply(
        &self,
        production: &ProductionOrder,
        finished_lots: &[Lot],
        lines: &[ComponentSlot],
    ) -> MatrixResult<Vec<ProductionId>> {
        let mut productions = Vec::new();
        let mut current_id = production.id;

        for fp_lot in finished_lots {
            self.process_unit(current_id, fp_lot, lines)?;

            productions.push(current_id);
            match self.repos.production_repo.mark_done(current_id)? {
                MarkDoneOutcome::BackorderRequired => {
                    match self.repos.production_repo.create_backorder(current_id)? {
                        Some(next_id) => {
                            info!(from = current_id, to = next_id, "在欠单上继续");
                            current_id = next_id;
                        }
                        None => break,
                    }
                }
                MarkDoneOutcome::Done => break,
            }
        }

        if productions.is_empty() {
            productions.push(production.id);
        }
        Ok(productions)
    }

    /// 单件成品: 设置产出序列号, 修正预留并标记消耗（不完工）
    ///
    /// 第一遍只读: 计算全部需求的预留调整并校验可用量;
    /// 第二遍才写入。任一批次不可用时本件不修改任何数据。
    #[instrument(skip(self, fp_lot, lines), fields(finished_lot = %fp_lot.name))]
    pub fn process_unit(
        &self,
        production_id: ProductionId,
        fp_lot: &Lot,
        lines: &[ComponentSlot],
    ) -> MatrixResult<()> {
        let mut plans = Vec::new();
        for mv in self.repos.production_repo.raw_moves(production_id)? {
            if float_is_zero(mv.product_qty, mv.product.uom_rounding) {
                // 进行中的订单无法删除组件需求, 只能置零; 置零即忽略
                continue;
            }
            match mv.product.tracking {
                Tracking::Serial | Tracking::Lot => {}
                Tracking::None => continue,
            }
            let unit_lines = self.slots_for_unit(lines, fp_lot, &mv);
            if unit_lines.is_empty() {
                continue;
            }
            plans.push(self.plan_requirement(mv, unit_lines)?);
        }

        self.repos
            .production_repo
            .set_qty_producing(production_id, fp_lot.id, 1.0)?;

        for plan in &plans {
            self.amend_reservations(plan)?;
            self.consume_selected_lots(&plan.mv, &plan.lines)?;
        }
        debug!(requirements = plans.len(), "成品消耗已登记");
        Ok(())
    }

    /// 某件成品在某需求上的单元格
    ///
    /// 按成品主键匹配; 主键不一致但标签一致时按配置决定是否采用（采用时记录告警日志）
    fn slots_for_unit<'l>(
        &self,
        lines: &'l [ComponentSlot],
        fp_lot: &Lot,
        mv: &RawMove,
    ) -> Vec<&'l ComponentSlot> {
        let mut matched = Vec::new();
        for line in lines.iter().filter(|l| l.component.id == mv.product.id) {
            if line.finished_lot_id == Some(fp_lot.id) {
                matched.push(line);
            } else if line.finished_lot_name == fp_lot.name {
                if self.label_fallback {
                    warn!(
                        finished_lot = %fp_lot.name,
                        stored_lot_id = ?line.finished_lot_id,
                        expected_lot_id = fp_lot.id,
                        column = %line.column_name,
                        "单元格成品主键不一致, 按标签匹配"
                    );
                    matched.push(line);
                } else {
                    warn!(
                        finished_lot = %fp_lot.name,
                        column = %line.column_name,
                        "单元格成品主键不一致, 已忽略"
                    );
                }
            }
        }
        matched
    }

    /// 计算某需求的预留调整（只读）
    ///
    /// 仅当存在需新增预留的批次时才调整; 每个新增批次都必须有正的可用量
    fn plan_requirement<'l>(
        &self,
        mv: RawMove,
        lines: Vec<&'l ComponentSlot>,
    ) -> MatrixResult<RequirementPlan<'l>> {
        let lots_to_consume = distinct_lots(&lines);
        let move_lines = self.repos.stock_repo.move_lines(mv.id)?;
        let lots_in_move: Vec<LotId> = move_lines.iter().filter_map(|ml| ml.lot_id).collect();

        let lots_to_reserve: Vec<&'l Lot> = lots_to_consume
            .iter()
            .copied()
            .filter(|lot| !lots_in_move.contains(&lot.id))
            .collect();

        let mut reservations = Vec::with_capacity(lots_to_reserve.len());
        for lot in lots_to_reserve {
            let qty = match mv.product.tracking {
                Tracking::Lot => sum_lot_qty(&lines, lot.id),
                Tracking::Serial | Tracking::None => 1.0,
            };
            let available = self.check_lot_available(&mv, lot)?;
            reservations.push((lot, qty, available));
        }

        let to_unreserve: Vec<MoveLineId> = if reservations.is_empty() {
            Vec::new()
        } else {
            move_lines
                .iter()
                .filter(|ml| match ml.lot_id {
                    Some(lot_id) => !lots_to_consume.iter().any(|lot| lot.id == lot_id),
                    None => false,
                })
                .map(|ml| ml.id)
                .collect()
        };

        Ok(RequirementPlan {
            mv,
            lines,
            reservations,
            to_unreserve,
        })
    }

    /// 修正预留: 释放不再需要的批次, 预留新增批次
    fn amend_reservations(&self, plan: &RequirementPlan<'_>) -> MatrixResult<()> {
        if plan.reservations.is_empty() {
            return Ok(());
        }
        if !plan.to_unreserve.is_empty() {
            debug!(move_id = plan.mv.id, count = plan.to_unreserve.len(), "释放不再需要的预留");
            self.repos.stock_repo.unlink_move_lines(&plan.to_unreserve)?;
        }
        for &(lot, qty, available) in &plan.reservations {
            self.reserve_lot_in_move(&plan.mv, lot, qty, available)?;
        }
        Ok(())
    }

    /// 标记消耗
    ///
    /// - 所需批次: 批次组件按单元格数量合计, 序列号组件按明细预留数量
    /// - 预留数量为零的明细: 删除
    /// - 其他明细: 消耗数量置零
    fn consume_selected_lots(&self, mv: &RawMove, lines: &[&ComponentSlot]) -> MatrixResult<()> {
        let lots_to_consume = distinct_lots(lines);
        let rounding = digits_to_rounding(self.precision_digits);

        let mut to_unlink = Vec::new();
        for ml in self.repos.stock_repo.move_lines(mv.id)? {
            let required = ml
                .lot_id
                .map(|lot_id| lots_to_consume.iter().any(|lot| lot.id == lot_id))
                .unwrap_or(false);

            if required {
                let qty_done = match mv.product.tracking {
                    Tracking::Lot => sum_lot_qty(lines, ml.lot_id.unwrap_or_default()),
                    Tracking::Serial | Tracking::None => ml.product_qty,
                };
                self.repos.stock_repo.set_qty_done(ml.id, qty_done)?;
            } else if float_is_zero(ml.product_qty, rounding) {
                to_unlink.push(ml.id);
            } else {
                self.repos.stock_repo.set_qty_done(ml.id, 0.0)?;
            }
        }

        if !to_unlink.is_empty() {
            self.repos.stock_repo.unlink_move_lines(&to_unlink)?;
        }
        Ok(())
    }

    /// 查询来源库位可用量, 不为正直接报错
    fn check_lot_available(&self, mv: &RawMove, lot: &Lot) -> MatrixResult<f64> {
        let available = self
            .repos
            .stock_repo
            .available_quantity(mv.product.id, mv.location_id, lot.id)?;
        if float_compare(available, 0.0, self.precision_digits) <= 0 {
            return Err(MatrixError::Availability {
                lot: lot.name.clone(),
            });
        }
        Ok(available)
    }

    fn reserve_lot_in_move(&self, mv: &RawMove, lot: &Lot, qty: f64, available: f64) -> MatrixResult<()> {
        let taken = self
            .repos
            .stock_repo
            .update_reserved_quantity(mv, qty, available, lot.id, true)?;
        debug!(move_id = mv.id, lot = %lot.name, qty, available, taken, "预留批次");
        Ok(())
    }
}

/// 单元格中已分配的批次（去重, 保持顺序）
fn distinct_lots<'l>(lines: &[&'l ComponentSlot]) -> Vec<&'l Lot> {
    let mut lots: Vec<&Lot> = Vec::new();
    for lot in lines.iter().copied().filter_map(|l| l.component_lot.as_ref()) {
        if !lots.iter().any(|existing| existing.id == lot.id) {
            lots.push(lot);
        }
    }
    lots
}

/// 某批次在单元格中的数量合计
fn sum_lot_qty(lines: &[&ComponentSlot], lot_id: LotId) -> f64 {
    lines
        .iter()
        .filter(|l| l.component_lot_id() == Some(lot_id))
        .map(|l| l.lot_qty)
        .sum()
}
