// ==========================================
// 生产序列号矩阵 - 向导编排器
// ==========================================
// 用途: 协调矩阵生成、CSV 校验/导入、告警检查、消耗计划
// 流程: open → (set_finished_lots | set_include_lots | import_csv)* → commit
// 红线: 任一输入变更都全量重建矩阵; 存在告警时拒绝提交
// 事务: 由调用方通过 db::with_transaction 负责
// ==========================================

use crate::config::MatrixConfig;
use crate::domain::lot::Lot;
use crate::domain::matrix::{ComponentSlot, SelectionReport};
use crate::domain::production::{ProductionId, ProductionOrder, RawMove};
use crate::domain::types::Tracking;
use crate::engine::consumption_planner::ConsumptionPlanner;
use crate::engine::matrix_generator::MatrixGenerator;
use crate::engine::repositories::MatrixRepositories;
use crate::engine::selection_checker::SelectionChecker;
use crate::error::{MatrixError, MatrixResult};
use crate::importer::csv_importer::CsvImporter;
use crate::importer::matrix_validator::MatrixValidator;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 结果结构
// ==========================================

/// CSV 导入结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub finished_lots: Vec<String>,
    pub slots_total: usize,
    pub slots_bound: usize,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub wizard_id: String,
    pub production_ids: Vec<ProductionId>,
    pub finished_lots: Vec<String>,
}

// ==========================================
// SerialMatrixWizard - 序列号矩阵向导
// ==========================================
pub struct SerialMatrixWizard {
    id: Uuid,
    repos: MatrixRepositories,
    config: MatrixConfig,
    production: ProductionOrder,
    raw_moves: Vec<RawMove>,
    finished_lots: Vec<Lot>,
    include_lots: bool,
    lines: Vec<ComponentSlot>,
    csv_import: String,
}

impl SerialMatrixWizard {
    /// 打开向导
    ///
    /// # 错误
    /// - 生产订单不存在: Repository(NotFound)
    /// - 成品不是序列号追踪: NotSerialTracked
    #[instrument(skip(repos, config))]
    pub fn open(
        repos: MatrixRepositories,
        config: MatrixConfig,
        production_id: ProductionId,
    ) -> MatrixResult<Self> {
        let production = repos
            .production_repo
            .find_production(production_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "production".to_string(),
                id: production_id.to_string(),
            })?;

        if production.product.tracking != Tracking::Serial {
            return Err(MatrixError::NotSerialTracked(
                production.product.display_name(),
            ));
        }

        let raw_moves = repos.production_repo.raw_moves(production_id)?;
        let finished_lots: Vec<Lot> = production.lot_producing.iter().cloned().collect();

        let mut wizard = Self {
            id: Uuid::new_v4(),
            repos,
            include_lots: config.include_lots_default,
            config,
            production,
            raw_moves,
            finished_lots,
            lines: Vec::new(),
            csv_import: String::new(),
        };
        wizard.regenerate();

        info!(
            wizard_id = %wizard.id,
            production = %wizard.production.name,
            slots = wizard.lines.len(),
            "向导已打开"
        );
        Ok(wizard)
    }

    // ==========================================
    // 访问器
    // ==========================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn production(&self) -> &ProductionOrder {
        &self.production
    }

    pub fn finished_lots(&self) -> &[Lot] {
        &self.finished_lots
    }

    pub fn include_lots(&self) -> bool {
        self.include_lots
    }

    pub fn lines(&self) -> &[ComponentSlot] {
        &self.lines
    }

    /// 手工为单元格分配原材料批次（None 表示清空）
    pub fn assign_slot(&mut self, index: usize, lot: Option<Lot>) -> bool {
        match self.lines.get_mut(index) {
            Some(slot) => {
                slot.component_lot = lot;
                true
            }
            None => false,
        }
    }

    // ==========================================
    // 输入变更（全量重建）
    // ==========================================

    pub fn set_finished_lots(&mut self, lots: Vec<Lot>) {
        self.finished_lots = lots;
        self.regenerate();
    }

    pub fn set_include_lots(&mut self, include_lots: bool) {
        self.include_lots = include_lots;
        self.regenerate();
    }

    fn regenerate(&mut self) {
        let generator = MatrixGenerator::new(self.include_lots);
        self.lines = generator.generate(
            &self.raw_moves,
            self.production.product_qty,
            &self.finished_lots,
        );
    }

    // ==========================================
    // CSV 导入
    // ==========================================

    pub fn set_csv_import(&mut self, text: impl Into<String>) {
        self.csv_import = text.into();
    }

    /// CSV 校验消息（无 CSV 或校验通过时为空）
    pub fn csv_warning_msg(&self) -> String {
        if self.csv_import.is_empty() {
            return String::new();
        }
        self.validator().validate(&self.csv_import)
    }

    pub fn is_ready_for_import(&self) -> bool {
        !self.csv_import.is_empty() && self.csv_warning_msg().is_empty()
    }

    fn validator(&self) -> MatrixValidator<'_> {
        MatrixValidator::new(&self.production.product.default_code, &self.lines)
    }

    /// 导入 CSV
    ///
    /// 步骤: 校验 → 解析成品序列号（替换成品选择）→ 重建矩阵 → 绑定单元格
    #[instrument(skip(self), fields(wizard_id = %self.id))]
    pub fn import_csv(&mut self) -> MatrixResult<ImportSummary> {
        if self.csv_import.is_empty() {
            return Err(MatrixError::NothingToImport);
        }
        let csv = self.validator().check(&self.csv_import)?;

        let lot_repo = self.repos.lot_repo.clone();
        let stock_repo = self.repos.stock_repo.clone();
        let importer = CsvImporter::new(lot_repo.as_ref(), stock_repo.as_ref());
        let lots = importer.resolve_finished_lots(&csv, self.production.product.id)?;
        self.set_finished_lots(lots);

        let slots_bound = importer.bind_slots(&csv, &mut self.lines)?;

        Ok(ImportSummary {
            finished_lots: self.finished_lots.iter().map(|l| l.name.clone()).collect(),
            slots_total: self.lines.len(),
            slots_bound,
        })
    }

    // ==========================================
    // 告警与提交
    // ==========================================

    pub fn selection_report(&self) -> MatrixResult<SelectionReport> {
        let checker = SelectionChecker::new(self.repos.stock_repo.as_ref());
        Ok(checker.check(&self.lines)?)
    }

    /// 提交: 按成品序列号逐件完工
    ///
    /// # 错误
    /// - 存在告警: SelectionWarnings
    /// - 批次不可用: Availability（在修改任何明细之前）
    #[instrument(skip(self), fields(wizard_id = %self.id, production_id = self.production.id))]
    pub fn commit(&self) -> MatrixResult<CommitSummary> {
        let report = self.selection_report()?;
        if !report.is_empty() {
            warn!(warnings = report.warnings.len(), "存在选择告警, 拒绝提交");
            return Err(MatrixError::SelectionWarnings(report.message()));
        }

        let planner = ConsumptionPlanner::new(
            &self.repos,
            self.config.uom_precision_digits,
            self.config.label_fallback_enabled,
        );
        let production_ids = planner.apply(&self.production, &self.finished_lots, &self.lines)?;

        info!(productions = ?production_ids, "提交完成");
        Ok(CommitSummary {
            wizard_id: self.id.to_string(),
            production_ids,
            finished_lots: self.finished_lots.iter().map(|l| l.name.clone()).collect(),
        })
    }
}
