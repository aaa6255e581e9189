// 命令行入口: 按 CSV 矩阵为生产订单登记原材料序列号并逐件完工
//
// Usage:
//   serial-matrix <db_path> <production_id> <csv_file> [--include-lots] [--dry-run]
//
// 结果以 JSON 输出到 stdout, 日志输出到 stderr (RUST_LOG 控制级别)。
// 退出码: 0 成功, 1 失败, 2 参数错误, 3 CSV 与订单不符

use mrp_serial_matrix::config::{ConfigManager, MatrixConfig};
use mrp_serial_matrix::db::{ensure_schema, open_sqlite_connection, with_rollback, with_transaction};
use mrp_serial_matrix::domain::matrix::ConsumptionWarning;
use mrp_serial_matrix::domain::production::ProductionId;
use mrp_serial_matrix::engine::{CommitSummary, ImportSummary, MatrixRepositories, SerialMatrixWizard};
use mrp_serial_matrix::error::MatrixResult;
use mrp_serial_matrix::logging;
use serde::Serialize;
use std::sync::{Arc, Mutex};

const USAGE: &str =
    "usage: serial-matrix <db_path> <production_id> <csv_file> [--include-lots] [--dry-run]";

struct CliArgs {
    db_path: String,
    production_id: ProductionId,
    csv_file: String,
    include_lots: bool,
    dry_run: bool,
}

#[derive(Serialize)]
struct CliReport {
    wizard_id: String,
    production_id: ProductionId,
    dry_run: bool,
    import: ImportSummary,
    warnings: Vec<ConsumptionWarning>,
    commit: Option<CommitSummary>,
}

fn parse_args() -> Result<CliArgs, String> {
    let mut positional = Vec::new();
    let mut include_lots = false;
    let mut dry_run = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--include-lots" => include_lots = true,
            "--dry-run" => dry_run = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {}", flag)),
            _ => positional.push(arg),
        }
    }

    let [db_path, production_id, csv_file]: [String; 3] = positional
        .try_into()
        .map_err(|_| USAGE.to_string())?;
    let production_id = production_id
        .trim()
        .parse::<ProductionId>()
        .map_err(|e| format!("invalid production_id '{}': {}", production_id, e))?;

    Ok(CliArgs {
        db_path,
        production_id,
        csv_file,
        include_lots,
        dry_run,
    })
}

fn run(
    repos: MatrixRepositories,
    config: MatrixConfig,
    args: &CliArgs,
    csv_text: String,
) -> MatrixResult<CliReport> {
    let mut wizard = SerialMatrixWizard::open(repos, config, args.production_id)?;
    if args.include_lots {
        wizard.set_include_lots(true);
    }

    wizard.set_csv_import(csv_text);
    let import = wizard.import_csv()?;
    let report = wizard.selection_report()?;
    for warning in &report.warnings {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
    }

    let commit = if args.dry_run {
        None
    } else {
        Some(wizard.commit()?)
    };

    Ok(CliReport {
        wizard_id: wizard.id().to_string(),
        production_id: args.production_id,
        dry_run: args.dry_run,
        import,
        warnings: report.warnings,
        commit,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };

    logging::init();
    tracing::info!("{} v{}", mrp_serial_matrix::APP_NAME, mrp_serial_matrix::VERSION);

    let conn = open_sqlite_connection(&args.db_path)?;
    ensure_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let config = MatrixConfig::load(&ConfigManager::from_connection(conn.clone()))?;
    let csv_text = std::fs::read_to_string(&args.csv_file)?;
    let repos = MatrixRepositories::from_connection(conn.clone());

    let outcome = if args.dry_run {
        with_rollback(&conn, || run(repos, config, &args, csv_text))
    } else {
        with_transaction(&conn, || run(repos, config, &args, csv_text))
    };

    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("错误: {}", err);
            // CSV 内容问题与系统问题使用不同退出码
            let code = if err.is_structural_mismatch() || err.is_binding() {
                3
            } else {
                1
            };
            std::process::exit(code);
        }
    }
}
