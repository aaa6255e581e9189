// ==========================================
// 生产序列号矩阵 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::matrix_config_trait::MatrixConfigReader;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::Other(anyhow::Error::new(e)))
    }

    fn get_bool(&self, key: &str, default: bool) -> RepositoryResult<bool> {
        let value = self.get_config_or_default(key, if default { "true" } else { "false" })?;
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Ok(true),
            "0" | "false" | "no" | "n" | "off" => Ok(false),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "布尔配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// MatrixConfigReader Trait 实现
// ==========================================
impl MatrixConfigReader for ConfigManager {
    fn get_include_lots_default(&self) -> RepositoryResult<bool> {
        self.get_bool(config_keys::INCLUDE_LOTS_DEFAULT, false)
    }

    fn get_uom_precision_digits(&self) -> RepositoryResult<u32> {
        let value = self.get_config_or_default(config_keys::UOM_PRECISION_DIGITS, "2")?;
        match value.trim().parse::<u32>() {
            Ok(digits) if digits <= 10 => Ok(digits),
            _ => {
                tracing::warn!(
                    config_key = config_keys::UOM_PRECISION_DIGITS,
                    raw_value = %value,
                    "精度配置格式错误，使用默认值 2"
                );
                Ok(2)
            }
        }
    }

    fn get_label_fallback_enabled(&self) -> RepositoryResult<bool> {
        self.get_bool(config_keys::LABEL_FALLBACK_ENABLED, true)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 矩阵生成
    pub const INCLUDE_LOTS_DEFAULT: &str = "serial_matrix.include_lots_default";

    // 数量精度
    pub const UOM_PRECISION_DIGITS: &str = "serial_matrix.uom_precision_digits";

    // 消耗计划
    pub const LABEL_FALLBACK_ENABLED: &str = "serial_matrix.label_fallback_enabled";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::matrix_config_trait::MatrixConfig;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = MatrixConfig::load(&manager()).unwrap();
        assert_eq!(config, MatrixConfig::default());
    }

    #[test]
    fn test_overrides_and_malformed_values() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::INCLUDE_LOTS_DEFAULT, "yes")
            .unwrap();
        manager
            .set_global_config_value(config_keys::UOM_PRECISION_DIGITS, "abc")
            .unwrap();
        manager
            .set_global_config_value(config_keys::LABEL_FALLBACK_ENABLED, "0")
            .unwrap();

        let config = MatrixConfig::load(&manager).unwrap();
        assert!(config.include_lots_default);
        assert_eq!(config.uom_precision_digits, 2);
        assert!(!config.label_fallback_enabled);

        let snapshot = manager.get_config_snapshot().unwrap();
        assert!(snapshot.contains("serial_matrix.include_lots_default"));
    }
}
