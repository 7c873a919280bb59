//! 病例记录的 SQLite 持久化

use crate::config::StorageConfig;
use crate::triage::{CaseRecord, CaseRecordInput};
use crate::utils::error::TriageError;
use crate::utils::{with_timeout, Deadline};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS case_records (
        seq                INTEGER PRIMARY KEY AUTOINCREMENT,
        id                 TEXT    NOT NULL UNIQUE,
        patient_name       TEXT,
        patient_age        TEXT,
        patient_phone      TEXT,
        image_ref          TEXT    NOT NULL,
        diagnosis_label    TEXT    NOT NULL,
        confidence_percent TEXT    NOT NULL,
        created_at_us      INTEGER NOT NULL
    )
"#;

const CREATE_RECENCY_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_case_records_recency
    ON case_records (created_at_us DESC, seq DESC)
"#;

const SELECT_COLUMNS: &str = r#"
    SELECT id, patient_name, patient_age, patient_phone, image_ref,
           diagnosis_label, confidence_percent, created_at_us
    FROM case_records
"#;

#[derive(sqlx::FromRow)]
struct CaseRow {
    id: String,
    patient_name: Option<String>,
    patient_age: Option<String>,
    patient_phone: Option<String>,
    image_ref: String,
    diagnosis_label: String,
    confidence_percent: String,
    created_at_us: i64,
}

impl TryFrom<CaseRow> for CaseRecord {
    type Error = TriageError;

    fn try_from(row: CaseRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| TriageError::Internal(format!("corrupt case id '{}': {}", row.id, e)))?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(row.created_at_us).ok_or_else(
            || TriageError::Internal(format!("corrupt timestamp: {}", row.created_at_us)),
        )?;

        Ok(CaseRecord {
            id,
            patient_name: row.patient_name,
            patient_age: row.patient_age,
            patient_phone: row.patient_phone,
            image_ref: row.image_ref,
            diagnosis_label: row.diagnosis_label,
            confidence_percent: row.confidence_percent,
            created_at,
        })
    }
}

/// 病例记录存储
///
/// `create` 在一把异步锁内分配 id 与时间戳并完成插入，
/// 因此成功写入的记录时间戳随插入顺序单调不减。
/// 所有操作都受 `timeout` 约束，超时返回 `TriageError::Timeout`。
pub struct CaseRecordStore {
    pool: SqlitePool,
    last_created_us: Mutex<i64>,
    timeout: Option<Duration>,
}

impl CaseRecordStore {
    /// 打开（必要时创建）数据库文件
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let path = &config.database_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TriageError::StorageUnavailable(format!(
                        "cannot create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::info!("Case record store opened at {}", path.display());
        Ok(Self::from_pool(pool)
            .await?
            .with_operation_timeout(Some(config.storage_timeout)))
    }

    /// 基于已有连接池初始化（建表并恢复最新时间戳）
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_RECENCY_INDEX).execute(&pool).await?;

        let last: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(created_at_us), 0) FROM case_records")
                .fetch_one(&pool)
                .await?;

        Ok(Self {
            pool,
            last_created_us: Mutex::new(last),
            timeout: None,
        })
    }

    /// 设置单次操作时限；`None` 表示不限时
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 新建记录，返回分配的 id
    pub async fn create(&self, input: CaseRecordInput) -> Result<Uuid> {
        self.create_with_timeout(input, self.timeout).await
    }

    /// 带超时的新建：等锁与插入共用同一截止时刻，超时发生在提交之前，
    /// 事务回滚，不留下记录
    pub async fn create_with_timeout(
        &self,
        input: CaseRecordInput,
        timeout: Option<Duration>,
    ) -> Result<Uuid> {
        let deadline = Deadline::after(timeout);

        let mut last = deadline
            .run("storage", async { Ok(self.last_created_us.lock().await) })
            .await?;

        let id = Uuid::new_v4();
        let created_at_us = Utc::now().timestamp_micros().max(*last);

        let tx = deadline
            .run("storage", async {
                let mut tx = self.pool.begin().await?;
                sqlx::query(
                    r#"
                    INSERT INTO case_records (
                        id, patient_name, patient_age, patient_phone, image_ref,
                        diagnosis_label, confidence_percent, created_at_us
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(&input.patient.name)
                .bind(&input.patient.age)
                .bind(&input.patient.phone)
                .bind(&input.image_ref)
                .bind(input.diagnosis.label())
                .bind(input.diagnosis.confidence_percent())
                .bind(created_at_us)
                .execute(&mut *tx)
                .await?;
                Ok::<_, TriageError>(tx)
            })
            .await?;

        tx.commit().await?;
        *last = created_at_us;

        tracing::info!(
            "Case record created: id={}, label={}, confidence={}",
            id,
            input.diagnosis.label(),
            input.diagnosis.confidence_percent()
        );

        Ok(id)
    }

    /// 按 id 查询；id 格式合法但不存在时返回 `None`
    pub async fn get(&self, id: &str) -> Result<Option<CaseRecord>> {
        let id = parse_id(id)?;
        self.find(id).await
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<CaseRecord>> {
        let row = with_timeout("storage", self.timeout, async {
            let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
            sqlx::query_as::<_, CaseRow>(&sql)
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(TriageError::from)
        })
        .await?;

        row.map(CaseRecord::try_from).transpose()
    }

    /// 全部记录，按创建时间倒序；时间相同则后插入者在前
    pub async fn list_recent(&self) -> Result<Vec<CaseRecord>> {
        let rows = with_timeout("storage", self.timeout, async {
            let sql = format!("{} ORDER BY created_at_us DESC, seq DESC", SELECT_COLUMNS);
            sqlx::query_as::<_, CaseRow>(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(TriageError::from)
        })
        .await?;

        rows.into_iter().map(CaseRecord::try_from).collect()
    }

    /// 删除记录；不存在时为空操作
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;

        let result = with_timeout("storage", self.timeout, async {
            sqlx::query("DELETE FROM case_records WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(TriageError::from)
        })
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Delete of absent case record ignored: id={}", id);
        } else {
            tracing::info!("Case record deleted: id={}", id);
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        with_timeout("storage", self.timeout, async {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM case_records")
                .fetch_one(&self.pool)
                .await
                .map_err(TriageError::from)
        })
        .await
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| TriageError::MalformedId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format_is_checked_before_touching_storage() {
        assert!(matches!(
            parse_id("not-a-real-id-format"),
            Err(TriageError::MalformedId(_))
        ));
        assert!(matches!(parse_id(""), Err(TriageError::MalformedId(_))));

        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_id(&id.to_string().to_uppercase()).unwrap(), id);
    }
}
