use crate::{
    image::ImagePreprocessor,
    models::Classifier,
    storage::{CaseRecordStore, ImageStore},
    triage::{CaseRecord, CaseRecordInput, Diagnosis, DiagnosisResolver, PatientMeta},
    utils::{error::TriageError, with_timeout},
    Config, Result,
};
use axum::body::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 推理与存储各自的时限
#[derive(Debug, Clone, Copy, Default)]
pub struct TriageTimeouts {
    pub inference: Option<Duration>,
    pub storage: Option<Duration>,
}

impl TriageTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inference: Some(config.onnx_config.inference_timeout),
            storage: Some(config.storage_config.storage_timeout),
        }
    }
}

/// 分诊流水线：影像存储 → 预处理 → 推理 → 诊断 → 写入病例
///
/// 任一阶段失败都不会留下病例记录；已保存的影像会被尽力删除。
pub struct TriagePipeline {
    classifier: Arc<Classifier>,
    records: Arc<CaseRecordStore>,
    images: Arc<dyn ImageStore>,
    timeouts: TriageTimeouts,
}

impl TriagePipeline {
    pub fn new(
        classifier: Arc<Classifier>,
        records: Arc<CaseRecordStore>,
        images: Arc<dyn ImageStore>,
        timeouts: TriageTimeouts,
    ) -> Self {
        Self {
            classifier,
            records,
            images,
            timeouts,
        }
    }

    pub fn records(&self) -> &Arc<CaseRecordStore> {
        &self.records
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    /// 分类并记录一次上传，返回病例 id
    pub async fn classify_and_record(
        &self,
        filename: &str,
        image_bytes: Bytes,
        patient: PatientMeta,
    ) -> Result<Uuid> {
        let start_time = Instant::now();

        // 影像先落盘，失败则不做推理
        let image_ref = with_timeout(
            "image storage",
            self.timeouts.storage,
            self.images.save(filename, &image_bytes),
        )
        .await?;

        match self.diagnose_and_persist(image_bytes, patient, &image_ref).await {
            Ok(id) => {
                tracing::info!(
                    "Triage completed: id={}, image_ref={}, total_time={:.3}s",
                    id,
                    image_ref,
                    start_time.elapsed().as_secs_f32()
                );
                Ok(id)
            }
            Err(e) => {
                tracing::warn!("Triage aborted for image_ref={}: {}", image_ref, e);
                if let Err(cleanup) = self.images.remove(&image_ref).await {
                    tracing::warn!("Failed to remove orphaned image {}: {}", image_ref, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn diagnose_and_persist(
        &self,
        image_bytes: Bytes,
        patient: PatientMeta,
        image_ref: &str,
    ) -> Result<Uuid> {
        let diagnosis = self.diagnose(image_bytes).await?;

        let storage_start = Instant::now();
        let input = CaseRecordInput::new(patient, image_ref, diagnosis);
        let id = self
            .records
            .create_with_timeout(input, self.timeouts.storage)
            .await?;
        tracing::debug!(
            "Record persisted in {:.3}s",
            storage_start.elapsed().as_secs_f32()
        );

        Ok(id)
    }

    /// 病例及其影像字节；病例不存在时返回 `None`
    pub async fn case_image(&self, id: &str) -> Result<Option<(CaseRecord, Vec<u8>)>> {
        let Some(record) = self.records.get(id).await? else {
            return Ok(None);
        };

        let bytes = with_timeout(
            "image storage",
            self.timeouts.storage,
            self.images.load(&record.image_ref),
        )
        .await?;

        Ok(Some((record, bytes)))
    }

    /// 删除病例并尽力删除其影像；不存在时为空操作
    pub async fn discard(&self, id: &str) -> Result<()> {
        let Some(record) = self.records.get(id).await? else {
            return Ok(());
        };

        self.records.delete(id).await?;

        if let Err(e) = self.images.remove(&record.image_ref).await {
            tracing::warn!(
                "Case {} deleted but its image {} was kept: {}",
                record.id,
                record.image_ref,
                e
            );
        }

        Ok(())
    }

    /// 预处理 + 推理 + 诊断，不做任何持久化
    pub async fn diagnose(&self, image_bytes: Bytes) -> Result<Diagnosis> {
        let inference_start = Instant::now();
        let classifier = Arc::clone(&self.classifier);

        let task = tokio::task::spawn_blocking(move || {
            let tensor = ImagePreprocessor::prepare(&image_bytes)?;
            classifier.infer(tensor)
        });

        let probabilities = with_timeout("inference", self.timeouts.inference, async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(TriageError::Internal(format!("inference task failed: {}", e))),
            }
        })
        .await?;

        let diagnosis = DiagnosisResolver::resolve(probabilities.as_slice())?;
        tracing::debug!(
            "Inference finished: label={}, confidence={}, time={:.3}s",
            diagnosis.label(),
            diagnosis.confidence_percent(),
            inference_start.elapsed().as_secs_f32()
        );

        Ok(diagnosis)
    }
}
