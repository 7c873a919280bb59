#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use neuroscan::config::StorageConfig;
use neuroscan::models::{Classifier, ModelDescriptor, ProbabilityModel};
use neuroscan::storage::{CaseRecordStore, ImageStore, LocalImageStore};
use neuroscan::triage::{
    CaseRecordInput, DiagnosisResolver, PatientMeta, TriagePipeline, TriageTimeouts,
};
use neuroscan::{Result, TriageError};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 返回固定分数的模型桩，可模拟失败与慢推理
pub struct StubModel {
    scores: Vec<f32>,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubModel {
    pub fn returning(scores: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            scores: Vec::new(),
            delay: None,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(scores: &[f32], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            delay: Some(delay),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProbabilityModel for StubModel {
    fn predict(&self, _input: Array4<f32>) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(TriageError::Inference("out of memory".into()));
        }
        Ok(self.scores.clone())
    }

    fn describe(&self) -> ModelDescriptor {
        ModelDescriptor {
            backend: "stub".into(),
            input_name: "input_1".into(),
            output_name: "dense_1".into(),
        }
    }
}

/// 总是失败的影像存储
pub struct BrokenImageStore;

#[async_trait::async_trait]
impl ImageStore for BrokenImageStore {
    async fn save(&self, _filename: &str, _bytes: &[u8]) -> Result<String> {
        Err(TriageError::StorageUnavailable("disk full".into()))
    }

    async fn load(&self, image_ref: &str) -> Result<Vec<u8>> {
        Err(TriageError::ImageNotFound(image_ref.to_string()))
    }

    async fn remove(&self, _image_ref: &str) -> Result<()> {
        Ok(())
    }
}

pub fn storage_config(dir: &Path) -> StorageConfig {
    StorageConfig {
        database_path: dir.join("db").join("cases.db"),
        uploads_dir: dir.join("uploads"),
        max_connections: 4,
        storage_timeout: Duration::from_secs(10),
    }
}

pub async fn open_store(dir: &Path) -> Arc<CaseRecordStore> {
    Arc::new(CaseRecordStore::open(&storage_config(dir)).await.unwrap())
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn patient(name: &str) -> PatientMeta {
    PatientMeta {
        name: Some(name.to_string()),
        age: Some("52".to_string()),
        phone: Some("555-0147".to_string()),
    }
}

pub fn record_input(name: &str, probabilities: &[f32]) -> CaseRecordInput {
    CaseRecordInput::new(
        patient(name),
        format!("{}.png", name),
        DiagnosisResolver::resolve(probabilities).unwrap(),
    )
}

pub async fn pipeline_with(
    dir: &Path,
    model: Arc<StubModel>,
    timeouts: TriageTimeouts,
) -> (TriagePipeline, Arc<CaseRecordStore>) {
    let records = open_store(dir).await;
    let images: Arc<dyn ImageStore> =
        Arc::new(LocalImageStore::new(dir.join("uploads")).await.unwrap());
    let classifier = Arc::new(Classifier::new(model));
    let pipeline = TriagePipeline::new(classifier, Arc::clone(&records), images, timeouts);
    (pipeline, records)
}

pub fn uploads_in(dir: &Path) -> usize {
    std::fs::read_dir(dir.join("uploads"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}
