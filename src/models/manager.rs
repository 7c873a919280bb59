use crate::models::{Classifier, ModelDescriptor, OnnxModel, CLASS_LABELS};
use crate::utils::error::TriageError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// 全局模型管理器单例
///
/// 进程启动时加载一次，之后只读共享；没有热重载。
pub struct ModelManager {
    classifier: Arc<Classifier>,
}

static MODEL_MANAGER: OnceCell<ModelManager> = OnceCell::new();

impl ModelManager {
    /// 从配置加载 ONNX 模型并初始化全局模型管理器
    pub fn init(config: &Config) -> Result<()> {
        tracing::info!("Initializing model manager...");

        let model = OnnxModel::new(config)?;
        let classifier = Arc::new(Classifier::new(Arc::new(model)));
        Self::install(classifier)
    }

    /// 使用已构建好的分类器初始化（可替换推理后端）
    pub fn install(classifier: Arc<Classifier>) -> Result<()> {
        let manager = ModelManager { classifier };

        MODEL_MANAGER
            .set(manager)
            .map_err(|_| TriageError::Internal("Model manager already initialized".to_string()))?;

        tracing::info!("Model manager initialized successfully");
        Ok(())
    }

    /// 获取全局模型管理器实例
    pub fn instance() -> Result<&'static ModelManager> {
        MODEL_MANAGER
            .get()
            .ok_or_else(|| TriageError::Internal("Model manager not initialized".to_string()))
    }

    /// 获取分类器引用
    pub fn classifier(&self) -> Arc<Classifier> {
        Arc::clone(&self.classifier)
    }
}

/// 模型统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model: ModelDescriptor,
    pub classes: Vec<String>,
    pub intra_threads: usize,
    pub optimization_level: i32,
}

impl ModelStats {
    pub fn collect(classifier: &Classifier, config: &Config) -> Self {
        Self {
            model: classifier.descriptor(),
            classes: CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            intra_threads: config.onnx_config.intra_threads,
            optimization_level: config.onnx_config.optimization_level,
        }
    }
}

/// 便捷函数：获取分类器
pub fn get_classifier() -> Result<Arc<Classifier>> {
    Ok(ModelManager::instance()?.classifier())
}
