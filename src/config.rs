use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// ONNX 分类模型文件
    pub model_path: PathBuf,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 病例记录与影像存储配置
    pub storage_config: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,

    /// 单次推理超时
    pub inference_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,

    /// 最大并发连接数
    pub max_connections: usize,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite 数据库文件
    pub database_path: PathBuf,

    /// 上传影像目录
    pub uploads_dir: PathBuf,

    /// 连接池大小
    pub max_connections: u32,

    /// 单次存储操作超时
    pub storage_timeout: Duration,
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        database_path: String,
        uploads_dir: String,
        dev_mode: bool,
    ) -> Result<Self> {
        if bind_addr.trim().is_empty() {
            anyhow::bail!("bind address must not be empty");
        }

        let cpu_cores = num_cpus::get();

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
            inference_timeout: Duration::from_secs(if dev_mode { 120 } else { 30 }),
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024, // 50MB
            max_connections: if dev_mode { 10 } else { 1000 },
        };

        let storage_config = StorageConfig {
            database_path: PathBuf::from(database_path),
            uploads_dir: PathBuf::from(uploads_dir),
            max_connections: 5,
            storage_timeout: Duration::from_secs(if dev_mode { 60 } else { 10 }),
        };

        Ok(Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            dev_mode,
            onnx_config,
            server_config,
            storage_config,
        })
    }

    /// 覆盖默认的推理/存储超时
    pub fn with_timeouts(
        mut self,
        inference_timeout: Option<Duration>,
        storage_timeout: Option<Duration>,
    ) -> Self {
        if let Some(timeout) = inference_timeout {
            self.onnx_config.inference_timeout = timeout;
        }
        if let Some(timeout) = storage_timeout {
            self.storage_config.storage_timeout = timeout;
        }
        self
    }
}
