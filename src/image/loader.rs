use crate::utils::error::TriageError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// 上传影像大小上限（50MB）
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 解码base64字符串为原始字节
    pub fn bytes_from_base64(base64_data: &str) -> Result<Vec<u8>> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;
        Self::check_size(image_bytes.len())?;

        Ok(image_bytes)
    }

    /// 从字节解码图像
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        Self::check_size(bytes.len())?;

        if bytes.is_empty() {
            return Err(TriageError::Decode("empty image payload".to_string()));
        }

        let image = image::load_from_memory(bytes)?;
        Self::validate_dimensions(&image)?;

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像尺寸与通道数
    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(TriageError::Decode(format!(
                "Image has no pixels: {}x{}",
                width, height
            )));
        }

        let channels = image.color().channel_count();
        if !(1..=4).contains(&channels) {
            return Err(TriageError::Decode(format!(
                "Unsupported channel count: {}",
                channels
            )));
        }

        Ok(())
    }

    fn check_size(len: usize) -> Result<()> {
        if len > MAX_IMAGE_BYTES {
            return Err(TriageError::FileTooLarge(len, MAX_IMAGE_BYTES));
        }
        Ok(())
    }
}
