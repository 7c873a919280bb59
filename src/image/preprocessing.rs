use crate::image::ImageLoader;
use crate::Result;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// 模型输入边长
pub const INPUT_SIZE: u32 = 128;

/// 模型输入张量形状 (N, H, W, C)
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 解码影像并生成 [1, 128, 128, 3] 的归一化张量
    pub fn prepare(image_bytes: &[u8]) -> Result<Array4<f32>> {
        let image = ImageLoader::from_bytes(image_bytes)?;
        Ok(Self::to_tensor(&image))
    }

    /// 拉伸（不裁剪）到 128x128，最近邻采样，通道值除以 255
    pub fn to_tensor(image: &DynamicImage) -> Array4<f32> {
        let resized = image
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
            .to_rgb8();

        let mut tensor = Array4::<f32>::zeros(INPUT_SHAPE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }

        tensor
    }
}
