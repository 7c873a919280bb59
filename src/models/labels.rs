/// 模型输出顺序对应的类别表，顺序与训练时一致，不可重排
pub const CLASS_LABELS: [&str; 4] = ["glioma", "meningioma", "notumor", "pituitary"];

/// 类别数
pub const NUM_CLASSES: usize = CLASS_LABELS.len();

/// 表示“无肿瘤”的类别名
pub const NO_TUMOR_CLASS: &str = "notumor";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_order_is_stable() {
        assert_eq!(CLASS_LABELS, ["glioma", "meningioma", "notumor", "pituitary"]);
        assert_eq!(CLASS_LABELS[2], NO_TUMOR_CLASS);
    }
}
