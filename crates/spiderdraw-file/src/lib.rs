//! Spiderdraw 文件格式处理
//!
//! 支持：
//! - `.spdr` 原生格式（MessagePack + Zstd）
//! - 两行一图元的文本格式
//! - JSON 配置文件

pub mod error;
pub mod native;
pub mod text;

pub use error::FileError;
pub use native::DiagramFile;

use spiderdraw_core::config::DiagramConfig;
use std::path::Path;

/// 读取 JSON 配置，缺省字段使用默认值
pub fn load_config(path: &Path) -> Result<DiagramConfig, FileError> {
    let data = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
