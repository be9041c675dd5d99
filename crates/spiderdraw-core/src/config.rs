//! 图表引擎参数

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// 点吸附到线段端点的最大距离
    pub point_line_dist: f64,
    /// 点的拾取/擦除半径
    pub point_hit_dist: f64,
    /// 其他图元轮廓的拾取容差
    pub outline_hit_dist: f64,
    /// 笔画结束后等待识别的时间（毫秒）
    pub settle_delay_ms: u64,
    /// 识别出的线段短于该长度时直接丢弃
    pub min_line_length: f64,
    /// 识别出的线段短于该长度时改为点
    pub point_line_length: f64,
    /// 新笔画与未识别笔画的重叠判定距离
    pub stroke_overlap_dist: f64,
    /// 空间索引网格大小
    pub spatial_cell_size: f64,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            point_line_dist: 15.0,
            point_hit_dist: 5.0,
            outline_hit_dist: 5.0,
            settle_delay_ms: 1000,
            min_line_length: 1.0,
            point_line_length: 10.0,
            stroke_overlap_dist: 5.0,
            spatial_cell_size: 100.0,
        }
    }
}

impl DiagramConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
