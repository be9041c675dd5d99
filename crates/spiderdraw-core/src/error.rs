//! 图表操作错误定义

use crate::entity::{LineId, PointId, ShapeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagramError {
    #[error("Unknown shape: {0}")]
    UnknownShape(ShapeId),

    #[error("Dangling relation: {owner} -> {entity} has no reverse side")]
    DanglingRelation { owner: String, entity: String },

    #[error("Point {point} is already attached to line {line}")]
    DuplicateAttachment { point: PointId, line: LineId },

    #[error("Shape {shape} does not support {operation}")]
    Unsupported {
        shape: ShapeId,
        operation: &'static str,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Empty container: {0}")]
    EmptyContainer(String),

    #[error("Invalid shape: {0}")]
    InvalidShape(String),
}

impl DiagramError {
    /// 结构性错误（关系不对称、未知ID）属于调用方违约，
    /// 其余错误是可以反馈给用户的正常失败。
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DiagramError::UnknownShape(_)
                | DiagramError::DanglingRelation { .. }
                | DiagramError::DuplicateAttachment { .. }
        )
    }
}

pub type DiagramResult<T> = Result<T, DiagramError>;
