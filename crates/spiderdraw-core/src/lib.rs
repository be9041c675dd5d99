//! Spiderdraw 核心引擎
//!
//! 维护蜘蛛图中点、线段、圆、方框之间的关联关系，并判断每个点是否有效。
//!
//! # 架构设计
//!
//! 采用实体表 + 类型化ID：
//! - `Diagram`: 持有全部图元的有序实体表，所有修改的入口
//! - `container`: 双向归属关系（点 ↔ 圆、点 ↔ 方框）
//! - `incidence`: 修改后为点重新推导关系
//! - `validity`: 沿线段行走判断点是否有效
//!
//! # 示例
//!
//! ```rust
//! use spiderdraw_core::prelude::*;
//!
//! let mut diagram = Diagram::new(DiagramConfig::default());
//! diagram.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
//! let foot = diagram.add_point(2.0, 1.0).unwrap();
//!
//! assert!(diagram.point(foot).unwrap().line1().is_some());
//! ```

pub mod classify;
pub mod config;
pub mod container;
pub mod diagram;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod incidence;
pub mod math;
pub mod spatial;
pub mod spiders;
pub mod validity;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::classify::{
        Classification, ClassificationKind, Classifier, Edit, EditOutcome, Editor, OutlineClassifier, Stroke,
        StrokeId, StrokeTracker,
    };
    pub use crate::config::DiagramConfig;
    pub use crate::container::{Mirror, MultiContainer, SingleContainer};
    pub use crate::diagram::{Diagram, PointView};
    pub use crate::entity::{BoxId, Capabilities, CircleId, LineId, PointId, ShapeId, ShapeKind};
    pub use crate::error::{DiagramError, DiagramResult};
    pub use crate::geometry::{Attachment, BoxShape, Circle, Geometry, Line, LineEnd, Point, Slot};
    pub use crate::incidence::RecomputeReport;
    pub use crate::math::{BoundingBox2, Point2, Vector2};
    pub use crate::spiders::Spider;
}
