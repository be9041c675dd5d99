//! 实体标识与能力
//!
//! 所有图元都存放在 [`Diagram`](crate::diagram::Diagram) 的实体表中，
//! 相互之间只通过标识符引用，不持有直接引用。

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// 点ID
    PointId,
    "p"
);
entity_id!(
    /// 线段ID
    LineId,
    "l"
);
entity_id!(
    /// 圆ID
    CircleId,
    "c"
);
entity_id!(
    /// 方框ID
    BoxId,
    "b"
);

/// 图元种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Point,
    Line,
    Circle,
    Box,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Point => "Point",
            ShapeKind::Line => "Line",
            ShapeKind::Circle => "Circle",
            ShapeKind::Box => "Box",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Point" => Some(ShapeKind::Point),
            "Line" => Some(ShapeKind::Line),
            "Circle" => Some(ShapeKind::Circle),
            "Box" => Some(ShapeKind::Box),
            _ => None,
        }
    }

    /// 该种类图元默认具备的能力
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(Capabilities::DRAWABLE | Capabilities::MOVABLE | Capabilities::DELETABLE)
    }
}

/// 带种类标签的图元ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeId {
    Point(PointId),
    Line(LineId),
    Circle(CircleId),
    Box(BoxId),
}

impl ShapeId {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeId::Point(_) => ShapeKind::Point,
            ShapeId::Line(_) => ShapeKind::Line,
            ShapeId::Circle(_) => ShapeKind::Circle,
            ShapeId::Box(_) => ShapeKind::Box,
        }
    }

    /// 原始序号，跨种类递增，即创建顺序
    pub fn raw(&self) -> u64 {
        match self {
            ShapeId::Point(id) => id.0,
            ShapeId::Line(id) => id.0,
            ShapeId::Circle(id) => id.0,
            ShapeId::Box(id) => id.0,
        }
    }
}

impl PartialOrd for ShapeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ShapeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw().cmp(&other.raw())
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeId::Point(id) => id.fmt(f),
            ShapeId::Line(id) => id.fmt(f),
            ShapeId::Circle(id) => id.fmt(f),
            ShapeId::Box(id) => id.fmt(f),
        }
    }
}

impl From<PointId> for ShapeId {
    fn from(id: PointId) -> Self {
        ShapeId::Point(id)
    }
}

impl From<LineId> for ShapeId {
    fn from(id: LineId) -> Self {
        ShapeId::Line(id)
    }
}

impl From<CircleId> for ShapeId {
    fn from(id: CircleId) -> Self {
        ShapeId::Circle(id)
    }
}

impl From<BoxId> for ShapeId {
    fn from(id: BoxId) -> Self {
        ShapeId::Box(id)
    }
}

/// 图元能力（位域）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    bits: u8,
}

impl Capabilities {
    pub const DRAWABLE: u8 = 1 << 0;
    pub const MOVABLE: u8 = 1 << 1;
    pub const DELETABLE: u8 = 1 << 2;

    pub const NONE: Capabilities = Capabilities { bits: 0 };

    pub fn new(bits: u8) -> Self {
        Self { bits }
    }

    pub fn is_drawable(&self) -> bool {
        self.bits & Self::DRAWABLE != 0
    }

    pub fn is_movable(&self) -> bool {
        self.bits & Self::MOVABLE != 0
    }

    pub fn is_deletable(&self) -> bool {
        self.bits & Self::DELETABLE != 0
    }

    pub fn without(self, bits: u8) -> Self {
        Self { bits: self.bits & !bits }
    }
}

/// 逻辑时钟：为新图元分配ID和创建时刻
///
/// 每个图表独立持有，不依赖进程级计数器。
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_raw(&mut self) -> u64 {
        if self.next == 0 {
            self.next = 1;
        }
        let id = self.next;
        self.next += 1;
        id
    }
}
