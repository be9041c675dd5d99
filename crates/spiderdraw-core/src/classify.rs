//! 笔画识别与编辑队列
//!
//! 手绘笔画结束后不立即识别：等待一段稳定时间，期间新的重叠笔画会
//! 取代它。识别任务在独立的 tokio 任务中运行，完成后只向编辑队列
//! 投递一条 [`Edit::Classified`] 消息，由唯一持有图表的 [`Editor`]
//! 串行应用，识别任务本身从不修改图表。

use crate::config::DiagramConfig;
use crate::diagram::Diagram;
use crate::entity::ShapeId;
use crate::error::DiagramResult;
use crate::geometry::Geometry;
use crate::math::{point_segment_distance, BoundingBox2, Point2};
use futures::channel::mpsc;
use futures::{FutureExt, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

/// 笔画ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StrokeId(pub u64);

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// 一次落笔到抬笔采集的点
#[derive(Debug, Clone)]
pub struct Stroke {
    pub id: StrokeId,
    points: Vec<Point2>,
    bounds: BoundingBox2,
}

impl Stroke {
    pub fn new(id: StrokeId, points: Vec<Point2>) -> Self {
        let bounds = BoundingBox2::from_points(points.iter().copied());
        Self { id, points, bounds }
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn bounds(&self) -> BoundingBox2 {
        self.bounds
    }

    pub fn center(&self) -> Point2 {
        self.bounds.center()
    }
}

/// 识别结果的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassificationKind {
    Point,
    Line,
    Circle,
    Box,
    Text,
    Unknown,
}

/// 识别结果
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Shape(Geometry),
    Text(String),
    Unknown,
}

impl Classification {
    pub fn kind(&self) -> ClassificationKind {
        match self {
            Classification::Shape(Geometry::Point { .. }) => ClassificationKind::Point,
            Classification::Shape(Geometry::Line { .. }) => ClassificationKind::Line,
            Classification::Shape(Geometry::Circle { .. }) => ClassificationKind::Circle,
            Classification::Shape(Geometry::Box { .. }) => ClassificationKind::Box,
            Classification::Text(_) => ClassificationKind::Text,
            Classification::Unknown => ClassificationKind::Unknown,
        }
    }
}

/// 笔画识别器
pub trait Classifier: Send + Sync {
    fn classify(&self, stroke: &Stroke) -> Classification;
}

/// 基于笔画外形的简单识别器
///
/// 很小的笔画是点，足够直的是线段，首尾闭合时按长宽比区分圆和方框。
#[derive(Debug, Clone)]
pub struct OutlineClassifier {
    /// 外接矩形小于该尺寸时视为点
    pub dot_size: f64,
    /// 各采样点偏离首尾连线的最大距离与长度之比
    pub straightness: f64,
    /// 首尾距离与外形尺寸之比小于该值时视为闭合
    pub closure: f64,
}

impl Default for OutlineClassifier {
    fn default() -> Self {
        Self {
            dot_size: 4.0,
            straightness: 0.08,
            closure: 0.2,
        }
    }
}

impl Classifier for OutlineClassifier {
    fn classify(&self, stroke: &Stroke) -> Classification {
        let (Some(first), Some(last)) = (stroke.points.first(), stroke.points.last()) else {
            return Classification::Unknown;
        };
        let bounds = stroke.bounds();
        let extent = bounds.width().max(bounds.height());
        if extent < self.dot_size {
            return Classification::Shape(Geometry::Point {
                position: stroke.center(),
            });
        }

        let chord = (*last - *first).norm();
        let deviation = stroke
            .points
            .iter()
            .map(|p| point_segment_distance(p, first, last))
            .fold(0.0, f64::max);
        if chord > 0.0 && deviation <= self.straightness * chord {
            return Classification::Shape(Geometry::Line {
                start: *first,
                end: *last,
            });
        }

        if chord <= self.closure * extent {
            let aspect = bounds.width() / bounds.height().max(f64::MIN_POSITIVE);
            if (0.75..=1.33).contains(&aspect) {
                return Classification::Shape(Geometry::Circle {
                    center: stroke.center(),
                    radius: (bounds.width() + bounds.height()) / 4.0,
                    label: None,
                });
            }
            return Classification::Shape(Geometry::Box {
                min: bounds.min,
                max: bounds.max,
            });
        }
        Classification::Unknown
    }
}

/// 把识别结果规整为要创建的图元
///
/// 过短的线段直接丢弃；稍长但仍不足以成为线段的改为笔画中心处的点。
pub fn shape_for(config: &DiagramConfig, stroke: &Stroke, classification: Classification) -> Option<Geometry> {
    match classification {
        Classification::Shape(Geometry::Line { start, end }) => {
            let length = (end - start).norm();
            if length < config.min_line_length {
                None
            } else if length < config.point_line_length {
                Some(Geometry::Point {
                    position: stroke.center(),
                })
            } else {
                Some(Geometry::Line { start, end })
            }
        }
        Classification::Shape(geometry) => Some(geometry),
        Classification::Text(_) | Classification::Unknown => None,
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    next: u64,
    pending: BTreeMap<StrokeId, BoundingBox2>,
}

/// 未识别笔画的登记表
///
/// 新笔画与未识别笔画重叠时取代后者；被取代或取消的笔画不再投递结果。
#[derive(Debug, Clone)]
pub struct StrokeTracker {
    state: Arc<RwLock<TrackerState>>,
    overlap_dist: f64,
}

/// 笔画的存活凭据
#[derive(Debug, Clone)]
pub struct StrokeTicket {
    id: StrokeId,
    state: Arc<RwLock<TrackerState>>,
}

impl StrokeTicket {
    pub fn id(&self) -> StrokeId {
        self.id
    }

    pub async fn is_live(&self) -> bool {
        self.state.read().await.pending.contains_key(&self.id)
    }

    /// 结束登记；返回笔画此时是否仍然存活
    pub async fn finish(self) -> bool {
        self.state.write().await.pending.remove(&self.id).is_some()
    }
}

impl StrokeTracker {
    pub fn new(overlap_dist: f64) -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
            overlap_dist,
        }
    }

    /// 登记新笔画，取代与之重叠的未识别笔画
    pub async fn begin(&self, points: Vec<Point2>) -> (Stroke, StrokeTicket) {
        let mut state = self.state.write().await;
        state.next += 1;
        let stroke = Stroke::new(StrokeId(state.next), points);

        let reach = stroke.bounds().inflated(self.overlap_dist);
        let superseded: Vec<StrokeId> = state
            .pending
            .iter()
            .filter(|(_, bounds)| bounds.intersects(&reach))
            .map(|(id, _)| *id)
            .collect();
        for id in superseded {
            state.pending.remove(&id);
            debug!("Stroke {} superseded by {}", id, stroke.id);
        }
        state.pending.insert(stroke.id, stroke.bounds());

        let ticket = StrokeTicket {
            id: stroke.id,
            state: self.state.clone(),
        };
        (stroke, ticket)
    }

    pub async fn cancel(&self, id: StrokeId) -> bool {
        self.state.write().await.pending.remove(&id).is_some()
    }

    pub async fn pending(&self) -> usize {
        self.state.read().await.pending.len()
    }
}

/// 启动识别任务
///
/// 等待稳定时间后检查凭据，仍然存活才识别并投递结果。
/// 返回值表示是否投递了消息。
pub fn spawn_classification(
    config: DiagramConfig,
    stroke: Stroke,
    ticket: StrokeTicket,
    classifier: Arc<dyn Classifier>,
    mut sender: mpsc::UnboundedSender<Edit>,
) -> JoinHandle<bool> {
    task::spawn(async move {
        tokio::time::sleep(config.settle_delay()).await;
        if !ticket.finish().await {
            debug!("Stroke {} is no longer live", stroke.id);
            return false;
        }

        let classification = classifier.classify(&stroke);
        let kind = classification.kind();
        let Some(shape) = shape_for(&config, &stroke, classification) else {
            warn!("Dropped stroke {} classified as {:?}", stroke.id, kind);
            return false;
        };

        match sender
            .send(Edit::Classified {
                stroke: stroke.id,
                shape,
            })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Editor is gone, dropped stroke {}: {}", stroke.id, e);
                false
            }
        }
    })
}

/// 对图表的一次修改请求
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Create(Geometry),
    Move { shape: ShapeId, from: Point2, to: Point2 },
    Delete(ShapeId),
    Erase { from: Point2, to: Point2 },
    Classified { stroke: StrokeId, shape: Geometry },
}

/// 修改结果
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Created(ShapeId),
    Moved(ShapeId),
    Deleted(ShapeId),
    Erased(Vec<ShapeId>),
}

/// 唯一持有图表的编辑者
///
/// 所有修改（包括异步识别结果）都通过它串行应用。
pub struct Editor {
    diagram: Diagram,
    sender: mpsc::UnboundedSender<Edit>,
    receiver: mpsc::UnboundedReceiver<Edit>,
    tracker: StrokeTracker,
}

impl Editor {
    pub fn new(diagram: Diagram) -> Self {
        let (sender, receiver) = mpsc::unbounded();
        let tracker = StrokeTracker::new(diagram.config().stroke_overlap_dist);
        info!("Editor started with {} shapes", diagram.len());
        Self {
            diagram,
            sender,
            receiver,
            tracker,
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn into_diagram(self) -> Diagram {
        self.diagram
    }

    pub fn tracker(&self) -> &StrokeTracker {
        &self.tracker
    }

    /// 编辑队列的发送端
    pub fn sender(&self) -> mpsc::UnboundedSender<Edit> {
        self.sender.clone()
    }

    /// 登记笔画并启动识别任务
    pub async fn submit_stroke(&self, points: Vec<Point2>, classifier: Arc<dyn Classifier>) -> (StrokeId, JoinHandle<bool>) {
        let (stroke, ticket) = self.tracker.begin(points).await;
        let id = stroke.id;
        let handle = spawn_classification(
            self.diagram.config().clone(),
            stroke,
            ticket,
            classifier,
            self.sender(),
        );
        (id, handle)
    }

    /// 立即应用一次修改
    pub fn apply(&mut self, edit: Edit) -> DiagramResult<EditOutcome> {
        match edit {
            Edit::Create(geometry) => self.diagram.create(geometry).map(EditOutcome::Created),
            Edit::Move { shape, from, to } => {
                self.diagram.move_shape(shape, from, to)?;
                Ok(EditOutcome::Moved(shape))
            }
            Edit::Delete(shape) => {
                self.diagram.delete(shape)?;
                Ok(EditOutcome::Deleted(shape))
            }
            Edit::Erase { from, to } => self.diagram.erase(from, to).map(EditOutcome::Erased),
            Edit::Classified { stroke, shape } => {
                let id = self.diagram.create(shape)?;
                debug!("Stroke {} became {}", stroke, id);
                Ok(EditOutcome::Created(id))
            }
        }
    }

    /// 应用队列中已有的全部修改，不等待
    pub fn drain_pending(&mut self) -> Vec<DiagramResult<EditOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(Some(edit)) = self.receiver.next().now_or_never() {
            outcomes.push(self.apply(edit));
        }
        outcomes
    }

    /// 等待并应用下一条修改
    pub async fn next_edit(&mut self) -> Option<DiagramResult<EditOutcome>> {
        let edit = self.receiver.next().await?;
        Some(self.apply(edit))
    }
}
