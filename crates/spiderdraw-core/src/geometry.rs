//! 几何图元定义
//!
//! 支持的基本图元：
//! - 点 (Point)：蜘蛛的足
//! - 线段 (Line)：连接两个足
//! - 圆 (Circle)：集合轮廓
//! - 方框 (BoxShape)：全集矩形
//!
//! 图元之间的引用一律是ID，反向关系由 [`container`](crate::container) 维护。

use crate::container::{Mirror, MultiContainer, SingleContainer};
use crate::entity::{BoxId, CircleId, LineId, PointId, ShapeKind};
use crate::math::{point_segment_distance, segments_intersect, BoundingBox2, Point2, Vector2};
use crate::spiders::Spider;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 纯几何描述（类型 + 位置参数）
///
/// 用作创建请求和序列化记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        position: Point2,
    },
    Line {
        start: Point2,
        end: Point2,
    },
    Circle {
        center: Point2,
        radius: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<char>,
    },
    Box {
        min: Point2,
        max: Point2,
    },
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point {
            position: Point2::new(x, y),
        }
    }

    pub fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Geometry::Line {
            start: Point2::new(x1, y1),
            end: Point2::new(x2, y2),
        }
    }

    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Geometry::Circle {
            center: Point2::new(x, y),
            radius,
            label: None,
        }
    }

    pub fn labeled_circle(x: f64, y: f64, radius: f64, label: char) -> Self {
        Geometry::Circle {
            center: Point2::new(x, y),
            radius,
            label: Some(label),
        }
    }

    pub fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let bounds = BoundingBox2::new(Point2::new(x1, y1), Point2::new(x2, y2));
        Geometry::Box {
            min: bounds.min,
            max: bounds.max,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Point { .. } => ShapeKind::Point,
            Geometry::Line { .. } => ShapeKind::Line,
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Box { .. } => ShapeKind::Box,
        }
    }

    /// 获取几何的类型名称
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        match self {
            Geometry::Point { position } => BoundingBox2::new(*position, *position),
            Geometry::Line { start, end } => BoundingBox2::new(*start, *end),
            Geometry::Circle { center, radius, .. } => circle_bbox(center, *radius),
            Geometry::Box { min, max } => BoundingBox2::new(*min, *max),
        }
    }
}

fn circle_bbox(center: &Point2, radius: f64) -> BoundingBox2 {
    BoundingBox2::new(
        Point2::new(center.x - radius, center.y - radius),
        Point2::new(center.x + radius, center.y + radius),
    )
}

/// 线段的端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineEnd {
    Start,
    End,
}

impl LineEnd {
    pub fn other(self) -> Self {
        match self {
            LineEnd::Start => LineEnd::End,
            LineEnd::End => LineEnd::Start,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LineEnd::Start => "start",
            LineEnd::End => "end",
        }
    }
}

/// 点上的线段槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    First,
    Second,
}

/// 点与线段的连接：哪条线，占哪一端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub line: LineId,
    pub end: LineEnd,
}

/// 点
#[derive(Debug, Clone)]
pub struct Point {
    pub id: PointId,
    pub position: Point2,
    /// 创建时刻（图表逻辑时钟）
    pub created_at: u64,
    pub(crate) line1: Option<Attachment>,
    pub(crate) line2: Option<Attachment>,
    pub(crate) circles: MultiContainer<PointId, CircleId>,
    pub(crate) owner_box: SingleContainer<PointId, BoxId>,
}

impl Point {
    pub fn new(id: PointId, position: Point2, created_at: u64) -> Self {
        Self {
            id,
            position,
            created_at,
            line1: None,
            line2: None,
            circles: MultiContainer::new(id),
            owner_box: SingleContainer::new(id),
        }
    }

    pub fn line1(&self) -> Option<Attachment> {
        self.line1
    }

    pub fn line2(&self) -> Option<Attachment> {
        self.line2
    }

    pub fn slot(&self, slot: Slot) -> Option<Attachment> {
        match slot {
            Slot::First => self.line1,
            Slot::Second => self.line2,
        }
    }

    pub(crate) fn set_slot(&mut self, slot: Slot, attachment: Option<Attachment>) {
        match slot {
            Slot::First => self.line1 = attachment,
            Slot::Second => self.line2 = attachment,
        }
    }

    pub fn is_fully_connected(&self) -> bool {
        self.line1.is_some() && self.line2.is_some()
    }

    /// 线段所在的槽位
    pub fn which_slot(&self, line: LineId) -> Option<Slot> {
        if self.line1.is_some_and(|a| a.line == line) {
            Some(Slot::First)
        } else if self.line2.is_some_and(|a| a.line == line) {
            Some(Slot::Second)
        } else {
            None
        }
    }

    /// 另一个槽位上的线段；`line` 不在任何槽位时返回 `None`
    pub fn other_line(&self, line: LineId) -> Option<LineId> {
        match self.which_slot(line)? {
            Slot::First => self.line2.map(|a| a.line),
            Slot::Second => self.line1.map(|a| a.line),
        }
    }

    pub fn is_attached_to(&self, line: LineId) -> bool {
        self.which_slot(line).is_some()
    }

    pub fn attachments(&self) -> impl Iterator<Item = Attachment> + '_ {
        self.line1.iter().chain(self.line2.iter()).copied()
    }

    pub fn circles(&self) -> &MultiContainer<PointId, CircleId> {
        &self.circles
    }

    pub fn owner_box(&self) -> Option<BoxId> {
        self.owner_box.get()
    }

    pub fn distance(&self, position: &Point2) -> f64 {
        (self.position - position).norm()
    }

    /// 拾取测试
    pub fn is_within(&self, position: &Point2, hit_dist: f64) -> bool {
        self.distance(position) < hit_dist
    }

    /// 以点为圆心、`radius` 为半径的小圆是否与线段相交
    pub fn intersects_segment(&self, a: &Point2, b: &Point2, radius: f64) -> bool {
        point_segment_distance(&self.position, a, b) <= radius
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(self.position, self.position)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::Point {
            position: self.position,
        }
    }
}

/// 线段端点：位置 + 可选的锚定点
#[derive(Debug, Clone, PartialEq)]
pub struct LineEndpoint {
    pub position: Point2,
    pub(crate) anchor: Option<PointId>,
}

impl LineEndpoint {
    pub fn new(position: Point2) -> Self {
        Self {
            position,
            anchor: None,
        }
    }

    pub fn anchor(&self) -> Option<PointId> {
        self.anchor
    }
}

/// 线段
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub created_at: u64,
    pub start: LineEndpoint,
    pub end: LineEndpoint,
}

impl Line {
    pub fn new(id: LineId, start: Point2, end: Point2, created_at: u64) -> Self {
        Self {
            id,
            created_at,
            start: LineEndpoint::new(start),
            end: LineEndpoint::new(end),
        }
    }

    pub fn endpoint(&self, end: LineEnd) -> &LineEndpoint {
        match end {
            LineEnd::Start => &self.start,
            LineEnd::End => &self.end,
        }
    }

    pub(crate) fn endpoint_mut(&mut self, end: LineEnd) -> &mut LineEndpoint {
        match end {
            LineEnd::Start => &mut self.start,
            LineEnd::End => &mut self.end,
        }
    }

    pub fn anchor(&self, end: LineEnd) -> Option<PointId> {
        self.endpoint(end).anchor
    }

    /// 两端都已锚定
    pub fn is_fully_anchored(&self) -> bool {
        self.start.anchor.is_some() && self.end.anchor.is_some()
    }

    /// 该点锚定在哪一端
    pub fn anchored_end(&self, point: PointId) -> Option<LineEnd> {
        if self.start.anchor == Some(point) {
            Some(LineEnd::Start)
        } else if self.end.anchor == Some(point) {
            Some(LineEnd::End)
        } else {
            None
        }
    }

    /// 从 `point` 出发沿线段到达的另一端锚定点
    pub fn other_end(&self, point: PointId) -> Option<PointId> {
        let end = self.anchored_end(point)?;
        self.anchor(end.other())
    }

    /// 计算线段长度
    pub fn length(&self) -> f64 {
        (self.end.position - self.start.position).norm()
    }

    /// 到较近端点的距离及该端；距离相等时取终点
    pub fn closest_end(&self, position: &Point2) -> (f64, LineEnd) {
        let start_dist = (self.start.position - position).norm();
        let end_dist = (self.end.position - position).norm();
        if start_dist < end_dist {
            (start_dist, LineEnd::Start)
        } else {
            (end_dist, LineEnd::End)
        }
    }

    /// 计算点到线段的距离
    pub fn distance_to_point(&self, position: &Point2) -> f64 {
        point_segment_distance(position, &self.start.position, &self.end.position)
    }

    pub fn intersects_segment(&self, a: &Point2, b: &Point2) -> bool {
        segments_intersect(self.start.position, self.end.position, *a, *b)
    }

    pub fn translate(&mut self, delta: &Vector2) {
        self.start.position += *delta;
        self.end.position += *delta;
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(self.start.position, self.end.position)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::Line {
            start: self.start.position,
            end: self.end.position,
        }
    }
}

/// 圆
#[derive(Debug, Clone)]
pub struct Circle {
    pub id: CircleId,
    pub created_at: u64,
    pub center: Point2,
    pub radius: f64,
    pub label: Option<char>,
    pub(crate) points: MultiContainer<CircleId, PointId>,
}

impl Circle {
    pub fn new(id: CircleId, center: Point2, radius: f64, created_at: u64) -> Self {
        Self {
            id,
            created_at,
            center,
            radius,
            label: None,
            points: MultiContainer::new(id),
        }
    }

    pub fn with_label(mut self, label: Option<char>) -> Self {
        self.label = label;
        self
    }

    /// 到圆周的距离（非负）
    pub fn boundary_distance(&self, position: &Point2) -> f64 {
        ((position - self.center).norm() - self.radius).abs()
    }

    /// 点是否恰好在圆周上
    pub fn is_on_boundary(&self, position: &Point2) -> bool {
        self.boundary_distance(position) == 0.0
    }

    /// 点是否在圆盘内（含圆周）
    pub fn contains(&self, position: &Point2) -> bool {
        (position - self.center).norm() <= self.radius
    }

    /// 线段是否穿过圆周
    pub fn intersects_segment(&self, a: &Point2, b: &Point2) -> bool {
        let nearest = point_segment_distance(&self.center, a, b);
        let farthest = (a - self.center).norm().max((b - self.center).norm());
        nearest <= self.radius && farthest >= self.radius
    }

    pub fn points(&self) -> &MultiContainer<CircleId, PointId> {
        &self.points
    }

    /// 显示名：标签字母，无标签时用ID
    pub fn display_name(&self) -> String {
        match self.label {
            Some(label) => label.to_string(),
            None => self.id.to_string(),
        }
    }

    pub fn translate(&mut self, delta: &Vector2) {
        self.center += *delta;
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        circle_bbox(&self.center, self.radius)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::Circle {
            center: self.center,
            radius: self.radius,
            label: self.label,
        }
    }
}

/// 方框
#[derive(Debug, Clone)]
pub struct BoxShape {
    pub id: BoxId,
    pub created_at: u64,
    pub bounds: BoundingBox2,
    pub(crate) points: MultiContainer<BoxId, PointId>,
    pub(crate) inner: BTreeSet<BoxId>,
    pub(crate) spiders: Vec<Spider>,
    pub(crate) spider_revision: u64,
}

impl BoxShape {
    pub fn new(id: BoxId, bounds: BoundingBox2, created_at: u64) -> Self {
        Self {
            id,
            created_at,
            bounds,
            points: MultiContainer::new(id),
            inner: BTreeSet::new(),
            spiders: Vec::new(),
            spider_revision: 0,
        }
    }

    pub fn contains(&self, position: &Point2) -> bool {
        self.bounds.contains(position)
    }

    pub fn contains_box(&self, other: &BoxShape) -> bool {
        self.bounds.contains_box(&other.bounds)
    }

    /// 没有内嵌方框，可以直接拥有点
    pub fn is_leaf(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn inner_boxes(&self) -> impl Iterator<Item = BoxId> + '_ {
        self.inner.iter().copied()
    }

    pub fn points(&self) -> &MultiContainer<BoxId, PointId> {
        &self.points
    }

    pub fn spiders(&self) -> &[Spider] {
        &self.spiders
    }

    /// 蜘蛛推导被调用的次数
    pub fn spider_revision(&self) -> u64 {
        self.spider_revision
    }

    /// 到四条边的最近距离
    pub fn edge_distance(&self, position: &Point2) -> f64 {
        self.edges()
            .iter()
            .map(|(a, b)| point_segment_distance(position, a, b))
            .fold(f64::MAX, f64::min)
    }

    pub fn intersects_segment(&self, a: &Point2, b: &Point2) -> bool {
        self.edges()
            .iter()
            .any(|(p, q)| segments_intersect(*p, *q, *a, *b))
    }

    fn edges(&self) -> [(Point2, Point2); 4] {
        let min = self.bounds.min;
        let max = self.bounds.max;
        let top_right = Point2::new(max.x, min.y);
        let bottom_left = Point2::new(min.x, max.y);
        [
            (min, top_right),
            (top_right, max),
            (max, bottom_left),
            (bottom_left, min),
        ]
    }

    pub fn translate(&mut self, delta: &Vector2) {
        self.bounds.min += *delta;
        self.bounds.max += *delta;
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        self.bounds
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::Box {
            min: self.bounds.min,
            max: self.bounds.max,
        }
    }
}

impl Mirror<CircleId, PointId> for BTreeMap<CircleId, Circle> {
    fn has(&self, key: CircleId) -> bool {
        self.contains_key(&key)
    }

    fn mirror_attach(&mut self, key: CircleId, owner: PointId) {
        if let Some(circle) = self.get_mut(&key) {
            circle.points.insert_mirrored(owner);
        }
    }

    fn mirror_detach(&mut self, key: CircleId, owner: PointId) {
        if let Some(circle) = self.get_mut(&key) {
            circle.points.remove_mirrored(&owner);
        }
    }
}

impl Mirror<BoxId, PointId> for BTreeMap<BoxId, BoxShape> {
    fn has(&self, key: BoxId) -> bool {
        self.contains_key(&key)
    }

    fn mirror_attach(&mut self, key: BoxId, owner: PointId) {
        if let Some(frame) = self.get_mut(&key) {
            frame.points.insert_mirrored(owner);
        }
    }

    fn mirror_detach(&mut self, key: BoxId, owner: PointId) {
        if let Some(frame) = self.get_mut(&key) {
            frame.points.remove_mirrored(&owner);
        }
    }
}

impl Mirror<PointId, CircleId> for BTreeMap<PointId, Point> {
    fn has(&self, key: PointId) -> bool {
        self.contains_key(&key)
    }

    fn mirror_attach(&mut self, key: PointId, owner: CircleId) {
        if let Some(point) = self.get_mut(&key) {
            point.circles.insert_mirrored(owner);
        }
    }

    fn mirror_detach(&mut self, key: PointId, owner: CircleId) {
        if let Some(point) = self.get_mut(&key) {
            point.circles.remove_mirrored(&owner);
        }
    }
}

impl Mirror<PointId, BoxId> for BTreeMap<PointId, Point> {
    fn has(&self, key: PointId) -> bool {
        self.contains_key(&key)
    }

    fn mirror_attach(&mut self, key: PointId, owner: BoxId) {
        if let Some(point) = self.get_mut(&key) {
            point.owner_box.set_mirrored(Some(owner));
        }
    }

    fn mirror_detach(&mut self, key: PointId, owner: BoxId) {
        if let Some(point) = self.get_mut(&key) {
            if point.owner_box.get() == Some(owner) {
                point.owner_box.set_mirrored(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EPSILON;

    #[test]
    fn test_line_length() {
        let line = Line::new(LineId(1), Point2::new(0.0, 0.0), Point2::new(3.0, 4.0), 1);
        assert!((line.length() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_closest_end_prefers_end_on_tie() {
        let line = Line::new(LineId(1), Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), 1);
        assert_eq!(line.closest_end(&Point2::new(1.0, 0.0)).1, LineEnd::Start);
        assert_eq!(line.closest_end(&Point2::new(5.0, 3.0)).1, LineEnd::End);
    }

    #[test]
    fn test_circle_boundary_is_exact() {
        let circle = Circle::new(CircleId(1), Point2::origin(), 5.0, 1);
        assert!(circle.is_on_boundary(&Point2::new(3.0, 4.0)));
        assert!(circle.is_on_boundary(&Point2::new(-5.0, 0.0)));
        assert!(!circle.is_on_boundary(&Point2::new(3.0, 4.001)));
        assert!(circle.contains(&Point2::new(1.0, 1.0)));
    }

    #[test]
    fn test_circle_intersects_segment_only_across_boundary() {
        let circle = Circle::new(CircleId(1), Point2::origin(), 5.0, 1);
        assert!(circle.intersects_segment(&Point2::new(-10.0, 0.0), &Point2::new(0.0, 0.0)));
        // 完全在圆内的线段不擦除圆
        assert!(!circle.intersects_segment(&Point2::new(-1.0, 0.0), &Point2::new(1.0, 0.0)));
        assert!(!circle.intersects_segment(&Point2::new(-10.0, 8.0), &Point2::new(10.0, 8.0)));
    }

    #[test]
    fn test_box_edges() {
        let frame = BoxShape::new(
            BoxId(1),
            BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)),
            1,
        );
        assert!(frame.contains(&Point2::new(5.0, 5.0)));
        assert!((frame.edge_distance(&Point2::new(5.0, 4.0)) - 4.0).abs() < EPSILON);
        assert!(frame.intersects_segment(&Point2::new(5.0, 5.0), &Point2::new(15.0, 5.0)));
        assert!(!frame.intersects_segment(&Point2::new(2.0, 2.0), &Point2::new(8.0, 8.0)));
    }

    #[test]
    fn test_point_other_line() {
        let mut point = Point::new(PointId(1), Point2::origin(), 1);
        point.line1 = Some(Attachment {
            line: LineId(2),
            end: LineEnd::Start,
        });
        assert_eq!(point.other_line(LineId(2)), None);
        point.line2 = Some(Attachment {
            line: LineId(3),
            end: LineEnd::End,
        });
        assert_eq!(point.other_line(LineId(2)), Some(LineId(3)));
        assert_eq!(point.other_line(LineId(3)), Some(LineId(2)));
        assert_eq!(point.other_line(LineId(9)), None);
        assert!(point.is_fully_connected());
    }

    #[test]
    fn test_geometry_serde_tagging() {
        let geometry = Geometry::labeled_circle(1.0, 2.0, 3.0, 'A');
        assert_eq!(geometry.type_name(), "Circle");
        let bbox = geometry.bounding_box();
        assert_eq!(bbox.min, Point2::new(-2.0, -1.0));
    }
}
