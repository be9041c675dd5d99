//! 图表存储
//!
//! 持有全部存活图元的有序实体表，是所有修改的入口。每次创建、移动、
//! 删除之后，都会对受影响的点重新执行关联计算（见 [`incidence`](crate::incidence)），
//! 调用方随后即可读取有效性状态用于绘制。
//!
//! 单写者：同一时刻只有一个调用方修改图表，异步识别结果通过
//! [`Editor`](crate::classify::Editor) 的消息队列串行进入。

use crate::config::DiagramConfig;
use crate::entity::{
    BoxId, Capabilities, CircleId, IdAllocator, LineId, PointId, ShapeId,
};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::{Attachment, BoxShape, Circle, Geometry, Line, LineEnd, Point, Slot};
use crate::math::{BoundingBox2, Point2};
use crate::spatial::SpatialIndex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// 供绘制使用的点状态
#[derive(Debug, Clone, PartialEq)]
pub struct PointView {
    pub id: PointId,
    pub position: Point2,
    pub valid: bool,
}

/// 图表
#[derive(Debug, Clone)]
pub struct Diagram {
    config: DiagramConfig,
    ids: IdAllocator,
    pub(crate) points: BTreeMap<PointId, Point>,
    pub(crate) lines: BTreeMap<LineId, Line>,
    pub(crate) circles: BTreeMap<CircleId, Circle>,
    pub(crate) boxes: BTreeMap<BoxId, BoxShape>,
    pub(crate) spatial: SpatialIndex,
    /// 画布方框：覆盖整个画布，不可拾取、移动或擦除
    drawing_box: Option<BoxId>,
}

pub(crate) fn dangling(owner: impl ToString, entity: impl ToString) -> DiagramError {
    DiagramError::DanglingRelation {
        owner: owner.to_string(),
        entity: entity.to_string(),
    }
}

fn validate_geometry(geometry: &Geometry) -> DiagramResult<()> {
    let finite = |p: &Point2| p.x.is_finite() && p.y.is_finite();
    let ok = match geometry {
        Geometry::Point { position } => finite(position),
        Geometry::Line { start, end } => finite(start) && finite(end),
        Geometry::Circle { center, radius, .. } => {
            if !(radius.is_finite() && *radius > 0.0) {
                return Err(DiagramError::InvalidGeometry(format!(
                    "circle radius must be positive, got {}",
                    radius
                )));
            }
            finite(center)
        }
        Geometry::Box { min, max } => finite(min) && finite(max),
    };
    if ok {
        Ok(())
    } else {
        Err(DiagramError::InvalidGeometry(format!(
            "{} has non-finite coordinates",
            geometry.type_name()
        )))
    }
}

impl Diagram {
    /// 创建空图表（无画布方框）
    pub fn new(config: DiagramConfig) -> Self {
        let spatial = SpatialIndex::new(config.spatial_cell_size);
        Self {
            config,
            ids: IdAllocator::new(),
            points: BTreeMap::new(),
            lines: BTreeMap::new(),
            circles: BTreeMap::new(),
            boxes: BTreeMap::new(),
            spatial,
            drawing_box: None,
        }
    }

    /// 创建带画布方框的图表，方框覆盖 `(0,0)`–`(width-1,height-1)`
    pub fn with_canvas(config: DiagramConfig, width: f64, height: f64) -> DiagramResult<Self> {
        let mut diagram = Self::new(config);
        diagram.resize_canvas(width, height)?;
        Ok(diagram)
    }

    /// 按记录顺序重放创建，得到与原图表等价的图表
    pub fn from_records(
        config: DiagramConfig,
        canvas: Option<(f64, f64)>,
        records: impl IntoIterator<Item = Geometry>,
    ) -> DiagramResult<Self> {
        let mut diagram = match canvas {
            Some((width, height)) => Self::with_canvas(config, width, height)?,
            None => Self::new(config),
        };
        for geometry in records {
            diagram.create(geometry)?;
        }
        info!("Rebuilt diagram with {} shapes", diagram.len());
        Ok(diagram)
    }

    pub fn config(&self) -> &DiagramConfig {
        &self.config
    }

    pub fn drawing_box(&self) -> Option<BoxId> {
        self.drawing_box
    }

    /// 画布尺寸（由画布方框推出）
    pub fn canvas_size(&self) -> Option<(f64, f64)> {
        let frame = self.boxes.get(&self.drawing_box?)?;
        Some((frame.bounds.max.x + 1.0, frame.bounds.max.y + 1.0))
    }

    // ---- 查询 ----

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(&id)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    pub fn circle(&self, id: CircleId) -> Option<&Circle> {
        self.circles.get(&id)
    }

    pub fn get_box(&self, id: BoxId) -> Option<&BoxShape> {
        self.boxes.get(&id)
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.points.values()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.lines.values()
    }

    pub fn circles(&self) -> impl Iterator<Item = &Circle> + '_ {
        self.circles.values()
    }

    pub fn boxes(&self) -> impl Iterator<Item = &BoxShape> + '_ {
        self.boxes.values()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        match id {
            ShapeId::Point(id) => self.points.contains_key(&id),
            ShapeId::Line(id) => self.lines.contains_key(&id),
            ShapeId::Circle(id) => self.circles.contains_key(&id),
            ShapeId::Box(id) => self.boxes.contains_key(&id),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len() + self.lines.len() + self.circles.len() + self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部图元，按创建顺序
    pub fn shapes(&self) -> Vec<ShapeId> {
        let mut shapes: Vec<ShapeId> = self
            .points
            .keys()
            .map(|id| ShapeId::Point(*id))
            .chain(self.lines.keys().map(|id| ShapeId::Line(*id)))
            .chain(self.circles.keys().map(|id| ShapeId::Circle(*id)))
            .chain(self.boxes.keys().map(|id| ShapeId::Box(*id)))
            .collect();
        shapes.sort();
        shapes
    }

    pub fn geometry_of(&self, id: ShapeId) -> Option<Geometry> {
        match id {
            ShapeId::Point(id) => self.points.get(&id).map(Point::geometry),
            ShapeId::Line(id) => self.lines.get(&id).map(Line::geometry),
            ShapeId::Circle(id) => self.circles.get(&id).map(Circle::geometry),
            ShapeId::Box(id) => self.boxes.get(&id).map(BoxShape::geometry),
        }
    }

    pub fn bounding_box_of(&self, id: ShapeId) -> Option<BoundingBox2> {
        match id {
            ShapeId::Point(id) => self.points.get(&id).map(Point::bounding_box),
            ShapeId::Line(id) => self.lines.get(&id).map(Line::bounding_box),
            ShapeId::Circle(id) => self.circles.get(&id).map(Circle::bounding_box),
            ShapeId::Box(id) => self.boxes.get(&id).map(BoxShape::bounding_box),
        }
    }

    /// 可序列化视图：除画布方框外的所有图元，按创建顺序
    pub fn records(&self) -> Vec<Geometry> {
        self.shapes()
            .into_iter()
            .filter(|id| Some(*id) != self.drawing_box.map(ShapeId::Box))
            .filter_map(|id| self.geometry_of(id))
            .collect()
    }

    pub fn capabilities(&self, id: ShapeId) -> DiagramResult<Capabilities> {
        if !self.contains(id) {
            return Err(DiagramError::UnknownShape(id));
        }
        let caps = id.kind().capabilities();
        if self.drawing_box.map(ShapeId::Box) == Some(id) {
            return Ok(caps.without(Capabilities::MOVABLE | Capabilities::DELETABLE));
        }
        Ok(caps)
    }

    /// 供绘制使用的点状态，按创建顺序
    pub fn point_views(&self) -> DiagramResult<Vec<PointView>> {
        self.points
            .values()
            .map(|p| {
                Ok(PointView {
                    id: p.id,
                    position: p.position,
                    valid: self.is_point_valid(p.id)?,
                })
            })
            .collect()
    }

    // ---- 修改 ----

    fn next_raw(&mut self) -> u64 {
        self.ids.next_raw()
    }

    fn insert_point(&mut self, position: Point2) -> PointId {
        let raw = self.next_raw();
        let id = PointId::new(raw);
        self.points.insert(id, Point::new(id, position, raw));
        self.reindex(id.into());
        id
    }

    fn insert_line(&mut self, start: Point2, end: Point2) -> LineId {
        let raw = self.next_raw();
        let id = LineId::new(raw);
        self.lines.insert(id, Line::new(id, start, end, raw));
        self.reindex(id.into());
        id
    }

    fn insert_circle(&mut self, center: Point2, radius: f64, label: Option<char>) -> CircleId {
        let raw = self.next_raw();
        let id = CircleId::new(raw);
        self.circles
            .insert(id, Circle::new(id, center, radius, raw).with_label(label));
        self.reindex(id.into());
        id
    }

    fn insert_box(&mut self, bounds: BoundingBox2) -> BoxId {
        let raw = self.next_raw();
        let id = BoxId::new(raw);
        self.boxes.insert(id, BoxShape::new(id, bounds, raw));
        self.reindex(id.into());
        self.update_nesting();
        id
    }

    /// 创建图元并触发关联计算
    pub fn create(&mut self, geometry: Geometry) -> DiagramResult<ShapeId> {
        validate_geometry(&geometry)?;
        let id = match geometry {
            Geometry::Point { position } => {
                let id = self.insert_point(position);
                self.recompute_point(id)?;
                ShapeId::Point(id)
            }
            Geometry::Line { start, end } => {
                let id = self.insert_line(start, end);
                self.recompute_all()?;
                ShapeId::Line(id)
            }
            Geometry::Circle {
                center,
                radius,
                label,
            } => {
                let id = self.insert_circle(center, radius, label);
                self.recompute_all()?;
                ShapeId::Circle(id)
            }
            Geometry::Box { min, max } => {
                let id = self.insert_box(BoundingBox2::new(min, max));
                self.recompute_all()?;
                ShapeId::Box(id)
            }
        };
        debug!("Created {}", id);
        Ok(id)
    }

    pub fn add_point(&mut self, x: f64, y: f64) -> DiagramResult<PointId> {
        match self.create(Geometry::point(x, y))? {
            ShapeId::Point(id) => Ok(id),
            other => Err(DiagramError::UnknownShape(other)),
        }
    }

    pub fn add_line(&mut self, start: Point2, end: Point2) -> DiagramResult<LineId> {
        match self.create(Geometry::Line { start, end })? {
            ShapeId::Line(id) => Ok(id),
            other => Err(DiagramError::UnknownShape(other)),
        }
    }

    pub fn add_circle(&mut self, center: Point2, radius: f64, label: Option<char>) -> DiagramResult<CircleId> {
        match self.create(Geometry::Circle {
            center,
            radius,
            label,
        })? {
            ShapeId::Circle(id) => Ok(id),
            other => Err(DiagramError::UnknownShape(other)),
        }
    }

    pub fn add_box(&mut self, min: Point2, max: Point2) -> DiagramResult<BoxId> {
        match self.create(Geometry::Box { min, max })? {
            ShapeId::Box(id) => Ok(id),
            other => Err(DiagramError::UnknownShape(other)),
        }
    }

    /// 按 `from -> to` 的位移移动图元
    ///
    /// 移动点时，锚定在该点上的线段端点随之移动；移动线段时，锚定的点随之移动。
    pub fn move_shape(&mut self, id: ShapeId, from: Point2, to: Point2) -> DiagramResult<()> {
        if !self.capabilities(id)?.is_movable() {
            return Err(DiagramError::Unsupported {
                shape: id,
                operation: "move",
            });
        }
        let delta = to - from;
        match id {
            ShapeId::Point(point_id) => {
                if let Some(point) = self.points.get_mut(&point_id) {
                    point.position += delta;
                }
                self.reindex(id);
                self.sync_anchored_ends(point_id)?;
                self.recompute_point(point_id)?;
            }
            ShapeId::Line(line_id) => {
                let anchors: Vec<PointId> = match self.lines.get_mut(&line_id) {
                    Some(line) => {
                        line.translate(&delta);
                        [line.start.anchor, line.end.anchor].into_iter().flatten().collect()
                    }
                    None => return Err(DiagramError::UnknownShape(id)),
                };
                self.reindex(id);
                for point_id in anchors {
                    let point = self
                        .points
                        .get_mut(&point_id)
                        .ok_or_else(|| dangling(line_id, point_id))?;
                    point.position += delta;
                    self.reindex(point_id.into());
                    self.sync_anchored_ends(point_id)?;
                }
                self.recompute_all()?;
            }
            ShapeId::Circle(circle_id) => {
                if let Some(circle) = self.circles.get_mut(&circle_id) {
                    circle.translate(&delta);
                }
                self.reindex(id);
                self.recompute_all()?;
            }
            ShapeId::Box(box_id) => {
                if let Some(frame) = self.boxes.get_mut(&box_id) {
                    frame.translate(&delta);
                }
                self.reindex(id);
                self.update_nesting();
                self.recompute_all()?;
            }
        }
        debug!("Moved {} by ({}, {})", id, delta.x, delta.y);
        Ok(())
    }

    /// 删除图元，对称地撤销它参与的所有关系
    pub fn delete(&mut self, id: ShapeId) -> DiagramResult<()> {
        if !self.capabilities(id)?.is_deletable() {
            return Err(DiagramError::Unsupported {
                shape: id,
                operation: "delete",
            });
        }
        match id {
            ShapeId::Point(point_id) => {
                self.detach_slot(point_id, Slot::First)?;
                self.detach_slot(point_id, Slot::Second)?;
                let point = self
                    .points
                    .get_mut(&point_id)
                    .ok_or(DiagramError::UnknownShape(id))?;
                let former_box = point.owner_box();
                point.circles.remove_all(&mut self.circles)?;
                point.owner_box.set(None, &mut self.boxes)?;
                self.points.remove(&point_id);
                self.spatial.remove(&id);
                if let Some(box_id) = former_box {
                    self.compute_spiders(box_id)?;
                }
            }
            ShapeId::Line(line_id) => {
                let anchors: Vec<PointId> = self
                    .lines
                    .get(&line_id)
                    .map(|line| [line.start.anchor, line.end.anchor].into_iter().flatten().collect())
                    .ok_or(DiagramError::UnknownShape(id))?;
                let mut affected_boxes = BTreeSet::new();
                for point_id in anchors {
                    let point = self
                        .points
                        .get(&point_id)
                        .ok_or_else(|| dangling(line_id, point_id))?;
                    let slot = point
                        .which_slot(line_id)
                        .ok_or_else(|| dangling(line_id, point_id))?;
                    affected_boxes.extend(point.owner_box());
                    self.detach_slot(point_id, slot)?;
                }
                self.lines.remove(&line_id);
                self.spatial.remove(&id);
                for box_id in affected_boxes {
                    self.compute_spiders(box_id)?;
                }
            }
            ShapeId::Circle(circle_id) => {
                let circle = self
                    .circles
                    .get_mut(&circle_id)
                    .ok_or(DiagramError::UnknownShape(id))?;
                let members = circle.points.remove_all(&mut self.points)?;
                self.circles.remove(&circle_id);
                self.spatial.remove(&id);
                for point_id in members {
                    self.recompute_point(point_id)?;
                }
            }
            ShapeId::Box(box_id) => {
                let frame = self
                    .boxes
                    .get_mut(&box_id)
                    .ok_or(DiagramError::UnknownShape(id))?;
                frame.points.remove_all(&mut self.points)?;
                self.boxes.remove(&box_id);
                self.spatial.remove(&id);
                self.update_nesting();
                self.recompute_all()?;
            }
        }
        debug!("Deleted {}", id);
        Ok(())
    }

    /// 擦除：删除橡皮擦线段穿过的所有可删除图元
    pub fn erase(&mut self, from: Point2, to: Point2) -> DiagramResult<Vec<ShapeId>> {
        let hit = self.config.point_hit_dist;
        let window = BoundingBox2::new(from, to).inflated(hit);
        let mut erased = Vec::new();
        for id in self.spatial.query_rect(&window) {
            if !self.contains(id) || !self.capabilities(id)?.is_deletable() {
                continue;
            }
            let crossed = match id {
                ShapeId::Point(p) => self
                    .points
                    .get(&p)
                    .is_some_and(|p| p.intersects_segment(&from, &to, hit)),
                ShapeId::Line(l) => self
                    .lines
                    .get(&l)
                    .is_some_and(|l| l.intersects_segment(&from, &to)),
                ShapeId::Circle(c) => self
                    .circles
                    .get(&c)
                    .is_some_and(|c| c.intersects_segment(&from, &to)),
                ShapeId::Box(b) => self
                    .boxes
                    .get(&b)
                    .is_some_and(|b| b.intersects_segment(&from, &to)),
            };
            if crossed {
                self.delete(id)?;
                erased.push(id);
            }
        }
        if !erased.is_empty() {
            info!("Erased {} shapes", erased.len());
        }
        Ok(erased)
    }

    /// 拾取：命中范围内离 `position` 最近的可移动图元
    pub fn pick(&self, position: Point2) -> Option<ShapeId> {
        let point_hit = self.config.point_hit_dist;
        let outline_hit = self.config.outline_hit_dist;
        let mut best: Option<(ShapeId, f64)> = None;

        for id in self.spatial.query_around(&position, point_hit.max(outline_hit)) {
            if !self.capabilities(id).is_ok_and(|caps| caps.is_movable()) {
                continue;
            }
            let distance = match id {
                ShapeId::Point(p) => self
                    .points
                    .get(&p)
                    .filter(|p| p.is_within(&position, point_hit))
                    .map(|p| p.distance(&position)),
                ShapeId::Line(l) => self
                    .lines
                    .get(&l)
                    .map(|l| l.distance_to_point(&position))
                    .filter(|d| *d < outline_hit),
                ShapeId::Circle(c) => self
                    .circles
                    .get(&c)
                    .map(|c| c.boundary_distance(&position))
                    .filter(|d| *d < outline_hit),
                ShapeId::Box(b) => self
                    .boxes
                    .get(&b)
                    .map(|b| b.edge_distance(&position))
                    .filter(|d| *d < outline_hit),
            };
            if let Some(distance) = distance {
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((id, distance));
                }
            }
        }

        best.map(|(id, _)| id)
    }

    /// 调整画布方框尺寸（不存在时创建）
    pub fn resize_canvas(&mut self, width: f64, height: f64) -> DiagramResult<()> {
        if !(width.is_finite() && height.is_finite() && width >= 1.0 && height >= 1.0) {
            return Err(DiagramError::InvalidGeometry(format!(
                "canvas size {}x{} is not usable",
                width, height
            )));
        }
        let bounds = BoundingBox2::new(Point2::origin(), Point2::new(width - 1.0, height - 1.0));
        match self.drawing_box.and_then(|id| self.boxes.get_mut(&id)) {
            Some(frame) => {
                frame.bounds = bounds;
                let id = frame.id;
                self.reindex(id.into());
                self.update_nesting();
            }
            None => {
                let id = self.insert_box(bounds);
                self.drawing_box = Some(id);
            }
        }
        self.recompute_all()?;
        Ok(())
    }

    // ---- 内部维护 ----

    pub(crate) fn reindex(&mut self, id: ShapeId) {
        match self.bounding_box_of(id) {
            Some(bbox) => self.spatial.insert(id, bbox),
            None => {
                self.spatial.remove(&id);
            }
        }
    }

    /// 让锚定在该点上的线段端点跟随点的位置
    pub(crate) fn sync_anchored_ends(&mut self, point_id: PointId) -> DiagramResult<()> {
        let (position, attachments): (Point2, Vec<Attachment>) = {
            let point = self
                .points
                .get(&point_id)
                .ok_or(DiagramError::UnknownShape(point_id.into()))?;
            (point.position, point.attachments().collect())
        };
        for attachment in attachments {
            let line = self
                .lines
                .get_mut(&attachment.line)
                .ok_or_else(|| dangling(point_id, attachment.line))?;
            line.endpoint_mut(attachment.end).position = position;
            self.reindex(attachment.line.into());
        }
        Ok(())
    }

    /// 重新计算方框嵌套关系：完全位于另一方框内的方框是其内嵌方框
    pub(crate) fn update_nesting(&mut self) {
        let rects: Vec<(BoxId, BoundingBox2)> =
            self.boxes.values().map(|b| (b.id, b.bounds)).collect();
        for frame in self.boxes.values_mut() {
            frame.inner = rects
                .iter()
                .filter(|(id, rect)| *id != frame.id && frame.bounds.contains_box(rect))
                .map(|(id, _)| *id)
                .collect();
        }
    }

    /// 清空某个槽位，同时清除线段端点上的锚定
    pub(crate) fn detach_slot(&mut self, point_id: PointId, slot: Slot) -> DiagramResult<Option<Attachment>> {
        let point = self
            .points
            .get_mut(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        let Some(attachment) = point.slot(slot) else {
            return Ok(None);
        };
        let line = self
            .lines
            .get_mut(&attachment.line)
            .ok_or_else(|| dangling(point_id, attachment.line))?;
        point.set_slot(slot, None);
        let endpoint = line.endpoint_mut(attachment.end);
        if endpoint.anchor == Some(point_id) {
            endpoint.anchor = None;
        }
        debug!(
            "Detached {} from {} at {}",
            point_id,
            attachment.line,
            attachment.end.name()
        );
        Ok(Some(attachment))
    }

    /// 把线段的某一端连接到点的某个槽位
    ///
    /// 槽位原有的线段先被断开；该端若锚定在其他点上，也先从那个点断开。
    /// 端点吸附到点的位置。
    pub(crate) fn attach(&mut self, point_id: PointId, slot: Slot, line_id: LineId, end: LineEnd) -> DiagramResult<()> {
        let point = self
            .points
            .get(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        let line = self
            .lines
            .get(&line_id)
            .ok_or(DiagramError::UnknownShape(line_id.into()))?;
        if point.which_slot(line_id).is_some_and(|s| s != slot) {
            return Err(DiagramError::DuplicateAttachment {
                point: point_id,
                line: line_id,
            });
        }
        let position = point.position;
        let previous_anchor = line.anchor(end).filter(|p| *p != point_id);

        self.detach_slot(point_id, slot)?;
        if let Some(other) = previous_anchor {
            let other_slot = self
                .points
                .get(&other)
                .and_then(|p| p.which_slot(line_id))
                .ok_or_else(|| dangling(line_id, other))?;
            self.detach_slot(other, other_slot)?;
        }

        if let Some(point) = self.points.get_mut(&point_id) {
            point.set_slot(slot, Some(Attachment { line: line_id, end }));
        }
        if let Some(line) = self.lines.get_mut(&line_id) {
            let endpoint = line.endpoint_mut(end);
            endpoint.anchor = Some(point_id);
            endpoint.position = position;
        }
        self.reindex(line_id.into());
        debug!("Attached {} to {} at {}", point_id, line_id, end.name());
        Ok(())
    }

    /// 校验所有双向关系都是对称的
    pub fn check_consistency(&self) -> DiagramResult<()> {
        for point in self.points.values() {
            if let (Some(a), Some(b)) = (point.line1, point.line2) {
                if a.line == b.line {
                    return Err(DiagramError::DuplicateAttachment {
                        point: point.id,
                        line: a.line,
                    });
                }
            }
            for attachment in point.attachments() {
                let anchored = self
                    .lines
                    .get(&attachment.line)
                    .and_then(|l| l.anchor(attachment.end));
                if anchored != Some(point.id) {
                    return Err(dangling(point.id, attachment.line));
                }
            }
            for circle_id in point.circles.iter() {
                if !self
                    .circles
                    .get(&circle_id)
                    .is_some_and(|c| c.points.contains(&point.id))
                {
                    return Err(dangling(point.id, circle_id));
                }
            }
            if let Some(box_id) = point.owner_box() {
                if !self
                    .boxes
                    .get(&box_id)
                    .is_some_and(|b| b.points.contains(&point.id))
                {
                    return Err(dangling(point.id, box_id));
                }
            }
        }
        for line in self.lines.values() {
            for end in [LineEnd::Start, LineEnd::End] {
                if let Some(point_id) = line.anchor(end) {
                    let mirrored = self
                        .points
                        .get(&point_id)
                        .is_some_and(|p| p.attachments().any(|a| a.line == line.id && a.end == end));
                    if !mirrored {
                        return Err(dangling(line.id, point_id));
                    }
                }
            }
        }
        for circle in self.circles.values() {
            for point_id in circle.points.iter() {
                if !self
                    .points
                    .get(&point_id)
                    .is_some_and(|p| p.circles.contains(&circle.id))
                {
                    return Err(dangling(circle.id, point_id));
                }
            }
        }
        for frame in self.boxes.values() {
            for point_id in frame.points.iter() {
                if self.points.get(&point_id).and_then(Point::owner_box) != Some(frame.id) {
                    return Err(dangling(frame.id, point_id));
                }
            }
        }
        Ok(())
    }
}
