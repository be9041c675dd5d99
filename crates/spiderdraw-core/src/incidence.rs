//! 关联计算
//!
//! 为一个点重新推导它与线段、圆、方框之间的关系：
//!
//! 1. 线段：把附近线段的端点吸附到点的两个槽位上
//! 2. 圆：点恰好位于圆周上时成为该圆的成员
//! 3. 方框：包含点的第一个叶子方框成为点的拥有者
//! 4. 拥有者方框重新推导蜘蛛
//!
//! 几何上不匹配是正常结果（什么也不连接），只有关系不对称才返回错误。

use crate::diagram::{dangling, Diagram};
use crate::entity::{BoxId, CircleId, LineId, PointId, ShapeId};
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::{Attachment, LineEnd, Slot};
use std::collections::BTreeSet;
use tracing::debug;

/// 一次新建立的连接
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentRecord {
    pub slot: Slot,
    pub attachment: Attachment,
    /// 吸附前点到该端点的距离
    pub distance: f64,
}

/// 一次重算的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeReport {
    pub attached: Vec<AttachmentRecord>,
    pub circles_added: Vec<CircleId>,
    pub circles_removed: Vec<CircleId>,
    /// 拥有者变化：`(旧, 新)`
    pub owner_changed: Option<(Option<BoxId>, BoxId)>,
    /// 触发了蜘蛛推导的方框
    pub spiders_computed: Option<BoxId>,
}

impl RecomputeReport {
    pub fn is_unchanged(&self) -> bool {
        self.attached.is_empty()
            && self.circles_added.is_empty()
            && self.circles_removed.is_empty()
            && self.owner_changed.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    line: LineId,
    end: LineEnd,
    distance: f64,
}

impl Diagram {
    /// 为点重算线段连接
    pub fn compute_lines(&mut self, point_id: PointId) -> DiagramResult<Vec<AttachmentRecord>> {
        let threshold = self.config().point_line_dist;
        let point = self
            .points
            .get(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        let position = point.position;

        let mut best: Option<Candidate> = None;
        let mut second: Option<Candidate> = None;
        for id in self.spatial.query_around(&position, threshold) {
            let ShapeId::Line(line_id) = id else {
                continue;
            };
            // 已连到本点的线段不能再连一次
            if point.is_attached_to(line_id) {
                continue;
            }
            let line = self
                .lines
                .get(&line_id)
                .ok_or_else(|| dangling("spatial index", line_id))?;
            let (distance, end) = line.closest_end(&position);
            let candidate = Candidate {
                line: line_id,
                end,
                distance,
            };
            if best.map_or(true, |b| distance < b.distance) {
                second = best;
                best = Some(candidate);
            } else if second.map_or(true, |s| distance < s.distance) {
                second = Some(candidate);
            }
        }

        let within = |c: Option<Candidate>| c.filter(|c| c.distance <= threshold);
        let mut plan = Vec::with_capacity(2);
        match (point.line1(), point.line2()) {
            (None, line2) => {
                if let Some(b) = within(best) {
                    plan.push((Slot::First, b));
                    if line2.is_none() {
                        if let Some(s) = within(second) {
                            plan.push((Slot::Second, s));
                        }
                    }
                }
            }
            (Some(_), None) => {
                if let Some(b) = within(best) {
                    plan.push((Slot::Second, b));
                }
            }
            (Some(_), Some(_)) => {}
        }

        let mut attached = Vec::with_capacity(plan.len());
        for (slot, candidate) in plan {
            self.attach(point_id, slot, candidate.line, candidate.end)?;
            attached.push(AttachmentRecord {
                slot,
                attachment: Attachment {
                    line: candidate.line,
                    end: candidate.end,
                },
                distance: candidate.distance,
            });
        }
        Ok(attached)
    }

    /// 为点重算圆成员关系：先全部移除，再加入圆周恰好经过点的圆
    pub fn compute_circles(&mut self, point_id: PointId) -> DiagramResult<(Vec<CircleId>, Vec<CircleId>)> {
        let point = self
            .points
            .get_mut(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        let position = point.position;
        let before: BTreeSet<CircleId> = point.circles.remove_all(&mut self.circles)?.into_iter().collect();

        let on_boundary: Vec<CircleId> = self
            .circles
            .values()
            .filter(|c| c.is_on_boundary(&position))
            .map(|c| c.id)
            .collect();
        for circle_id in &on_boundary {
            point.circles.add(*circle_id, &mut self.circles)?;
        }

        let after: BTreeSet<CircleId> = on_boundary.into_iter().collect();
        let added = after.difference(&before).copied().collect();
        let removed = before.difference(&after).copied().collect();
        Ok((added, removed))
    }

    /// 为点重算拥有者方框
    ///
    /// 找不到包含点的叶子方框时保留原拥有者。
    pub fn compute_boxes(&mut self, point_id: PointId) -> DiagramResult<Option<(Option<BoxId>, BoxId)>> {
        let point = self
            .points
            .get_mut(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        let position = point.position;
        let leaf = self
            .boxes
            .values()
            .find(|b| b.is_leaf() && b.contains(&position))
            .map(|b| b.id);

        let Some(leaf) = leaf else {
            return Ok(None);
        };
        let previous = point.owner_box();
        if point.owner_box.set(Some(leaf), &mut self.boxes)? {
            Ok(Some((previous, leaf)))
        } else {
            Ok(None)
        }
    }

    /// 按 线段 -> 圆 -> 方框 -> 蜘蛛 的顺序重算一个点
    pub fn recompute_point(&mut self, point_id: PointId) -> DiagramResult<RecomputeReport> {
        let attached = self.compute_lines(point_id)?;
        let (circles_added, circles_removed) = self.compute_circles(point_id)?;
        let owner_changed = self.compute_boxes(point_id)?;

        if let Some((Some(previous), _)) = owner_changed {
            if self.boxes.contains_key(&previous) {
                self.compute_spiders(previous)?;
            }
        }

        let owner = self.points.get(&point_id).and_then(|p| p.owner_box());
        if let Some(box_id) = owner {
            self.compute_spiders(box_id)?;
        }

        let report = RecomputeReport {
            attached,
            circles_added,
            circles_removed,
            owner_changed,
            spiders_computed: owner,
        };
        if !report.is_unchanged() {
            debug!(
                "Recomputed {}: {} attachments, +{} -{} circles, owner {:?}",
                point_id,
                report.attached.len(),
                report.circles_added.len(),
                report.circles_removed.len(),
                report.owner_changed
            );
        }
        Ok(report)
    }

    /// 按创建顺序重算所有点
    pub fn recompute_all(&mut self) -> DiagramResult<Vec<RecomputeReport>> {
        let ids: Vec<PointId> = self.points.keys().copied().collect();
        ids.into_iter().map(|id| self.recompute_point(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagramConfig;
    use crate::math::Point2;
    use proptest::prelude::*;

    fn diagram() -> Diagram {
        Diagram::new(DiagramConfig::default())
    }

    #[test]
    fn test_isolated_point_has_no_relations() {
        let mut d = diagram();
        d.add_line(Point2::new(0.0, 0.0), Point2::new(50.0, 0.0)).unwrap();
        d.add_circle(Point2::new(0.0, 0.0), 30.0, Some('A')).unwrap();
        d.add_box(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)).unwrap();

        let p = d.add_point(900.0, 900.0).unwrap();
        let point = d.point(p).unwrap();
        assert!(point.line1().is_none());
        assert!(point.line2().is_none());
        assert!(point.circles().is_empty());
        assert_eq!(point.owner_box(), None);
        assert!(d.is_point_valid(p).unwrap());
    }

    #[test]
    fn test_attachment_respects_threshold() {
        let mut d = diagram();
        let line = d.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
        let far = d.add_point(0.0, 15.5).unwrap();
        assert!(d.point(far).unwrap().line1().is_none());

        let near = d.add_point(0.0, 15.0).unwrap();
        assert_eq!(
            d.point(near).unwrap().line1(),
            Some(Attachment {
                line,
                end: LineEnd::Start
            })
        );
    }

    #[test]
    fn test_point_between_two_lines_takes_both() {
        let mut d = diagram();
        let first = d.add_line(Point2::new(-100.0, 0.0), Point2::new(-4.0, 0.0)).unwrap();
        let second = d.add_line(Point2::new(3.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
        let p = d.add_point(0.0, 0.0).unwrap();

        let point = d.point(p).unwrap();
        assert_eq!(point.line1().map(|a| a.line), Some(second));
        assert_eq!(point.line2().map(|a| a.line), Some(first));
        assert_eq!(d.line(first).unwrap().anchor(LineEnd::End), Some(p));
        assert_eq!(d.line(second).unwrap().anchor(LineEnd::Start), Some(p));
    }

    #[test]
    fn test_equal_distance_prefers_earlier_line() {
        let mut d = diagram();
        let first = d.add_line(Point2::new(-100.0, 0.0), Point2::new(-5.0, 0.0)).unwrap();
        let second = d.add_line(Point2::new(5.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
        let p = d.add_point(0.0, 0.0).unwrap();
        let point = d.point(p).unwrap();
        assert_eq!(point.line1().map(|a| a.line), Some(first));
        assert_eq!(point.line2().map(|a| a.line), Some(second));
    }

    #[test]
    fn test_stealing_an_end_detaches_previous_point() {
        let mut d = diagram();
        let line = d.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
        let a = d.add_point(10.0, 0.0).unwrap();
        assert_eq!(d.line(line).unwrap().anchor(LineEnd::Start), Some(a));

        // 起点已被吸附到 (10,0)，新点就在旁边
        let b = d.add_point(12.0, 0.0).unwrap();
        assert_eq!(d.line(line).unwrap().anchor(LineEnd::Start), Some(b));
        assert!(d.point(a).unwrap().line1().is_none());
        d.check_consistency().unwrap();
    }

    #[test]
    fn test_second_slot_takes_only_best_new_line() {
        let mut d = diagram();
        let first = d.add_line(Point2::new(-100.0, 0.0), Point2::new(0.0, 0.0)).unwrap();
        let p = d.add_point(0.0, 0.0).unwrap();
        let slot1 = d.point(p).unwrap().line1();
        assert_eq!(slot1.map(|a| a.line), Some(first));
        assert!(d.point(p).unwrap().line2().is_none());

        let second = d.add_line(Point2::new(5.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
        let point = d.point(p).unwrap();
        assert_eq!(point.line1(), slot1);
        assert_eq!(
            point.line2(),
            Some(Attachment {
                line: second,
                end: LineEnd::Start
            })
        );
        assert_ne!(point.line1().map(|a| a.line), point.line2().map(|a| a.line));
        assert_eq!(d.line(second).unwrap().anchor(LineEnd::Start), Some(p));
        d.check_consistency().unwrap();
    }

    #[test]
    fn test_second_slot_fill_reports_single_attachment() {
        let mut d = diagram();
        let first = d.add_line(Point2::new(-100.0, 0.0), Point2::new(0.0, 0.0)).unwrap();
        let p = d.add_point(0.0, 0.0).unwrap();
        let near = d.add_line(Point2::new(300.0, 0.0), Point2::new(400.0, 0.0)).unwrap();
        let far = d.add_line(Point2::new(300.0, 50.0), Point2::new(400.0, 50.0)).unwrap();

        // 直接平移两条线段的起点到点附近，再单独重算该点
        d.lines.get_mut(&near).unwrap().start.position = Point2::new(4.0, 0.0);
        d.lines.get_mut(&far).unwrap().start.position = Point2::new(0.0, 9.0);
        d.reindex(near.into());
        d.reindex(far.into());

        let report = d.recompute_point(p).unwrap();
        assert_eq!(report.attached.len(), 1);
        assert_eq!(report.attached[0].slot, Slot::Second);
        assert_eq!(report.attached[0].attachment.line, near);
        assert_eq!(d.point(p).unwrap().line1().map(|a| a.line), Some(first));
        assert_eq!(d.line(far).unwrap().anchor(LineEnd::Start), None);
    }

    #[test]
    fn test_full_point_is_untouched() {
        let mut d = diagram();
        d.add_line(Point2::new(-50.0, 0.0), Point2::new(0.0, 0.0)).unwrap();
        d.add_line(Point2::new(0.0, 0.0), Point2::new(50.0, 0.0)).unwrap();
        let p = d.add_point(0.0, 0.0).unwrap();
        assert!(d.point(p).unwrap().is_fully_connected());

        d.add_line(Point2::new(1.0, 1.0), Point2::new(1.0, 80.0)).unwrap();
        let report = d.recompute_point(p).unwrap();
        assert!(report.attached.is_empty());
    }

    #[test]
    fn test_circle_membership_is_exact_and_not_stale() {
        let mut d = diagram();
        let c = d.add_circle(Point2::new(0.0, 0.0), 5.0, Some('A')).unwrap();
        let p = d.add_point(3.0, 4.0).unwrap();
        assert!(d.point(p).unwrap().circles().contains(&c));
        assert!(d.circle(c).unwrap().points().contains(&p));

        d.move_shape(p.into(), Point2::new(3.0, 4.0), Point2::new(3.0, 4.5))
            .unwrap();
        assert!(d.point(p).unwrap().circles().is_empty());
        assert!(d.circle(c).unwrap().points().is_empty());

        d.move_shape(p.into(), Point2::new(3.0, 4.5), Point2::new(3.0, 4.0))
            .unwrap();
        assert!(d.point(p).unwrap().circles().contains(&c));
    }

    #[test]
    fn test_circle_report_lists_changes() {
        let mut d = diagram();
        let c = d.add_circle(Point2::new(0.0, 0.0), 5.0, None).unwrap();
        let p = d.add_point(5.0, 0.0).unwrap();

        let report = d.recompute_point(p).unwrap();
        assert!(report.circles_added.is_empty());
        assert!(report.circles_removed.is_empty());

        d.points.get_mut(&p).unwrap().position = Point2::new(6.0, 0.0);
        let report = d.recompute_point(p).unwrap();
        assert_eq!(report.circles_removed, vec![c]);
    }

    #[test]
    fn test_first_leaf_box_owns_point() {
        let mut d = diagram();
        let outer = d.add_box(Point2::new(0.0, 0.0), Point2::new(200.0, 200.0)).unwrap();
        let inner = d.add_box(Point2::new(10.0, 10.0), Point2::new(50.0, 50.0)).unwrap();
        assert!(!d.get_box(outer).unwrap().is_leaf());

        let p = d.add_point(20.0, 20.0).unwrap();
        assert_eq!(d.point(p).unwrap().owner_box(), Some(inner));

        // 外框不是叶子，不会成为拥有者
        let q = d.add_point(150.0, 150.0).unwrap();
        assert_eq!(d.point(q).unwrap().owner_box(), None);
    }

    /// 点离开所有方框后仍保留原拥有者
    #[test]
    fn test_leaving_all_boxes_keeps_prior_owner() {
        let mut d = diagram();
        let b = d.add_box(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)).unwrap();
        let p = d.add_point(50.0, 50.0).unwrap();
        assert_eq!(d.point(p).unwrap().owner_box(), Some(b));

        d.move_shape(p.into(), Point2::new(50.0, 50.0), Point2::new(500.0, 500.0))
            .unwrap();
        assert_eq!(d.point(p).unwrap().owner_box(), Some(b));
        assert!(d.get_box(b).unwrap().points().contains(&p));
        d.check_consistency().unwrap();
    }

    #[test]
    fn test_moving_inside_same_box_fires_spiders_once() {
        let mut d = diagram();
        let b = d.add_box(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)).unwrap();
        let p = d.add_point(20.0, 20.0).unwrap();
        let revision = d.get_box(b).unwrap().spider_revision();

        let report = d.recompute_point(p).unwrap();
        assert_eq!(report.owner_changed, None);
        assert_eq!(report.spiders_computed, Some(b));
        assert_eq!(d.get_box(b).unwrap().spider_revision(), revision + 1);

        d.move_shape(p.into(), Point2::new(20.0, 20.0), Point2::new(60.0, 70.0))
            .unwrap();
        assert_eq!(d.point(p).unwrap().owner_box(), Some(b));
        assert_eq!(d.get_box(b).unwrap().spider_revision(), revision + 2);
    }

    #[test]
    fn test_moving_between_boxes_reassigns_owner() {
        let mut d = diagram();
        let left = d.add_box(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)).unwrap();
        let right = d.add_box(Point2::new(200.0, 0.0), Point2::new(300.0, 100.0)).unwrap();
        let p = d.add_point(50.0, 50.0).unwrap();

        d.move_shape(p.into(), Point2::new(50.0, 50.0), Point2::new(250.0, 50.0))
            .unwrap();
        assert_eq!(d.point(p).unwrap().owner_box(), Some(right));
        assert!(d.get_box(left).unwrap().points().is_empty());
        assert!(d.get_box(right).unwrap().points().contains(&p));
    }

    proptest! {
        #[test]
        fn prop_attachments_within_threshold(
            lines in prop::collection::vec((0.0..300.0f64, 0.0..300.0f64, 0.0..300.0f64, 0.0..300.0f64), 1..8),
            points in prop::collection::vec((0.0..300.0f64, 0.0..300.0f64), 1..12),
        ) {
            let mut d = diagram();
            let threshold = d.config().point_line_dist;
            for (x1, y1, x2, y2) in lines {
                d.add_line(Point2::new(x1, y1), Point2::new(x2, y2)).unwrap();
            }
            for (x, y) in points {
                let before: Vec<_> = d.lines().map(|l| (l.id, l.start.position, l.end.position)).collect();
                let position = Point2::new(x, y);
                let id = d.add_point(x, y).unwrap();
                let point = d.point(id).unwrap();

                for attachment in point.attachments() {
                    let (_, start, end) = before
                        .iter()
                        .find(|(line, _, _)| *line == attachment.line)
                        .unwrap();
                    let before_snap = match attachment.end {
                        LineEnd::Start => start,
                        LineEnd::End => end,
                    };
                    prop_assert!((*before_snap - position).norm() <= threshold);
                }
                if let (Some(a), Some(b)) = (point.line1(), point.line2()) {
                    prop_assert_ne!(a.line, b.line);
                }
                prop_assert!(d.check_consistency().is_ok());
            }
        }
    }
}
