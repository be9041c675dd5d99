//! 点的有效性
//!
//! 同一只蜘蛛的两个足不能落在同一个区域（圆集合完全相同）。
//! 从点的两个槽位各出发走一次：沿完全锚定的线段走到另一端的点，
//! 比较它的圆集合与起点是否相同，再经它的另一条线段继续。
//! 任一方向遇到相同区域即为无效。

use crate::diagram::{dangling, Diagram};
use crate::entity::PointId;
use crate::error::{DiagramError, DiagramResult};
use crate::geometry::{Point, Slot};

impl Diagram {
    /// 点是否有效
    pub fn is_point_valid(&self, point_id: PointId) -> DiagramResult<bool> {
        let origin = self
            .points
            .get(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        Ok(!self.walk_finds_same_zone(origin, Slot::First)?
            && !self.walk_finds_same_zone(origin, Slot::Second)?)
    }

    /// 所有无效点，按创建顺序
    pub fn invalid_points(&self) -> DiagramResult<Vec<PointId>> {
        let mut invalid = Vec::new();
        for id in self.points.keys() {
            if !self.is_point_valid(*id)? {
                invalid.push(*id);
            }
        }
        Ok(invalid)
    }

    fn walk_finds_same_zone(&self, origin: &Point, slot: Slot) -> DiagramResult<bool> {
        let mut current = origin.id;
        let mut next_line = origin.slot(slot).map(|a| a.line);
        // 闭合的线段环会回到起点，步数上限防止死循环
        let mut steps = 0;

        while let Some(line_id) = next_line {
            let line = self
                .lines
                .get(&line_id)
                .ok_or_else(|| dangling(current, line_id))?;
            if !line.is_fully_anchored() {
                break;
            }
            let next_id = line
                .other_end(current)
                .ok_or_else(|| dangling(line_id, current))?;
            let next = self
                .points
                .get(&next_id)
                .ok_or_else(|| dangling(line_id, next_id))?;
            if next.circles.same_members(&origin.circles) {
                return Ok(true);
            }

            steps += 1;
            if steps > self.points.len() {
                break;
            }
            next_line = next.other_line(line_id);
            current = next_id;
        }
        Ok(false)
    }
}
