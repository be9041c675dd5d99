//! 蜘蛛推导与文本表示
//!
//! 方框拥有的点按完全锚定的线段划分连通分量，每个分量是一只蜘蛛，
//! 分量中的点是它的足。文本表示形如：
//!
//! ```text
//! box{spider(A|A,B) spider(-)}
//! ```
//!
//! 每个足写成它所在的区域（圆名排序后用逗号连接，不在任何圆上写 `-`），
//! 同一只蜘蛛的足之间用 `|` 分隔。

use crate::diagram::Diagram;
use crate::entity::{BoxId, PointId};
use crate::error::{DiagramError, DiagramResult};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// 蜘蛛：一组由线段连通的足
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spider {
    /// 按创建顺序排列
    pub feet: Vec<PointId>,
}

/// 把 `members` 按 `edges` 划分为连通分量
///
/// 只考虑两端都在 `members` 中的边。分量按其最早的点排序。
pub fn spider_components(
    members: &BTreeSet<PointId>,
    edges: impl IntoIterator<Item = (PointId, PointId)>,
) -> Vec<Spider> {
    let mut adjacency: BTreeMap<PointId, BTreeSet<PointId>> = BTreeMap::new();
    for (a, b) in edges {
        if a != b && members.contains(&a) && members.contains(&b) {
            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        }
    }

    let mut seen = BTreeSet::new();
    let mut spiders = Vec::new();
    for start in members {
        if !seen.insert(*start) {
            continue;
        }
        let mut feet = vec![*start];
        let mut queue = VecDeque::from([*start]);
        while let Some(current) = queue.pop_front() {
            for next in adjacency.get(&current).into_iter().flatten() {
                if seen.insert(*next) {
                    feet.push(*next);
                    queue.push_back(*next);
                }
            }
        }
        feet.sort();
        spiders.push(Spider { feet });
    }
    spiders
}

impl Diagram {
    /// 重新推导方框中的蜘蛛，并递增推导版本
    pub fn compute_spiders(&mut self, box_id: BoxId) -> DiagramResult<()> {
        let frame = self
            .boxes
            .get(&box_id)
            .ok_or(DiagramError::UnknownShape(box_id.into()))?;
        let members: BTreeSet<PointId> = frame.points.iter().collect();
        let edges: Vec<(PointId, PointId)> = self
            .lines
            .values()
            .filter_map(|l| Some((l.start.anchor?, l.end.anchor?)))
            .collect();
        let spiders = spider_components(&members, edges);

        if let Some(frame) = self.boxes.get_mut(&box_id) {
            frame.spiders = spiders;
            frame.spider_revision += 1;
        }
        Ok(())
    }

    fn zone_name(&self, point_id: PointId) -> DiagramResult<String> {
        let point = self
            .points
            .get(&point_id)
            .ok_or(DiagramError::UnknownShape(point_id.into()))?;
        let mut names: Vec<String> = point
            .circles
            .iter()
            .filter_map(|c| self.circles.get(&c).map(|c| c.display_name()))
            .collect();
        if names.is_empty() {
            return Ok("-".to_string());
        }
        names.sort();
        Ok(names.join(","))
    }

    /// 单个方框的文本表示
    pub fn box_textual_rep(&self, box_id: BoxId) -> DiagramResult<String> {
        let frame = self
            .boxes
            .get(&box_id)
            .ok_or(DiagramError::UnknownShape(box_id.into()))?;
        if frame.points.is_empty() {
            return Err(DiagramError::EmptyContainer(format!("{} has no points", box_id)));
        }
        for point_id in frame.points.iter() {
            if !self.is_point_valid(point_id)? {
                return Err(DiagramError::InvalidShape(format!(
                    "{} holds invalid point {}",
                    box_id, point_id
                )));
            }
        }

        // 蜘蛛列表可能落后于最近一次修改，这里按当前状态重新划分
        let members: BTreeSet<PointId> = frame.points.iter().collect();
        let edges = self
            .lines
            .values()
            .filter_map(|l| Some((l.start.anchor?, l.end.anchor?)));
        let mut parts = Vec::new();
        for spider in spider_components(&members, edges) {
            let zones = spider
                .feet
                .iter()
                .map(|p| self.zone_name(*p))
                .collect::<DiagramResult<Vec<_>>>()?;
            parts.push(format!("spider({})", zones.join("|")));
        }
        Ok(format!("box{{{}}}", parts.join(" ")))
    }

    /// 整个图表的文本表示，每个叶子方框一行
    pub fn textual_rep(&self) -> DiagramResult<String> {
        let targets: Vec<BoxId> = match self.drawing_box().and_then(|id| self.boxes.get(&id)) {
            Some(root) if root.is_leaf() => vec![root.id],
            Some(root) => root
                .inner_boxes()
                .filter(|id| self.boxes.get(id).is_some_and(|b| b.is_leaf()))
                .collect(),
            None => self.boxes.values().filter(|b| b.is_leaf()).map(|b| b.id).collect(),
        };
        if targets.is_empty() {
            return Err(DiagramError::EmptyContainer("diagram has no boxes".to_string()));
        }

        let lines = targets
            .into_iter()
            .map(|id| self.box_textual_rep(id))
            .collect::<DiagramResult<Vec<_>>>()?;
        debug!("Rendered {} boxes as text", lines.len());
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagramConfig;
    use crate::math::Point2;

    #[test]
    fn test_components_ignore_outside_edges() {
        let members: BTreeSet<PointId> = [1, 2, 3, 4].into_iter().map(PointId).collect();
        let edges = vec![
            (PointId(1), PointId(3)),
            (PointId(3), PointId(9)),
            (PointId(4), PointId(2)),
        ];
        let spiders = spider_components(&members, edges);
        assert_eq!(
            spiders,
            vec![
                Spider {
                    feet: vec![PointId(1), PointId(3)]
                },
                Spider {
                    feet: vec![PointId(2), PointId(4)]
                },
            ]
        );
    }

    #[test]
    fn test_box_spiders_follow_lines() {
        let mut d = Diagram::new(DiagramConfig::default());
        let b = d.add_box(Point2::new(0.0, 0.0), Point2::new(300.0, 300.0)).unwrap();
        d.add_line(Point2::new(50.0, 50.0), Point2::new(150.0, 50.0)).unwrap();
        let p = d.add_point(50.0, 50.0).unwrap();
        let q = d.add_point(150.0, 50.0).unwrap();
        let r = d.add_point(250.0, 250.0).unwrap();

        let frame = d.get_box(b).unwrap();
        assert_eq!(
            frame.spiders(),
            &[Spider { feet: vec![p, q] }, Spider { feet: vec![r] }]
        );
    }

    #[test]
    fn test_textual_rep() {
        let mut d = Diagram::with_canvas(DiagramConfig::default(), 400.0, 400.0).unwrap();
        d.add_circle(Point2::new(100.0, 100.0), 50.0, Some('A')).unwrap();
        d.add_circle(Point2::new(200.0, 100.0), 50.0, Some('B')).unwrap();
        d.add_line(Point2::new(50.0, 100.0), Point2::new(150.0, 100.0)).unwrap();
        // (50,100) 只在 A 上，(150,100) 同时在 A、B 上
        d.add_point(50.0, 100.0).unwrap();
        d.add_point(150.0, 100.0).unwrap();
        d.add_point(350.0, 350.0).unwrap();

        assert_eq!(
            d.textual_rep().unwrap(),
            "box{spider(A|A,B) spider(-)}"
        );
    }

    #[test]
    fn test_textual_rep_errors() {
        let d = Diagram::new(DiagramConfig::default());
        assert!(matches!(d.textual_rep(), Err(DiagramError::EmptyContainer(_))));

        let mut d = Diagram::with_canvas(DiagramConfig::default(), 400.0, 400.0).unwrap();
        assert!(matches!(d.textual_rep(), Err(DiagramError::EmptyContainer(_))));

        d.add_line(Point2::new(10.0, 10.0), Point2::new(100.0, 10.0)).unwrap();
        d.add_point(10.0, 10.0).unwrap();
        d.add_point(100.0, 10.0).unwrap();
        assert!(matches!(d.textual_rep(), Err(DiagramError::InvalidShape(_))));
    }

    #[test]
    fn test_textual_rep_lists_inner_leaf_boxes() {
        let mut d = Diagram::with_canvas(DiagramConfig::default(), 400.0, 400.0).unwrap();
        d.add_box(Point2::new(10.0, 10.0), Point2::new(100.0, 100.0)).unwrap();
        d.add_box(Point2::new(200.0, 10.0), Point2::new(300.0, 100.0)).unwrap();
        let c = d.add_circle(Point2::new(250.0, 50.0), 20.0, None).unwrap();
        d.add_point(50.0, 50.0).unwrap();
        d.add_point(270.0, 50.0).unwrap();

        assert_eq!(
            d.textual_rep().unwrap(),
            format!("box{{spider(-)}}\nbox{{spider({})}}", c)
        );
    }
}
