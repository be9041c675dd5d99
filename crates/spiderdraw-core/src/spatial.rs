//! 空间索引
//!
//! 基于网格的包围盒索引，支持：
//! - 范围查询（关联计算的候选线段、擦除）
//! - 点击测试（拾取）
//!
//! 查询结果按创建顺序排序，保证与顺序扫描时的并列取舍一致。
//!
//! 覆盖网格单元超过 [`MAX_CELLS_PER_SHAPE`] 的图元不进网格，单独登记，
//! 每次查询都会逐个检查。

use crate::entity::ShapeId;
use crate::math::{BoundingBox2, Point2};
use std::collections::{BTreeSet, HashMap};

/// 单个图元最多登记的网格单元数
pub const MAX_CELLS_PER_SHAPE: u64 = 4096;

/// 简单的空间索引（基于网格）
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// 网格单元大小
    cell_size: f64,

    /// 网格映射：网格坐标 -> 图元列表
    grid: HashMap<(i64, i64), Vec<ShapeId>>,

    /// 图元的包围盒缓存
    bboxes: HashMap<ShapeId, BoundingBox2>,

    /// 过大而不进网格的图元
    oversized: BTreeSet<ShapeId>,
}

impl SpatialIndex {
    /// 创建新的空间索引
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 100.0 },
            grid: HashMap::new(),
            bboxes: HashMap::new(),
            oversized: BTreeSet::new(),
        }
    }

    /// 将世界坐标转换为网格坐标
    fn to_grid_coord(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// 包围盒覆盖的网格单元；超过上限时返回 `None`
    fn cells_for_bbox(&self, bbox: &BoundingBox2) -> Option<Vec<(i64, i64)>> {
        let (min_gx, min_gy) = self.to_grid_coord(bbox.min.x, bbox.min.y);
        let (max_gx, max_gy) = self.to_grid_coord(bbox.max.x, bbox.max.y);

        let span = |lo: i64, hi: i64| (i128::from(hi) - i128::from(lo) + 1).max(0) as u128;
        let count = span(min_gx, max_gx).saturating_mul(span(min_gy, max_gy));
        if count > u128::from(MAX_CELLS_PER_SHAPE) {
            return None;
        }

        let mut cells = Vec::with_capacity(count as usize);
        for gx in min_gx..=max_gx {
            for gy in min_gy..=max_gy {
                cells.push((gx, gy));
            }
        }
        Some(cells)
    }

    /// 插入或更新图元
    pub fn insert(&mut self, id: ShapeId, bbox: BoundingBox2) {
        if self.bboxes.get(&id) == Some(&bbox) {
            return;
        }
        self.remove(&id);

        match self.cells_for_bbox(&bbox) {
            Some(cells) => {
                for cell in cells {
                    self.grid.entry(cell).or_default().push(id);
                }
            }
            None => {
                self.oversized.insert(id);
            }
        }

        self.bboxes.insert(id, bbox);
    }

    /// 移除图元
    pub fn remove(&mut self, id: &ShapeId) -> bool {
        if let Some(bbox) = self.bboxes.remove(id) {
            if self.oversized.remove(id) {
                return true;
            }
            for cell in self.cells_for_bbox(&bbox).unwrap_or_default() {
                if let Some(shapes) = self.grid.get_mut(&cell) {
                    shapes.retain(|s| s != id);
                    if shapes.is_empty() {
                        self.grid.remove(&cell);
                    }
                }
            }
            true
        } else {
            false
        }
    }

    /// 范围查询：查找包围盒与指定矩形相交的所有图元
    pub fn query_rect(&self, rect: &BoundingBox2) -> Vec<ShapeId> {
        let hits = |id: &ShapeId| self.bboxes.get(id).is_some_and(|bbox| bbox.intersects(rect));

        // 查询范围本身过大时直接扫描全部图元
        let Some(cells) = self.cells_for_bbox(rect) else {
            let mut result: Vec<ShapeId> = self.bboxes.keys().copied().filter(|id| hits(id)).collect();
            result.sort();
            return result;
        };

        let mut result: BTreeSet<ShapeId> = self.oversized.iter().copied().filter(|id| hits(id)).collect();
        for cell in cells {
            if let Some(shapes) = self.grid.get(&cell) {
                result.extend(shapes.iter().copied().filter(|id| hits(id)));
            }
        }

        result.into_iter().collect()
    }

    /// 查找包围盒与以 `point` 为中心、半径 `radius` 的方形窗口相交的图元
    pub fn query_around(&self, point: &Point2, radius: f64) -> Vec<ShapeId> {
        self.query_rect(&BoundingBox2::new(*point, *point).inflated(radius))
    }

    /// 清空索引
    pub fn clear(&mut self) {
        self.grid.clear();
        self.bboxes.clear();
        self.oversized.clear();
    }

    /// 获取图元数量
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    /// 获取图元的包围盒
    pub fn get_bbox(&self, id: &ShapeId) -> Option<&BoundingBox2> {
        self.bboxes.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BoxId, CircleId, LineId, PointId};

    #[test]
    fn test_spatial_index() {
        let mut index = SpatialIndex::new(10.0);

        let id1 = ShapeId::Point(PointId(1));
        let id2 = ShapeId::Line(LineId(2));
        let id3 = ShapeId::Circle(CircleId(3));

        index.insert(
            id1,
            BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)),
        );
        index.insert(
            id2,
            BoundingBox2::new(Point2::new(10.0, 10.0), Point2::new(15.0, 15.0)),
        );
        index.insert(
            id3,
            BoundingBox2::new(Point2::new(100.0, 100.0), Point2::new(105.0, 105.0)),
        );

        // 查询与 (0,0)-(20,20) 相交的图元
        let result = index.query_rect(&BoundingBox2::new(
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 20.0),
        ));

        assert_eq!(result, vec![id1, id2]);
    }

    #[test]
    fn test_update_moves_entry() {
        let mut index = SpatialIndex::new(10.0);
        let id = ShapeId::Point(PointId(1));
        index.insert(id, BoundingBox2::new(Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)));
        index.insert(id, BoundingBox2::new(Point2::new(51.0, 51.0), Point2::new(51.0, 51.0)));

        assert!(index.query_around(&Point2::new(1.0, 1.0), 2.0).is_empty());
        assert_eq!(index.query_around(&Point2::new(50.0, 50.0), 2.0), vec![id]);
        assert_eq!(index.len(), 1);

        assert!(index.remove(&id));
        assert!(index.is_empty());
    }

    #[test]
    fn test_huge_shape_stays_out_of_grid() {
        let mut index = SpatialIndex::new(100.0);
        let huge = ShapeId::Box(BoxId(1));
        let line = ShapeId::Line(LineId(2));
        let small = ShapeId::Point(PointId(3));

        index.insert(huge, BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(3e5, 3e5)));
        index.insert(line, BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(1e300, 10.0)));
        index.insert(small, BoundingBox2::new(Point2::new(5.0, 5.0), Point2::new(5.0, 5.0)));

        assert!(index.grid.len() <= 2 * MAX_CELLS_PER_SHAPE as usize);
        assert_eq!(index.oversized.len(), 2);
        assert_eq!(index.query_around(&Point2::new(5.0, 5.0), 1.0), vec![huge, line, small]);
        assert_eq!(index.query_around(&Point2::new(2e5, 2e5), 1.0), vec![huge]);
        assert!(index.query_around(&Point2::new(-50.0, -50.0), 1.0).is_empty());

        // 查询范围过大时退回全表扫描
        let everything = BoundingBox2::new(Point2::new(-1e9, -1e9), Point2::new(1e9, 1e9));
        assert_eq!(index.query_rect(&everything), vec![huge, line, small]);

        assert!(index.remove(&huge));
        assert_eq!(index.oversized.len(), 1);
        assert_eq!(index.query_around(&Point2::new(5.0, 5.0), 1.0), vec![line, small]);
    }
}
