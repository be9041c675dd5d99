//! 归属容器
//!
//! 表达“实体 A 拥有 0..1 或 0..N 个实体 B”的双向关系。容器本身只存ID，
//! 反向一侧通过 [`Mirror`] 访问，每次修改都同步两侧：
//! 任何一次调用返回后，A 引用 B 当且仅当 B 的反向集合引用 A。

use crate::error::{DiagramError, DiagramResult};
use std::collections::BTreeSet;
use std::fmt::Display;

/// 关系的反向一侧
///
/// `K` 为被拥有实体的ID，`O` 为拥有者ID。实现方通常是实体表本身，
/// 负责在被拥有实体上记录/撤销拥有者。
pub trait Mirror<K, O> {
    /// 反向实体是否存在
    fn has(&self, key: K) -> bool;

    /// 在 `key` 上记录拥有者（调用前已确认存在）
    fn mirror_attach(&mut self, key: K, owner: O);

    /// 在 `key` 上撤销拥有者（调用前已确认存在）
    fn mirror_detach(&mut self, key: K, owner: O);
}

fn dangling<O: Display, T: Display>(owner: O, entity: T) -> DiagramError {
    DiagramError::DanglingRelation {
        owner: owner.to_string(),
        entity: entity.to_string(),
    }
}

/// 单值容器：持有 0 或 1 个实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleContainer<O, T> {
    owner: O,
    held: Option<T>,
}

impl<O, T> SingleContainer<O, T>
where
    O: Copy + Display,
    T: Copy + Eq + Display,
{
    pub fn new(owner: O) -> Self {
        Self { owner, held: None }
    }

    pub fn owner(&self) -> O {
        self.owner
    }

    pub fn get(&self) -> Option<T> {
        self.held
    }

    /// 替换持有的实体，并同步旧实体与新实体的反向集合
    ///
    /// 返回是否发生了变化。两侧都先校验再修改，失败时不留下中间状态。
    pub fn set<R: Mirror<T, O>>(&mut self, entity: Option<T>, reverse: &mut R) -> DiagramResult<bool> {
        if self.held == entity {
            return Ok(false);
        }
        if let Some(old) = self.held {
            if !reverse.has(old) {
                return Err(dangling(self.owner, old));
            }
        }
        if let Some(new) = entity {
            if !reverse.has(new) {
                return Err(dangling(self.owner, new));
            }
        }

        if let Some(old) = self.held.take() {
            reverse.mirror_detach(old, self.owner);
        }
        self.held = entity;
        if let Some(new) = entity {
            reverse.mirror_attach(new, self.owner);
        }
        Ok(true)
    }

    /// 仅修改本侧，由反向一侧的 [`Mirror`] 实现调用
    pub(crate) fn set_mirrored(&mut self, entity: Option<T>) {
        self.held = entity;
    }
}

/// 多值容器：持有一组实体（无重复、无序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiContainer<O, T> {
    owner: O,
    members: BTreeSet<T>,
}

impl<O, T> MultiContainer<O, T>
where
    O: Copy + Display,
    T: Copy + Ord + Display,
{
    pub fn new(owner: O) -> Self {
        Self {
            owner,
            members: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> O {
        self.owner
    }

    /// 加入一个实体，同时在其反向集合中记录拥有者
    ///
    /// 返回是否为新加入的成员。
    pub fn add<R: Mirror<T, O>>(&mut self, entity: T, reverse: &mut R) -> DiagramResult<bool> {
        if !reverse.has(entity) {
            return Err(dangling(self.owner, entity));
        }
        let inserted = self.members.insert(entity);
        if inserted {
            reverse.mirror_attach(entity, self.owner);
        }
        Ok(inserted)
    }

    /// 移除一个实体，同时撤销其反向记录
    pub fn remove<R: Mirror<T, O>>(&mut self, entity: T, reverse: &mut R) -> DiagramResult<bool> {
        if !self.members.contains(&entity) {
            return Ok(false);
        }
        if !reverse.has(entity) {
            return Err(dangling(self.owner, entity));
        }
        self.members.remove(&entity);
        reverse.mirror_detach(entity, self.owner);
        Ok(true)
    }

    /// 移除全部成员：先从每个成员的反向集合撤销本拥有者，再清空
    ///
    /// 返回被移除的成员。
    pub fn remove_all<R: Mirror<T, O>>(&mut self, reverse: &mut R) -> DiagramResult<Vec<T>> {
        if let Some(missing) = self.members.iter().find(|m| !reverse.has(**m)) {
            return Err(dangling(self.owner, *missing));
        }
        for member in &self.members {
            reverse.mirror_detach(*member, self.owner);
        }
        let removed = self.members.iter().copied().collect();
        self.members.clear();
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, entity: &T) -> bool {
        self.members.contains(entity)
    }

    /// `other` 的每个成员是否都在本容器中
    pub fn contains_all<P>(&self, other: &MultiContainer<P, T>) -> bool {
        other.members.iter().all(|m| self.members.contains(m))
    }

    /// 成员是否完全相同：先比较数量，再比较成员，与顺序无关
    pub fn same_members<P>(&self, other: &MultiContainer<P, T>) -> bool {
        self.members.len() == other.members.len() && self.contains_all(other)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.members.iter().copied()
    }

    pub(crate) fn insert_mirrored(&mut self, entity: T) {
        self.members.insert(entity);
    }

    pub(crate) fn remove_mirrored(&mut self, entity: &T) {
        self.members.remove(entity);
    }
}
