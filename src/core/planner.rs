//! # Execution Planner Module / 执行计划模块
//!
//! This module partitions the collected items into execution groups and a
//! residual ungrouped batch. Groups are ordered by ascending numeric id, not
//! by the order in which they were first seen.
//!
//! 此模块把收集到的测试项划分为执行分组和剩余的未分组批次。
//! 分组按数字 ID 升序排列，而不是按首次出现的顺序。

use crate::core::errors::ConfigError;
use crate::core::models::TestItem;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one batch of the plan.
/// 标识计划中的一个批次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Group(i64),
    Ungrouped,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Group(id) => write!(f, "group {id}"),
            BatchKind::Ungrouped => f.write_str("ungrouped"),
        }
    }
}

/// Represents the complete execution plan of a run.
/// 表示一次运行的完整执行计划。
#[derive(Debug, Default)]
pub struct ExecutionPlan<'a> {
    /// Grouped items keyed by group id, each group in collection order.
    /// 按分组 ID 索引的分组测试项，每个分组内保持收集顺序。
    pub groups: BTreeMap<i64, Vec<&'a TestItem>>,
    /// Items without a group annotation, in collection order.
    /// 没有分组注解的测试项，保持收集顺序。
    pub ungrouped: Vec<&'a TestItem>,
}

impl<'a> ExecutionPlan<'a> {
    /// Batches in scheduling order: every group by ascending id, then the
    /// ungrouped batch.
    pub fn batches(&self) -> impl Iterator<Item = (BatchKind, &[&'a TestItem])> {
        self.groups
            .iter()
            .map(|(id, items)| (BatchKind::Group(*id), items.as_slice()))
            .chain(std::iter::once((BatchKind::Ungrouped, self.ungrouped.as_slice())))
    }

    pub fn total_items(&self) -> usize {
        self.groups.values().map(Vec::len).sum::<usize>() + self.ungrouped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

/// Creates the execution plan for `items`.
///
/// A group annotation that does not resolve to an integer is a
/// configuration error; nothing is planned in that case.
///
/// 为 `items` 创建执行计划。
/// 无法解析为整数的分组注解属于配置错误，此时不会生成任何计划。
pub fn plan_execution(items: &[TestItem]) -> Result<ExecutionPlan<'_>, ConfigError> {
    let mut plan = ExecutionPlan::default();

    for item in items {
        match &item.group {
            None => plan.ungrouped.push(item),
            Some(annotation) => {
                let id = annotation.group_id().ok_or_else(|| ConfigError::InvalidGroup {
                    nodeid: item.nodeid.clone(),
                    annotation: annotation.to_string(),
                })?;
                plan.groups.entry(id).or_default().push(item);
            }
        }
    }

    Ok(plan)
}
