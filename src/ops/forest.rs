use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::task::{Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("task {id} is its own ancestor")]
    Cyclic { id: TaskId },
}

/// A task with its nested subtasks attached, borrowed from the task map
#[derive(Debug, Clone, Serialize)]
pub struct TaskNode<'a> {
    pub task: &'a Task,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskNode<'a>>,
}

/// Full descendant set of every task, following `children` links.
///
/// Children that are not in `tasks` are ignored. Each task is visited once;
/// a task reachable from itself yields [`GraphError::Cyclic`].
pub fn descendants(
    tasks: &IndexMap<TaskId, Task>,
) -> Result<HashMap<TaskId, BTreeSet<TaskId>>, GraphError> {
    let mut memo = HashMap::with_capacity(tasks.len());
    let mut on_stack = HashSet::new();
    for id in tasks.keys() {
        visit(id, tasks, &mut memo, &mut on_stack)?;
    }
    Ok(memo)
}

fn visit(
    id: &TaskId,
    tasks: &IndexMap<TaskId, Task>,
    memo: &mut HashMap<TaskId, BTreeSet<TaskId>>,
    on_stack: &mut HashSet<TaskId>,
) -> Result<(), GraphError> {
    if memo.contains_key(id) {
        return Ok(());
    }
    if !on_stack.insert(id.clone()) {
        return Err(GraphError::Cyclic { id: id.clone() });
    }

    let mut set = BTreeSet::new();
    if let Some(task) = tasks.get(id) {
        for child in &task.children {
            if !tasks.contains_key(child) {
                continue;
            }
            visit(child, tasks, memo, on_stack)?;
            set.insert(child.clone());
            if let Some(below) = memo.get(child) {
                set.extend(below.iter().cloned());
            }
        }
    }

    on_stack.remove(id);
    memo.insert(id.clone(), set);
    Ok(())
}

/// Rebuild parent/child trees from the flat task map.
///
/// Roots are the tasks that are nobody's descendant, ordered by file and
/// line. A task whose parent is missing from the map is therefore a root.
/// Subtasks keep the order of the parent's `children` list.
pub fn build_forest(tasks: &IndexMap<TaskId, Task>) -> Result<Vec<TaskNode<'_>>, GraphError> {
    let desc = descendants(tasks)?;
    let nested: HashSet<&TaskId> = desc.values().flatten().collect();

    let mut roots: Vec<&Task> = tasks
        .values()
        .filter(|t| !nested.contains(&t.id))
        .collect();
    roots.sort_by(|a, b| a.source_key().cmp(&b.source_key()));

    Ok(roots.into_iter().map(|t| node(t, tasks)).collect())
}

fn node<'a>(task: &'a Task, tasks: &'a IndexMap<TaskId, Task>) -> TaskNode<'a> {
    TaskNode {
        task,
        subtasks: task
            .children
            .iter()
            .filter_map(|id| tasks.get(id))
            .map(|child| node(child, tasks))
            .collect(),
    }
}

/// The task and all of its descendants, last line first, so that removing
/// them in order never shifts a line still to be removed.
pub fn cascade(tasks: &IndexMap<TaskId, Task>, id: &TaskId) -> Result<Vec<TaskId>, GraphError> {
    let Some(task) = tasks.get(id) else {
        return Ok(Vec::new());
    };

    let mut memo = HashMap::new();
    visit(id, tasks, &mut memo, &mut HashSet::new())?;

    let mut all: Vec<&Task> = vec![task];
    if let Some(below) = memo.get(id) {
        all.extend(below.iter().filter_map(|d| tasks.get(d)));
    }
    all.sort_by(|a, b| b.source_key().cmp(&a.source_key()));
    Ok(all.into_iter().map(|t| t.id.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(line: usize, children: &[usize]) -> Task {
        let mut t = Task::new("a.md", line, &format!("t{}", line));
        t.children = children.iter().map(|c| TaskId::new("a.md", *c)).collect();
        t
    }

    fn map(tasks: Vec<Task>) -> IndexMap<TaskId, Task> {
        tasks.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    fn id(line: usize) -> TaskId {
        TaskId::new("a.md", line)
    }

    #[test]
    fn test_nested_forest() {
        let tasks = map(vec![
            task(5, &[]),
            task(0, &[1, 3]),
            task(1, &[2]),
            task(2, &[]),
            task(3, &[]),
        ]);
        let forest = build_forest(&tasks).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].task.id, id(0));
        assert_eq!(forest[1].task.id, id(5));

        let subs: Vec<&TaskId> = forest[0].subtasks.iter().map(|n| &n.task.id).collect();
        assert_eq!(subs, vec![&id(1), &id(3)]);
        assert_eq!(forest[0].subtasks[0].subtasks[0].task.id, id(2));
    }

    #[test]
    fn test_descendant_sets() {
        let tasks = map(vec![task(0, &[1]), task(1, &[2]), task(2, &[])]);
        let desc = descendants(&tasks).unwrap();
        assert_eq!(desc[&id(0)], BTreeSet::from([id(1), id(2)]));
        assert_eq!(desc[&id(1)], BTreeSet::from([id(2)]));
        assert!(desc[&id(2)].is_empty());
    }

    #[test]
    fn test_missing_child_is_skipped() {
        let tasks = map(vec![task(0, &[1, 9]), task(1, &[])]);
        let forest = build_forest(&tasks).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].subtasks.len(), 1);
        assert_eq!(forest[0].subtasks[0].task.id, id(1));
    }

    #[test]
    fn test_orphan_becomes_root() {
        let mut child = task(4, &[]);
        child.parent = Some(id(3));
        let tasks = map(vec![child, task(7, &[])]);
        let forest = build_forest(&tasks).unwrap();
        let roots: Vec<&TaskId> = forest.iter().map(|n| &n.task.id).collect();
        assert_eq!(roots, vec![&id(4), &id(7)]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let tasks = map(vec![task(0, &[1]), task(1, &[0])]);
        assert!(matches!(
            build_forest(&tasks),
            Err(GraphError::Cyclic { .. })
        ));

        let tasks = map(vec![task(0, &[0])]);
        assert_eq!(
            descendants(&tasks).unwrap_err(),
            GraphError::Cyclic { id: id(0) }
        );
    }

    #[test]
    fn test_cascade_is_bottom_up() {
        let tasks = map(vec![
            task(0, &[1, 3]),
            task(1, &[2]),
            task(2, &[]),
            task(3, &[]),
            task(4, &[]),
        ]);
        assert_eq!(
            cascade(&tasks, &id(0)).unwrap(),
            vec![id(3), id(2), id(1), id(0)]
        );
        assert_eq!(cascade(&tasks, &id(4)).unwrap(), vec![id(4)]);
        assert!(cascade(&tasks, &id(99)).unwrap().is_empty());
    }
}
