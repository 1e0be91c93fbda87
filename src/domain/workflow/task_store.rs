use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::domain::utils::id::TaskName;
use crate::domain::workflow::task::Task;

new_key_type! {
    pub struct TaskKey;
}

/// Arena owning the tasks of one workflow.
///
/// Edges between tasks are stored as `TaskKey`s, so the graph holds no
/// shared pointers.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    /// Task storage.
    slots: SlotMap<TaskKey, Task>,

    /// Index lookup TaskKey using the task name from the input file.
    name_index: HashMap<TaskName, TaskKey>,

    /// Insertion order, used wherever "first encountered" matters.
    order: Vec<TaskKey>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self { slots: SlotMap::with_key(), name_index: HashMap::new(), order: Vec::new() }
    }

    /// Adds a Task to the store.
    ///
    /// # Returns
    /// The internal key, or `None` if a task with the same name exists.
    pub fn add(&mut self, task: Task) -> Option<TaskKey> {
        if self.name_index.contains_key(&task.name) {
            return None;
        }

        let name = task.name.clone();
        let key = self.slots.insert(task);
        self.name_index.insert(name, key);
        self.order.push(key);
        Some(key)
    }

    pub fn get(&self, key: TaskKey) -> Option<&Task> {
        self.slots.get(key)
    }

    pub fn get_mut(&mut self, key: TaskKey) -> Option<&mut Task> {
        self.slots.get_mut(key)
    }

    pub fn key_for_name(&self, name: &TaskName) -> Option<TaskKey> {
        self.name_index.get(name).copied()
    }

    pub fn contains(&self, key: TaskKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[TaskKey] {
        &self.order
    }

    /// Tasks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskKey, &Task)> {
        self.order.iter().map(|key| (*key, &self.slots[*key]))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Index<TaskKey> for TaskStore {
    type Output = Task;

    fn index(&self, key: TaskKey) -> &Task {
        &self.slots[key]
    }
}

impl IndexMut<TaskKey> for TaskStore {
    fn index_mut(&mut self, key: TaskKey) -> &mut Task {
        &mut self.slots[key]
    }
}
