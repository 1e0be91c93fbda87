use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::workflow::task::TaskRef;

#[derive(Debug, Clone, Copy)]
struct ReadyEntry {
    earliest_start_time: f64,
    sequence: u64,
    task: TaskRef,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for BinaryHeap (min-heap behavior), FIFO on equal times
        other.earliest_start_time.total_cmp(&self.earliest_start_time).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Ready tasks ordered by earliest start time.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<ReadyEntry>,
    next_sequence: u64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        ReadyQueue { heap: BinaryHeap::new(), next_sequence: 0 }
    }

    pub fn push(&mut self, task: TaskRef, earliest_start_time: f64) {
        self.heap.push(ReadyEntry { earliest_start_time, sequence: self.next_sequence, task });
        self.next_sequence += 1;
    }

    /// Removes the task with the smallest earliest start time.
    pub fn pop(&mut self) -> Option<(TaskRef, f64)> {
        self.heap.pop().map(|entry| (entry.task, entry.earliest_start_time))
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.earliest_start_time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::task_store::TaskKey;
    use crate::domain::workflow::workflow::WorkflowKey;
    use slotmap::SlotMap;

    #[test]
    fn test_pops_smallest_time_first_and_fifo_on_ties() {
        let mut workflows: SlotMap<WorkflowKey, ()> = SlotMap::with_key();
        let mut tasks: SlotMap<TaskKey, ()> = SlotMap::with_key();
        let workflow = workflows.insert(());
        let refs: Vec<TaskRef> = (0..4).map(|_| TaskRef::new(workflow, tasks.insert(()))).collect();

        let mut queue = ReadyQueue::new();
        queue.push(refs[0], 5.0);
        queue.push(refs[1], 1.0);
        queue.push(refs[2], 5.0);
        queue.push(refs[3], 3.0);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.peek_time(), Some(1.0));
        assert_eq!(queue.pop(), Some((refs[1], 1.0)));
        assert_eq!(queue.pop(), Some((refs[3], 3.0)));
        assert_eq!(queue.pop(), Some((refs[0], 5.0)));
        assert_eq!(queue.pop(), Some((refs[2], 5.0)));
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
