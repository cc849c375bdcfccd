//! Object Stack - LIFO worklist of object ids
//!
//! Used for the depth-first mark traversal and for the queue of unreachable
//! subregion roots drained after a sweep. Releasing a subregion may push
//! further roots, so nesting depth never grows the call stack.

use crate::object::ObjectId;

/// Worklist of object ids
#[derive(Debug, Default)]
pub struct ObjectStack {
    data: Vec<ObjectId>,
    /// Total pushes since creation
    pushed: usize,
}

impl ObjectStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pushed: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, object: ObjectId) {
        self.data.push(object);
        self.pushed += 1;
    }

    #[inline]
    pub fn pop(&mut self) -> Option<ObjectId> {
        self.data.pop()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of pushes over the lifetime of the stack
    pub fn pushed_count(&self) -> usize {
        self.pushed
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Extend<ObjectId> for ObjectStack {
    fn extend<I: IntoIterator<Item = ObjectId>>(&mut self, iter: I) {
        for object in iter {
            self.push(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_order() {
        let mut stack = ObjectStack::new();
        let a = ObjectId::new(1, 0);
        let b = ObjectId::new(2, 0);

        stack.push(a);
        stack.push(b);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(b));
        assert_eq!(stack.pop(), Some(a));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
        assert_eq!(stack.pushed_count(), 2);
    }

    #[test]
    fn test_extend_counts_pushes() {
        let mut stack = ObjectStack::with_capacity(4);
        stack.extend((0..3).map(|i| ObjectId::new(i, 0)));
        assert_eq!(stack.len(), 3);
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.pushed_count(), 3);
    }
}
