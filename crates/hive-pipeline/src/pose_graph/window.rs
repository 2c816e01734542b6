//! Bounded, time-ordered window of tracker states.

use hive_optim::problems::WindowState;
use std::collections::VecDeque;

/// Sliding window of states; the oldest are dropped once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct PoseWindow {
    states: VecDeque<WindowState>,
    capacity: usize,
}

impl PoseWindow {
    /// Window holding at most `capacity` states (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            states: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn front(&self) -> Option<&WindowState> {
        self.states.front()
    }

    pub fn back(&self) -> Option<&WindowState> {
        self.states.back()
    }

    pub fn back_mut(&mut self) -> Option<&mut WindowState> {
        self.states.back_mut()
    }

    /// State before the newest one.
    pub fn second_to_back(&self) -> Option<&WindowState> {
        self.states.len().checked_sub(2).and_then(|i| self.states.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowState> {
        self.states.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WindowState> {
        self.states.iter_mut()
    }

    /// Append a state and drop the oldest ones beyond capacity.
    ///
    /// Returns the number of states evicted from the front.
    pub fn push(&mut self, state: WindowState) -> usize {
        self.states.push_back(state);
        let mut evicted = 0;
        while self.states.len() > self.capacity {
            self.states.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Contiguous view of the states, oldest first.
    pub fn as_slice(&mut self) -> &[WindowState] {
        self.states.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
