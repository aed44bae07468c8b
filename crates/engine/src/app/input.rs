use std::collections::VecDeque;

/// Actions visible to one simulation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSnapshot<A> {
    quit_requested: bool,
    actions: Vec<A>,
}

impl<A> InputSnapshot<A> {
    pub fn empty() -> Self {
        Self {
            quit_requested: false,
            actions: Vec::new(),
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn with_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }
}

impl<A> Default for InputSnapshot<A> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Collects actions between ticks. Each pushed action is an edge: it shows up in
/// exactly one snapshot and is then cleared. Quit is level-triggered.
#[derive(Debug)]
pub struct InputCollector<A> {
    quit_requested: bool,
    pending: VecDeque<A>,
}

impl<A> Default for InputCollector<A> {
    fn default() -> Self {
        Self {
            quit_requested: false,
            pending: VecDeque::new(),
        }
    }
}

impl<A> InputCollector<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: A) {
        self.pending.push_back(action);
    }

    pub fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot_for_tick(&mut self) -> InputSnapshot<A> {
        InputSnapshot {
            quit_requested: self.quit_requested,
            actions: self.pending.drain(..).collect(),
        }
    }
}
