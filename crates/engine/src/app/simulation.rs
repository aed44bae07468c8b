use std::fmt::Debug;

use super::{InputCollector, InputSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCommand {
    #[default]
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExitReason {
    Quit,
    FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    pub reason: LoopExitReason,
    pub frames: u64,
    pub ticks: u64,
}

/// Something the fixed-step loop can drive.
///
/// `poll_input` runs once per frame before any ticks. `update` runs zero or more
/// times per frame with the fixed step; actions collected during the frame are
/// delivered to the first tick only. `render` runs once per frame after the ticks.
pub trait Simulation {
    type Action: Debug;

    fn load(&mut self) {}

    fn poll_input(&mut self, _input: &mut InputCollector<Self::Action>) {}

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot<Self::Action>,
    ) -> LoopCommand;

    fn render(&mut self) {}

    fn shutdown(&mut self) {}

    fn debug_label(&self) -> Option<String> {
        None
    }
}
