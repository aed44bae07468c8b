mod input;
mod loop_runner;
mod math;
mod metrics;
mod simulation;

pub use input::{InputCollector, InputSnapshot};
pub use loop_runner::{
    run_app, FrameOutcome, FrameStepper, LoopConfig, DEFAULT_FIXED_DT, SLOW_FRAME_ENV_VAR,
};
pub use math::{signed_angle, wrap_angle, Transform3, Vec3};
pub use metrics::LoopMetricsSnapshot;
pub use simulation::{LoopCommand, LoopExit, LoopExitReason, Simulation};
