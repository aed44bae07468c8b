use std::env;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::metrics::MetricsAccumulator;
use super::{InputCollector, LoopCommand, LoopExit, LoopExitReason, Simulation};

pub const SLOW_FRAME_ENV_VAR: &str = "ALGO_MISSION_SLOW_FRAME_MS";
pub const DEFAULT_FIXED_DT: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub fixed_dt: Duration,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub max_frames: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fixed_dt: DEFAULT_FIXED_DT,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: Some(60),
            max_frames: None,
        }
    }
}

/// Runs `simulation` until it asks to quit or the configured frame limit is hit.
pub fn run_app<S: Simulation>(config: LoopConfig, simulation: &mut S) -> LoopExit {
    let mut stepper = FrameStepper::new(&config);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut input_collector = InputCollector::new();

    info!(
        fixed_dt_ms = stepper.fixed_dt.as_millis() as u64,
        max_frame_delta_ms = stepper.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = stepper.max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        max_frames = ?config.max_frames,
        "loop_config"
    );

    simulation.load();

    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut frames = 0u64;

    let reason = loop {
        if slow_frame_delay > Duration::ZERO {
            // Debug perturbation only; the render cap below is separate.
            thread::sleep(slow_frame_delay);
        }

        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        simulation.poll_input(&mut input_collector);
        let outcome = stepper.advance(raw_frame_dt, simulation, &mut input_collector);
        metrics_accumulator.record_ticks(outcome.ticks_run);

        if outcome.dropped_backlog > Duration::ZERO {
            metrics_accumulator.record_dropped_backlog(outcome.dropped_backlog);
            warn!(
                dropped_backlog_ms = outcome.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = stepper.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        let elapsed_since_last_present =
            Instant::now().saturating_duration_since(last_present_instant);
        let cap_sleep = compute_cap_sleep(elapsed_since_last_present, render_frame_target);
        if cap_sleep > Duration::ZERO {
            thread::sleep(cap_sleep);
        }

        simulation.render();
        last_present_instant = Instant::now();
        metrics_accumulator.record_frame(raw_frame_dt);
        frames = frames.saturating_add(1);

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                dropped_backlog_ms = snapshot.dropped_backlog_ms,
                label = simulation.debug_label().as_deref().unwrap_or("-"),
                "loop_metrics"
            );
        }

        if outcome.command == LoopCommand::Quit {
            info!(reason = "simulation", "shutdown_requested");
            break LoopExitReason::Quit;
        }
        if frame_limit_reached(frames, config.max_frames) {
            warn!(frames, "frame_limit_reached");
            break LoopExitReason::FrameLimit;
        }
    };

    simulation.shutdown();
    info!(frames, ticks = stepper.total_ticks(), "shutdown");

    LoopExit {
        reason,
        frames,
        ticks: stepper.total_ticks(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub ticks_run: u32,
    pub dropped_backlog: Duration,
    pub command: LoopCommand,
}

/// Owns the lag accumulator and turns wall-clock frame deltas into fixed ticks.
#[derive(Debug)]
pub struct FrameStepper {
    fixed_dt: Duration,
    fixed_dt_seconds: f32,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    total_ticks: u64,
}

impl FrameStepper {
    pub fn new(config: &LoopConfig) -> Self {
        let fixed_dt = normalize_non_zero_duration(config.fixed_dt, DEFAULT_FIXED_DT);
        Self {
            fixed_dt,
            fixed_dt_seconds: fixed_dt.as_secs_f32(),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt_seconds
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn advance<S: Simulation>(
        &mut self,
        raw_frame_dt: Duration,
        simulation: &mut S,
        input: &mut InputCollector<S::Action>,
    ) -> FrameOutcome {
        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let mut ticks_run = 0u32;
        let mut command = LoopCommand::Continue;
        for _ in 0..step_plan.ticks_to_run {
            let input_snapshot = input.snapshot_for_tick();
            ticks_run = ticks_run.saturating_add(1);
            self.total_ticks = self.total_ticks.saturating_add(1);
            if input_snapshot.quit_requested() {
                command = LoopCommand::Quit;
                break;
            }
            if simulation.update(self.fixed_dt_seconds, &input_snapshot) == LoopCommand::Quit {
                command = LoopCommand::Quit;
                break;
            }
        }
        self.accumulator = step_plan.remaining_accumulator;

        FrameOutcome {
            ticks_run,
            dropped_backlog: step_plan.dropped_backlog,
            command,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn frame_limit_reached(frames: u64, max_frames: Option<u64>) -> bool {
    max_frames.is_some_and(|limit| frames >= limit)
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}
