use std::cell::Cell;
use std::rc::Rc;

use engine::{Observer, Relay};
use tracing::{debug, info};

use super::bot::{MapStatus, MapStatusHandle};
use super::flair::ScoreDelta;
use super::map::GroundRole;
use super::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    TileRoleChanged(GroundRole),
    ScoreDelta(ScoreDelta),
    LifecycleChanged(AppState),
}

pub type MissionHub = engine::NotificationHub<Notification>;

/// Shared running score. Clones see the same value.
#[derive(Debug, Clone, Default)]
pub struct ScoreHandle(Rc<Cell<i64>>);

impl ScoreHandle {
    pub fn get(&self) -> i64 {
        self.0.get()
    }

    pub fn reset(&self) {
        self.0.set(0);
    }

    fn add(&self, delta: ScoreDelta) -> i64 {
        let next = self.0.get().saturating_add(i64::from(delta));
        self.0.set(next);
        next
    }
}

#[derive(Debug)]
pub struct ScoreKeeper {
    score: ScoreHandle,
}

impl ScoreKeeper {
    pub fn new(score: ScoreHandle) -> Self {
        Self { score }
    }
}

impl Observer<Notification> for ScoreKeeper {
    fn on_notification(&mut self, notification: &Notification, _relay: &mut Relay<Notification>) {
        if let Notification::ScoreDelta(delta) = notification {
            let score = self.score.add(*delta);
            info!(delta = *delta, score, "score_changed");
        }
    }
}

/// Tells the bot how its run ended so it can react on its next tick.
#[derive(Debug)]
pub struct BotStatusListener {
    status: MapStatusHandle,
}

impl BotStatusListener {
    pub fn new(status: MapStatusHandle) -> Self {
        Self { status }
    }
}

impl Observer<Notification> for BotStatusListener {
    fn on_notification(&mut self, notification: &Notification, _relay: &mut Relay<Notification>) {
        match notification {
            Notification::LifecycleChanged(AppState::Dead) => self.status.set(MapStatus::Bad),
            Notification::LifecycleChanged(AppState::Win) => self.status.set(MapStatus::Good),
            _ => {}
        }
    }
}

/// Turns "the bot drove off the course" into a lifecycle notification.
#[derive(Debug, Default)]
pub struct LifecycleRelay;

impl Observer<Notification> for LifecycleRelay {
    fn on_notification(&mut self, notification: &Notification, relay: &mut Relay<Notification>) {
        if let Notification::TileRoleChanged(role) = notification {
            debug!(role = role.as_str(), "tile_role_observed");
            if *role == GroundRole::NoTile {
                relay.publish(Notification::LifecycleChanged(AppState::Dead));
            }
        }
    }
}

/// Registers the standard observers in delivery order.
pub fn wire_observers(hub: &mut MissionHub, score: &ScoreHandle, status: &MapStatusHandle) {
    hub.register(Box::new(LifecycleRelay));
    hub.register(Box::new(ScoreKeeper::new(score.clone())));
    hub.register(Box::new(BotStatusListener::new(status.clone())));
}
