//! Synchronous publish/subscribe between simulation components.
//!
//! Observers are called in registration order. An observer may publish follow-up
//! notifications through the [`Relay`] it is handed. As soon as that observer
//! returns, its follow-ups are delivered to every observer, depth-first, before the
//! current notification moves on to the next observer. No observer is re-entered.

use std::fmt::Debug;

use tracing::{trace, warn};

/// Upper bound on notifications delivered by a single `publish` call, relays
/// included. Hitting it means two observers are relaying to each other forever.
pub const MAX_CASCADE_LEN: usize = 64;

pub trait Observer<N> {
    fn on_notification(&mut self, notification: &N, relay: &mut Relay<N>);
}

#[derive(Debug)]
pub struct Relay<N> {
    queued: Vec<N>,
}

impl<N> Relay<N> {
    fn new() -> Self {
        Self { queued: Vec::new() }
    }

    pub fn publish(&mut self, notification: N) {
        self.queued.push(notification);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u32);

pub struct NotificationHub<N> {
    observers: Vec<(ObserverId, Box<dyn Observer<N>>)>,
    next_id: u32,
    delivered: u64,
}

impl<N> Default for NotificationHub<N> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
            delivered: 0,
        }
    }
}

impl<N: Debug> NotificationHub<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn Observer<N>>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.observers.push((id, observer));
        id
    }

    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// Delivers `notification` and any relayed follow-ups before returning.
    pub fn publish(&mut self, notification: N) {
        let mut budget = MAX_CASCADE_LEN;
        self.deliver(notification, &mut budget);
    }

    fn deliver(&mut self, notification: N, budget: &mut usize) {
        if *budget == 0 {
            warn!(
                notification = ?notification,
                limit = MAX_CASCADE_LEN,
                "notification_cascade_truncated"
            );
            return;
        }
        *budget -= 1;
        self.delivered = self.delivered.saturating_add(1);
        trace!(notification = ?notification, observers = self.observers.len(), "notify");

        for index in 0..self.observers.len() {
            let mut relay = Relay::new();
            self.observers[index]
                .1
                .on_notification(&notification, &mut relay);
            for follow_up in relay.queued {
                self.deliver(follow_up, budget);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Ping {
        Hello(u32),
        Echo(u32),
    }

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<(&'static str, Ping)>>>,
    }

    impl Observer<Ping> for Recorder {
        fn on_notification(&mut self, notification: &Ping, _relay: &mut Relay<Ping>) {
            self.log.borrow_mut().push((self.name, notification.clone()));
        }
    }

    struct Echoer;

    impl Observer<Ping> for Echoer {
        fn on_notification(&mut self, notification: &Ping, relay: &mut Relay<Ping>) {
            if let Ping::Hello(value) = notification {
                relay.publish(Ping::Echo(*value));
            }
        }
    }

    struct Looper;

    impl Observer<Ping> for Looper {
        fn on_notification(&mut self, notification: &Ping, relay: &mut Relay<Ping>) {
            relay.publish(notification.clone());
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = NotificationHub::new();
        hub.register(Box::new(Recorder {
            name: "first",
            log: Rc::clone(&log),
        }));
        hub.register(Box::new(Recorder {
            name: "second",
            log: Rc::clone(&log),
        }));

        hub.publish(Ping::Hello(1));

        assert_eq!(
            *log.borrow(),
            vec![("first", Ping::Hello(1)), ("second", Ping::Hello(1))]
        );
    }

    #[test]
    fn relayed_notification_reaches_everyone_before_later_observers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = NotificationHub::new();
        hub.register(Box::new(Recorder {
            name: "before",
            log: Rc::clone(&log),
        }));
        hub.register(Box::new(Echoer));
        hub.register(Box::new(Recorder {
            name: "after",
            log: Rc::clone(&log),
        }));

        hub.publish(Ping::Hello(4));

        assert_eq!(
            *log.borrow(),
            vec![
                ("before", Ping::Hello(4)),
                ("before", Ping::Echo(4)),
                ("after", Ping::Echo(4)),
                ("after", Ping::Hello(4)),
            ]
        );
        assert_eq!(hub.delivered_count(), 2);
    }

    #[test]
    fn unregistered_observer_stops_receiving() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = NotificationHub::new();
        let id = hub.register(Box::new(Recorder {
            name: "rec",
            log: Rc::clone(&log),
        }));

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        hub.publish(Ping::Hello(1));

        assert!(log.borrow().is_empty());
        assert_eq!(hub.observer_count(), 0);
    }

    #[test]
    fn endless_relay_is_cut_off() {
        let mut hub = NotificationHub::new();
        hub.register(Box::new(Looper));

        hub.publish(Ping::Hello(0));

        assert_eq!(hub.delivered_count(), MAX_CASCADE_LEN as u64);
    }
}
