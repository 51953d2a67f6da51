//! Observer routing: update records, subscriber handles and the page-keyed
//! publish/subscribe registry.
//!
//! Topics are keyed by the packed page origin, so routing survives any
//! relocation of the page array itself. Fan-out always snapshots the
//! subscriber list and releases every lock before delivering: delivery can
//! block on a full inbox and must never hold a registry shard hostage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use dashmap::DashMap;
use smallvec::SmallVec;

use crate::geom::{Point, Rect, INVALID_RECT};
use crate::Value;

/// A tile coordinate together with the tile's value at dispatch time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueAt {
    pub point: Point,
    pub value: Value,
}

/// One tile-state transition.
///
/// A pure value change carries `old.point == new.point` and no entity
/// fields. An entity move carries both endpoints plus `del` and `add` set
/// to the moved entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update<T> {
    pub old: ValueAt,
    pub new: ValueAt,
    pub add: Option<T>,
    pub del: Option<T>,
}

// ── Subscriber ──────────────────────────────────────────────────────────

/// The registry-side half of a view: its viewport packed into one atomic
/// word, and the sending end of its inbox. Shared between the view and
/// every topic it subscribes to; identity is the `Arc` pointer.
pub(crate) struct Subscriber<T> {
    rect: AtomicU64,
    sender: Sender<Update<T>>,
}

impl<T> Subscriber<T> {
    pub fn new(sender: Sender<Update<T>>) -> Self {
        Self {
            rect: AtomicU64::new(INVALID_RECT.pack()),
            sender,
        }
    }

    #[inline(always)]
    pub fn viewport(&self) -> Rect {
        Rect::unpack(self.rect.load(Ordering::SeqCst))
    }

    /// Swaps in a new viewport and returns the previous one.
    #[inline]
    pub fn swap_viewport(&self, rect: Rect) -> Rect {
        Rect::unpack(self.rect.swap(rect.pack(), Ordering::SeqCst))
    }

    /// Delivers one update, blocking while the inbox is full. A closed
    /// inbox drops the update.
    #[inline]
    pub fn deliver(&self, ev: Update<T>) {
        let _ = self.sender.send(ev);
    }
}

// ── Registry ────────────────────────────────────────────────────────────

type SubList<T> = SmallVec<[Arc<Subscriber<T>>; 4]>;

struct Topic<T> {
    subs: Mutex<SubList<T>>,
}

impl<T> Default for Topic<T> {
    fn default() -> Self {
        Self {
            subs: Mutex::new(SmallVec::new()),
        }
    }
}

impl<T> Topic<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, SubList<T>> {
        self.subs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Page-origin-keyed subscriber lists.
pub(crate) struct Pubsub<T> {
    topics: DashMap<u32, Topic<T>>,
}

impl<T> Pubsub<T> {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Registers a subscriber for the page at `origin`. Returns true when
    /// the list holds at least one subscriber afterwards, so callers can
    /// set the page's observed bit idempotently.
    pub fn subscribe(&self, origin: Point, sub: Arc<Subscriber<T>>) -> bool {
        let topic = self.topics.entry(origin.pack()).or_default();
        let mut subs = topic.lock();
        subs.push(sub);
        !subs.is_empty()
    }

    /// Removes a subscriber from the page at `origin`. Returns true when
    /// the removal leaves the list empty.
    pub fn unsubscribe(&self, origin: Point, sub: &Arc<Subscriber<T>>) -> bool {
        let Some(topic) = self.topics.get(&origin.pack()) else {
            return false;
        };
        let mut subs = topic.lock();
        subs.retain(|s| !Arc::ptr_eq(s, sub));
        subs.is_empty()
    }

    /// Invokes `f` for each subscriber of `origin` whose viewport contains
    /// `at`. The list is snapshotted first; `f` runs without locks held.
    pub fn each(&self, origin: Point, at: Point, mut f: impl FnMut(&Arc<Subscriber<T>>)) {
        let snapshot = self.snapshot(origin);
        for sub in &snapshot {
            if sub.viewport().contains(at) {
                f(sub);
            }
        }
    }

    fn snapshot(&self, origin: Point) -> SubList<T> {
        match self.topics.get(&origin.pack()) {
            Some(topic) => topic.lock().clone(),
            None => SmallVec::new(),
        }
    }
}

impl<T: Clone> Pubsub<T> {
    /// Single-page dispatch: every subscriber of `origin` whose viewport
    /// contains `at` receives a copy of `ev`.
    pub fn notify(&self, ev: &Update<T>, origin: Point, at: Point) {
        self.each(origin, at, |sub| sub.deliver(ev.clone()));
    }

    /// Two-page dispatch for entity moves. Subscribers of both pages are
    /// unioned and deduplicated, then each receives `ev` once if its
    /// viewport contains either endpoint.
    pub fn notify_pair(&self, ev: &Update<T>, origins: [Point; 2], at: [Point; 2]) {
        let mut targets: SmallVec<[Arc<Subscriber<T>>; 8]> = SmallVec::new();
        for origin in origins {
            if let Some(topic) = self.topics.get(&origin.pack()) {
                for sub in topic.lock().iter() {
                    if !targets.iter().any(|t| Arc::ptr_eq(t, sub)) {
                        targets.push(sub.clone());
                    }
                }
            }
        }

        for sub in targets {
            let viewport = sub.viewport();
            if viewport.contains(at[0]) || viewport.contains(at[1]) {
                sub.deliver(ev.clone());
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn subscriber(rect: Rect) -> (Arc<Subscriber<u32>>, crossbeam_channel::Receiver<Update<u32>>) {
        let (tx, rx) = bounded(32);
        let sub = Arc::new(Subscriber::new(tx));
        sub.swap_viewport(rect);
        (sub, rx)
    }

    fn update_at(p: Point) -> Update<u32> {
        let at = ValueAt { point: p, value: 0 };
        Update {
            old: at,
            new: at,
            add: None,
            del: None,
        }
    }

    #[test]
    fn notify_filters_by_viewport() {
        let bus: Pubsub<u32> = Pubsub::new();
        let origin = Point::new(0, 0);
        let (near, near_rx) = subscriber(Rect::new(0, 0, 3, 3));
        let (far, far_rx) = subscriber(Rect::new(30, 30, 40, 40));
        bus.subscribe(origin, near.clone());
        bus.subscribe(origin, far);

        bus.notify(&update_at(Point::new(1, 1)), origin, Point::new(1, 1));
        assert_eq!(near_rx.try_recv().unwrap().new.point, Point::new(1, 1));
        assert!(far_rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_reports_drained_lists() {
        let bus: Pubsub<u32> = Pubsub::new();
        let origin = Point::new(3, 0);
        let (a, _a_rx) = subscriber(Rect::new(0, 0, 9, 9));
        let (b, _b_rx) = subscriber(Rect::new(0, 0, 9, 9));
        bus.subscribe(origin, a.clone());
        bus.subscribe(origin, b.clone());

        assert!(!bus.unsubscribe(origin, &a));
        assert!(bus.unsubscribe(origin, &b));
        assert!(!bus.unsubscribe(Point::new(90, 90), &a));
    }

    #[test]
    fn pair_dispatch_delivers_once_to_shared_observers() {
        let bus: Pubsub<u32> = Pubsub::new();
        let src = Point::new(0, 0);
        let dst = Point::new(3, 0);
        let (both, both_rx) = subscriber(Rect::new(0, 0, 9, 9));
        bus.subscribe(src, both.clone());
        bus.subscribe(dst, both.clone());

        let ev = update_at(Point::new(1, 1));
        bus.notify_pair(&ev, [src, dst], [Point::new(1, 1), Point::new(4, 1)]);
        assert!(both_rx.try_recv().is_ok());
        assert!(both_rx.try_recv().is_err());
    }
}
