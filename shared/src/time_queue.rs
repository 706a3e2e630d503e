use std::{
    cell::Cell,
    cmp::Ordering,
    collections::BinaryHeap,
    rc::Rc,
    time::{Duration, SystemTime},
};

/// Millisecond timestamp on the process clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instant {
    millis: u64,
}

impl Instant {
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn add(&self, duration: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_add(duration.as_millis() as u64))
    }

    /// Time elapsed between `self` and a later `now`, zero if `now` is earlier.
    pub fn elapsed(&self, now: &Instant) -> Duration {
        Duration::from_millis(now.millis.saturating_sub(self.millis))
    }
}

/// Source of "now" for everything the server schedules.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock in milliseconds since UNIX epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Instant::from_millis(millis)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(millis: u64) -> Self {
        let clock = Self::new();
        clock.millis.set(millis);
        clock
    }

    pub fn advance(&self, duration: Duration) {
        self.millis
            .set(self.millis.get().saturating_add(duration.as_millis() as u64));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.millis.get())
    }
}

struct Scheduled<T> {
    due: Instant,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    // reversed so the BinaryHeap pops the earliest item first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Deferred tasks, popped in due order. Items scheduled for the same instant
/// come out in the order they were added.
pub struct TimeQueue<T> {
    queue: BinaryHeap<Scheduled<T>>,
    next_sequence: u64,
}

impl<T> TimeQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    pub fn add_item(&mut self, due: Instant, item: T) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(Scheduled {
            due,
            sequence,
            item,
        });
    }

    pub fn has_item(&self, now: &Instant) -> bool {
        match self.queue.peek() {
            Some(scheduled) => scheduled.due <= *now,
            None => false,
        }
    }

    pub fn pop_item(&mut self, now: &Instant) -> Option<T> {
        if !self.has_item(now) {
            return None;
        }
        self.queue.pop().map(|scheduled| scheduled.item)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.queue.peek().map(|scheduled| scheduled.due)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Default for TimeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out monotonically increasing ids, never reusing one.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    next: u64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn generate(&mut self) -> u64 {
        let key = self.next;
        self.next += 1;
        key
    }
}
