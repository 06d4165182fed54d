//! Timer Registry
//!
//! Owns every running countdown. The registry has no clock of its own: the
//! caller pumps [`TimerRegistry::tick`] once per tick interval and receives the
//! payloads of the timers that completed on that tick.
//!
//! ## Guarantees
//!
//! - At most one timer per key. Starting an existing key cancels the old timer
//!   (clearing its display) before the new one begins.
//! - A payload is handed out at most once. Completion moves it out of the
//!   registry; cancellation drops it. Whichever happens first wins.
//! - Unreachable audience members are skipped for display but never stop a
//!   countdown.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::core::ids::ParticipantId;
use crate::timer::display::DisplayUpdate;
use crate::world::Messenger;

/// A running countdown.
#[derive(Debug)]
struct Countdown<E> {
    label: String,
    duration: u32,
    remaining: u32,
    audience: BTreeSet<ParticipantId>,
    payload: E,
}

/// Read-only view of a running countdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerSnapshot<K> {
    /// Timer key.
    pub key: K,
    /// Display label.
    pub label: String,
    /// Seconds left.
    pub remaining: u32,
    /// Duration the timer was started with.
    pub duration: u32,
}

/// Keyed collection of countdowns yielding payloads of type `E`.
#[derive(Debug)]
pub struct TimerRegistry<K, E> {
    timers: BTreeMap<K, Countdown<E>>,
}

impl<K, E> Default for TimerRegistry<K, E> {
    fn default() -> Self {
        Self { timers: BTreeMap::new() }
    }
}

impl<K, E> TimerRegistry<K, E>
where
    K: Ord + Clone + fmt::Debug,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a countdown.
    ///
    /// The initial display goes out immediately; the first decrement happens
    /// on the next tick. A zero duration completes on the next tick.
    pub fn start<M, I>(
        &mut self,
        messenger: &mut M,
        key: K,
        audience: I,
        duration_secs: u32,
        label: &str,
        payload: E,
    ) where
        M: Messenger + ?Sized,
        I: IntoIterator<Item = ParticipantId>,
    {
        self.cancel(messenger, &key);

        let audience: BTreeSet<_> = audience.into_iter().collect();
        publish(messenger, &audience, &DisplayUpdate::countdown(label, duration_secs));

        debug!("Timer {:?} started: {}s, {} watching", key, duration_secs, audience.len());
        self.timers.insert(key, Countdown {
            label: label.to_string(),
            duration: duration_secs,
            remaining: duration_secs,
            audience,
            payload,
        });
    }

    /// Stop a countdown and clear its display. Returns whether one was running.
    pub fn cancel<M>(&mut self, messenger: &mut M, key: &K) -> bool
    where
        M: Messenger + ?Sized,
    {
        match self.timers.remove(key) {
            Some(timer) => {
                publish(messenger, &timer.audience, &DisplayUpdate::Clear);
                debug!("Timer {:?} cancelled with {}s left", key, timer.remaining);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer whose key matches. Returns how many were running.
    pub fn cancel_where<M, F>(&mut self, messenger: &mut M, mut matches: F) -> usize
    where
        M: Messenger + ?Sized,
        F: FnMut(&K) -> bool,
    {
        let keys: Vec<K> = self.timers.keys().filter(|k| matches(k)).cloned().collect();
        let mut cancelled = 0;
        for key in &keys {
            if self.cancel(messenger, key) {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancel everything.
    pub fn cancel_all<M>(&mut self, messenger: &mut M) -> usize
    where
        M: Messenger + ?Sized,
    {
        self.cancel_where(messenger, |_| true)
    }

    /// Whether a timer is running under this key.
    pub fn is_running(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }

    /// Seconds left, `None` when not running.
    pub fn remaining(&self, key: &K) -> Option<u32> {
        self.timers.get(key).map(|t| t.remaining)
    }

    /// Snapshot of one timer.
    pub fn snapshot(&self, key: &K) -> Option<TimerSnapshot<K>> {
        self.timers.get(key).map(|t| TimerSnapshot {
            key: key.clone(),
            label: t.label.clone(),
            remaining: t.remaining,
            duration: t.duration,
        })
    }

    /// Number of running timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timer is running.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Add a participant to a running timer's audience and show them the
    /// current countdown. Returns `false` if the timer is not running.
    pub fn watch<M>(&mut self, messenger: &mut M, key: &K, participant: ParticipantId) -> bool
    where
        M: Messenger + ?Sized,
    {
        let Some(timer) = self.timers.get_mut(key) else {
            return false;
        };

        if timer.audience.insert(participant) {
            let update = DisplayUpdate::countdown(&timer.label, timer.remaining);
            publish(messenger, std::iter::once(&participant), &update);
        }
        true
    }

    /// Remove a participant from every audience and clear their display.
    pub fn unwatch<M>(&mut self, messenger: &mut M, participant: &ParticipantId)
    where
        M: Messenger + ?Sized,
    {
        let mut was_watching = false;
        for timer in self.timers.values_mut() {
            was_watching |= timer.audience.remove(participant);
        }

        if was_watching {
            publish(messenger, std::iter::once(participant), &DisplayUpdate::Clear);
        }
    }

    /// Advance every timer by one second.
    ///
    /// Returns the payloads of the timers that reached zero, in key order.
    pub fn tick<M>(&mut self, messenger: &mut M) -> Vec<E>
    where
        M: Messenger + ?Sized,
    {
        let mut finished = Vec::new();

        for (key, timer) in self.timers.iter_mut() {
            timer.remaining = timer.remaining.saturating_sub(1);
            if timer.remaining > 0 {
                let update = DisplayUpdate::countdown(&timer.label, timer.remaining);
                publish(messenger, &timer.audience, &update);
            } else {
                finished.push(key.clone());
            }
        }

        let mut completed = Vec::with_capacity(finished.len());
        for key in finished {
            if let Some(timer) = self.timers.remove(&key) {
                publish(messenger, &timer.audience, &DisplayUpdate::complete(&timer.label));
                debug!("Timer {:?} completed", key);
                completed.push(timer.payload);
            }
        }

        completed
    }
}

/// Push a display update to every reachable member, ignoring failures.
fn publish<'a, M, I>(messenger: &mut M, audience: I, update: &DisplayUpdate)
where
    M: Messenger + ?Sized,
    I: IntoIterator<Item = &'a ParticipantId>,
{
    for participant in audience {
        if !messenger.is_reachable(*participant) {
            continue;
        }
        if let Err(e) = messenger.update_display(*participant, update) {
            debug!("Display update for {} dropped: {}", participant, e);
        }
    }
}
