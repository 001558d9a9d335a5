//! Session timer set: two restartable single-shot countdowns.
//!
//! Each armed timer is an abortable sleep task that posts a
//! generation-tagged expiry back onto the session queue. Arming replaces
//! any existing deadline (abort plus generation bump); an expiry that was
//! already queued when its timer got re-armed or disarmed carries a stale
//! generation and is dropped by [`TimerSet::accept`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// The two timers owned by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTimer {
    /// Fires when a `voice-coming` is never followed by ASR activity.
    SolitaryVoiceComing,
    /// Fires when an awaken session receives no voice input at all.
    NoVoiceInput,
}

/// Message posted onto the session queue when a timer expires.
#[derive(Debug, Clone, Copy)]
pub struct TimerFired {
    pub timer: SessionTimer,
    pub generation: u64,
}

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Owns the two session timers.
pub struct TimerSet {
    solitary: TimerSlot,
    no_voice: TimerSlot,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TimerSet {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            solitary: TimerSlot::default(),
            no_voice: TimerSlot::default(),
            fired_tx,
        }
    }

    fn slot(&self, timer: SessionTimer) -> &TimerSlot {
        match timer {
            SessionTimer::SolitaryVoiceComing => &self.solitary,
            SessionTimer::NoVoiceInput => &self.no_voice,
        }
    }

    fn slot_mut(&mut self, timer: SessionTimer) -> &mut TimerSlot {
        match timer {
            SessionTimer::SolitaryVoiceComing => &mut self.solitary,
            SessionTimer::NoVoiceInput => &mut self.no_voice,
        }
    }

    /// Arm `timer` to fire after `after`, cancelling any previous deadline.
    pub fn arm(&mut self, timer: SessionTimer, after: Duration) {
        let fired_tx = self.fired_tx.clone();
        let slot = self.slot_mut(timer);
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.task = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = fired_tx.send(TimerFired { timer, generation });
        }));
        debug!(?timer, ?after, generation, "timer armed");
    }

    /// Disarm `timer`. An expiry already in flight becomes stale.
    pub fn disarm(&mut self, timer: SessionTimer) {
        let slot = self.slot_mut(timer);
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
            debug!(?timer, "timer disarmed");
        }
    }

    /// Validate an expiry against the current generation. A stale expiry
    /// (its timer was re-armed or disarmed since) returns `false` and must
    /// not run its handler.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        let slot = self.slot_mut(fired.timer);
        if fired.generation != slot.generation {
            return false;
        }
        slot.task = None;
        true
    }

    /// Whether `timer` currently holds a live deadline.
    pub fn is_armed(&self, timer: SessionTimer) -> bool {
        self.slot(timer)
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        for slot in [&mut self.solitary, &mut self.no_voice] {
            if let Some(task) = slot.task.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_with_current_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx);

        timers.arm(SessionTimer::SolitaryVoiceComing, Duration::from_millis(100));
        assert!(timers.is_armed(SessionTimer::SolitaryVoiceComing));

        let fired = rx.recv().await.expect("timer shall fire");
        assert_eq!(fired.timer, SessionTimer::SolitaryVoiceComing);
        assert!(timers.accept(fired));
        assert!(!timers.is_armed(SessionTimer::SolitaryVoiceComing));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx);

        timers.arm(SessionTimer::NoVoiceInput, Duration::from_millis(100));
        timers.arm(SessionTimer::NoVoiceInput, Duration::from_millis(200));

        let fired = rx.recv().await.expect("replacement timer shall fire");
        assert!(timers.accept(fired), "only the replacement generation is live");
        assert!(rx.try_recv().is_err(), "the replaced deadline shall not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx);

        timers.arm(SessionTimer::SolitaryVoiceComing, Duration::from_millis(50));
        timers.disarm(SessionTimer::SolitaryVoiceComing);
        assert!(!timers.is_armed(SessionTimer::SolitaryVoiceComing));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timers_are_independent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx);

        timers.arm(SessionTimer::SolitaryVoiceComing, Duration::from_millis(300));
        timers.arm(SessionTimer::NoVoiceInput, Duration::from_millis(100));
        timers.disarm(SessionTimer::SolitaryVoiceComing);

        let fired = rx.recv().await.expect("no-voice timer shall fire");
        assert_eq!(fired.timer, SessionTimer::NoVoiceInput);
        assert!(timers.accept(fired));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err(), "disarmed solitary timer shall stay silent");
    }
}
