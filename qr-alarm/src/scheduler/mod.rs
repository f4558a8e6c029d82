//! Turns a requested wake time into exactly one pending wake-up.

mod timer;

pub use timer::{TimerError, TokioWakeTimer, WakeTarget, WakeTimer};

use std::sync::Arc;

use time::{Duration, OffsetDateTime, Time};

use crate::clock::Clock;
use crate::store::{ConfigStore, ConfigUpdate, Missing};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("exact wake-up permission has not been granted")]
    PermissionRequired,

    #[error("cannot schedule without {0}")]
    ConfigurationIncomplete(Missing),

    #[error("alarm is ringing; stop it before rescheduling")]
    AlarmActive,

    #[error(transparent)]
    Timer(#[from] TimerError),
}

pub struct Scheduler {
    store: Arc<ConfigStore>,
    timer: Arc<dyn WakeTimer>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(store: Arc<ConfigStore>, timer: Arc<dyn WakeTimer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            timer,
            clock,
        }
    }

    /// Schedule the alarm for `requested`, or for its next occurrence if
    /// that instant has already passed.
    ///
    /// Replaces any pending wake-up. Returns the instant actually
    /// registered, which is also written to the store along with
    /// `enabled = true`.
    pub fn schedule(&self, requested: OffsetDateTime) -> Result<OffsetDateTime, ScheduleError> {
        let config = self.store.read();
        if config.active {
            return Err(ScheduleError::AlarmActive);
        }
        config
            .check_schedulable()
            .map_err(ScheduleError::ConfigurationIncomplete)?;
        if !self.timer.can_schedule_exact() {
            warn!("Exact wake-ups not permitted, alarm not scheduled");
            return Err(ScheduleError::PermissionRequired);
        }

        let at = next_occurrence(requested, self.clock.now());
        self.timer.register(at)?;

        // The update only fails if ringing started since the read above.
        let stored = self.store.update(ConfigUpdate {
            trigger_time: Some(at),
            enabled: Some(true),
            ..Default::default()
        });
        if stored.is_err() {
            self.timer.cancel();
            return Err(ScheduleError::AlarmActive);
        }

        info!(trigger = %at, "Alarm scheduled");
        Ok(at)
    }

    /// Schedule for the next `time_of_day` on the local clock.
    pub fn schedule_time_of_day(&self, time_of_day: Time) -> Result<OffsetDateTime, ScheduleError> {
        let requested = self.clock.now().replace_time(time_of_day);
        self.schedule(requested)
    }

    /// Drop the pending wake-up and disable the alarm. Safe to call when
    /// nothing is scheduled.
    pub fn cancel(&self) {
        let had_pending = self.timer.cancel();
        self.store.clear_trigger();
        info!(had_pending, "Alarm cancelled");
    }

    /// Bring the wake-up back after a restart.
    ///
    /// A stored `active` flag can only be left over from a process that
    /// died mid-ring, so it is cleared. An enabled alarm is re-registered,
    /// moved forward if its time passed while we were down.
    pub fn restore(&self) -> Option<OffsetDateTime> {
        let config = self.store.read();
        if config.active {
            warn!("Clearing ringing flag left by a previous run");
            self.store.set_active(false);
        }

        let (true, Some(trigger)) = (config.enabled, config.trigger_time) else {
            debug!("No alarm to restore");
            return None;
        };

        match self.schedule(trigger) {
            Ok(at) => {
                if at != trigger {
                    info!(missed = %trigger, next = %at, "Missed alarm moved to next occurrence");
                }
                Some(at)
            }
            Err(e) => {
                warn!(error = %e, "Could not restore alarm");
                None
            }
        }
    }

    /// The pending wake-up, if any.
    pub fn next_trigger(&self) -> Option<OffsetDateTime> {
        self.timer.pending()
    }
}

/// `requested` if it is still ahead of `now`; otherwise the same time of
/// day at its first occurrence after `now`.
///
/// The result is always in `(now, now + 24h]` for a past `requested`.
pub fn next_occurrence(requested: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    if requested > now {
        return requested;
    }

    let offset = requested.offset();
    let today = now
        .to_offset(offset)
        .date()
        .with_time(requested.time())
        .assume_offset(offset);

    if today > now {
        today
    } else {
        today + Duration::DAY
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use time::macros::{datetime, time};

    use super::*;
    use crate::store::AudioSource;
    use crate::testing::{FixedClock, ManualTimer};

    const NOW: OffsetDateTime = datetime!(2026-10-16 22:00 +2);

    struct Fixture {
        store: Arc<ConfigStore>,
        timer: Arc<ManualTimer>,
        scheduler: Scheduler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(ConfigStore::in_memory());
        store
            .update(ConfigUpdate {
                audio_source: Some(AudioSource::new("/sounds/a.ogg")),
                ..Default::default()
            })
            .unwrap();
        store.enroll("XYZ123").unwrap();

        let timer = Arc::new(ManualTimer::new());
        let clock = Arc::new(FixedClock::new(NOW));
        let scheduler = Scheduler::new(store.clone(), timer.clone(), clock);
        Fixture {
            store,
            timer,
            scheduler,
        }
    }

    #[test]
    fn schedule_then_read() {
        let f = fixture();
        let t = datetime!(2026-10-17 07:30 +2);

        assert_eq!(f.scheduler.schedule(t), Ok(t));

        let config = f.store.read();
        assert_eq!(config.trigger_time, Some(t));
        assert!(config.enabled);
        assert_eq!(f.scheduler.next_trigger(), Some(t));
    }

    #[test]
    fn schedule_twice_leaves_one_registration() {
        let f = fixture();
        f.scheduler.schedule(datetime!(2026-10-17 07:30 +2)).unwrap();
        f.scheduler.schedule(datetime!(2026-10-17 08:00 +2)).unwrap();

        assert_eq!(f.timer.registrations(), 2);
        assert_eq!(f.timer.pending(), Some(datetime!(2026-10-17 08:00 +2)));
    }

    #[test_case(datetime!(2026-10-16 07:30 +2), datetime!(2026-10-17 07:30 +2) ; "earlier today")]
    #[test_case(datetime!(2026-10-16 22:00 +2), datetime!(2026-10-17 22:00 +2) ; "exactly now")]
    #[test_case(datetime!(2026-10-10 23:15 +2), datetime!(2026-10-16 23:15 +2) ; "days ago later in the day")]
    #[test_case(datetime!(2026-10-16 18:30 UTC), datetime!(2026-10-17 18:30 UTC) ; "other offset")]
    fn past_trigger_advances(requested: OffsetDateTime, expected: OffsetDateTime) {
        let at = next_occurrence(requested, NOW);
        assert_eq!(at, expected);
        assert!(at > NOW);
        assert!(at - NOW <= Duration::DAY);
    }

    #[test]
    fn advance_keeps_the_requested_offset() {
        // Requested in summer time, resolved after the clocks went back.
        let requested = datetime!(2026-10-20 07:30 +2);
        let now = datetime!(2026-10-26 09:00 +1);

        let at = next_occurrence(requested, now);

        assert_eq!(at, datetime!(2026-10-27 07:30 +2));
        assert_eq!(at.offset(), requested.offset());
    }

    #[test]
    fn default_timer_permits_exact_wakeups() {
        let store = fixture().store;
        let timer = Arc::new(ManualTimer::default());
        let scheduler = Scheduler::new(store, timer.clone(), Arc::new(FixedClock::new(NOW)));

        assert!(scheduler.schedule(datetime!(2026-10-17 07:30 +2)).is_ok());
        assert_eq!(timer.registrations(), 1);
    }

    #[test]
    fn future_trigger_kept() {
        let t = datetime!(2026-10-20 07:30 +2);
        assert_eq!(next_occurrence(t, NOW), t);
    }

    #[test]
    fn time_of_day_resolves_to_next_morning() {
        let f = fixture();
        let at = f.scheduler.schedule_time_of_day(time!(07:30)).unwrap();
        assert_eq!(at, datetime!(2026-10-17 07:30 +2));
    }

    #[test]
    fn requires_sound_and_code() {
        let store = Arc::new(ConfigStore::in_memory());
        let timer = Arc::new(ManualTimer::new());
        let scheduler = Scheduler::new(store.clone(), timer.clone(), Arc::new(FixedClock::new(NOW)));
        let t = datetime!(2026-10-17 07:30 +2);

        assert_eq!(
            scheduler.schedule(t),
            Err(ScheduleError::ConfigurationIncomplete(Missing::AudioSource))
        );

        store
            .update(ConfigUpdate {
                audio_source: Some(AudioSource::new("/sounds/a.ogg")),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            scheduler.schedule(t),
            Err(ScheduleError::ConfigurationIncomplete(Missing::DismissalSecret))
        );
        assert_eq!(timer.registrations(), 0);
        assert!(!store.read().enabled);
    }

    #[test]
    fn permission_required_registers_nothing() {
        let f = fixture();
        f.timer.set_permitted(false);

        assert_eq!(
            f.scheduler.schedule(datetime!(2026-10-17 07:30 +2)),
            Err(ScheduleError::PermissionRequired)
        );
        assert_eq!(f.timer.registrations(), 0);
        assert_eq!(f.store.read().trigger_time, None);
    }

    #[test]
    fn rejected_while_ringing() {
        let f = fixture();
        f.store.set_active(true);

        assert_eq!(
            f.scheduler.schedule(datetime!(2026-10-17 07:30 +2)),
            Err(ScheduleError::AlarmActive)
        );
        assert_eq!(f.timer.pending(), None);
    }

    #[test]
    fn cancel_clears_everything() {
        let f = fixture();
        f.scheduler.schedule(datetime!(2026-10-17 07:30 +2)).unwrap();

        f.scheduler.cancel();

        let config = f.store.read();
        assert_eq!(config.trigger_time, None);
        assert!(!config.enabled);
        assert_eq!(f.timer.pending(), None);

        // Nothing left to cancel.
        f.scheduler.cancel();
    }

    #[test]
    fn restore_reregisters_missed_alarm() {
        let f = fixture();
        f.store
            .update(ConfigUpdate {
                trigger_time: Some(datetime!(2026-10-16 07:30 +2)),
                enabled: Some(true),
                ..Default::default()
            })
            .unwrap();
        f.store.set_active(true);

        let at = f.scheduler.restore();

        assert_eq!(at, Some(datetime!(2026-10-17 07:30 +2)));
        assert_eq!(f.timer.pending(), at);
        let config = f.store.read();
        assert!(!config.active);
        assert_eq!(config.trigger_time, at);
    }

    #[test]
    fn restore_leaves_disabled_alarm_alone() {
        let f = fixture();
        f.store
            .update(ConfigUpdate {
                trigger_time: Some(datetime!(2026-10-17 07:30 +2)),
                enabled: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(f.scheduler.restore(), None);
        assert_eq!(f.timer.registrations(), 0);
    }
}
