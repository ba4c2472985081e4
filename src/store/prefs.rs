//! Typed accessors for non-credential app preferences

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{KeyValueStore, StoreError};

const LANGUAGE_KEY: &str = "language";
const EMAIL_KEY: &str = "email";
const FIRST_LAUNCH_KEY: &str = "firstLaunch";
const UNREAD_TOPIC_KEY: &str = "unreadTopicSign";
const EVENTS_ENABLED_KEY: &str = "eventsEnable";
const UNSEEN_TRIGGER_KEY: &str = "unseenTrigger";
const NOTIFICATIONS_OPENED_KEY: &str = "numberOfNotifications";
const FEEDBACK_SENT_KEY: &str = "feedbackSent";
// Key spelling is part of the persisted format.
const REGISTRATION_ATTEMPTS_KEY: &str = "registrationAttemts";
const RATE_PROMPT_COUNT_KEY: &str = "ratePromptCount";
const PUSH_DECLINE_COUNT_KEY: &str = "pushDeclineCount";
const LAST_ACTIVE_KEY: &str = "lastActiveDate";
const LAUNCH_DATE_KEY: &str = "launchDate";
const PUSH_NEXT_PROMPT_KEY: &str = "pushNextPromptDate";

/// Default UI language
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Usage counters tracked across launches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    NotificationsOpened,
    FeedbackSent,
    RegistrationAttempts,
    RatePrompts,
    PushDeclines,
}

impl Counter {
    fn key(&self) -> &'static str {
        match self {
            Counter::NotificationsOpened => NOTIFICATIONS_OPENED_KEY,
            Counter::FeedbackSent => FEEDBACK_SENT_KEY,
            Counter::RegistrationAttempts => REGISTRATION_ATTEMPTS_KEY,
            Counter::RatePrompts => RATE_PROMPT_COUNT_KEY,
            Counter::PushDeclines => PUSH_DECLINE_COUNT_KEY,
        }
    }
}

/// Boolean flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    UnreadTopic,
    EventsEnabled,
    UnseenTrigger,
}

impl Flag {
    fn key(&self) -> &'static str {
        match self {
            Flag::UnreadTopic => UNREAD_TOPIC_KEY,
            Flag::EventsEnabled => EVENTS_ENABLED_KEY,
            Flag::UnseenTrigger => UNSEEN_TRIGGER_KEY,
        }
    }
}

/// Timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    LastActive,
    Launch,
    PushNextPrompt,
}

impl Moment {
    fn key(&self) -> &'static str {
        match self {
            Moment::LastActive => LAST_ACTIVE_KEY,
            Moment::Launch => LAUNCH_DATE_KEY,
            Moment::PushNextPrompt => PUSH_NEXT_PROMPT_KEY,
        }
    }
}

/// App preferences stored next to the credentials
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn language(&self) -> Result<String, StoreError> {
        Ok(self
            .store
            .get(LANGUAGE_KEY)?
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()))
    }

    pub fn set_language(&self, language: &str) -> Result<(), StoreError> {
        self.store.set(LANGUAGE_KEY, language)
    }

    pub fn email(&self) -> Result<String, StoreError> {
        Ok(self.store.get(EMAIL_KEY)?.unwrap_or_default())
    }

    pub fn set_email(&self, email: &str) -> Result<(), StoreError> {
        self.store.set(EMAIL_KEY, email)
    }

    /// True until explicitly cleared
    pub fn first_launch(&self) -> Result<bool, StoreError> {
        Ok(self.read_bool(FIRST_LAUNCH_KEY)?.unwrap_or(true))
    }

    pub fn set_first_launch(&self, value: bool) -> Result<(), StoreError> {
        self.store.set(FIRST_LAUNCH_KEY, bool_str(value))
    }

    pub fn flag(&self, flag: Flag) -> Result<bool, StoreError> {
        Ok(self.read_bool(flag.key())?.unwrap_or(false))
    }

    pub fn set_flag(&self, flag: Flag, value: bool) -> Result<(), StoreError> {
        self.store.set(flag.key(), bool_str(value))
    }

    pub fn counter(&self, counter: Counter) -> Result<i64, StoreError> {
        let key = counter.key();
        match self.store.get(key)? {
            None => Ok(0),
            Some(raw) => raw.parse().map_err(|e| StoreError::InvalidValue {
                key: key.to_string(),
                reason: format!("{e}"),
            }),
        }
    }

    pub fn set_counter(&self, counter: Counter, value: i64) -> Result<(), StoreError> {
        self.store.set(counter.key(), &value.to_string())
    }

    /// Add one to a counter and return the new value
    pub fn increment(&self, counter: Counter) -> Result<i64, StoreError> {
        let next = self.counter(counter)?.saturating_add(1);
        self.set_counter(counter, next)?;
        Ok(next)
    }

    pub fn moment(&self, moment: Moment) -> Result<Option<DateTime<Utc>>, StoreError> {
        let key = moment.key();
        match self.store.get(key)? {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| StoreError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("{e}"),
                }),
        }
    }

    pub fn set_moment(
        &self,
        moment: Moment,
        value: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        match value {
            Some(dt) => self.store.set(moment.key(), &dt.to_rfc3339()),
            None => self.store.remove(moment.key()),
        }
    }

    fn read_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        match self.store.get(key)?.as_deref() {
            None => Ok(None),
            Some("true") | Some("1") => Ok(Some(true)),
            Some("false") | Some("0") => Ok(Some(false)),
            Some(other) => Err(StoreError::InvalidValue {
                key: key.to_string(),
                reason: format!("not a boolean: {other}"),
            }),
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn prefs() -> Preferences {
        Preferences::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_defaults() {
        let prefs = prefs();
        assert_eq!(prefs.language().unwrap(), "ru");
        assert!(prefs.first_launch().unwrap());
        assert!(!prefs.flag(Flag::EventsEnabled).unwrap());
        assert_eq!(prefs.counter(Counter::FeedbackSent).unwrap(), 0);
        assert_eq!(prefs.moment(Moment::Launch).unwrap(), None);
    }

    #[test]
    fn test_counters_increment() {
        let prefs = prefs();
        assert_eq!(prefs.increment(Counter::RatePrompts).unwrap(), 1);
        assert_eq!(prefs.increment(Counter::RatePrompts).unwrap(), 2);
        assert_eq!(prefs.counter(Counter::PushDeclines).unwrap(), 0);
    }

    #[test]
    fn test_moment_round_trip_and_clear() {
        let prefs = prefs();
        let when = DateTime::parse_from_rfc3339("2026-01-21T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        prefs.set_moment(Moment::LastActive, Some(when)).unwrap();
        assert_eq!(prefs.moment(Moment::LastActive).unwrap(), Some(when));

        prefs.set_moment(Moment::LastActive, None).unwrap();
        assert_eq!(prefs.moment(Moment::LastActive).unwrap(), None);
    }

    #[test]
    fn test_garbage_counter_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        store.set(FEEDBACK_SENT_KEY, "lots").unwrap();
        let prefs = Preferences::new(store);

        let err = prefs.counter(Counter::FeedbackSent).unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));
    }

    #[test]
    fn test_first_launch_can_be_cleared() {
        let prefs = prefs();
        prefs.set_first_launch(false).unwrap();
        assert!(!prefs.first_launch().unwrap());
    }
}
