use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::ReviewOrder;

/// Aggregate learning progress. One record per owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Progress {
    #[serde(default)]
    pub total_study_minutes: u32,
    #[serde(default)]
    pub current_streak_days: u32,
    #[serde(default)]
    pub longest_streak_days: u32,
    #[serde(default)]
    pub lessons_completed: u32,
    #[serde(default)]
    pub cards_reviewed: u32,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// A progress record with no recorded activity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Combine two independent progress histories.
    ///
    /// Study time and counters add up, streaks keep the higher value, and the
    /// latest activity timestamp wins.
    #[must_use]
    pub fn combined_with(&self, other: &Self) -> Self {
        Self {
            total_study_minutes: self
                .total_study_minutes
                .saturating_add(other.total_study_minutes),
            current_streak_days: self.current_streak_days.max(other.current_streak_days),
            longest_streak_days: self.longest_streak_days.max(other.longest_streak_days),
            lessons_completed: self.lessons_completed.saturating_add(other.lessons_completed),
            cards_reviewed: self.cards_reviewed.saturating_add(other.cards_reviewed),
            last_active_at: self.last_active_at.max(other.last_active_at),
        }
    }
}

const fn default_daily_goal() -> u32 {
    15
}

fn default_theme() -> String {
    "system".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

const fn default_notifications() -> bool {
    true
}

/// Learner preferences. One record per owner.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default = "default_daily_goal")]
    pub daily_goal_minutes: u32,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_notifications")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub review_order: ReviewOrder,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            daily_goal_minutes: default_daily_goal(),
            theme: default_theme(),
            language: default_language(),
            notifications_enabled: default_notifications(),
            review_order: ReviewOrder::default(),
        }
    }
}

impl Preferences {
    /// Preferences never changed from the defaults.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn combined_progress_adds_counters_and_keeps_best_streak() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap();
        let a = Progress {
            total_study_minutes: 40,
            current_streak_days: 2,
            longest_streak_days: 9,
            lessons_completed: 3,
            cards_reviewed: 20,
            last_active_at: Some(early),
        };
        let b = Progress {
            total_study_minutes: 15,
            current_streak_days: 4,
            longest_streak_days: 4,
            lessons_completed: 1,
            cards_reviewed: 5,
            last_active_at: Some(late),
        };

        let combined = a.combined_with(&b);
        assert_eq!(combined.total_study_minutes, 55);
        assert_eq!(combined.current_streak_days, 4);
        assert_eq!(combined.longest_streak_days, 9);
        assert_eq!(combined.lessons_completed, 4);
        assert_eq!(combined.cards_reviewed, 25);
        assert_eq!(combined.last_active_at, Some(late));
        assert_eq!(combined, b.combined_with(&a));
    }

    #[test]
    fn empty_detection() {
        assert!(Progress::default().is_empty());
        assert!(Preferences::default().is_default());
        let prefs = Preferences {
            theme: "dark".into(),
            ..Preferences::default()
        };
        assert!(!prefs.is_default());
    }

    #[test]
    fn preferences_fill_missing_fields_with_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(prefs.theme, "dark");
        assert_eq!(prefs.daily_goal_minutes, 15);
        assert!(prefs.notifications_enabled);
    }
}
