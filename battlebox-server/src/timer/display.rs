//! Countdown Display
//!
//! What a participant's timer display shows. Rendering is up to the messaging
//! collaborator; this module only decides the content and urgency tier.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Urgency tier of a running countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// 11 seconds or more.
    Normal,
    /// 4 to 10 seconds.
    Warning,
    /// 3 seconds or fewer.
    Critical,
}

impl Urgency {
    /// Tier for a remaining duration.
    pub fn for_remaining(seconds: u32) -> Urgency {
        match seconds {
            0..=3 => Urgency::Critical,
            4..=10 => Urgency::Warning,
            _ => Urgency::Normal,
        }
    }
}

/// Display state pushed to an audience member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayUpdate {
    /// Countdown still running.
    Countdown {
        /// Timer title.
        label: String,
        /// Seconds left.
        remaining: u32,
        /// Color tier.
        urgency: Urgency,
    },
    /// Countdown reached zero.
    Complete {
        /// Timer title.
        label: String,
    },
    /// Remove the display.
    Clear,
}

impl DisplayUpdate {
    /// Running countdown state.
    pub fn countdown(label: &str, remaining: u32) -> Self {
        DisplayUpdate::Countdown {
            label: label.to_string(),
            remaining,
            urgency: Urgency::for_remaining(remaining),
        }
    }

    /// Terminal state.
    pub fn complete(label: &str) -> Self {
        DisplayUpdate::Complete { label: label.to_string() }
    }

    /// Text lines for a sidebar-style display. Empty for `Clear`.
    pub fn lines(&self) -> Vec<String> {
        match self {
            DisplayUpdate::Countdown { label, remaining, .. } => {
                vec![label.clone(), format!("Time: {}", format_clock(*remaining))]
            }
            DisplayUpdate::Complete { label } => vec![label.clone(), "Time: 0".to_string()],
            DisplayUpdate::Clear => Vec::new(),
        }
    }
}

impl fmt::Display for DisplayUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join(" | "))
    }
}

/// Seconds as `m:ss` from one minute up, plain seconds below.
pub fn format_clock(seconds: u32) -> String {
    if seconds >= 60 {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        seconds.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_tiers() {
        assert_eq!(Urgency::for_remaining(120), Urgency::Normal);
        assert_eq!(Urgency::for_remaining(11), Urgency::Normal);
        assert_eq!(Urgency::for_remaining(10), Urgency::Warning);
        assert_eq!(Urgency::for_remaining(4), Urgency::Warning);
        assert_eq!(Urgency::for_remaining(3), Urgency::Critical);
        assert_eq!(Urgency::for_remaining(1), Urgency::Critical);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(120), "2:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(59), "59");
    }

    #[test]
    fn test_lines() {
        let update = DisplayUpdate::countdown("BATTLE BOX", 90);
        assert_eq!(update.lines(), vec!["BATTLE BOX".to_string(), "Time: 1:30".to_string()]);
        assert!(DisplayUpdate::Clear.lines().is_empty());
    }
}
