use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::format::{fmt_time, hhmm};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "weekday" => Some(DayType::Weekday),
            "weekend" => Some(DayType::Weekend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingTimeRule {
    pub id: i64,
    pub day_type: DayType,
    pub rule_name: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_blocked: bool,
    pub description: Option<String>,
}

impl BookingTimeRule {
    /// Windows are half-open: `[start, end)`.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start_time <= t && t < self.end_time
    }
}

/// A rule as submitted by an administrator, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub day_type: DayType,
    pub rule_name: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl RuleDraft {
    /// Checks the draft against the other rules of its day type. `replacing` is the id
    /// of the rule being edited, which must not count as an overlap with itself.
    pub fn validate(&self, existing: &[BookingTimeRule], replacing: Option<i64>) -> Result<(), String> {
        if self.rule_name.trim().is_empty() {
            return Err("rule_name is required".to_string());
        }
        if self.start_time >= self.end_time {
            return Err(format!(
                "start_time {} must be before end_time {}",
                fmt_time(&self.start_time),
                fmt_time(&self.end_time)
            ));
        }

        let clash = existing.iter().find(|r| {
            r.day_type == self.day_type
                && Some(r.id) != replacing
                && r.start_time < self.end_time
                && self.start_time < r.end_time
        });
        if let Some(r) = clash {
            return Err(format!(
                "window {}-{} overlaps {} rule '{}' ({}-{})",
                fmt_time(&self.start_time),
                fmt_time(&self.end_time),
                r.day_type.as_str(),
                r.rule_name,
                fmt_time(&r.start_time),
                fmt_time(&r.end_time)
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotVerdict {
    Blocked { rule_name: String },
    OutsideHours { hours: String },
    RequiresApproval { rule_name: String },
    FreelyBookable { rule_name: String },
}

impl SlotVerdict {
    pub fn requires_approval(&self) -> bool {
        matches!(self, SlotVerdict::RequiresApproval { .. })
    }
}

/// Resolve a requested time against one day type's rules. Windows starting before
/// `approval_cutoff` need a human to sign off.
pub fn classify(rules: &[BookingTimeRule], t: NaiveTime, approval_cutoff: NaiveTime) -> SlotVerdict {
    match rules.iter().find(|r| r.contains(t)) {
        None => SlotVerdict::OutsideHours {
            hours: to_human_readable(rules),
        },
        Some(rule) if rule.is_blocked => SlotVerdict::Blocked {
            rule_name: rule.rule_name.clone(),
        },
        Some(rule) if rule.start_time < approval_cutoff => SlotVerdict::RequiresApproval {
            rule_name: rule.rule_name.clone(),
        },
        Some(rule) => SlotVerdict::FreelyBookable {
            rule_name: rule.rule_name.clone(),
        },
    }
}

pub fn to_human_readable(rules: &[BookingTimeRule]) -> String {
    let mut open: Vec<&BookingTimeRule> = rules.iter().filter(|r| !r.is_blocked).collect();
    open.sort_by_key(|r| r.start_time);

    open.iter()
        .map(|r| format!("{}-{}", fmt_time(&r.start_time), fmt_time(&r.end_time)))
        .collect::<Vec<_>>()
        .join(", ")
}
