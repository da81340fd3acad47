pub mod blocked_date;
pub mod booking;
pub mod calendar;
pub mod dog;
pub mod format;
pub mod settings;
pub mod time_rule;
pub mod user;

pub use blocked_date::{BlockedDate, CascadeReport};
pub use booking::{ApprovalStatus, Booking, BookingFilter, BookingStatus, NewBooking};
pub use calendar::{CalendarDay, CalendarMonth};
pub use dog::Dog;
pub use settings::{BookingSettings, SystemSetting};
pub use time_rule::{BookingTimeRule, DayType, RuleDraft, SlotVerdict};
pub use user::{ExperienceLevel, Principal, User};
