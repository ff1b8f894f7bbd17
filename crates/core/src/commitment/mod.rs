mod reminders;
pub use reminders::{DueReminder, ReminderEngine};
