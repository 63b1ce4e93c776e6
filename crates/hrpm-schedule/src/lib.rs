//! # hrpm-schedule
//!
//! Bookable meeting slots and the meeting approval workflow.
//!
//! An approver publishes recurring weekly [`AvailabilityRule`]s and carves
//! dated [`UnavailabilityException`]s out of them. [`compute_slots`] turns
//! both into 30-minute bookable slots for a date. A [`Meeting`] moves
//! `pending → approved → {completed, cancelled}` or `pending → {rejected,
//! cancelled}`; [`SchedulingService`] keeps meetings and availability in
//! step, so an approved meeting's interval is never offered again until the
//! meeting is cancelled.
//!
//! Days of the week are numbered 0 (Sunday) to 6 (Saturday). Dates and clock
//! times are UTC.

pub mod availability;
pub mod booking;
pub mod error;
pub mod interval;
pub mod meeting;
pub mod store;

pub use availability::{
    compute_slots, day_of_week, AvailabilityEngine, AvailabilityRule, UnavailabilityException,
};
pub use booking::{MeetingFilter, SchedulingService};
pub use error::ScheduleError;
pub use interval::{covers, generate_slots, ClockTime, TimeInterval, SLOT_MINUTES};
pub use meeting::{
    JoinStatus, Meeting, MeetingRequest, MeetingStatus, DEFAULT_JOIN_LEAD_MINUTES,
};
pub use store::{
    JsonScheduleStore, MemoryScheduleStore, ScheduleBatch, ScheduleDocument, ScheduleOp,
    ScheduleStore,
};
