pub mod booking;
pub mod conflict;
pub mod recurrence;
pub mod week_copy;

pub use booking::BookingService;
pub use conflict::{
    assess_therapist_slot, overlaps, room_conflicts, room_is_free, therapist_conflicts,
    ProposedSlot, SlotVerdict, THERAPIST_SLOT_CAPACITY,
};
pub use recurrence::{expand_weekly, RecurrenceService, MAX_OCCURRENCES};
pub use week_copy::WeekCopyService;
