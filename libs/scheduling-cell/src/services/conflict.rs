// libs/scheduling-cell/src/services/conflict.rs
//
// Pure interval arithmetic and the clinic's asymmetric capacity policy.
// Every booking entry point (single, recurring, week copy, reschedule)
// goes through these functions; nothing here touches the store.

use chrono::{NaiveTime, Timelike};
use uuid::Uuid;

use crate::models::{Appointment, DEFAULT_DURATION_MINUTES};

/// How many non-cancelled bookings a therapist slot may hold at once.
/// The second booking is the clinic's "dual session" rule.
pub const THERAPIST_SLOT_CAPACITY: usize = 2;

/// Verdict for a proposed therapist slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotVerdict {
    /// No overlapping booking; accept silently.
    Free,
    /// Exactly one overlapping booking; accept, but tell the caller who
    /// shares the slot and when that session ends.
    DualWarning { with_patient: String, until: String },
    /// Capacity reached; the booking must be rejected.
    Full { count: usize },
}

impl SlotVerdict {
    pub fn is_blocking(&self) -> bool {
        matches!(self, SlotVerdict::Full { .. })
    }

    pub fn warning(&self) -> Option<String> {
        match self {
            SlotVerdict::DualWarning { with_patient, until } => Some(format!(
                "Dual session: slot shared with {} until {}",
                with_patient, until
            )),
            _ => None,
        }
    }
}

/// A booking window proposed for conflict evaluation, detached from any
/// persisted row so edits can be checked before they are written.
#[derive(Debug, Clone)]
pub struct ProposedSlot {
    /// Existing appointment id when validating an edit; always excluded
    /// from the comparison set.
    pub exclude_id: Option<Uuid>,
    pub therapist_id: Uuid,
    pub room_id: Option<Uuid>,
    pub date: chrono::NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: Option<i32>,
}

impl ProposedSlot {
    pub fn effective_duration(&self) -> i32 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    fn start_minute(&self) -> i32 {
        (self.time.hour() * 60 + self.time.minute()) as i32
    }

    fn end_minute(&self) -> i32 {
        (self.start_minute() + self.effective_duration().max(0)).min(24 * 60)
    }
}

/// Half-open overlap test on same-day minute windows:
/// `[start, start+duration)`: a session ending exactly when another
/// starts does not overlap. Windows running past midnight are clamped
/// to end of day.
pub fn overlaps(start_a: NaiveTime, dur_a: i32, start_b: NaiveTime, dur_b: i32) -> bool {
    let a_start = (start_a.hour() * 60 + start_a.minute()) as i32;
    let b_start = (start_b.hour() * 60 + start_b.minute()) as i32;
    let a_end = (a_start + dur_a.max(0)).min(24 * 60);
    let b_end = (b_start + dur_b.max(0)).min(24 * 60);

    a_start < b_end && a_end > b_start
}

fn window_overlaps(proposed: &ProposedSlot, existing: &Appointment) -> bool {
    proposed.start_minute() < existing.end_minute()
        && proposed.end_minute() > existing.start_minute()
}

fn is_candidate(proposed: &ProposedSlot, existing: &Appointment) -> bool {
    existing.date == proposed.date
        && existing.counts_for_capacity()
        && Some(existing.id) != proposed.exclude_id
        && window_overlaps(proposed, existing)
}

/// Existing bookings of the same therapist whose windows overlap the
/// proposal. Cancelled rows and the proposal's own id are ignored.
pub fn therapist_conflicts<'a>(
    proposed: &ProposedSlot,
    existing: &'a [Appointment],
) -> Vec<&'a Appointment> {
    existing
        .iter()
        .filter(|appt| appt.therapist_id == proposed.therapist_id && is_candidate(proposed, appt))
        .collect()
}

/// Existing bookings occupying the same room window, independent of
/// therapist. Empty when the proposal has no room.
pub fn room_conflicts<'a>(
    proposed: &ProposedSlot,
    existing: &'a [Appointment],
) -> Vec<&'a Appointment> {
    let Some(room_id) = proposed.room_id else {
        return Vec::new();
    };

    existing
        .iter()
        .filter(|appt| appt.room_id == Some(room_id) && is_candidate(proposed, appt))
        .collect()
}

/// Apply the dual-capacity policy to a proposed therapist slot. The slot
/// is full once [`THERAPIST_SLOT_CAPACITY`] overlapping bookings exist.
pub fn assess_therapist_slot(proposed: &ProposedSlot, existing: &[Appointment]) -> SlotVerdict {
    let conflicts = therapist_conflicts(proposed, existing);

    match conflicts.len() {
        0 => SlotVerdict::Free,
        count if count >= THERAPIST_SLOT_CAPACITY => SlotVerdict::Full { count },
        _ => SlotVerdict::DualWarning {
            with_patient: conflicts[0].patient_name.clone(),
            until: conflicts[0].end_label(),
        },
    }
}

/// The room rule is always hard-blocking, even where the therapist rule
/// would tolerate a second booking.
pub fn room_is_free(proposed: &ProposedSlot, existing: &[Appointment]) -> bool {
    room_conflicts(proposed, existing).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
    }

    fn appointment(
        therapist_id: Uuid,
        room_id: Option<Uuid>,
        time: NaiveTime,
        duration: i32,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: None,
            patient_name: "Maria Costa".to_string(),
            date: day(),
            time,
            duration_minutes: duration,
            therapist_id,
            room_id,
            status,
            is_first_session: false,
            repeat_weekly: false,
            repeat_until: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn proposal(therapist_id: Uuid, room_id: Option<Uuid>, time: NaiveTime) -> ProposedSlot {
        ProposedSlot {
            exclude_id: None,
            therapist_id,
            room_id,
            date: day(),
            time,
            duration_minutes: Some(60),
        }
    }

    #[test]
    fn half_open_boundary() {
        assert!(overlaps(t(10, 0), 30, t(10, 29), 30));
        assert!(!overlaps(t(10, 0), 30, t(10, 30), 30));
        assert!(!overlaps(t(10, 30), 30, t(10, 0), 30));
        assert!(overlaps(t(9, 0), 120, t(10, 0), 30));
    }

    #[test]
    fn free_slot_accepts_silently() {
        let therapist = Uuid::new_v4();
        let existing = vec![appointment(
            therapist,
            None,
            t(8, 0),
            60,
            AppointmentStatus::Confirmed,
        )];

        let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 0)), &existing);
        assert_eq!(verdict, SlotVerdict::Free);
    }

    #[test]
    fn one_overlap_warns_with_patient_and_end_time() {
        let therapist = Uuid::new_v4();
        let existing = vec![appointment(
            therapist,
            None,
            t(10, 0),
            90,
            AppointmentStatus::Scheduled,
        )];

        let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 30)), &existing);
        match verdict {
            SlotVerdict::DualWarning { with_patient, until } => {
                assert_eq!(with_patient, "Maria Costa");
                assert_eq!(until, "11:30");
            }
            other => panic!("expected dual warning, got {:?}", other),
        }
    }

    #[test]
    fn two_overlaps_fill_the_slot() {
        let therapist = Uuid::new_v4();
        let existing = vec![
            appointment(therapist, None, t(10, 0), 60, AppointmentStatus::Scheduled),
            appointment(therapist, None, t(10, 15), 60, AppointmentStatus::Confirmed),
        ];

        let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 30)), &existing);
        assert!(verdict.is_blocking());
    }

    #[test]
    fn slot_fills_exactly_at_capacity() {
        let therapist = Uuid::new_v4();
        let mut existing = Vec::new();

        for n in 1..=THERAPIST_SLOT_CAPACITY {
            existing.push(appointment(
                therapist,
                None,
                t(10, 0),
                60,
                AppointmentStatus::Scheduled,
            ));
            let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 0)), &existing);
            assert_eq!(verdict.is_blocking(), n >= THERAPIST_SLOT_CAPACITY);
        }
    }

    #[test]
    fn cancelled_bookings_do_not_count() {
        let therapist = Uuid::new_v4();
        let existing = vec![
            appointment(therapist, None, t(10, 0), 60, AppointmentStatus::Cancelled),
            appointment(therapist, None, t(10, 0), 60, AppointmentStatus::Cancelled),
        ];

        let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 0)), &existing);
        assert_eq!(verdict, SlotVerdict::Free);
    }

    #[test]
    fn blocked_bookings_count_like_normal_ones() {
        let therapist = Uuid::new_v4();
        let existing = vec![
            appointment(therapist, None, t(10, 0), 60, AppointmentStatus::Blocked),
            appointment(therapist, None, t(10, 0), 60, AppointmentStatus::Scheduled),
        ];

        let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 0)), &existing);
        assert!(verdict.is_blocking());
    }

    #[test]
    fn own_id_is_excluded_when_editing() {
        let therapist = Uuid::new_v4();
        let existing = vec![appointment(
            therapist,
            None,
            t(10, 0),
            60,
            AppointmentStatus::Scheduled,
        )];

        let mut edit = proposal(therapist, None, t(10, 0));
        edit.exclude_id = Some(existing[0].id);

        assert_eq!(assess_therapist_slot(&edit, &existing), SlotVerdict::Free);
    }

    #[test]
    fn other_therapists_never_conflict() {
        let therapist = Uuid::new_v4();
        let existing = vec![appointment(
            Uuid::new_v4(),
            None,
            t(10, 0),
            60,
            AppointmentStatus::Scheduled,
        )];

        let verdict = assess_therapist_slot(&proposal(therapist, None, t(10, 0)), &existing);
        assert_eq!(verdict, SlotVerdict::Free);
    }

    #[test]
    fn room_rule_blocks_at_one_overlap() {
        let room = Uuid::new_v4();
        // Different therapists, same room: the room rule is therapist-independent.
        let existing = vec![appointment(
            Uuid::new_v4(),
            Some(room),
            t(10, 0),
            60,
            AppointmentStatus::Scheduled,
        )];

        assert!(!room_is_free(
            &proposal(Uuid::new_v4(), Some(room), t(10, 30)),
            &existing
        ));
        // Back-to-back occupancy is allowed.
        assert!(room_is_free(
            &proposal(Uuid::new_v4(), Some(room), t(11, 0)),
            &existing
        ));
    }

    #[test]
    fn no_room_means_no_room_conflicts() {
        let existing = vec![appointment(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            t(10, 0),
            60,
            AppointmentStatus::Scheduled,
        )];

        assert!(room_is_free(
            &proposal(Uuid::new_v4(), None, t(10, 0)),
            &existing
        ));
    }
}
