// libs/schedule-cell/src/services/slots.rs
use crate::models::{format_hhmm, parse_hhmm, ScheduleError, Shift};

/// Lazy sequence of slot start times within one shift. A slot is emitted only
/// if the whole slot fits before the shift end; a start whose slot would
/// overrun is excluded.
#[derive(Debug, Clone)]
pub struct SlotIter {
    next_start: u32,
    end: u32,
    step: u32,
}

impl Iterator for SlotIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next_start + self.step > self.end {
            return None;
        }
        let slot = format_hhmm(self.next_start);
        self.next_start += self.step;
        Some(slot)
    }
}

/// Subdivide a shift into slot start times. Restartable: call again for a
/// fresh iterator. A shift shorter than one slot yields an empty sequence,
/// not an error.
pub fn shift_slots(shift: &Shift, slot_duration_minutes: i32) -> Result<SlotIter, ScheduleError> {
    let start = parse_hhmm(&shift.start_time)?;
    let end = parse_hhmm(&shift.end_time)?;

    Ok(SlotIter {
        next_start: start,
        end,
        step: slot_duration_minutes as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(start: &str, end: &str, duration: i32) -> Vec<String> {
        shift_slots(&Shift::new(start, end), duration)
            .unwrap()
            .collect()
    }

    #[test]
    fn morning_shift_with_half_hour_slots() {
        assert_eq!(
            collect("09:00", "12:00", 30),
            vec!["09:00", "09:30", "10:00", "10:30", "11:00", "11:30"]
        );
    }

    #[test]
    fn never_emits_a_slot_that_overruns_the_shift() {
        // 50-minute span, 20-minute slots: 09:40 would end at 10:00, past
        // the shift end, so the last fitting start is 09:20.
        assert_eq!(collect("09:00", "09:50", 20), vec!["09:00", "09:20"]);

        for duration in [7, 13, 25, 45] {
            let end = parse_hhmm("17:00").unwrap();
            for slot in collect("08:00", "17:00", duration) {
                let start = parse_hhmm(&slot).unwrap();
                assert!(
                    start + duration as u32 <= end,
                    "slot {slot} overruns with duration {duration}"
                );
            }
        }
    }

    #[test]
    fn shift_shorter_than_one_slot_is_empty() {
        assert!(collect("09:00", "09:20", 30).is_empty());
    }

    #[test]
    fn exact_fit_includes_final_slot() {
        assert_eq!(collect("09:00", "10:00", 30), vec!["09:00", "09:30"]);
    }

    #[test]
    fn iterator_is_restartable() {
        let shift = Shift::new("10:00", "11:00");
        let first: Vec<_> = shift_slots(&shift, 20).unwrap().collect();
        let second: Vec<_> = shift_slots(&shift, 20).unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["10:00", "10:20", "10:40"]);
    }

    #[test]
    fn malformed_shift_times_error() {
        assert!(shift_slots(&Shift::new("9:00", "12:00"), 30).is_err());
        assert!(shift_slots(&Shift::new("09:00", "25:00"), 30).is_err());
    }
}
