//! Voice allocation.
//!
//! Sounds carry a priority (larger wins). A request first scans for a free
//! voice among the candidates; if none is free it may instead take over the
//! lowest-priority busy voice whose priority does not exceed the incoming
//! sound's. Reserved voices (MP3 output) are never candidates.

use log::debug;

use crate::shared::VoiceSlot;

/// Pick a voice for a sound of the given priority.
///
/// `voices` are the candidate slots in channel order. Returns the chosen
/// index, or `None` when every candidate is busy with higher-priority work.
/// Of several free voices the highest-numbered wins; of several equally
/// evictable voices the lowest-numbered wins.
pub fn allocate_voice(voices: &[VoiceSlot], priority: u8) -> Option<usize> {
    let mut free = None;
    let mut victim: Option<(usize, u8)> = None;

    for (i, slot) in voices.iter().enumerate() {
        if slot.reserved {
            continue;
        }
        if !slot.busy {
            free = Some(i);
            continue;
        }
        let evictable = slot.sound.priority <= priority;
        if evictable {
            match victim {
                Some((_, p)) if p <= slot.sound.priority => {}
                _ => victim = Some((i, slot.sound.priority)),
            }
        }
    }

    if let Some(i) = free {
        return Some(i);
    }
    match victim {
        Some((i, p)) => {
            debug!("voice {i}: evicting priority {p} for priority {priority}");
            Some(i)
        }
        None => {
            debug!("no voice for priority {priority}: all busy and higher");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::NUM_VOICES;

    fn board() -> Vec<VoiceSlot> {
        (0..NUM_VOICES).map(|_| VoiceSlot::default()).collect()
    }

    fn occupy(slot: &mut VoiceSlot, priority: u8) {
        slot.busy = true;
        slot.sound.priority = priority;
    }

    #[test]
    fn test_free_scan_prefers_highest_index() {
        let voices = board();
        assert_eq!(allocate_voice(&voices, 0), Some(NUM_VOICES - 1));
    }

    #[test]
    fn test_reserved_voices_are_skipped() {
        let mut voices = board();
        voices[NUM_VOICES - 1].reserved = true;
        voices[NUM_VOICES - 2].reserved = true;
        assert_eq!(allocate_voice(&voices, 0), Some(NUM_VOICES - 3));
    }

    #[test]
    fn test_full_board_evicts_lowest_priority() {
        let mut voices = board();
        for (i, slot) in voices.iter_mut().enumerate() {
            occupy(slot, 10 + i as u8);
        }
        occupy(&mut voices[5], 3);
        assert_eq!(allocate_voice(&voices, 50), Some(5));
    }

    #[test]
    fn test_low_priority_request_is_refused() {
        let mut voices = board();
        for slot in voices.iter_mut() {
            occupy(slot, 9);
        }
        assert_eq!(allocate_voice(&voices, 8), None);
    }

    #[test]
    fn test_equal_priority_may_evict() {
        let mut voices = board();
        for slot in voices.iter_mut() {
            occupy(slot, 7);
        }
        assert_eq!(allocate_voice(&voices, 7), Some(0));
    }

    #[test]
    fn test_free_voice_beats_eviction() {
        let mut voices = board();
        for slot in voices.iter_mut() {
            occupy(slot, 0);
        }
        voices[2].busy = false;
        assert_eq!(allocate_voice(&voices, 100), Some(2));
    }
}
