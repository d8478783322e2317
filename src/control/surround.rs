//! Surround pan model.
//!
//! In surround mode every sound runs on two hardware voices: the primary
//! voice hard-left and a delayed mirror hard-right. Stereo position comes
//! from a volume difference between the two rather than from the hardware
//! pan register, so the short delay on the mirror widens the image without
//! moving it.

/// Right shift applied to the centred pan before scaling. Larger values
/// flatten the pan curve.
pub const PANNING_SHIFT: u8 = 1;

/// Divisor normalizing the pan-scaled volume back into register range.
pub const VOLUME_NORMALIZE: i32 = 64;

/// Default playback volume for sounds started without explicit settings.
/// Headroom below the register maximum keeps the mirror from clipping.
pub const BASE_VOLUME: u8 = 112;

/// Volume pair for the two voices of one surround sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurroundVolumes {
    /// Volume of the primary (left-panned) voice.
    pub primary: u8,
    /// Volume of the delayed mirror (right-panned) voice.
    pub mirror: u8,
}

/// Split `volume` across the primary and mirror voices according to `pan`
/// (0 left, 64 centre, 127 right).
///
/// At centre both voices carry the full volume; panning left attenuates the
/// mirror and boosts the primary, panning right does the reverse. Both
/// results clamp to the register range.
pub fn surround_volumes(volume: u8, pan: u8) -> SurroundVolumes {
    let difference = (((pan as i32 - 64) >> PANNING_SHIFT) * volume as i32) / VOLUME_NORMALIZE;
    SurroundVolumes {
        primary: (volume as i32 - difference).clamp(0, 127) as u8,
        mirror: (volume as i32 + difference).clamp(0, 127) as u8,
    }
}
