//! Per-agent pseudo-random numbers.
//!
//! Each agent carries its own 32-bit xorshift state, so one agent's draws
//! never perturb another's and a run is reproducible from its seeds.

use crate::math::Fixed;

/// Replacement for a zero state, which xorshift would never leave.
pub const ZERO_SEED_REPLACEMENT: u32 = 0xA3C5_9AC3;

/// Advance a xorshift32 state and return the new value.
pub fn next_u32(state: &mut u32) -> u32 {
    let mut s = *state;
    if s == 0 {
        s = ZERO_SEED_REPLACEMENT;
    }
    s ^= s << 13;
    s ^= s >> 17;
    s ^= s << 5;
    *state = s;
    s
}

/// Uniform draw in `[0, 1)` with 24 bits of resolution.
pub fn next_unit(state: &mut u32) -> Fixed {
    let bits = next_u32(state) & 0x00FF_FFFF;
    // bits / 2^24, expressed directly in I32F32 raw bits.
    Fixed::from_bits(i64::from(bits) << 8)
}

/// Uniform draw in `[min, max)`.
pub fn next_range(state: &mut u32, min: Fixed, max: Fixed) -> Fixed {
    min + next_unit(state) * (max - min)
}

/// Spawn seed derived from an entity slot, used when no seed is supplied.
#[must_use]
pub fn seed_for_index(index: u32) -> u32 {
    let seed = index.wrapping_add(1).wrapping_mul(0x9E37_79B9) ^ ZERO_SEED_REPLACEMENT;
    if seed == 0 {
        ZERO_SEED_REPLACEMENT
    } else {
        seed
    }
}
