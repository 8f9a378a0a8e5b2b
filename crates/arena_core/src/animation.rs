//! Animation state driver.
//!
//! The renderer samples [`Sprite`] read-only. The AI core selects clips via
//! the `enter_*` functions and advances playback with [`animation_system`].
//! A non-looping clip that reaches its last frame clears `playing`, which is
//! the "attack finished" signal the combat state machine waits for.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, fixed_serde, Fixed};

/// Default seconds per frame for generated clips.
pub const DEFAULT_FRAME_TIME: Fixed = Fixed::from_bits(429_496_730); // 0.1

/// A sequence of texture identifiers played at a fixed rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationClip {
    /// Texture identifiers, one per frame.
    #[serde(default)]
    pub frames: Vec<String>,
    /// Seconds per frame.
    #[serde(with = "fixed_decimal", default = "default_frame_time")]
    pub frame_time: Fixed,
}

const fn default_frame_time() -> Fixed {
    DEFAULT_FRAME_TIME
}

impl Default for AnimationClip {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            frame_time: DEFAULT_FRAME_TIME,
        }
    }
}

impl AnimationClip {
    /// Clip named `{prefix}_{i}` for `i` in `0..count`.
    #[must_use]
    pub fn numbered(prefix: &str, count: usize) -> Self {
        Self {
            frames: (0..count).map(|i| format!("{prefix}_{i}")).collect(),
            frame_time: DEFAULT_FRAME_TIME,
        }
    }

    /// Whether the clip has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Clips available to one agent archetype.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSet {
    /// Standing still.
    pub idle: AnimationClip,
    /// Walking forward.
    pub walk: AnimationClip,
    /// Strafing left during a dodge.
    pub walk_left: AnimationClip,
    /// Strafing right during a dodge.
    pub walk_right: AnimationClip,
    /// Backing off during a dodge.
    pub walk_back: AnimationClip,
    /// Attack; played once.
    pub attack: AnimationClip,
}

impl AnimationSet {
    /// Set with every clip named after `prefix` (`{prefix}_walk_0`, ...).
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            idle: AnimationClip::numbered(&format!("{prefix}_idle"), 1),
            walk: AnimationClip::numbered(&format!("{prefix}_walk"), 4),
            walk_left: AnimationClip::numbered(&format!("{prefix}_walk_left"), 4),
            walk_right: AnimationClip::numbered(&format!("{prefix}_walk_right"), 4),
            walk_back: AnimationClip::numbered(&format!("{prefix}_walk_back"), 4),
            attack: AnimationClip::numbered(&format!("{prefix}_attack"), 6),
        }
    }

    /// The clip for a kind, falling back to `walk` for empty directional clips.
    #[must_use]
    pub fn clip(&self, kind: ClipKind) -> &AnimationClip {
        let clip = match kind {
            ClipKind::Idle => &self.idle,
            ClipKind::Walk => &self.walk,
            ClipKind::WalkLeft => &self.walk_left,
            ClipKind::WalkRight => &self.walk_right,
            ClipKind::WalkBack => &self.walk_back,
            ClipKind::Attack => &self.attack,
        };
        match kind {
            ClipKind::WalkLeft | ClipKind::WalkRight | ClipKind::WalkBack if clip.is_empty() => {
                &self.walk
            }
            _ => clip,
        }
    }
}

/// Which clip of an [`AnimationSet`] a sprite is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClipKind {
    /// Idle clip.
    #[default]
    Idle,
    /// Forward walk.
    Walk,
    /// Left strafe.
    WalkLeft,
    /// Right strafe.
    WalkRight,
    /// Backward walk.
    WalkBack,
    /// Attack.
    Attack,
}

/// Sprite playback state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sprite {
    /// Clip currently loaded.
    pub clip: ClipKind,
    /// Texture identifiers of the loaded clip.
    pub frames: Vec<String>,
    /// Seconds per frame.
    #[serde(with = "fixed_serde")]
    pub frame_time: Fixed,
    /// Restart from frame 0 after the last frame.
    pub looping: bool,
    /// Whether playback is advancing.
    pub playing: bool,
    /// Index into `frames`.
    pub current_frame: usize,
    /// Time carried toward the next frame.
    #[serde(with = "fixed_serde")]
    pub accumulator: Fixed,
}

impl Sprite {
    /// Load a clip and rewind.
    pub fn play(&mut self, kind: ClipKind, clip: &AnimationClip, looping: bool, playing: bool) {
        self.clip = kind;
        self.frames.clone_from(&clip.frames);
        self.frame_time = clip.frame_time;
        self.looping = looping;
        self.playing = playing && !clip.frames.is_empty();
        self.current_frame = 0;
        self.accumulator = Fixed::ZERO;
    }

    /// Texture of the current frame, if any.
    #[must_use]
    pub fn current_texture(&self) -> Option<&str> {
        self.frames.get(self.current_frame).map(String::as_str)
    }

    /// Advance playback by `dt` seconds.
    pub fn advance(&mut self, dt: Fixed) {
        if !self.playing || self.frames.is_empty() {
            return;
        }
        if dt <= Fixed::ZERO || self.frame_time <= Fixed::ZERO {
            return;
        }

        self.accumulator += dt;
        while self.accumulator >= self.frame_time {
            self.accumulator -= self.frame_time;
            self.current_frame += 1;
            if self.current_frame >= self.frames.len() {
                if self.looping {
                    self.current_frame = 0;
                } else {
                    self.current_frame = self.frames.len() - 1;
                    self.playing = false;
                    self.accumulator = Fixed::ZERO;
                    break;
                }
            }
        }
    }
}

/// Advance every sprite by `dt` seconds.
pub fn animation_system<'a>(sprites: impl IntoIterator<Item = &'a mut Sprite>, dt: Fixed) {
    for sprite in sprites {
        sprite.advance(dt);
    }
}

/// Show the idle clip (or the first walk frame when there is none), paused.
pub fn enter_passive(sprite: &mut Sprite, set: &AnimationSet) {
    let kind = if set.idle.is_empty() {
        ClipKind::Walk
    } else {
        ClipKind::Idle
    };
    if sprite.clip == kind && !sprite.playing && sprite.looping {
        return;
    }
    sprite.play(kind, set.clip(kind), true, false);
}

/// Play a looping walk clip. Keeps the current playback if already on it.
pub fn enter_moving(sprite: &mut Sprite, set: &AnimationSet, kind: ClipKind) {
    if sprite.clip == kind && sprite.looping && sprite.playing {
        return;
    }
    sprite.play(kind, set.clip(kind), true, true);
}

/// Start the attack clip from the beginning.
///
/// Returns the frame at which the attack takes effect: the middle of the
/// clip, or 0 for an empty clip (which is never "playing", so the attack
/// resolves on the next evaluation).
pub fn enter_attacking(sprite: &mut Sprite, set: &AnimationSet) -> usize {
    sprite.play(ClipKind::Attack, &set.attack, false, true);
    set.attack.frames.len() / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: f64) -> Fixed {
        Fixed::from_num(value)
    }

    #[test]
    fn test_non_looping_clip_stops_on_last_frame() {
        let set = AnimationSet::with_prefix("melee");
        let mut sprite = Sprite::default();
        let apply_frame = enter_attacking(&mut sprite, &set);
        assert_eq!(apply_frame, 3);
        assert!(sprite.playing);

        for _ in 0..5 {
            sprite.advance(set.attack.frame_time);
        }
        assert_eq!(sprite.current_frame, 5);
        assert!(sprite.playing);

        sprite.advance(set.attack.frame_time);
        assert_eq!(sprite.current_frame, 5);
        assert!(!sprite.playing);
        assert_eq!(sprite.current_texture(), Some("melee_attack_5"));
    }

    #[test]
    fn test_looping_clip_wraps() {
        let set = AnimationSet::with_prefix("ranged");
        let mut sprite = Sprite::default();
        enter_moving(&mut sprite, &set, ClipKind::Walk);
        sprite.advance(set.walk.frame_time * Fixed::from_num(5));
        assert_eq!(sprite.current_frame, 1);
        assert!(sprite.playing);
    }

    #[test]
    fn test_enter_moving_keeps_playback() {
        let set = AnimationSet::with_prefix("melee");
        let mut sprite = Sprite::default();
        enter_moving(&mut sprite, &set, ClipKind::Walk);
        sprite.advance(set.walk.frame_time * Fixed::from_num(2));
        enter_moving(&mut sprite, &set, ClipKind::Walk);
        assert_eq!(sprite.current_frame, 2);
    }

    #[test]
    fn test_empty_attack_clip_is_not_playing() {
        let mut set = AnimationSet::with_prefix("support");
        set.attack = AnimationClip::default();
        let mut sprite = Sprite::default();
        assert_eq!(enter_attacking(&mut sprite, &set), 0);
        assert!(!sprite.playing);
    }

    #[test]
    fn test_directional_clip_falls_back_to_walk() {
        let mut set = AnimationSet::with_prefix("ranged");
        set.walk_left = AnimationClip::default();
        assert_eq!(set.clip(ClipKind::WalkLeft), &set.walk);
        assert_ne!(set.clip(ClipKind::WalkRight), &set.walk);
    }

    #[test]
    fn test_passive_is_paused() {
        let set = AnimationSet::with_prefix("melee");
        let mut sprite = Sprite::default();
        enter_passive(&mut sprite, &set);
        sprite.advance(secs(1.0));
        assert_eq!(sprite.current_frame, 0);
        assert_eq!(sprite.clip, ClipKind::Idle);
    }

    #[test]
    fn test_zero_dt_is_ignored() {
        let set = AnimationSet::with_prefix("melee");
        let mut sprite = Sprite::default();
        enter_moving(&mut sprite, &set, ClipKind::Walk);
        sprite.advance(Fixed::ZERO);
        sprite.advance(secs(-1.0));
        assert_eq!(sprite.current_frame, 0);
        assert_eq!(sprite.accumulator, Fixed::ZERO);
    }
}
