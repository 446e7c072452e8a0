use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("brightness {0} is outside 0..=100")]
pub struct OutOfRange(pub u32);

/// Display brightness as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Brightness(u8);

impl Brightness {
    pub const MAX: Brightness = Brightness(100);

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Moves by `notches` wheel clicks of `step` percent each, saturating at
    /// both ends.
    pub fn stepped(self, notches: i32, step: u32) -> Brightness {
        let delta = notches as i64 * step as i64;
        Brightness((self.0 as i64 + delta).clamp(0, 100) as u8)
    }

    pub fn tooltip(self) -> String {
        format!("Brightness {self}")
    }
}

impl TryFrom<u32> for Brightness {
    type Error = OutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > 100 {
            return Err(OutOfRange(value));
        }
        Ok(Brightness(value as u8))
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The popup's view of the display brightness. Until the display has
/// reported a value there is nothing to show or change.
#[derive(Debug, Default)]
pub struct SliderState {
    known: Option<Brightness>,
}

impl SliderState {
    pub fn value(&self) -> Option<Brightness> {
        self.known
    }

    pub fn is_ready(&self) -> bool {
        self.known.is_some()
    }

    /// A value read back from the display. Once a first reading exists,
    /// readings arriving mid-drag are dropped.
    pub fn reading(&mut self, value: Brightness, dragging: bool) {
        if self.known.is_none() || !dragging {
            self.known = Some(value);
        }
    }

    /// A change made by the user. Returns the value to write, or `None` when
    /// nothing is known yet or the value did not move.
    pub fn set(&mut self, value: Brightness) -> Option<Brightness> {
        let current = self.known?;
        if current == value {
            return None;
        }
        self.known = Some(value);
        Some(value)
    }

    pub fn step(&mut self, notches: i32, step: u32) -> Option<Brightness> {
        let next = self.known?.stepped(notches, step);
        self.set(next)
    }
}

/// Turns wheel movement, reported in points, into whole notches. Partial
/// movement from smooth-scrolling devices carries over between frames.
#[derive(Debug, Default)]
pub struct WheelAccumulator {
    pending: f32,
}

impl WheelAccumulator {
    pub fn push(&mut self, delta: f32, points_per_notch: f32) -> i32 {
        if points_per_notch <= 0.0 {
            return 0;
        }
        self.pending += delta;
        let notches = (self.pending / points_per_notch).trunc();
        self.pending -= notches * points_per_notch;
        notches as i32
    }
}
