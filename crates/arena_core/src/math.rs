//! Fixed-point math utilities for deterministic simulation.
//!
//! All agent decision making uses fixed-point arithmetic so that a given
//! arena state and seed always produce the same decisions, on every
//! platform. Floating-point operations can produce different results on
//! different CPUs, and non-finite values are impossible by construction.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// π in fixed point.
pub const PI: Fixed = Fixed::from_bits(13_493_037_705);

/// π/2 in fixed point.
pub const HALF_PI: Fixed = Fixed::from_bits(6_746_518_852);

/// 2π in fixed point.
pub const TWO_PI: Fixed = Fixed::from_bits(26_986_075_409);

/// Vectors shorter than this normalize to zero (about 1e-6).
pub const NORMALIZE_EPSILON: Fixed = Fixed::from_bits(4_295);

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for hand-authored fixed-point values.
///
/// Config and scenario files are written by people, so values are read as
/// decimal literals (`0.25`, `1500`) and converted once at load time.
/// Simulation state is never round-tripped through this adapter; use
/// [`fixed_serde`] for that.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a fixed-point number from a decimal literal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("value {value} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Check if both components are exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot_saturating(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    fn dot_saturating(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, s: Fixed) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    /// Unit vector in the same direction, or zero for (near) zero-length input.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len <= NORMALIZE_EPSILON {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Vector rotated by 90 degrees.
    ///
    /// With y pointing down (screen space), `clockwise` yields `(-y, x)`.
    #[must_use]
    pub fn perpendicular(self, clockwise: bool) -> Self {
        if clockwise {
            Self::new(-self.y, self.x)
        } else {
            Self::new(self.y, -self.x)
        }
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Computes the square root of a fixed-point number.
///
/// Works on the raw bits with an integer Newton iteration, so the result is
/// exact to the last fractional bit. Non-positive input yields zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    // sqrt(bits / 2^32) * 2^32 == sqrt(bits * 2^32)
    let scaled = (value.to_bits() as u128) << 32;
    Fixed::from_bits(isqrt_u128(scaled) as i64)
}

fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }

    // Initial guess is a power of two at or above the root.
    let shift = (128 - n.leading_zeros() + 1) / 2;
    let mut x = 1u128 << shift;
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Clamp a value into `[0, 1]`.
#[must_use]
pub fn clamp01(value: Fixed) -> Fixed {
    value.clamp(Fixed::ZERO, Fixed::ONE)
}

/// Convert degrees to radians.
#[must_use]
pub fn deg_to_rad(degrees: Fixed) -> Fixed {
    degrees * PI / Fixed::from_num(180)
}

/// Sine and cosine of an angle in radians.
///
/// Range-reduces into `[-π/2, π/2]` and evaluates a Taylor series there,
/// giving an absolute error well below `1e-8`.
#[must_use]
pub fn sin_cos(radians: Fixed) -> (Fixed, Fixed) {
    let mut x = radians % TWO_PI;
    if x > PI {
        x -= TWO_PI;
    } else if x < -PI {
        x += TWO_PI;
    }

    if x > HALF_PI {
        let (s, c) = sin_cos_reduced(PI - x);
        (s, -c)
    } else if x < -HALF_PI {
        let (s, c) = sin_cos_reduced(-PI - x);
        (s, -c)
    } else {
        sin_cos_reduced(x)
    }
}

/// Cosine of an angle in radians.
#[must_use]
pub fn cos(radians: Fixed) -> Fixed {
    sin_cos(radians).1
}

fn sin_cos_reduced(x: Fixed) -> (Fixed, Fixed) {
    let x2 = x * x;
    let mut sin = x;
    let mut sin_term = x;
    let mut cos = Fixed::ONE;
    let mut cos_term = Fixed::ONE;

    for k in 1..=7i32 {
        sin_term = -sin_term * x2 / Fixed::from_num((2 * k) * (2 * k + 1));
        sin += sin_term;
        cos_term = -cos_term * x2 / Fixed::from_num((2 * k - 1) * (2 * k));
        cos += cos_term;
    }

    (sin, cos)
}
