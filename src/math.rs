//! Small numeric helpers for the fixed-point sampling path.
//!
//! Everything here is integer-only; the capture pipeline must never touch
//! floating point.

/// Fixed point scaling.
///
/// The `factor` argument represents scaling from 0 (at `0`) to ~1 (at `u16::MAX`).
pub trait ScaleBy {
    fn scale_by(self, by: ScalingFactor) -> Self;
}

/// A Q16 scale factor in `0.0 ..= ~1.0`.
///
/// Wraps the raw `u16` so fractions are constructed in one place instead of
/// as ad hoc shifts at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScalingFactor(u16);

impl ScalingFactor {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn from_percent(pct: u32) -> Self {
        assert!(pct <= 100);
        Self((u16::MAX as u32 * pct / 100) as u16)
    }

    /// Ratio `num/den`, saturated to ~1.0.
    pub const fn from_ratio(num: u32, den: u32) -> Self {
        assert!(den > 0);
        let raw = num as u64 * u16::MAX as u64 / den as u64;
        if raw > u16::MAX as u64 {
            Self(u16::MAX)
        } else {
            Self(raw as u16)
        }
    }

    pub const fn to_raw(self) -> u16 {
        self.0
    }
}

macro_rules! impl_scaleby {
    ($this:ty, via: $intermediate:ty) => {
        impl ScaleBy for $this {
            fn scale_by(self, by: ScalingFactor) -> Self {
                ((self as $intermediate * by.0 as $intermediate) >> u16::BITS) as $this
            }
        }
    };
}

impl_scaleby!(i16, via: i32);
impl_scaleby!(i32, via: i64);
impl_scaleby!(u16, via: u32);
impl_scaleby!(u32, via: u64);
impl_scaleby!(usize, via: u64);

/// Integer truncation, checked in debug mode.
pub trait Truncate<To> {
    fn truncate(self) -> To;
}

macro_rules! impl_truncate {
    ($from:ty => $to:ty) => {
        const _: () = assert!(<$to>::BITS <= <$from>::BITS);

        impl Truncate<$to> for $from {
            fn truncate(self) -> $to {
                debug_assert!(self <= <$to>::MAX as $from);
                #[allow(clippy::cast_possible_truncation)]
                let truncated = self as $to;
                truncated
            }
        }
    };
}

impl_truncate!(usize => u16);
impl_truncate!(u32 => u16);
impl_truncate!(u64 => u32);
impl_truncate!(isize => i16);
impl_truncate!(i32 => i16);

/// Rounded integer division.
pub trait DivRound {
    fn div_round(self, by: Self) -> Self;
}

macro_rules! impl_divround {
    ($self:ty) => {
        impl DivRound for $self {
            fn div_round(self, by: Self) -> Self {
                let round = by / 2;
                #[allow(unused_comparisons)]
                if self >= 0 {
                    (self + round) / by
                } else {
                    (self - round) / by
                }
            }
        }
    };
}

impl_divround!(u16);
impl_divround!(u32);
impl_divround!(u64);
impl_divround!(usize);
impl_divround!(i16);
impl_divround!(i32);
impl_divround!(i64);
impl_divround!(isize);

/// Integer square root, truncated.
///
/// Used for spectrum magnitudes; everything else compares squared values.
pub fn isqrt(x: u32) -> u16 {
    if x == 0 {
        return 0;
    }
    let mut low = 0u32;
    let mut high = 1u32 << (u32::BITS / 2);
    // invariant: low^2 <= x < high^2
    while high - low > 1 {
        let mid = (low + high) / 2;
        if mid * mid <= x {
            low = mid;
        } else {
            high = mid;
        }
    }
    low as u16
}
