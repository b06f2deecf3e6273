//! Utility types, used throughout the crate.

/// An integer, axis-aligned rectangle in image pixels. Width and height are never negative.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
    /// A rect at the origin with the given size.
    #[must_use]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
    // Computed in i64, as the far edge of an i32 origin + u32 extent doesn't fit an i32.
    fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }
    fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }
    /// Smallest rect containing both. Empty rects don't contribute.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self {
            x,
            y,
            width: u32::try_from(right - i64::from(x)).unwrap_or(u32::MAX),
            height: u32::try_from(bottom - i64::from(y)).unwrap_or(u32::MAX),
        }
    }
    /// Overlapping area, or None if they don't touch.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= i64::from(x) || bottom <= i64::from(y) {
            return None;
        }
        // Both fit, they're no larger than either input.
        Some(Self {
            x,
            y,
            width: u32::try_from(right - i64::from(x)).ok()?,
            height: u32::try_from(bottom - i64::from(y)).ok()?,
        })
    }
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        x >= i64::from(self.x) && y >= i64::from(self.y) && x < self.right() && y < self.bottom()
    }
}

/// A layer opacity, always finite and within `[0, 1]`.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f32", into = "f32")]
#[repr(transparent)]
pub struct Opacity(f32);
impl Opacity {
    pub const TRANSPARENT: Self = Self(0.0);
    pub const OPAQUE: Self = Self(1.0);
    pub fn new(val: f32) -> Result<Self, OpacityError> {
        if !val.is_finite() {
            Err(OpacityError::NotFinite)
        } else if !(0.0..=1.0).contains(&val) {
            Err(OpacityError::OutOfRange(val))
        } else {
            Ok(Self(val))
        }
    }
    /// Like [`Self::new`], but out-of-range values are clamped instead of rejected. NaN becomes transparent.
    #[must_use]
    pub fn saturating(val: f32) -> Self {
        if val.is_nan() {
            Self::TRANSPARENT
        } else {
            Self(val.clamp(0.0, 1.0))
        }
    }
    #[must_use]
    pub fn get(self) -> f32 {
        self.0
    }
}
impl Default for Opacity {
    fn default() -> Self {
        Self::OPAQUE
    }
}
impl TryFrom<f32> for Opacity {
    type Error = OpacityError;
    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
impl From<Opacity> for f32 {
    fn from(value: Opacity) -> Self {
        value.get()
    }
}
// Fine, as NaN is never stored.
impl Eq for Opacity {}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum OpacityError {
    #[error("not finite")]
    NotFinite,
    #[error("{0} is outside of 0..=1")]
    OutOfRange(f32),
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn union_ignores_empty() {
        let a = Rect::new(10, 10, 5, 5);
        assert_eq!(a.union(&Rect::default()), a);
        assert_eq!(Rect::default().union(&a), a);
        assert_eq!(a.union(&Rect::new(-5, 12, 2, 20)), Rect::new(-5, 10, 20, 22));
    }
    #[test]
    fn intersection() {
        let a = Rect::from_size(10, 10);
        assert_eq!(
            a.intersection(&Rect::new(5, 5, 10, 10)),
            Some(Rect::new(5, 5, 5, 5))
        );
        // Touching edges do not overlap.
        assert_eq!(a.intersection(&Rect::new(10, 0, 5, 5)), None);
        assert!(a.contains(9, 9));
        assert!(!a.contains(10, 9));
    }
    #[test]
    fn opacity_bounds() {
        assert!(Opacity::new(0.5).is_ok());
        assert_eq!(Opacity::new(f32::NAN), Err(OpacityError::NotFinite));
        assert_eq!(Opacity::new(1.5), Err(OpacityError::OutOfRange(1.5)));
        assert_eq!(Opacity::saturating(-3.0), Opacity::TRANSPARENT);
        assert_eq!(Opacity::saturating(f32::NAN), Opacity::TRANSPARENT);
    }
}
