//! Attempt number normalization.

/// A value that can be used as a retry attempt number.
///
/// Attempt numbers are 1-based. Every implementation maps its input onto
/// `max(1, floor(value))`, so zero, negative, fractional, NaN and missing
/// (`None`) attempts all collapse to a safe value instead of being rejected.
/// Inputs beyond `u32::MAX` saturate.
///
/// # Examples
///
/// ```rust
/// use backoffkit_core::IntoAttempt;
///
/// assert_eq!(3_u32.into_attempt(), 3);
/// assert_eq!(0_i32.into_attempt(), 1);
/// assert_eq!((-7_i64).into_attempt(), 1);
/// assert_eq!(2.9_f64.into_attempt(), 2);
/// assert_eq!(None::<u32>.into_attempt(), 1);
/// ```
pub trait IntoAttempt {
    /// Convert into a normalized attempt number, always `>= 1`.
    fn into_attempt(self) -> u32;
}

macro_rules! impl_into_attempt_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoAttempt for $ty {
                fn into_attempt(self) -> u32 {
                    u32::try_from(self.max(1)).unwrap_or(u32::MAX)
                }
            }
        )*
    };
}

impl_into_attempt_for_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl IntoAttempt for f64 {
    fn into_attempt(self) -> u32 {
        // Float-to-int `as` saturates and maps NaN to 0.
        (self.floor() as u32).max(1)
    }
}

impl IntoAttempt for f32 {
    fn into_attempt(self) -> u32 {
        f64::from(self).into_attempt()
    }
}

impl<T: IntoAttempt> IntoAttempt for Option<T> {
    fn into_attempt(self) -> u32 {
        self.map_or(1, IntoAttempt::into_attempt)
    }
}
