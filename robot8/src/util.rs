#[inline(always)]
pub fn lerp(t: f32, a: f32, b: f32) -> f32 {
    (1.0 - t) * a + t * b
}

#[inline(always)]
pub fn unlerp(x: f32, a: f32, b: f32) -> f32 {
    (x - a) / (b - a)
}

/// Whether `length` lies within `expected` ± `expected / divisor`.
#[inline]
pub fn within_tolerance(length: u32, expected: u32, divisor: u32) -> bool {
    let tolerance = expected / divisor;
    length >= expected.saturating_sub(tolerance) && length <= expected + tolerance
}
