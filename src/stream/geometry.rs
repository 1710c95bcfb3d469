//! Output size computation

/// Scale native dimensions to fit `max_dimension` and round both down to
/// even numbers. `max_dimension == 0` keeps the native size.
///
/// Never upscales: the scale factor is capped at 1.
pub fn target_dimensions(native_width: u32, native_height: u32, max_dimension: u32) -> (u32, u32) {
    if max_dimension == 0 {
        return (even_floor(native_width), even_floor(native_height));
    }

    let longest = native_width.max(native_height).max(1);
    let scale = (f64::from(max_dimension) / f64::from(longest)).min(1.0);

    let width = (f64::from(native_width) * scale).floor() as u32;
    let height = (f64::from(native_height) * scale).floor() as u32;

    (even_floor(width), even_floor(height))
}

#[inline]
fn even_floor(value: u32) -> u32 {
    value & !1
}
