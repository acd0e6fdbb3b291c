/// Kilometers with one decimal, e.g. "123.5 km".
pub fn format_distance(meters: f64) -> String {
    format!("{:.1} km", meters / 1000.)
}

/// "Hh Mmin", or "Mmin" when under an hour. Seconds are truncated.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0. { seconds as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;

    if hours > 0 {
        format!("{}h {}min", hours, minutes)
    } else {
        format!("{}min", minutes)
    }
}
