/// Portal 2 runs at a fixed 60 ticks per second.
pub const TICKS_PER_SECOND: u64 = 60;

pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Render a tick count as `H:MM:SS.mmm`.
pub fn format_ticks(ticks: u64) -> String {
    let total_ms = (ticks as f64 * 1000.0 / TICKS_PER_SECOND as f64).round() as u64;

    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    format!("{hours}:{mins:02}:{secs:02}.{ms:03}")
}
