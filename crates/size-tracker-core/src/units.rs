//! Human-readable byte sizes using binary prefixes.

const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format a byte count with binary prefixes, e.g. `2 MiB` or `1.5 KiB`.
///
/// Values are rounded to one decimal place; a trailing `.0` is dropped.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut idx = 0;
    while value >= 1024.0 && idx + 1 < UNITS.len() {
        value /= 1024.0;
        idx += 1;
    }

    let mut rounded = round_tenths(value);
    // 1023.96 KiB rounds to 1024.0; carry into the next unit.
    if rounded >= 1024.0 && idx + 1 < UNITS.len() {
        idx += 1;
        rounded = round_tenths(value / 1024.0);
    }

    let unit = UNITS[idx];
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {unit}")
    } else {
        format!("{rounded:.1} {unit}")
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Format a byte count as `<human> (<raw> bytes)`.
pub fn format_bytes_with_raw(bytes: u64) -> String {
    format!("{} ({bytes} bytes)", format_bytes(bytes))
}

/// Format a signed byte difference, e.g. `+1 MiB` or `-512 B`.
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { "-" } else { "+" };
    format!("{sign}{}", format_bytes(delta.unsigned_abs()))
}
