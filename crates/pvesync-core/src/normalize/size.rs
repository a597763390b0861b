// ── Size string parsing ──

use tracing::warn;

/// Convert a source size string (`"32G"`, `"10240M"`, `"2T"`) to MiB.
///
/// Units K/M/G/T are binary multiples; a trailing `B` is tolerated
/// (`"32GB"`). A bare number means gigabytes, the source's convention for
/// disk `size=` parameters. Malformed strings yield `None` and a warning --
/// never an error, a single bad size must not sink the guest.
pub fn parse_size_mb(raw: &str) -> Option<u64> {
    let s = raw.trim().to_uppercase();
    if s.is_empty() {
        return None;
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number_part, unit_part) = s.split_at(split);

    let Ok(value) = number_part.parse::<f64>() else {
        warn!(raw, "could not parse disk size string");
        return None;
    };

    let mb = match unit_part.trim_end_matches('B') {
        "T" => value * 1024.0 * 1024.0,
        "G" | "" => value * 1024.0,
        "M" => value,
        "K" => value / 1024.0,
        _ => {
            warn!(raw, "unknown disk size unit");
            return None;
        }
    };

    if !mb.is_finite() || mb < 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(mb.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gigabytes() {
        assert_eq!(parse_size_mb("32G"), Some(32768));
    }

    #[test]
    fn megabytes() {
        assert_eq!(parse_size_mb("10240M"), Some(10240));
    }

    #[test]
    fn terabytes() {
        assert_eq!(parse_size_mb("2T"), Some(2_097_152));
    }

    #[test]
    fn bare_number_defaults_to_gigabytes() {
        assert_eq!(parse_size_mb("50"), Some(51200));
    }

    #[test]
    fn kilobytes_round_to_mib() {
        assert_eq!(parse_size_mb("2048K"), Some(2));
    }

    #[test]
    fn fractional_values() {
        assert_eq!(parse_size_mb("0.5G"), Some(512));
    }

    #[test]
    fn trailing_b_suffix() {
        assert_eq!(parse_size_mb("32GB"), Some(32768));
    }

    #[test]
    fn malformed_strings_yield_none() {
        assert_eq!(parse_size_mb(""), None);
        assert_eq!(parse_size_mb("huge"), None);
        assert_eq!(parse_size_mb("32Q"), None);
    }
}
