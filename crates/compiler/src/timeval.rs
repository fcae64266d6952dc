//! IEC 61131-3 TIME literal handling
//!
//! Parses `T#...` / `TIME#...` literals into a millisecond count and
//! serialises milliseconds back to the shortest human-readable form.
//! Components are `d`, `h`, `m`, `s`, `ms`, accepted in decreasing order
//! of magnitude, each at most once.

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Parse a TIME literal (with its `T#` or `TIME#` prefix) into milliseconds.
///
/// Accepts e.g. `T#500ms`, `TIME#1h30m`, `t#2d4h`. Components must appear
/// in decreasing order (`T#30m1h` is rejected) and the result is always
/// non-negative.
pub fn parse_time_literal(text: &str) -> Result<i64, String> {
    let body = strip_prefix(text)
        .ok_or_else(|| format!("TIME literal '{}' must start with 'T#' or 'TIME#'", text))?;

    if body.is_empty() {
        return Err(format!("TIME literal '{}' has no components", text));
    }

    // Unit ranks, decreasing; ensures d > h > m > s > ms ordering
    let mut last_rank = 6;
    let mut total_ms: i64 = 0;
    let mut rest = body;

    while !rest.is_empty() {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(format!(
                "TIME literal '{}': expected a number before '{}'",
                text, rest
            ));
        }
        rest = &rest[digits.len()..];
        let value: i64 = digits
            .parse()
            .map_err(|_| format!("TIME literal '{}': component '{}' is too large", text, digits))?;

        let (unit_ms, rank, unit_len) = match unit_at(rest) {
            Some(u) => u,
            None => {
                return Err(format!(
                    "TIME literal '{}': expected a unit (d, h, m, s, ms) after '{}'",
                    text, digits
                ));
            }
        };
        rest = &rest[unit_len..];

        if rank >= last_rank {
            return Err(format!(
                "TIME literal '{}': components must appear in decreasing order",
                text
            ));
        }
        last_rank = rank;

        total_ms = total_ms.saturating_add(value.saturating_mul(unit_ms));
    }

    Ok(total_ms)
}

/// Identify the unit at the head of `rest`: `(ms-per-unit, rank, chars)`.
///
/// `m` is a minute only when not followed by `s`; `s` alone is a second.
fn unit_at(rest: &str) -> Option<(i64, u8, usize)> {
    let lower: Vec<char> = rest.chars().take(2).map(|c| c.to_ascii_lowercase()).collect();
    match lower.as_slice() {
        ['m', 's', ..] => Some((1, 0, 2)),
        ['m', ..] => Some((MS_PER_MINUTE, 3, 1)),
        ['s', ..] => Some((MS_PER_SECOND, 1, 1)),
        ['h', ..] => Some((MS_PER_HOUR, 4, 1)),
        ['d', ..] => Some((MS_PER_DAY, 5, 1)),
        _ => None,
    }
}

fn strip_prefix(text: &str) -> Option<&str> {
    let upper_len = if text.len() >= 5 && text[..5].eq_ignore_ascii_case("TIME#") {
        5
    } else if text.len() >= 2 && text[..2].eq_ignore_ascii_case("T#") {
        2
    } else {
        return None;
    };
    Some(&text[upper_len..])
}

/// True when `text` starts like a TIME literal (used by the lexer)
pub fn has_time_prefix(text: &str) -> bool {
    strip_prefix(text).is_some()
}

/// Serialise milliseconds to the shortest TIME literal.
///
/// `T#<n>ms` below one second, `T#<n>s` for whole seconds below one
/// minute, otherwise `h`/`m`/`s`/`ms` components in decreasing order with
/// zero components skipped. Negative input clamps to `T#0ms`.
pub fn format_time_ms(ms: i64) -> String {
    if ms <= 0 {
        return "T#0ms".to_string();
    }
    if ms < MS_PER_SECOND {
        return format!("T#{}ms", ms);
    }
    if ms % MS_PER_SECOND == 0 && ms < MS_PER_MINUTE {
        return format!("T#{}s", ms / MS_PER_SECOND);
    }

    let mut out = String::from("T#");
    let mut rest = ms;
    let hours = rest / MS_PER_HOUR;
    rest %= MS_PER_HOUR;
    let minutes = rest / MS_PER_MINUTE;
    rest %= MS_PER_MINUTE;
    let seconds = rest / MS_PER_SECOND;
    rest %= MS_PER_SECOND;

    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    if rest > 0 {
        out.push_str(&format!("{}ms", rest));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_milliseconds() {
        assert_eq!(parse_time_literal("T#500ms").unwrap(), 500);
        assert_eq!(parse_time_literal("t#0ms").unwrap(), 0);
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_time_literal("T#1h30m").unwrap(), 90 * 60 * 1000);
        assert_eq!(parse_time_literal("TIME#2s500ms").unwrap(), 2500);
        assert_eq!(
            parse_time_literal("T#1d2h3m4s5ms").unwrap(),
            86_400_000 + 2 * 3_600_000 + 3 * 60_000 + 4_000 + 5
        );
    }

    #[test]
    fn test_parse_minute_vs_ms() {
        // `m` not followed by `s` is minutes; `ms` is milliseconds
        assert_eq!(parse_time_literal("T#5m").unwrap(), 300_000);
        assert_eq!(parse_time_literal("T#5ms").unwrap(), 5);
    }

    #[test]
    fn test_parse_rejects_out_of_order() {
        assert!(parse_time_literal("T#30m1h").is_err());
        assert!(parse_time_literal("T#1s1s").is_err());
        assert!(parse_time_literal("T#5ms1s").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_time_literal("T#").is_err());
        assert!(parse_time_literal("T#h").is_err());
        assert!(parse_time_literal("T#12").is_err());
        assert!(parse_time_literal("T#12x").is_err());
        assert!(parse_time_literal("500ms").is_err());
    }

    #[test]
    fn test_format_shortest_forms() {
        assert_eq!(format_time_ms(0), "T#0ms");
        assert_eq!(format_time_ms(750), "T#750ms");
        assert_eq!(format_time_ms(5_000), "T#5s");
        assert_eq!(format_time_ms(59_000), "T#59s");
        assert_eq!(format_time_ms(60_000), "T#1m");
        assert_eq!(format_time_ms(90_500), "T#1m30s500ms");
        assert_eq!(format_time_ms(3_600_000), "T#1h");
        assert_eq!(format_time_ms(5_400_000), "T#1h30m");
    }

    #[test]
    fn test_format_folds_days_into_hours() {
        assert_eq!(format_time_ms(25 * 3_600_000), "T#25h");
        assert_eq!(parse_time_literal("T#25h").unwrap(), 25 * 3_600_000);
    }

    #[test]
    fn test_round_trip_idempotence() {
        // parse(emit(parse(t))) == parse(t)
        for text in ["T#1500ms", "T#90s", "T#1h0m30s", "T#2d", "T#0ms", "T#61s"] {
            let parsed = parse_time_literal(text).unwrap();
            let emitted = format_time_ms(parsed);
            assert_eq!(parse_time_literal(&emitted).unwrap(), parsed, "for {}", text);
        }
    }
}
