use super::{ValidationRule, Violation};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static INT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid int regex"));

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(off|0|([0-9]*\.?[0-9]+(ns|us|µs|ms|s|m|h|d|w|M|y))+)$")
        .expect("valid duration regex")
});

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(off|-1|[0-9]*\.?[0-9]+([bkmgtpe]i?b?)?)$").expect("valid size regex")
});

static FILE_MODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0?[0-7]{3,4}$").expect("valid file mode regex"));

static TIMETABLE_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((Mon|Tue|Wed|Thu|Fri|Sat|Sun)-)?([01]?[0-9]|2[0-3]):[0-5][0-9],(.+)$")
        .expect("valid timetable regex")
});

/// Free text; anything goes
pub struct StringRule;

impl ValidationRule for StringRule {
    fn violation(&self, _raw: &str) -> Option<Violation> {
        None
    }
}

/// Accepts the checkbox literals; anything else is a type error upstream
pub struct BoolRule;

impl ValidationRule for BoolRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "false" => None,
            _ => Some(Violation::NotInSet {
                allowed: vec!["true".to_string(), "false".to_string()],
            }),
        }
    }
}

pub struct IntRule;

impl ValidationRule for IntRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        if INT_PATTERN.is_match(raw) {
            None
        } else {
            Some(Violation::NotInteger)
        }
    }
}

pub struct FloatRule;

impl ValidationRule for FloatRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => None,
            _ => Some(Violation::NotFloat),
        }
    }
}

/// Go-style durations: `1h30m`, `500ms`, `off`
pub struct DurationRule;

impl ValidationRule for DurationRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        if DURATION_PATTERN.is_match(raw) {
            None
        } else {
            Some(Violation::InvalidDuration)
        }
    }
}

/// Sizes with optional binary suffix: `8Mi`, `1G`, `100k`, `off`
pub struct SizeSuffixRule;

impl ValidationRule for SizeSuffixRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        if SIZE_PATTERN.is_match(raw) {
            None
        } else {
            Some(Violation::InvalidSize)
        }
    }
}

pub struct FileModeRule;

impl ValidationRule for FileModeRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        if FILE_MODE_PATTERN.is_match(raw) {
            None
        } else {
            Some(Violation::InvalidFileMode)
        }
    }
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD[ HH:MM:SS]`
pub struct TimeRule;

impl ValidationRule for TimeRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        let ok = DateTime::parse_from_rfc3339(raw).is_ok()
            || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").is_ok()
            || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").is_ok()
            || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok();
        if ok {
            None
        } else {
            Some(Violation::InvalidTime)
        }
    }
}

pub struct CommaListRule;

impl ValidationRule for CommaListRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        if raw.split(',').any(|item| item.trim().is_empty()) {
            Some(Violation::InvalidList)
        } else {
            None
        }
    }
}

/// Space separated, items may be quoted
pub struct SpaceListRule;

impl ValidationRule for SpaceListRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        let mut quote: Option<char> = None;
        for c in raw.chars() {
            match (quote, c) {
                (None, '"') | (None, '\'') => quote = Some(c),
                (Some(open), c) if c == open => quote = None,
                _ => {}
            }
        }
        if quote.is_some() {
            Some(Violation::InvalidList)
        } else {
            None
        }
    }
}

pub struct TristateRule;

impl ValidationRule for TristateRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        match raw.to_ascii_lowercase().as_str() {
            "unset" | "null" | "true" | "false" => None,
            _ => Some(Violation::InvalidTristate),
        }
    }
}

/// Bandwidth limit: a single rate, `off`, or a timetable such as
/// `08:00,512k 12:00,10M Sat-00:00,off` where a rate may be `up:down`.
pub struct BwTimetableRule;

impl BwTimetableRule {
    fn valid_rate(rate: &str) -> bool {
        let mut parts = rate.split(':');
        let valid = |part: Option<&str>| {
            part.map(|p| !p.is_empty() && SIZE_PATTERN.is_match(p))
                .unwrap_or(false)
        };
        match (parts.next(), parts.next(), parts.next()) {
            (up, None, None) => valid(up),
            (up, down @ Some(_), None) => valid(up) && valid(down),
            _ => false,
        }
    }
}

impl ValidationRule for BwTimetableRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        let entries: Vec<&str> = raw.split_whitespace().collect();
        let valid = match entries.as_slice() {
            [single] if !single.contains(',') => Self::valid_rate(single),
            entries => entries.iter().all(|entry| {
                TIMETABLE_ENTRY
                    .captures(entry)
                    .and_then(|caps| caps.get(4))
                    .map(|rate| Self::valid_rate(rate.as_str()))
                    .unwrap_or(false)
            }),
        };
        if valid {
            None
        } else {
            Some(Violation::InvalidBwTimetable)
        }
    }
}

/// Value must be one of a fixed choice list (case-insensitive)
pub struct EnumRule {
    choices: Vec<String>,
}

impl EnumRule {
    pub fn new(choices: Vec<String>) -> Self {
        Self { choices }
    }
}

impl ValidationRule for EnumRule {
    fn violation(&self, raw: &str) -> Option<Violation> {
        if self.choices.is_empty() || self.choices.iter().any(|c| c.eq_ignore_ascii_case(raw)) {
            None
        } else {
            Some(Violation::NotInSet {
                allowed: self.choices.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(rule: &dyn ValidationRule, raw: &str) -> bool {
        rule.violation(raw).is_none()
    }

    #[test]
    fn test_int_and_float() {
        assert!(ok(&IntRule, "42"));
        assert!(ok(&IntRule, "-3"));
        assert!(!ok(&IntRule, "4.2"));
        assert!(!ok(&IntRule, "four"));
        assert!(ok(&FloatRule, "0.5"));
        assert!(!ok(&FloatRule, "inf"));
        assert!(!ok(&FloatRule, "abc"));
    }

    #[test]
    fn test_duration() {
        for raw in ["1h30m", "500ms", "off", "0", "1.5s", "2d", "1w"] {
            assert!(ok(&DurationRule, raw), "{raw} should be valid");
        }
        for raw in ["1x", "h", "10", "1 h"] {
            assert!(!ok(&DurationRule, raw), "{raw} should be invalid");
        }
    }

    #[test]
    fn test_size_suffix() {
        for raw in ["8Mi", "100k", "1G", "off", "-1", "1.5GiB", "512"] {
            assert!(ok(&SizeSuffixRule, raw), "{raw} should be valid");
        }
        for raw in ["8Z", "M", "ten"] {
            assert!(!ok(&SizeSuffixRule, raw), "{raw} should be invalid");
        }
    }

    #[test]
    fn test_file_mode_and_time() {
        assert!(ok(&FileModeRule, "0755"));
        assert!(ok(&FileModeRule, "644"));
        assert!(!ok(&FileModeRule, "0799"));
        assert!(ok(&TimeRule, "2024-01-02T03:04:05Z"));
        assert!(ok(&TimeRule, "2024-01-02"));
        assert!(!ok(&TimeRule, "yesterday"));
    }

    #[test]
    fn test_lists() {
        assert!(ok(&CommaListRule, "a,b,c"));
        assert!(!ok(&CommaListRule, "a,,c"));
        assert!(ok(&SpaceListRule, "a \"b c\" d"));
        assert!(!ok(&SpaceListRule, "a \"b c"));
    }

    #[test]
    fn test_bw_timetable() {
        for raw in ["10M", "off", "08:00,512k 12:00,10M", "Mon-00:00,off", "08:00,1M:2M"] {
            assert!(ok(&BwTimetableRule, raw), "{raw} should be valid");
        }
        for raw in ["25:00,1M", "08:00,", "08:00,fast", "1M:2M:3M"] {
            assert!(!ok(&BwTimetableRule, raw), "{raw} should be invalid");
        }
    }

    #[test]
    fn test_enum_and_tristate() {
        let rule = EnumRule::new(vec!["off".into(), "full".into()]);
        assert!(ok(&rule, "FULL"));
        assert!(matches!(rule.violation("partial"), Some(Violation::NotInSet { .. })));
        assert!(ok(&TristateRule, "unset"));
        assert!(!ok(&TristateRule, "maybe"));
    }
}
