//! Next-occurrence computation for recurring appointments.
//!
//! Two rule dialects exist in the data: iCalendar-style RRULE strings
//! (`FREQ=DAILY;INTERVAL=3`) and fixed Portuguese keywords (`semanal`).
//! Both normalize to the same `Recurrence` and share the date arithmetic.

use chrono::{DateTime, Duration, Months, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub freq: Freq,
    pub interval: u32,
}

/// Parse the supported RRULE subset. Unknown parts are ignored; an
/// unknown or missing FREQ makes the rule non-recurring.
pub fn parse_rrule(rule: &str) -> Option<Recurrence> {
    let body = rule.trim().strip_prefix("RRULE:").unwrap_or(rule.trim());

    let mut freq = None;
    let mut interval = 1u32;

    for part in body.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => {
                freq = match value.trim().to_ascii_uppercase().as_str() {
                    "DAILY" => Some(Freq::Daily),
                    "WEEKLY" => Some(Freq::Weekly),
                    "MONTHLY" => Some(Freq::Monthly),
                    "YEARLY" => Some(Freq::Yearly),
                    _ => return None,
                };
            }
            "INTERVAL" => {
                interval = value.trim().parse().ok().filter(|i| *i >= 1)?;
            }
            _ => {}
        }
    }

    freq.map(|freq| Recurrence { freq, interval })
}

/// Parse the legacy fixed rule keywords.
pub fn parse_fixed_rule(rule: &str) -> Option<Recurrence> {
    let recurrence = match rule.trim().to_lowercase().as_str() {
        "diaria" | "diária" => Recurrence { freq: Freq::Daily, interval: 1 },
        "semanal" => Recurrence { freq: Freq::Weekly, interval: 1 },
        "quinzenal" => Recurrence { freq: Freq::Weekly, interval: 2 },
        "mensal" => Recurrence { freq: Freq::Monthly, interval: 1 },
        "anual" => Recurrence { freq: Freq::Yearly, interval: 1 },
        _ => return None,
    };
    Some(recurrence)
}

/// The occurrence that follows `base`, keeping the time-of-day. Monthly
/// and yearly steps clamp to the last valid day of the target month.
pub fn next_occurrence(recurrence: &Recurrence, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match recurrence.freq {
        Freq::Daily => base.checked_add_signed(Duration::days(i64::from(recurrence.interval))),
        Freq::Weekly => {
            base.checked_add_signed(Duration::days(7 * i64::from(recurrence.interval)))
        }
        Freq::Monthly => base.checked_add_months(Months::new(recurrence.interval)),
        Freq::Yearly => base.checked_add_months(Months::new(12 * recurrence.interval)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_interval_three_advances_three_days_same_time() {
        let rule = parse_rrule("FREQ=DAILY;INTERVAL=3").unwrap();
        let base = at(2026, 8, 30, 14, 30);

        let next = next_occurrence(&rule, base).unwrap();
        assert_eq!(next, at(2026, 9, 2, 14, 30));
    }

    #[test]
    fn rrule_prefix_and_default_interval() {
        let rule = parse_rrule("RRULE:FREQ=WEEKLY").unwrap();
        assert_eq!(rule, Recurrence { freq: Freq::Weekly, interval: 1 });

        let next = next_occurrence(&rule, at(2026, 1, 1, 9, 0)).unwrap();
        assert_eq!(next, at(2026, 1, 8, 9, 0));
    }

    #[test]
    fn monthly_step_clamps_short_months() {
        let rule = parse_rrule("FREQ=MONTHLY;INTERVAL=1").unwrap();
        let next = next_occurrence(&rule, at(2026, 1, 31, 10, 0)).unwrap();
        assert_eq!(next, at(2026, 2, 28, 10, 0));
    }

    #[test]
    fn yearly_step() {
        let rule = parse_rrule("FREQ=YEARLY").unwrap();
        let next = next_occurrence(&rule, at(2026, 3, 10, 8, 0)).unwrap();
        assert_eq!(next, at(2027, 3, 10, 8, 0));
    }

    #[test]
    fn invalid_rules_are_not_recurring() {
        assert!(parse_rrule("").is_none());
        assert!(parse_rrule("FREQ=HOURLY").is_none());
        assert!(parse_rrule("INTERVAL=2").is_none());
        assert!(parse_rrule("FREQ=DAILY;INTERVAL=0").is_none());
        assert!(parse_rrule("sem recorrencia").is_none());
    }

    #[test]
    fn fixed_keywords() {
        assert_eq!(
            parse_fixed_rule("Semanal"),
            Some(Recurrence { freq: Freq::Weekly, interval: 1 })
        );
        assert_eq!(
            parse_fixed_rule("quinzenal"),
            Some(Recurrence { freq: Freq::Weekly, interval: 2 })
        );
        assert_eq!(
            parse_fixed_rule("mensal"),
            Some(Recurrence { freq: Freq::Monthly, interval: 1 })
        );
        assert!(parse_fixed_rule("FREQ=DAILY").is_none());
    }
}
