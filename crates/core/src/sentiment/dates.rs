use chrono::{Days, NaiveDate};

/// How a headline date was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrigin {
    /// An explicit slash or dashed calendar date.
    Explicit,
    /// A relative keyword such as "today", "yesterday" or "3 days ago".
    Relative,
    /// Nothing usable; the row is dated today.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub origin: DateOrigin,
}

impl ParsedDate {
    fn explicit(date: NaiveDate) -> Self {
        Self {
            date,
            origin: DateOrigin::Explicit,
        }
    }

    fn relative(date: NaiveDate) -> Self {
        Self {
            date,
            origin: DateOrigin::Relative,
        }
    }

    fn fallback(today: NaiveDate) -> Self {
        Self {
            date: today,
            origin: DateOrigin::Fallback,
        }
    }
}

const DASHED_FORMATS: [&str; 2] = ["%b-%d-%y", "%Y-%m-%d"];

/// Parse a scraped headline date. Never fails: anything unrecognized is dated `today`.
///
/// Priority: `M/D/Y` slash dates, then the two dashed formats (`Oct-17-26`,
/// `2026-10-17`), then relative keywords, then the fallback.
pub fn parse_news_date(raw: &str, today: NaiveDate) -> ParsedDate {
    let lower = raw.trim().to_lowercase();
    let Some(head) = lower.split_whitespace().next() else {
        return ParsedDate::fallback(today);
    };

    if head.contains('/') {
        if let Some(d) = parse_slash_date(head) {
            return ParsedDate::explicit(d);
        }
    } else if head.contains('-') {
        for fmt in DASHED_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                return ParsedDate::explicit(d);
            }
        }
    }

    match head {
        "today" => return ParsedDate::relative(today),
        "yesterday" => {
            return today
                .checked_sub_days(Days::new(1))
                .map(ParsedDate::relative)
                .unwrap_or_else(|| ParsedDate::fallback(today));
        }
        _ => {}
    }

    if lower.split_whitespace().any(|w| w == "ago") {
        return parse_ago(&lower, today);
    }

    ParsedDate::fallback(today)
}

fn parse_slash_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('/');
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    let year_raw = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let mut year = year_raw.parse::<i32>().ok()?;
    if year_raw.len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

// "3 days ago", "an hour ago", "2 weeks ago". Sub-day units count as today.
fn parse_ago(lower: &str, today: NaiveDate) -> ParsedDate {
    let mut words = lower.split_whitespace();
    let amount = match words.next() {
        Some("a") | Some("an") => Some(1u64),
        Some(w) => w.parse::<u64>().ok(),
        None => None,
    };
    let unit = words.next().map(|u| u.trim_end_matches('s'));

    let days = match (amount, unit) {
        (Some(n), Some("day")) => n,
        (Some(n), Some("week")) => n.saturating_mul(7),
        (Some(_), Some("hour" | "minute" | "min" | "second" | "sec")) => 0,
        _ => 0,
    };

    today
        .checked_sub_days(Days::new(days))
        .map(ParsedDate::relative)
        .unwrap_or_else(|| ParsedDate::fallback(today))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_slash_dates_with_short_and_long_years() {
        let p = parse_news_date("10/17/26", today());
        assert_eq!(p, ParsedDate::explicit(d(2026, 10, 17)));
        assert_eq!(parse_news_date("1/2/2025", today()).date, d(2025, 1, 2));
    }

    #[test]
    fn parses_dashed_formats() {
        assert_eq!(parse_news_date("Oct-17-26", today()).date, d(2026, 10, 17));
        assert_eq!(parse_news_date("Oct-17-26 09:30AM", today()).date, d(2026, 10, 17));
        let p = parse_news_date("2026-09-30", today());
        assert_eq!(p, ParsedDate::explicit(d(2026, 9, 30)));
    }

    #[test]
    fn parses_relative_keywords() {
        assert_eq!(parse_news_date("Today 09:30AM", today()), ParsedDate::relative(today()));
        assert_eq!(parse_news_date("yesterday", today()).date, d(2026, 10, 18));
        assert_eq!(parse_news_date("3 days ago", today()).date, d(2026, 10, 16));
        assert_eq!(parse_news_date("a day ago", today()).date, d(2026, 10, 18));
        assert_eq!(parse_news_date("2 weeks ago", today()).date, d(2026, 10, 5));
        assert_eq!(parse_news_date("5 hours ago", today()), ParsedDate::relative(today()));
        assert_eq!(parse_news_date("long ago", today()), ParsedDate::relative(today()));
    }

    #[test]
    fn unparseable_dates_fall_back_to_today() {
        for raw in ["", "   ", "13/45/26", "Foo-99-99", "sometime", "1/2"] {
            let p = parse_news_date(raw, today());
            assert_eq!(p, ParsedDate::fallback(today()), "raw={raw:?}");
        }
    }
}
