use chrono::{DateTime, Datelike, Utc};
use url::Url;

/// Truncate to `max_len` chars, appending `...` when anything was cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Compact display form for large counts: 1.2M, 3.4K, 999.
pub fn format_number(num: f64) -> String {
    if num >= 1_000_000.0 {
        format!("{:.1}M", num / 1_000_000.0)
    } else if num >= 1_000.0 {
        format!("{:.1}K", num / 1_000.0)
    } else {
        format!("{}", num as i64)
    }
}

/// Dollar amounts at budget scale: $2.50B, $1.3M, $45K.
pub fn format_currency(amount: f64) -> String {
    if amount >= 1e9 {
        format!("${:.2}B", amount / 1e9)
    } else if amount >= 1e6 {
        format!("${:.1}M", amount / 1e6)
    } else if amount >= 1e3 {
        format!("${:.0}K", amount / 1e3)
    } else {
        format!("${amount:.0}")
    }
}

/// Signed percent delta between an adopted and modified figure: "+3.2%".
pub fn format_change_percent(adopted: f64, modified: f64) -> String {
    if adopted == 0.0 {
        return "0%".to_string();
    }
    let change = (modified - adopted) / adopted * 100.0;
    let sign = if change >= 0.0 { "+" } else { "" };
    format!("{sign}{change:.1}%")
}

/// Humanized relative timestamp: "Just now", "5m ago", "3h ago",
/// "Yesterday", "4d ago", then "Mon D" (with year when it differs).
pub fn humanize_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(date);
    let days = diff.num_days();

    if days == 0 {
        let hours = diff.num_hours();
        if hours == 0 {
            let mins = diff.num_minutes();
            if mins <= 1 {
                return "Just now".to_string();
            }
            return format!("{mins}m ago");
        }
        return format!("{hours}h ago");
    }
    if days == 1 {
        return "Yesterday".to_string();
    }
    if days < 7 {
        return format!("{days}d ago");
    }
    if date.year() == now.year() {
        date.format("%b %-d").to_string()
    } else {
        date.format("%b %-d, %Y").to_string()
    }
}

/// Registrable host of a URL for source attribution; "Web" when absent or
/// unparseable.
pub fn extract_domain(url: &str) -> String {
    if url.is_empty() {
        return "Web".to_string();
    }
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_else(|| "Web".to_string()),
        Err(_) => "Web".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn truncate_short_text_untouched() {
        assert_eq!(truncate("hello", 150), "hello");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        let long = "a".repeat(200);
        let out = truncate(&long, 150);
        assert_eq!(out.chars().count(), 150);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncate_exact_boundary() {
        let text = "b".repeat(150);
        assert_eq!(truncate(&text, 150), text);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(1_500_000.0), "1.5M");
        assert_eq!(format_number(2_300.0), "2.3K");
        assert_eq!(format_number(999.0), "999");
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(2_500_000_000.0), "$2.50B");
        assert_eq!(format_currency(1_300_000.0), "$1.3M");
        assert_eq!(format_currency(45_000.0), "$45K");
        assert_eq!(format_currency(750.0), "$750");
    }

    #[test]
    fn change_percent() {
        assert_eq!(format_change_percent(100.0, 103.2), "+3.2%");
        assert_eq!(format_change_percent(100.0, 95.0), "-5.0%");
        assert_eq!(format_change_percent(0.0, 50.0), "0%");
    }

    #[test]
    fn humanize_just_now_and_minutes() {
        let now = utc(2026, 8, 30, 12, 0);
        assert_eq!(humanize_date(utc(2026, 8, 30, 11, 59), now), "Just now");
        assert_eq!(humanize_date(utc(2026, 8, 30, 11, 45), now), "15m ago");
    }

    #[test]
    fn humanize_hours_and_days() {
        let now = utc(2026, 8, 30, 12, 0);
        assert_eq!(humanize_date(utc(2026, 8, 30, 9, 0), now), "3h ago");
        assert_eq!(humanize_date(utc(2026, 8, 29, 11, 0), now), "Yesterday");
        assert_eq!(humanize_date(utc(2026, 8, 26, 12, 0), now), "4d ago");
    }

    #[test]
    fn humanize_calendar_fallback() {
        let now = utc(2026, 8, 30, 12, 0);
        assert_eq!(humanize_date(utc(2026, 1, 5, 12, 0), now), "Jan 5");
        assert_eq!(humanize_date(utc(2025, 12, 20, 12, 0), now), "Dec 20, 2025");
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(extract_domain("https://www.nytimes.com/a/b"), "nytimes.com");
        assert_eq!(extract_domain("https://gothamist.com/news"), "gothamist.com");
        assert_eq!(extract_domain("not a url"), "Web");
        assert_eq!(extract_domain(""), "Web");
    }
}
