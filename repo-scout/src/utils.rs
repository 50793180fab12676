/// Text processing utilities
pub mod text {
    /// Keep at most `max_chars` characters, cutting on a char boundary.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_index, _)) => text[..byte_index].to_string(),
            None => text.to_string(),
        }
    }

    /// Pull the body out of a Markdown code fence if the reply is wrapped in one.
    pub fn strip_code_fence(text: &str) -> &str {
        let trimmed = text.trim();

        let inner = if let Some((_, rest)) = trimmed.split_once("```json") {
            rest
        } else if let Some((_, rest)) = trimmed.split_once("```") {
            rest
        } else {
            return trimmed;
        };

        inner.split("```").next().unwrap_or(inner).trim()
    }

    /// Shorten text for log lines.
    pub fn preview(text: &str, max_chars: usize) -> String {
        if text.chars().count() > max_chars {
            format!("{}...", truncate_chars(text, max_chars))
        } else {
            text.to_string()
        }
    }
}

/// Time window utilities
pub mod time {
    use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};

    /// Parse a `--since` value relative to `now`.
    ///
    /// Accepts `Nh`, `Nd`, `Nm` (months) or an ISO date (`YYYY-MM-DD`, taken as
    /// midnight UTC).
    pub fn parse_since(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        let value = value.trim().to_lowercase();

        if let Some(unit) = value.chars().last().filter(|c| matches!(c, 'h' | 'd' | 'm')) {
            let digits = &value[..value.len() - 1];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                let amount: u32 = digits
                    .parse()
                    .map_err(|_| format!("relative window too large: {}", value))?;
                let since = match unit {
                    'h' => now.checked_sub_signed(Duration::hours(amount.into())),
                    'd' => now.checked_sub_signed(Duration::days(amount.into())),
                    _ => now.checked_sub_months(Months::new(amount)),
                };
                return since.ok_or_else(|| format!("relative window out of range: {}", value));
            }
        }

        let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map_err(|_| format!("expected Nh, Nd, Nm or YYYY-MM-DD, got '{}'", value))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("invalid date: {}", value))?;
        Ok(Utc.from_utc_datetime(&midnight))
    }

    /// The default window: everything created in the last day.
    pub fn default_since(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(1)
    }
}
