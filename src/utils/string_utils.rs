//! # String helpers
//!
//! Trimming for request fields and escaping for the HTML email templates.

use serde::Deserialize;

/// `None` for missing, empty or blank values, otherwise the trimmed value.
pub fn clean_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// serde adapter for [`clean_optional_string`].
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct UpdateProfile {
///     #[serde(default, deserialize_with = "deserialize_optional_string")]
///     phone: Option<String>,
/// }
/// ```
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(clean_optional_string(opt))
}

/// Escapes text interpolated into email HTML.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Formats an amount in minor units, e.g. `4550, "eur"` → `45.50 EUR`.
pub fn format_amount(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_optional_string() {
        assert_eq!(clean_optional_string(Some("Hello".to_string())), Some("Hello".to_string()));
        assert_eq!(clean_optional_string(Some("  World  ".to_string())), Some("World".to_string()));
        assert_eq!(clean_optional_string(Some("".to_string())), None);
        assert_eq!(clean_optional_string(Some("   ".to_string())), None);
        assert_eq!(clean_optional_string(None), None);
    }

    #[test]
    fn test_deserialize_optional_string() {
        #[derive(Deserialize)]
        struct Contact {
            #[serde(default, deserialize_with = "deserialize_optional_string")]
            phone: Option<String>,
        }

        let contact: Contact = serde_json::from_str(r#"{"phone": "  912345678 "}"#).unwrap();
        assert_eq!(contact.phone.as_deref(), Some("912345678"));

        let contact: Contact = serde_json::from_str(r#"{"phone": "   "}"#).unwrap();
        assert_eq!(contact.phone, None);

        let contact: Contact = serde_json::from_str("{}").unwrap();
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & Jerry's</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; Jerry&#39;s&lt;/b&gt;"
        );
        assert_eq!(escape_html("Lar São José"), "Lar São José");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(4550, "eur"), "45.50 EUR");
        assert_eq!(format_amount(5, "eur"), "0.05 EUR");
        assert_eq!(format_amount(-120, "usd"), "-1.20 USD");
    }
}
