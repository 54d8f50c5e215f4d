use ratatui::prelude::Color;

/// Truncate a string to a maximum number of chars, adding "..." if
/// truncated. Cuts on a char boundary, so non-ASCII names are safe.
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    return s.to_string();
  }
  let keep = max_len.saturating_sub(3);
  let cut = s
    .char_indices()
    .nth(keep)
    .map(|(i, _)| i)
    .unwrap_or(s.len());
  format!("{}...", &s[..cut])
}

/// Get the display color for a backend status string
pub fn status_color(status: &str) -> Color {
  match status.to_ascii_lowercase().as_str() {
    "active" | "published" | "paid" | "completed" | "answered" => Color::Green,
    "pending" | "draft" | "processing" => Color::Yellow,
    "rejected" | "expired" | "cancelled" | "refunded" => Color::Red,
    _ => Color::White,
  }
}

/// Format a dollar amount with thousands separators, e.g. `$1,234.50`
pub fn format_money(amount: f64) -> String {
  let cents = (amount.abs() * 100.0).round() as u64;
  let dollars = (cents / 100).to_string();
  let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
  for (i, c) in dollars.chars().enumerate() {
    if i > 0 && (dollars.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  let sign = if amount < 0.0 { "-" } else { "" };
  format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Format a backend timestamp as a short date.
///
/// The API sends RFC 3339 strings; anything unparseable is shown as-is
/// rather than hidden.
pub fn format_date(raw: &str) -> String {
  if raw.is_empty() {
    return String::new();
  }
  match chrono::DateTime::parse_from_rfc3339(raw) {
    Ok(dt) => dt.format("%Y-%m-%d").to_string(),
    Err(_) => raw.to_string(),
  }
}
