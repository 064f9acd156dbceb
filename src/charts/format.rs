//! Presentation formatting. Values stay at full precision until they reach
//! these helpers.

/// Insert thousands separators into an integer.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Round to whole 만원 with separators, e.g. `1,234만원`.
pub fn format_manwon(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    format!("{}만원", group_thousands(value.round() as i64))
}

pub fn format_area(value: f64) -> String {
    format!("{:.2}㎡", value)
}
