//! Number formatting shared by the market data blobs, so the model can quote figures verbatim.

/// Groups the integer part with commas: `1234567.891` -> `1,234,567.89`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// US dollar amount. Sub-dollar prices keep six decimals so small caps stay readable.
pub fn usd(value: f64) -> String {
    let decimals = if value.abs() >= 1.0 || value == 0.0 { 2 } else { 6 };
    let grouped = group_thousands(value, decimals);
    match grouped.strip_prefix('-') {
        Some(rest) => format!("-${}", rest),
        None => format!("${}", grouped),
    }
}

/// Whole-dollar amount for large figures such as market cap and volume.
pub fn usd_whole(value: f64) -> String {
    format!("${}", group_thousands(value, 0))
}

/// Percentage with an explicit sign: `+2.35%`, `-0.10%`, `0.00%`.
pub fn signed_percent(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    if rounded == "0.00" || rounded == "-0.00" {
        "0.00%".to_string()
    } else if value > 0.0 {
        format!("+{}%", rounded)
    } else {
        format!("{}%", rounded)
    }
}

/// Missing numeric fields render as `N/A` rather than zero.
pub fn or_na(value: Option<f64>, f: fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| "N/A".to_string())
}
