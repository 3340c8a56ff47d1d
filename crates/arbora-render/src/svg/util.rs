use std::fmt::Write as _;

/// Formats an attribute number: round-trippable decimal, no `-0`, float noise snapped to
/// the nearest integer.
pub(super) fn fmt_into(out: &mut String, v: f64) {
    if !v.is_finite() {
        out.push('0');
        return;
    }

    let mut v = if v.abs() < 1e-9 { 0.0 } else { v };
    let nearest = v.round();
    if (v - nearest).abs() < 1e-6 {
        v = nearest;
    }
    if v == -0.0 {
        v = 0.0;
    }

    let _ = write!(out, "{v}");
}

pub(super) fn fmt(v: f64) -> String {
    let mut out = String::new();
    fmt_into(&mut out, v);
    out
}

/// Path coordinates are rounded half-up to three fractional digits, trailing zeros trimmed.
pub(super) fn fmt_path_into(out: &mut String, v: f64) {
    if !v.is_finite() || v.abs() < 0.0005 {
        out.push('0');
        return;
    }

    let k = (v * 1000.0 + 0.5).floor() as i64;
    if k == 0 {
        out.push('0');
        return;
    }
    if k < 0 {
        out.push('-');
    }
    let abs = k.unsigned_abs();
    let _ = write!(out, "{}", abs / 1000);
    let frac = abs % 1000;
    if frac != 0 {
        let digits = format!("{frac:03}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
}

/// Characters outside the XML `Char` production (C0 controls other than tab, LF and CR,
/// plus U+FFFE and U+FFFF) are dropped.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

pub(super) fn escape_xml_into(out: &mut String, text: &str) {
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        let esc = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            '\'' => "&#39;",
            c if !is_xml_char(c) => "",
            _ => continue,
        };
        out.push_str(&text[start..i]);
        out.push_str(esc);
        start = i + c.len_utf8();
    }
    out.push_str(&text[start..]);
}

pub(super) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_xml_into(&mut out, text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(v: f64) -> String {
        let mut s = String::new();
        fmt_path_into(&mut s, v);
        s
    }

    #[test]
    fn fmt_snaps_noise_and_negative_zero() {
        assert_eq!(fmt(f64::NAN), "0");
        assert_eq!(fmt(-0.0), "0");
        assert_eq!(fmt(1.0000004), "1");
        assert_eq!(fmt(-1.0000004), "-1");
        assert_eq!(fmt(12.5), "12.5");
    }

    #[test]
    fn path_numbers_use_three_digits() {
        assert_eq!(path(f64::INFINITY), "0");
        assert_eq!(path(0.0004), "0");
        assert_eq!(path(-0.0004), "0");
        assert_eq!(path(1.23456), "1.235");
        assert_eq!(path(1.0), "1");
        assert_eq!(path(-1.2345), "-1.234");
        assert_eq!(path(10.5), "10.5");
        assert_eq!(path(-0.25), "-0.25");
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_xml(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
        assert_eq!(escape_xml("订单"), "订单");
    }

    #[test]
    fn drops_characters_xml_cannot_carry() {
        assert_eq!(escape_xml("root\u{7}x"), "rootx");
        assert_eq!(escape_xml("a\u{0}\u{1b}b\u{FFFE}"), "ab");
        assert_eq!(escape_xml("tab\there\r\n"), "tab\there\r\n");
        assert_eq!(escape_xml("<\u{8}>"), "&lt;&gt;");
    }
}
