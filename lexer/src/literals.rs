use model::IntegerSuffix;

/// Decodes one escape sequence starting right after the backslash.
/// Advances `pos` past the sequence.
pub fn decode_escape(bytes: &[u8], pos: &mut usize) -> Result<u8, String> {
    let Some(&c) = bytes.get(*pos) else {
        return Err("incomplete escape sequence".to_string());
    };
    *pos += 1;
    Ok(match c {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'\\' => b'\\',
        b'\'' => b'\'',
        b'"' => b'"',
        b'?' => b'?',
        b'a' => 7,
        b'b' => 8,
        b'f' => 12,
        b'v' => 11,
        b'x' => {
            let start = *pos;
            while bytes.get(*pos).is_some_and(u8::is_ascii_hexdigit) {
                *pos += 1;
            }
            if *pos == start {
                return Err("\\x used with no following hex digits".to_string());
            }
            let digits = std::str::from_utf8(&bytes[start..*pos]).map_err(|e| e.to_string())?;
            let value = u32::from_str_radix(digits, 16).map_err(|_| "hex escape sequence out of range".to_string())?;
            u8::try_from(value).map_err(|_| "hex escape sequence out of range".to_string())?
        }
        b'0'..=b'7' => {
            let mut value = u32::from(c - b'0');
            let mut count = 1;
            while count < 3 {
                match bytes.get(*pos) {
                    Some(&d @ b'0'..=b'7') => {
                        value = value * 8 + u32::from(d - b'0');
                        *pos += 1;
                        count += 1;
                    }
                    _ => break,
                }
            }
            u8::try_from(value).map_err(|_| "octal escape sequence out of range".to_string())?
        }
        other => return Err(format!("unknown escape sequence '\\{}'", char::from(other))),
    })
}

/// Parses the content between the quotes of a character literal.
/// Single characters are sign-extended like a signed `char`; multi-character
/// constants pack big-endian.
pub fn parse_char_literal(content: &[u8]) -> Result<i64, String> {
    let mut bytes = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        if content[pos] == b'\\' {
            pos += 1;
            bytes.push(decode_escape(content, &mut pos)?);
        } else {
            bytes.push(content[pos]);
            pos += 1;
        }
    }
    match bytes.as_slice() {
        [] => Err("empty character constant".to_string()),
        [b] => Ok(i64::from(*b as i8)),
        many if many.len() <= 4 => Ok(many.iter().fold(0i64, |acc, &b| (acc << 8) | i64::from(b))),
        _ => Err("character constant too long".to_string()),
    }
}

/// Parses an integer constant with optional suffix. Returns the value,
/// the suffix and whether the constant was written in decimal.
pub fn parse_int_constant(text: &str) -> Result<(u64, IntegerSuffix, bool), String> {
    let lower = text.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    let digits_end = body
        .find(|c: char| !c.is_digit(radix.max(10)) && !(radix == 16 && c.is_ascii_hexdigit()))
        .unwrap_or(body.len());
    let (digits, suffix) = body.split_at(digits_end);
    if digits.is_empty() {
        // "0" followed by a suffix, e.g. "0u", lands here as octal with no digits.
        if radix != 8 {
            return Err(format!("invalid integer constant '{text}'"));
        }
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_digit(radix)) {
        return Err(format!("invalid digit '{bad}' in integer constant '{text}'"));
    }
    let value = if digits.is_empty() {
        0
    } else {
        u64::from_str_radix(digits, radix).map_err(|_| format!("integer constant '{text}' is too large"))?
    };
    let suffix = match suffix {
        "" => IntegerSuffix::None,
        "u" => IntegerSuffix::U,
        "l" => IntegerSuffix::L,
        "ul" | "lu" => IntegerSuffix::UL,
        "ll" => IntegerSuffix::LL,
        "ull" | "llu" => IntegerSuffix::ULL,
        other => return Err(format!("invalid suffix '{other}' on integer constant")),
    };
    Ok((value, suffix, radix == 10))
}

/// Parses a floating constant. Returns the value and whether it has an `f` suffix.
pub fn parse_float_literal(text: &str) -> Result<(f64, bool), String> {
    let (body, single) = match text.as_bytes().last() {
        Some(b'f' | b'F') => (&text[..text.len() - 1], true),
        Some(b'l' | b'L') => (&text[..text.len() - 1], false),
        _ => (text, false),
    };
    let value = body
        .parse::<f64>()
        .map_err(|_| format!("invalid floating constant '{text}'"))?;
    Ok((value, single))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── parse_char_literal tests ───────────────────────────────
    #[test]
    fn char_regular() {
        assert_eq!(parse_char_literal(b"A").unwrap(), 65);
    }

    #[test]
    fn char_simple_escapes() {
        assert_eq!(parse_char_literal(b"\\n").unwrap(), 10);
        assert_eq!(parse_char_literal(b"\\t").unwrap(), 9);
        assert_eq!(parse_char_literal(b"\\0").unwrap(), 0);
        assert_eq!(parse_char_literal(b"\\\\").unwrap(), 92);
        assert_eq!(parse_char_literal(b"\\'").unwrap(), 39);
        assert_eq!(parse_char_literal(b"\\v").unwrap(), 11);
    }

    #[test]
    fn char_octal_escape() {
        assert_eq!(parse_char_literal(b"\\101").unwrap(), 65);
        assert_eq!(parse_char_literal(b"\\077").unwrap(), 63);
    }

    #[test]
    fn char_hex_escape_is_sign_extended() {
        assert_eq!(parse_char_literal(b"\\x41").unwrap(), 0x41);
        assert_eq!(parse_char_literal(b"\\xff").unwrap(), -1);
    }

    #[test]
    fn char_multichar_packs_big_endian() {
        assert_eq!(parse_char_literal(b"AB").unwrap(), (65 << 8) | 66);
    }

    #[test]
    fn char_errors() {
        assert!(parse_char_literal(b"").is_err());
        assert!(parse_char_literal(b"\\q").is_err());
        assert!(parse_char_literal(b"\\x").is_err());
    }

    // ─── parse_int_constant tests ───────────────────────────────
    #[test]
    fn int_radixes() {
        assert_eq!(parse_int_constant("42").unwrap(), (42, IntegerSuffix::None, true));
        assert_eq!(parse_int_constant("0").unwrap(), (0, IntegerSuffix::None, true));
        assert_eq!(parse_int_constant("0xAbCd").unwrap(), (0xABCD, IntegerSuffix::None, false));
        assert_eq!(parse_int_constant("0777").unwrap(), (0o777, IntegerSuffix::None, false));
        assert_eq!(parse_int_constant("0b1010").unwrap(), (10, IntegerSuffix::None, false));
    }

    #[test]
    fn int_suffixes() {
        assert_eq!(parse_int_constant("42U").unwrap().1, IntegerSuffix::U);
        assert_eq!(parse_int_constant("100ul").unwrap().1, IntegerSuffix::UL);
        assert_eq!(parse_int_constant("100LU").unwrap().1, IntegerSuffix::UL);
        assert_eq!(parse_int_constant("999ULL").unwrap().1, IntegerSuffix::ULL);
        assert_eq!(parse_int_constant("0xFFL").unwrap(), (255, IntegerSuffix::L, false));
        assert_eq!(parse_int_constant("0u").unwrap(), (0, IntegerSuffix::U, false));
    }

    #[test]
    fn int_errors() {
        assert!(parse_int_constant("09").is_err());
        assert!(parse_int_constant("12abc").is_err());
        assert!(parse_int_constant("0x").is_err());
        assert!(parse_int_constant("99999999999999999999999").is_err());
    }

    // ─── parse_float_literal tests ──────────────────────────────
    #[test]
    fn float_forms() {
        assert_eq!(parse_float_literal("3.5").unwrap(), (3.5, false));
        assert_eq!(parse_float_literal("3.5f").unwrap(), (3.5, true));
        assert_eq!(parse_float_literal(".5").unwrap(), (0.5, false));
        assert_eq!(parse_float_literal("1.").unwrap(), (1.0, false));
        assert_eq!(parse_float_literal("2.0L").unwrap(), (2.0, false));
        assert!((parse_float_literal("1e-2").unwrap().0 - 0.01).abs() < 1e-12);
    }

    #[test]
    fn float_invalid_is_error() {
        assert!(parse_float_literal("1e").is_err());
    }
}
