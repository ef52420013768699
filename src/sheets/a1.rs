//! A1-notation helpers for building range strings.

/// 0-based column index to its A1 letter ("A", "Z", "AA", ...).
pub fn col_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// A1 letter back to its 0-based column index; `None` for non-letters.
pub fn col_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        index = index * 26 + (c as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// Quotes a sheet title for use in a range when it needs it.
pub fn sheet_prefix(title: &str) -> String {
    if title.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        title.to_string()
    } else {
        format!("'{}'", title.replace('\'', "''"))
    }
}

/// Range covering one full row (1-based) across `cols` columns of `sheet`.
pub fn row_range(sheet: &str, row: usize, cols: usize) -> String {
    format!(
        "{}!A{}:{}{}",
        sheet_prefix(sheet),
        row,
        col_letter(cols - 1),
        row
    )
}

/// Range covering one whole column (0-based index) of `sheet`.
pub fn col_range(sheet: &str, col: usize) -> String {
    let letter = col_letter(col);
    format!("{}!{}:{}", sheet_prefix(sheet), letter, letter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip() {
        for (i, s) in [(0, "A"), (25, "Z"), (26, "AA"), (51, "AZ"), (52, "BA"), (701, "ZZ")] {
            assert_eq!(col_letter(i), s);
            assert_eq!(col_index(s), Some(i));
        }
        for i in 0..1000 {
            assert_eq!(col_index(&col_letter(i)), Some(i));
        }
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(col_index(""), None);
        assert_eq!(col_index("a1"), None);
    }

    #[test]
    fn ranges_format() {
        assert_eq!(row_range("Master", 2, 15), "Master!A2:O2");
        assert_eq!(col_range("Master", 0), "Master!A:A");
        assert_eq!(
            row_range("Abrechnung u1 2025-03", 4, 9),
            "'Abrechnung u1 2025-03'!A4:I4"
        );
    }
}
