//! Conversion between 0-based (row, column) indexes and A1-style references.

/// Column letters for a 0-based column index (0 → "A", 26 → "AA").
pub fn col_to_letters(col: usize) -> String {
    let mut letters = Vec::new();
    let mut remainder = col + 1;
    while remainder > 0 {
        remainder -= 1;
        letters.push(b'A' + (remainder % 26) as u8);
        remainder /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}

/// 0-based column index for column letters, case-insensitive.
pub fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.bytes().try_fold(0usize, |index, byte| {
        let digit = match byte {
            b'A'..=b'Z' => byte - b'A',
            b'a'..=b'z' => byte - b'a',
            _ => return None,
        };
        index.checked_mul(26)?.checked_add(digit as usize + 1)
    }).map(|index| index - 1)
}

/// 0-based row index for a 1-based row number.
pub fn row_to_index(digits: &str) -> Option<usize> {
    digits.parse::<usize>().ok().and_then(|row| row.checked_sub(1))
}

/// Splits "AB12" into 0-based (row, column).
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim().trim_start_matches('$');
    let split = reference.find(|c: char| c.is_ascii_digit() || c == '$')?;
    let (letters, digits) = reference.split_at(split);
    let col = col_to_index(letters)?;
    let row = row_to_index(digits.trim_start_matches('$'))?;
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip_edges() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
        assert_eq!(col_to_index("AAA"), Some(702));
        assert_eq!(col_to_index("zz"), Some(701));
    }

    #[test]
    fn references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(6, 2), "C7");
        assert_eq!(reference_to_index("C7"), Some((6, 2)));
        assert_eq!(reference_to_index("$AB$12"), Some((11, 27)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A1B"), None);
    }
}
