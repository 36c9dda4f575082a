//! Keypad amount entry
//!
//! Digits shift in from the right like a cash register: `1`, `2`, `5` reads
//! `0.01`, `0.12`, `1.25`.

use pos_core::minor_to_major;

/// Largest amount the keypad accepts (999 999.99)
pub const MAX_CENTS: i64 = 99_999_999;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmountEntry {
    cents: i64,
}

impl AmountEntry {
    /// Shift a digit in; ignored once the amount would exceed [`MAX_CENTS`]
    #[must_use]
    pub fn push_digit(self, digit: u8) -> Self {
        if digit > 9 {
            return self;
        }
        let cents = self.cents * 10 + i64::from(digit);
        if cents > MAX_CENTS { self } else { Self { cents } }
    }

    #[must_use]
    pub const fn backspace(self) -> Self {
        Self {
            cents: self.cents / 10,
        }
    }

    pub const fn cents(self) -> i64 {
        self.cents
    }

    pub const fn is_zero(self) -> bool {
        self.cents == 0
    }

    /// Major units with two decimals, e.g. `25.50`
    pub fn display(self) -> String {
        minor_to_major(self.cents).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(keys: &[u8]) -> AmountEntry {
        keys.iter()
            .fold(AmountEntry::default(), |entry, &d| entry.push_digit(d))
    }

    #[test]
    fn test_digits_shift_in_from_the_right() {
        assert_eq!(AmountEntry::default().display(), "0.00");
        assert_eq!(typed(&[1]).display(), "0.01");
        assert_eq!(typed(&[2, 5, 5, 0]).display(), "25.50");
        assert_eq!(typed(&[2, 5, 5, 0]).cents(), 2550);
    }

    #[test]
    fn test_backspace_and_leading_zeros() {
        assert_eq!(typed(&[0, 0, 7]).cents(), 7);
        assert_eq!(typed(&[1, 2, 3]).backspace().display(), "0.12");
        assert!(typed(&[4]).backspace().is_zero());
    }

    #[test]
    fn test_caps_at_maximum() {
        let full = typed(&[9; 8]);
        assert_eq!(full.cents(), MAX_CENTS);
        assert_eq!(full.push_digit(9), full);
        assert_eq!(typed(&[12]), AmountEntry::default());
    }
}
