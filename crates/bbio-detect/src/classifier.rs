//! Byte stream classification
//!
//! Decides whether bytes received at a candidate rate look like text. Each
//! byte is put in a [`Category`], categories are folded into a
//! [`ClassificationWindow`], and the window is confirmed once enough
//! plausible text has been seen without a single garbage byte in between.
//!
//! Nothing here does I/O or keeps state outside the window the caller owns.

/// Number of consecutive valid bytes needed before a rate can be confirmed
pub const CONFIRMATION_THRESHOLD: u32 = 25;

/// Whitespace bytes (also counted as valid)
pub const WHITESPACE: &[u8] = b" \t\r\n";

/// Punctuation bytes tracked by the window
pub const PUNCTUATION: &[u8] = b".,:;?!";

/// Vowels in either case
pub const VOWELS: &[u8] = b"aAeEiIoOuU";

/// Adapter control and sync bytes that must not count as garbage
///
/// Shift-out/shift-in and the bytes the adapter emits around bridge
/// transitions show up in an otherwise clean stream.
pub const CONTROL: &[u8] = &[0x0E, 0x0F, 0xE0, 0xFE, 0xC0];

/// The closed set of bytes accepted as text
#[derive(Debug, Clone)]
pub struct ValidCharacterSet {
    table: [bool; 256],
}

impl ValidCharacterSet {
    /// Printable ASCII, whitespace and adapter control bytes
    pub const fn standard() -> Self {
        let mut table = [false; 256];

        let mut b = 0x20;
        while b <= 0x7E {
            table[b] = true;
            b += 1;
        }

        let mut i = 0;
        while i < WHITESPACE.len() {
            table[WHITESPACE[i] as usize] = true;
            i += 1;
        }

        let mut i = 0;
        while i < CONTROL.len() {
            table[CONTROL[i] as usize] = true;
            i += 1;
        }

        Self { table }
    }

    /// Returns true if the byte belongs to the set
    pub fn contains(&self, byte: u8) -> bool {
        self.table[byte as usize]
    }

    /// Iterate over every member of the set in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |b| self.contains(*b))
    }
}

impl Default for ValidCharacterSet {
    fn default() -> Self {
        Self::standard()
    }
}

static VALID: ValidCharacterSet = ValidCharacterSet::standard();

/// Classification of a single received byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Whitespace,
    Punctuation,
    Vowel,
    /// Valid but not otherwise interesting (consonants, digits, symbols, control)
    OtherValid,
    /// Outside the valid character set
    Invalid,
}

/// Classify a byte against the standard valid character set
///
/// Whitespace wins over punctuation, punctuation over vowels; a byte is only
/// ever in one category.
pub fn classify(byte: u8) -> Category {
    if !VALID.contains(byte) {
        Category::Invalid
    } else if WHITESPACE.contains(&byte) {
        Category::Whitespace
    } else if PUNCTUATION.contains(&byte) {
        Category::Punctuation
    } else if VOWELS.contains(&byte) {
        Category::Vowel
    } else {
        Category::OtherValid
    }
}

/// Render a byte for progress display
pub fn describe(byte: u8) -> String {
    if (0x20..=0x7E).contains(&byte) {
        (byte as char).to_string()
    } else {
        format!("0x{:02x}", byte)
    }
}

/// Evidence accumulated for the current candidate rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationWindow {
    /// Valid bytes seen since the last reset
    pub total_valid: u32,
    pub whitespace: u32,
    pub punctuation: u32,
    pub vowel: u32,
}

impl ClassificationWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one category into the window
    ///
    /// An `Invalid` byte throws away everything accumulated so far.
    #[must_use]
    pub fn observe(self, category: Category) -> Self {
        let mut next = self;
        match category {
            Category::Invalid => return Self::default(),
            Category::Whitespace => next.whitespace += 1,
            Category::Punctuation => next.punctuation += 1,
            Category::Vowel => next.vowel += 1,
            Category::OtherValid => {}
        }
        next.total_valid += 1;
        next
    }

    /// Returns true once the window holds enough plausible text
    ///
    /// Punctuation is tracked but not required.
    pub fn is_confirmed(&self) -> bool {
        self.total_valid >= CONFIRMATION_THRESHOLD && self.whitespace >= 1 && self.vowel >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fold(bytes: &[u8]) -> ClassificationWindow {
        bytes
            .iter()
            .fold(ClassificationWindow::new(), |w, b| w.observe(classify(*b)))
    }

    #[test]
    fn test_set_membership() {
        let set = ValidCharacterSet::standard();
        assert!(set.contains(b' '));
        assert!(set.contains(b'~'));
        assert!(set.contains(b'\t'));
        assert!(set.contains(b'\r'));
        assert!(set.contains(b'\n'));
        assert!(set.contains(0x0E));
        assert!(set.contains(0xC0));
        assert!(!set.contains(0x00));
        assert!(!set.contains(0x7F));
        assert!(!set.contains(0xFF));
        // 95 printable + tab, CR, LF + 5 control bytes
        assert_eq!(set.iter().count(), 95 + 3 + 5);
    }

    #[test]
    fn test_categories() {
        assert_eq!(classify(b' '), Category::Whitespace);
        assert_eq!(classify(b'\n'), Category::Whitespace);
        assert_eq!(classify(b'!'), Category::Punctuation);
        assert_eq!(classify(b','), Category::Punctuation);
        assert_eq!(classify(b'E'), Category::Vowel);
        assert_eq!(classify(b'u'), Category::Vowel);
        assert_eq!(classify(b'y'), Category::OtherValid);
        assert_eq!(classify(b'7'), Category::OtherValid);
        assert_eq!(classify(0xFE), Category::OtherValid);
        assert_eq!(classify(0x80), Category::Invalid);
    }

    #[test]
    fn test_observe_counts() {
        let window = fold(b"hi, you");
        assert_eq!(window.total_valid, 7);
        assert_eq!(window.whitespace, 1);
        assert_eq!(window.punctuation, 1);
        assert_eq!(window.vowel, 3);
    }

    #[test]
    fn test_invalid_resets_window() {
        let mut bytes = b"hello world, this is a test".to_vec();
        bytes.push(0xFF);
        assert_eq!(fold(&bytes), ClassificationWindow::default());

        bytes.extend_from_slice(b"ok");
        let window = fold(&bytes);
        assert_eq!(window.total_valid, 2);
        assert_eq!(window.vowel, 1);
    }

    #[test]
    fn test_confirmation_boundary() {
        let window = ClassificationWindow {
            total_valid: 25,
            whitespace: 1,
            punctuation: 0,
            vowel: 1,
        };
        assert!(window.is_confirmed());

        let short = ClassificationWindow {
            total_valid: 24,
            ..window
        };
        assert!(!short.is_confirmed());

        let no_space = ClassificationWindow {
            whitespace: 0,
            ..window
        };
        assert!(!no_space.is_confirmed());

        let no_vowel = ClassificationWindow { vowel: 0, ..window };
        assert!(!no_vowel.is_confirmed());
    }

    #[test]
    fn test_sample_sentence_confirms() {
        let window = fold(b"hello world, this is a test.\r\n");
        assert!(window.is_confirmed());
        // Confirmed as soon as the 25th byte arrives
        assert!(fold(&b"hello world, this is a test.\r\n"[..25]).is_confirmed());
        assert!(!fold(&b"hello world, this is a test.\r\n"[..24]).is_confirmed());
    }

    #[test]
    fn test_consonants_never_confirm() {
        let window = fold(&[b'x'; 100]);
        assert_eq!(window.total_valid, 100);
        assert!(!window.is_confirmed());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(b'a'), "a");
        assert_eq!(describe(0x0A), "0x0a");
        assert_eq!(describe(0xFE), "0xfe");
    }

    proptest! {
        #[test]
        fn prop_invalid_iff_outside_set(byte in any::<u8>()) {
            let set = ValidCharacterSet::standard();
            prop_assert_eq!(classify(byte) == Category::Invalid, !set.contains(byte));
        }

        #[test]
        fn prop_observe_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            prop_assert_eq!(fold(&bytes), fold(&bytes));
        }

        #[test]
        fn prop_invalid_zeroes_window(
            prefix in proptest::collection::vec(0x20u8..=0x7E, 0..100),
            bad in 0x80u8..=0xBF,
        ) {
            let mut bytes = prefix;
            bytes.push(bad);
            prop_assert_eq!(fold(&bytes), ClassificationWindow::default());
        }

        #[test]
        fn prop_short_windows_never_confirm(bytes in proptest::collection::vec(0x20u8..=0x7E, 0..25)) {
            prop_assert!(!fold(&bytes).is_confirmed());
        }
    }
}
