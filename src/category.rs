//! Label categorisation.
//!
//! Every label maps to exactly one [`Category`], which forms the first
//! directory level of the output tree. The mapping is a pure function of the
//! label string and is recomputed wherever it is needed.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Labels naming a complete kata. Checked before any other rule.
pub const KATA_FORMS: &[&str] = &["Heian-Nidan"];

/// Output category of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A complete named form from [`KATA_FORMS`].
    Kata,
    /// A numbered or `+`-joined combination of techniques.
    Combinations,
    /// A single technique (everything else).
    Elements,
}

impl Category {
    /// Directory name used in the output layout.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Kata => "kata",
            Category::Combinations => "combinations",
            Category::Elements => "elements",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Classify a label.
///
/// Rules, first match wins:
///
/// 1. the label is listed in [`KATA_FORMS`] → [`Category::Kata`];
/// 2. it starts with a digit or contains `+` → [`Category::Combinations`];
/// 3. otherwise → [`Category::Elements`].
///
/// # Example
///
/// ```
/// use labelclip::{Category, categorize};
///
/// assert_eq!(categorize("Heian-Nidan"), Category::Kata);
/// assert_eq!(categorize("3-step"), Category::Combinations);
/// assert_eq!(categorize("Gedan-Barai+Oi-Zuki"), Category::Combinations);
/// assert_eq!(categorize("Mae-Geri"), Category::Elements);
/// ```
pub fn categorize(label: &str) -> Category {
    if KATA_FORMS.contains(&label) {
        return Category::Kata;
    }

    let starts_with_digit = label.chars().next().is_some_and(|c| c.is_numeric());
    if starts_with_digit || label.contains('+') {
        return Category::Combinations;
    }

    Category::Elements
}
