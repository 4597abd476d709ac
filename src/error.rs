use thiserror::Error;

/// The unicode encoding forms understood by this crate.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Encoding {
    Utf8,
    Utf16,
    Utf32,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16 => "UTF-16",
            Encoding::Utf32 => "UTF-32",
        })
    }
}

/// A code unit sequence was not well formed in the claimed encoding.
///
/// Only returned from strict constructors and validators
/// ([`Text::from_utf8`](crate::Text::from_utf8) and friends). The lossy
/// variants never fail - they substitute U+FFFD for each maximal ill-formed
/// subsequence instead.
///
/// `offset` is the index (in code units of the source encoding) of the first
/// unit of the offending subsequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[error("ill-formed {encoding} at code unit {offset}")]
pub struct InvalidEncoding {
    pub encoding: Encoding,
    pub offset: usize,
}
