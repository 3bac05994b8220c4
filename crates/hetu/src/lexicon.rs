//! Keyword set, operator precedence tiers, literal type names, and reserved
//! identifier prefixes (spec §4.1).
//!
//! Grounded on the teacher's `intern.rs` `StaticStrings`/`exception_private.rs`
//! `ExcType` idiom: a closed, `strum`-derived enum used as a compact const
//! table rather than ad hoc string comparisons scattered through the lexer.

use strum::{Display, EnumString};

/// Reserved words. `is` is included here (not as an operator token) because
/// the lexer never needs to special-case it; the parser treats
/// `Keyword::Is` as the one keyword usable in operator position (relational
/// tier, spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Import,
    Var,
    Let,
    Def,
    Static,
    External,
    Class,
    Extends,
    Construct,
    Get,
    Set,
    Fun,
    Proc,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    This,
    Super,
    Is,
}

impl Keyword {
    /// Looks up a keyword by its exact source spelling. Returns `None` for
    /// any identifier that isn't reserved.
    pub fn lookup(word: &str) -> Option<Self> {
        use std::str::FromStr;
        Self::from_str(word).ok()
    }
}

/// Literal type names recognized by the type parser (spec §3/§4.3).
pub const LITERAL_TYPE_NAMES: &[&str] = &["num", "bool", "String"];

/// Reserved type names (spec §3).
pub const RESERVED_TYPE_NAMES: &[&str] =
    &["num", "bool", "String", "List", "Map", "Object", "any", "void", "function", "NAMESPACE", "CLASS"];

/// Reserved identifier prefixes for synthesized names (spec §4.1).
pub const EXTERNAL_PREFIX: &str = "__external__";
pub const GETTER_PREFIX: &str = "__get__";
pub const SETTER_PREFIX: &str = "__set__";
pub const CONSTRUCTOR_NAME: &str = "__construct__";
pub const FOR_IN_INDEX_PREFIX: &str = "__i";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_roundtrips_every_spelling() {
        for kw in [
            Keyword::Import,
            Keyword::Var,
            Keyword::Let,
            Keyword::Def,
            Keyword::Static,
            Keyword::External,
            Keyword::Class,
            Keyword::Extends,
            Keyword::Construct,
            Keyword::Get,
            Keyword::Set,
            Keyword::Fun,
            Keyword::Proc,
            Keyword::Return,
            Keyword::If,
            Keyword::Else,
            Keyword::While,
            Keyword::For,
            Keyword::In,
            Keyword::Break,
            Keyword::Continue,
            Keyword::This,
            Keyword::Super,
            Keyword::Is,
        ] {
            let spelled = kw.to_string();
            assert_eq!(Keyword::lookup(&spelled), Some(kw));
        }
        assert_eq!(Keyword::lookup("notakeyword"), None);
    }
}
