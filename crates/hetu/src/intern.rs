//! Identifier and string-literal interning.
//!
//! Scaled down from the teacher's `intern.rs` three-tier offset scheme
//! (ASCII-byte / static-string / per-executor ranges, chosen there to keep
//! bytecode operands narrow) to a single growable table: Hetu's AST nodes
//! hold `Rc<str>` directly rather than bytecode operand indices, so there is
//! no operand-width budget to economize for. The backing map is `ahash`,
//! matching the teacher's own choice throughout `intern.rs`/`object.rs`.

use std::rc::Rc;

use ahash::AHashMap;

/// Deduplicates source text into shared `Rc<str>` handles so identical
/// identifiers and string literals across a file share one allocation.
#[derive(Debug, Default)]
pub struct Interner {
    table: AHashMap<Rc<str>, Rc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self { table: AHashMap::new() }
    }

    /// Returns the shared handle for `text`, inserting it on first sight.
    pub fn intern(&mut self, text: &str) -> Rc<str> {
        if let Some(existing) = self.table.get(text) {
            return Rc::clone(existing);
        }
        let rc: Rc<str> = Rc::from(text);
        self.table.insert(Rc::clone(&rc), Rc::clone(&rc));
        rc
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_interns_share_allocation() {
        let mut interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_text_gets_distinct_handles() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }
}
