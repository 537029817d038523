use std::rc::Rc;

use hashbrown::HashMap;

/// An interned symbol: identity is the dense id the interner assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sym(u32);

impl Sym {
    pub fn from_raw(raw: u32) -> Self {
        Sym(raw)
    }

    pub fn into_raw(self) -> u32 {
        self.0
    }

    /// Dense index, assigned from zero in insertion order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The engine-owned symbol table: byte strings in, dense ids out.
///
/// Equal inputs intern to equal symbols; ids are assigned from zero in
/// insertion order. Entries are reference-counted slices shared between the
/// store and the reverse index, so the stored bytes never move while the
/// interner lives. An engine owns exactly one of these (no process-wide
/// table), and a host may swap in a pre-seeded one before registering
/// anything against the engine.
#[derive(Default)]
pub struct Interner {
    strings: Vec<Rc<[u8]>>,
    index: HashMap<Rc<[u8]>, Sym>,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    pub fn intern(&mut self, bytes: &[u8]) -> Sym {
        if let Some(&sym) = self.index.get(bytes) {
            return sym;
        }
        let sym = Sym(self.strings.len() as u32);
        let stored: Rc<[u8]> = Rc::from(bytes);
        self.strings.push(Rc::clone(&stored));
        self.index.insert(stored, sym);
        sym
    }

    /// Resolve a symbol produced by this interner. Panics on a foreign id.
    pub fn resolve(&self, sym: Sym) -> &[u8] {
        &self.strings[sym.index()]
    }

    pub fn try_resolve(&self, sym: Sym) -> Option<&[u8]> {
        self.strings.get(sym.index()).map(|bytes| &**bytes)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn intern_and_resolve() {
        let mut interner = Interner::new();
        let id = interner.intern(b"hello");
        assert_eq!(interner.resolve(id), b"hello");
    }

    #[test]
    fn same_bytes_same_id() {
        let mut interner = Interner::new();
        let a = interner.intern(b"interact");
        let b = interner.intern(b"interact");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_bytes_distinct_ids() {
        let mut interner = Interner::new();
        let a = interner.intern(b"stone");
        let b = interner.intern(b"grass");
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_dense_from_zero() {
        let mut interner = Interner::new();
        let a = interner.intern(b"first");
        let b = interner.intern(b"second");
        let c = interner.intern(b"third");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 2);
        // Re-interning does not advance the counter
        assert_eq!(interner.intern(b"second").index(), 1);
        assert_eq!(interner.len(), 3);
    }

    #[test]
    fn empty_bytes_intern() {
        let mut interner = Interner::new();
        let id = interner.intern(b"");
        assert_eq!(interner.resolve(id), b"");
    }

    #[test]
    fn non_utf8_bytes_round_trip() {
        let mut interner = Interner::new();
        let raw = [0xff, 0xfe, b'x', 0x00];
        let id = interner.intern(&raw);
        assert_eq!(interner.resolve(id), raw);
        assert_eq!(interner.intern(&raw), id);
    }

    #[test]
    fn foreign_key_fails() {
        let interner = Interner::new();
        assert!(interner.try_resolve(Sym::from_raw(7)).is_none());
    }

    proptest! {
        #[test]
        fn round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut interner = Interner::new();
            let id = interner.intern(&bytes);
            prop_assert_eq!(interner.resolve(id), bytes.as_slice());
        }

        #[test]
        fn intern_is_idempotent(
            strings in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..12),
                1..32,
            )
        ) {
            let mut interner = Interner::new();
            let first: Vec<Sym> = strings.iter().map(|s| interner.intern(s)).collect();
            let second: Vec<Sym> = strings.iter().map(|s| interner.intern(s)).collect();
            prop_assert_eq!(first, second);
        }
    }
}
