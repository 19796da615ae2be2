//! Local symbol-table construction.
//!
//! Every distinct string literal and unresolved global name is interned
//! once; nested function definitions get one entry each. The table is
//! serialised after the executable region in insertion order, which is the
//! order LDSYM's 16-bit operand indexes at run time.

use crate::compiler::emit::CodeBuf;
use crate::consts::MAX_SYMBOLS;

use sable_asm::{encode_str, SymbolId, SymbolTag, Word};

use hashbrown::HashMap;

use std::rc::Rc;

#[derive(Debug)]
enum Entry {
    Str(Rc<str>),
    Stub(Rc<str>),
    Func { name: Rc<str>, entry: usize },
}

/// Interning builder for one translation unit's symbol table.
#[derive(Debug, Default)]
pub(crate) struct SymtabBuilder {
    entries: Vec<Entry>,
    strings: HashMap<Rc<str>, SymbolId>,
    stubs: HashMap<Rc<str>, SymbolId>,
}

impl SymtabBuilder {
    /// Number of entries so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, entry: Entry) -> Option<SymbolId> {
        if self.entries.len() >= MAX_SYMBOLS {
            return None;
        }

        let id = self.entries.len() as SymbolId;
        self.entries.push(entry);
        Some(id)
    }

    /// Intern a string constant; repeated literals share one slot.
    pub fn string(&mut self, s: &Rc<str>) -> Option<SymbolId> {
        if let Some(&id) = self.strings.get(s) {
            return Some(id);
        }

        let id = self.push(Entry::Str(s.clone()))?;
        self.strings.insert(s.clone(), id);
        Some(id)
    }

    /// Intern an unresolved global reference; repeated names share one
    /// slot, so LDSYM memoisation covers every use site.
    pub fn stub(&mut self, name: &Rc<str>) -> Option<SymbolId> {
        if let Some(&id) = self.stubs.get(name) {
            return Some(id);
        }

        let id = self.push(Entry::Stub(name.clone()))?;
        self.stubs.insert(name.clone(), id);
        Some(id)
    }

    /// Record a function defined at word offset `entry`. One slot per
    /// definition site.
    pub fn function(&mut self, name: Rc<str>, entry: usize) -> Option<SymbolId> {
        self.push(Entry::Func { name, entry })
    }

    /// Serialise all entries after the executable region.
    pub fn write(&self, code: &mut CodeBuf) {
        for entry in &self.entries {
            match entry {
                Entry::Str(s) => {
                    code.word((SymbolTag::String as Word) | ((s.len() as Word) << 8));
                    for word in encode_str(s) {
                        code.word(word);
                    }
                }
                Entry::Stub(name) => {
                    code.word((SymbolTag::Stub as Word) | ((name.len() as Word) << 8));
                    for word in encode_str(name) {
                        code.word(word);
                    }
                }
                Entry::Func { name, entry } => {
                    code.word(SymbolTag::Function as Word);
                    code.word(*entry as Word);
                    code.word(name.len() as Word);
                    for word in encode_str(name) {
                        code.word(word);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_and_stubs_are_deduplicated() {
        let mut symtab = SymtabBuilder::default();
        let a: Rc<str> = Rc::from("hello");

        assert_eq!(symtab.string(&a), Some(0));
        assert_eq!(symtab.string(&Rc::from("hello")), Some(0));
        assert_eq!(symtab.stub(&Rc::from("print")), Some(1));
        assert_eq!(symtab.stub(&Rc::from("print")), Some(1));
        assert_eq!(symtab.len(), 2);
    }

    #[test]
    fn function_entries_are_not_deduplicated() {
        let mut symtab = SymtabBuilder::default();

        assert_eq!(symtab.function(Rc::from("f"), 10), Some(0));
        assert_eq!(symtab.function(Rc::from("f"), 20), Some(1));
    }
}
