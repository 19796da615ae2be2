//! PROPGET / PROPSET / METHOD — the class-descriptor protocol.
//!
//! Class descriptors are hashmaps of methods and properties, chained via a
//! `super` key. Roots: a hashmap is its own root; host pointers look up
//! the class map by identity; every other type by its type-name string. A
//! property stored as a hashmap with a `get`/`set` key is an accessor;
//! getters are invoked as `(self, name)`, setters as `(self, value,
//! name)`. Method lookup walks the same chain without the accessor step
//! and without the hashmap raw fallback.

use crate::error::RuntimeError;
use crate::value::{MapRef, Value};
use crate::vm::Vm;

use sable_asm::RegisterId;

use std::rc::Rc;

/// Chain links followed before giving up on a cyclic `super`.
const MAX_CHAIN: usize = 256;

enum Found {
    /// The accessor function under the requested `get`/`set` key.
    Accessor(Value),
    /// A plain non-nil value.
    Plain(Value),
    /// Nothing along the chain.
    Nothing,
}

impl Vm {
    fn class_root(&self, object: &Value) -> Option<MapRef> {
        let class = match object {
            Value::Hashmap(map) => return Some(map.clone()),
            Value::Ptr(_) => self.classes.get(object),
            other => self.classes.get(&Value::from(other.type_name())),
        };

        match class {
            Value::Hashmap(map) => Some(map),
            _ => None,
        }
    }

    /// Walk a class chain for `name`. With `accessor_key` set, a hashmap
    /// value holding that key counts as an accessor; without it (method
    /// lookup), hashmaps are plain values like any other.
    fn chain_walk(
        &self,
        root: MapRef,
        name: &Value,
        accessor_key: Option<&str>,
    ) -> Result<Found, RuntimeError> {
        let super_key = Value::from("super");
        let mut current = root;

        for _ in 0..MAX_CHAIN {
            let found = current.borrow().get(name);

            match (&found, accessor_key) {
                (Value::Nil, _) => {}
                (Value::Hashmap(accessor), Some(key)) => {
                    let func = accessor.borrow().get(&Value::from(key));
                    return if func.is_nil() {
                        Ok(Found::Plain(found.clone()))
                    } else {
                        Ok(Found::Accessor(func))
                    };
                }
                _ => return Ok(Found::Plain(found.clone())),
            }

            let parent = current.borrow().get(&super_key);
            match parent {
                Value::Hashmap(map) => current = map,
                _ => return Ok(Found::Nothing),
            }
        }

        Err(RuntimeError::ClassChainTooDeep)
    }

    /// Property read per the getter protocol.
    pub(crate) fn property_get(
        &mut self,
        object: &Value,
        name: &Rc<str>,
    ) -> Result<Value, RuntimeError> {
        // Built-in `length` short-circuits the chain.
        if name.as_ref() == "length" {
            match object {
                Value::Str(s) => return Ok(Value::Int(s.len() as i64)),
                Value::Array(items) => return Ok(Value::Int(items.borrow().len() as i64)),
                Value::Hashmap(map) => return Ok(Value::Int(map.borrow().len() as i64)),
                _ => {}
            }
        }

        let name_value = Value::Str(name.clone());

        let found = match self.class_root(object) {
            Some(root) => self.chain_walk(root, &name_value, Some("get"))?,
            None => Found::Nothing,
        };

        match found {
            Found::Accessor(getter) => {
                self.call_value_internal(&getter, &[object.clone(), name_value])
            }
            Found::Plain(value) => Ok(value),
            Found::Nothing => match object {
                // Raw fallback; an absent key reads as nil.
                Value::Hashmap(map) => Ok(map.borrow().get(&name_value)),
                _ => Err(RuntimeError::NoGetter(name.clone())),
            },
        }
    }

    /// Property write per the setter protocol.
    pub(crate) fn property_set(
        &mut self,
        object: &Value,
        name: &Rc<str>,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let name_value = Value::Str(name.clone());

        let found = match self.class_root(object) {
            Some(root) => self.chain_walk(root, &name_value, Some("set"))?,
            None => Found::Nothing,
        };

        match found {
            Found::Accessor(setter) => {
                // The setter's return value is ignored.
                self.call_value_internal(&setter, &[object.clone(), value, name_value])?;
                Ok(())
            }
            _ => match object {
                Value::Hashmap(map) => map
                    .borrow_mut()
                    .insert(name_value, value)
                    .map_err(|k| RuntimeError::InvalidKey(k.describe())),
                _ => Err(RuntimeError::NoSetter(name.clone())),
            },
        }
    }

    /// PROPGET: the destination register holds the receiver on entry and
    /// the property value on exit.
    pub(crate) fn op_propget(&mut self, dst: RegisterId, sym: u16) -> Result<(), RuntimeError> {
        let object = self.reg(dst)?.clone();
        let program = self.frame()?.program.clone();
        let name = self.symbol_string(&program, sym)?;

        let value = self.property_get(&object, &name)?;
        self.set_reg(dst, value)
    }

    /// PROPSET: object register, name register (a string), value register.
    pub(crate) fn op_propset(
        &mut self,
        obj: RegisterId,
        name: RegisterId,
        src: RegisterId,
    ) -> Result<(), RuntimeError> {
        let object = self.reg(obj)?.clone();
        let name = match self.reg(name)? {
            Value::Str(s) => s.clone(),
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "string",
                    found: other.type_name(),
                });
            }
        };
        let value = self.reg(src)?.clone();

        self.property_set(&object, &name, value)
    }

    /// METHOD: class-chain lookup without accessors or raw fallback. A nil
    /// result is valid; a missing class is not.
    pub(crate) fn op_method(
        &mut self,
        dst: RegisterId,
        obj: RegisterId,
        name: RegisterId,
    ) -> Result<(), RuntimeError> {
        let object = self.reg(obj)?.clone();
        let name = match self.reg(name)? {
            Value::Str(s) => Value::Str(s.clone()),
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "string",
                    found: other.type_name(),
                });
            }
        };

        let root = self
            .class_root(&object)
            .ok_or_else(|| RuntimeError::NoClass(object.type_name()))?;

        let value = match self.chain_walk(root, &name, None)? {
            Found::Plain(value) => value,
            _ => Value::Nil,
        };

        self.set_reg(dst, value)
    }
}
