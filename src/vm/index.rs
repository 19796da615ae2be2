//! IDXGET / IDXSET / ARRPUSH and the indexing validation rules.
//!
//! Arrays and (on reads) strings take an integer index in `[0, count)`;
//! hashmaps take any non-nil, non-NaN key and treat a nil store as a
//! delete. Everything else is not indexable.

use crate::error::RuntimeError;
use crate::map::{validate_key, InvalidKey};
use crate::value::Value;
use crate::vm::Vm;

use sable_asm::RegisterId;

fn key_error(key: InvalidKey) -> RuntimeError {
    RuntimeError::InvalidKey(key.describe())
}

fn array_index(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::NonIntegerIndex(index.type_name()));
    };

    if *i < 0 || *i as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index: *i, len });
    }

    Ok(*i as usize)
}

fn index_get(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match container {
        Value::Array(items) => {
            let items = items.borrow();
            let at = array_index(index, items.len())?;
            Ok(items[at].clone())
        }
        Value::Str(s) => {
            let at = array_index(index, s.len())?;
            Ok(Value::Int(s.as_bytes()[at] as i64))
        }
        Value::Hashmap(map) => {
            validate_key(index).map_err(key_error)?;
            Ok(map.borrow().get(index))
        }
        other => Err(RuntimeError::NotIndexable(other.type_name())),
    }
}

fn index_set(container: &Value, index: Value, value: Value) -> Result<(), RuntimeError> {
    match container {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let at = array_index(&index, items.len())?;
            items[at] = value;
            Ok(())
        }
        Value::Hashmap(map) => map.borrow_mut().insert(index, value).map_err(key_error),
        other => Err(RuntimeError::NotIndexable(other.type_name())),
    }
}

impl Vm {
    pub(crate) fn op_idx_get(
        &mut self,
        dst: RegisterId,
        obj: RegisterId,
        idx: RegisterId,
    ) -> Result<(), RuntimeError> {
        let container = self.reg(obj)?.clone();
        let index = self.reg(idx)?.clone();
        let value = index_get(&container, &index)?;
        self.set_reg(dst, value)
    }

    pub(crate) fn op_idx_set(
        &mut self,
        obj: RegisterId,
        idx: RegisterId,
        src: RegisterId,
    ) -> Result<(), RuntimeError> {
        let container = self.reg(obj)?.clone();
        let index = self.reg(idx)?.clone();
        let value = self.reg(src)?.clone();
        index_set(&container, index, value)
    }

    pub(crate) fn op_arr_push(
        &mut self,
        arr: RegisterId,
        src: RegisterId,
    ) -> Result<(), RuntimeError> {
        let value = self.reg(src)?.clone();
        match self.reg(arr)? {
            Value::Array(items) => {
                items.borrow_mut().push(value);
                Ok(())
            }
            other => Err(RuntimeError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_bounds_are_checked_on_raw_integers() {
        let array = Value::array_from(vec![Value::Int(10), Value::Int(20)]);

        assert_eq!(index_get(&array, &Value::Int(1)).unwrap(), Value::Int(20));
        assert_eq!(
            index_get(&array, &Value::Int(-1)),
            Err(RuntimeError::IndexOutOfBounds { index: -1, len: 2 })
        );
        assert_eq!(
            index_get(&array, &Value::Int(2)),
            Err(RuntimeError::IndexOutOfBounds { index: 2, len: 2 })
        );
    }

    #[test]
    fn float_indices_are_rejected() {
        let array = Value::array_from(vec![Value::Int(10)]);

        assert_eq!(
            index_get(&array, &Value::Float(0.0)),
            Err(RuntimeError::NonIntegerIndex("number"))
        );
    }

    #[test]
    fn string_reads_yield_bytes() {
        let s = Value::from("AB");

        assert_eq!(index_get(&s, &Value::Int(0)).unwrap(), Value::Int(65));
        assert!(index_set(&s, Value::Int(0), Value::Int(0)).is_err());
    }

    #[test]
    fn hashmap_set_to_nil_deletes() {
        let map = Value::new_hashmap();

        index_set(&map, Value::from("k"), Value::Int(1)).unwrap();
        assert_eq!(index_get(&map, &Value::from("k")).unwrap(), Value::Int(1));

        index_set(&map, Value::from("k"), Value::Nil).unwrap();
        assert_eq!(index_get(&map, &Value::from("k")).unwrap(), Value::Nil);
    }

    #[test]
    fn invalid_hashmap_keys_error() {
        let map = Value::new_hashmap();

        assert_eq!(
            index_set(&map, Value::Nil, Value::Int(1)),
            Err(RuntimeError::InvalidKey("nil"))
        );
        assert_eq!(
            index_set(&map, Value::Float(f64::NAN), Value::Int(1)),
            Err(RuntimeError::InvalidKey("NaN"))
        );
    }
}
