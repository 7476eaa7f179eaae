use std::rc::Rc;
use std::collections::HashMap;
use std::collections::TryReserveError;
use std::cell::RefCell;
use crate::types::value::{LuaValue, LuaValueFullEq};
use crate::error::ArgumentError;
use std::fmt;
use crate::constants::types::LUA_INT;
use std::fmt::{Display, Formatter, Debug};
use crate::types::{AsLuaPointer, ref_to_pointer, LuaType, CoerceFrom};

/// Array part holds keys 1..=array.len(), which must all be non-nil; Everything else lives in the hash part
#[derive(Debug)]
struct TableImpl {
    map: HashMap<LuaValueFullEq, LuaValue>,
    array: Vec<LuaValue>,
}

impl TableImpl {
    /// Moves consecutive integer keys following the array part from the hash part into the array part
    fn migrate_from_map(&mut self) {
        loop {
            let next_key = LuaValue::from((self.array.len() + 1) as LUA_INT);
            match next_key.try_full_eq().ok().and_then(|key| self.map.remove(&key)) {
                Some(value) => self.array.push(value),
                None => break,
            }
        }
    }
}

#[derive(Clone)]
pub struct LuaTable {
    inner: Rc<(RefCell<TableImpl>, RefCell<Option<LuaTable>>)>   // Where inner.0 = TableImpl, and inner.1 = table's metatable
}

impl LuaTable {
    pub fn empty() -> LuaTable {
        LuaTable::with_capacity(0, 0)
    }

    pub fn with_capacity(array_capacity: usize, hash_capacity: usize) -> LuaTable {
        LuaTable {
            inner: Rc::new((RefCell::new(TableImpl {
                map: HashMap::with_capacity(hash_capacity),
                array: Vec::with_capacity(array_capacity),
            }), RefCell::from(None)))
        }
    }

    /// Fallible variant of `with_capacity`, reporting allocation failure instead of aborting
    pub fn try_with_capacity(array_capacity: usize, hash_capacity: usize) -> Result<LuaTable, TryReserveError> {
        let mut map = HashMap::new();
        map.try_reserve(hash_capacity)?;
        let mut array = Vec::new();
        array.try_reserve(array_capacity)?;
        Ok(LuaTable {
            inner: Rc::new((RefCell::new(TableImpl { map, array }), RefCell::from(None)))
        })
    }

    /// `table::get` but for Into<LuaValue> keys
    pub fn raw_get_into<K: Into<LuaValue>>(&self, key: K) -> LuaValue {
        self.raw_get(&key.into()).unwrap_or(LuaValue::NIL)
    }

    pub fn raw_get(&self, key: &LuaValue) -> Result<LuaValue, ArgumentError> {
        if key == &LuaValue::NIL { return Ok(LuaValue::NIL); }

        let (inner, _) = &*self.inner;
        let table = inner.borrow();
        if let Some(index) = array_index(key, table.array.len()) {
            return Ok(table.array[index].clone());
        }
        let key = key.clone().try_full_eq().map_err(|_| ArgumentError::TableKeyIsNaN)?;
        Ok(table.map.get(&key).cloned().unwrap_or(LuaValue::NIL))
    }

    pub fn raw_set<K: Into<LuaValue>, V: Into<LuaValue>>(&self, key: K, value: V) -> Result<(), ArgumentError> {
        let key = normalize_key(key.into());
        let value = value.into();
        if key == LuaValue::NIL {
            return Err(ArgumentError::TableKeyIsNil);
        }
        let key_eq = key.clone().try_full_eq().map_err(|_| ArgumentError::TableKeyIsNaN)?;
        let (inner, _) = &*self.inner;
        let table = &mut *inner.borrow_mut();
        let array_len = table.array.len();

        match array_index(&key, array_len + 1) {
            // In existing array-part
            Some(index) if index < array_len => {
                if value == LuaValue::NIL {
                    // Everything after the hole moves to the hash part, keeping the array part hole-free
                    let tail = table.array.split_off(index);
                    for (offset, moved) in tail.into_iter().enumerate().skip(1) {
                        if let Ok(moved_key) = LuaValue::from((index + offset + 1) as LUA_INT).try_full_eq() {
                            table.map.insert(moved_key, moved);
                        }
                    }
                } else {
                    table.array[index] = value;
                }
            }
            // Append to array-part
            Some(_) => {
                if value != LuaValue::NIL {
                    table.map.remove(&key_eq);
                    table.array.push(value);
                    table.migrate_from_map();
                } else {
                    table.map.remove(&key_eq);
                }
            }
            None => {
                if value == LuaValue::NIL {
                    table.map.remove(&key_eq);
                } else {
                    table.map.insert(key_eq, value);
                }
            }
        };
        Ok(())
    }

    pub fn metatable(&self) -> Option<LuaTable> {
        self.inner.1.borrow().clone()
    }

    pub fn set_metatable(&self, metatable: Option<LuaTable>) {
        self.inner.1.replace(metatable);
    }

    /// Border of the table, as returned by the raw length operator
    pub fn len(&self) -> usize {
        let (inner, _) = &*self.inner;
        let table = inner.borrow();
        let mut border = table.array.len();
        // Integer keys may still be in the hash part if they were set before the keys preceding them
        while let Ok(key) = LuaValue::from((border + 1) as LUA_INT).try_full_eq() {
            if table.map.contains_key(&key) {
                border += 1;
            } else {
                break;
            }
        }
        border
    }

    pub fn is_empty(&self) -> bool {
        let table = self.inner.0.borrow();
        table.array.is_empty() && table.map.is_empty()
    }

    /// Returns the key-value pair following `index` in traversal order; Array part first, then the hash part
    pub fn next(&self, index: &LuaValue) -> Result<Option<(LuaValue, LuaValue)>, ArgumentError> {
        let table = &self.inner.0.borrow();
        let start = match index {
            LuaValue::NIL => 0,
            key => match array_index(key, table.array.len()) {
                Some(i) => i + 1,
                None => {
                    let key_eq = key.clone().try_full_eq().map_err(|_| ArgumentError::TableKeyIsNaN)?;
                    let position = table.map.keys().position(|k| k == &key_eq)
                        .ok_or_else(|| ArgumentError::InvalidPatternOrFormat { message: String::from("invalid key to 'next'") })?;
                    table.array.len() + position + 1
                }
            }
        };
        if start < table.array.len() {
            return Ok(Some((LuaValue::from((start + 1) as LUA_INT), table.array[start].clone())));
        }
        Ok(table.map.iter()
            .nth(start - table.array.len())
            .map(|(k, v)| (k.inner.clone(), v.clone())))
    }

    /// Snapshot of all entries
    pub fn iter(&self) -> Vec<(LuaValue, LuaValue)> {
        let table = self.inner.0.borrow();
        table.array.iter().enumerate()
            .map(|(i, v)| (LuaValue::from((i + 1) as LUA_INT), v.clone()))
            .chain(table.map.iter().map(|(k, v)| (k.inner.clone(), v.clone())))
            .collect()
    }
}

/// Floats with an exact integer value are stored under their integer key, so that `t[1.0]` and `t[1]` are one entry
fn normalize_key(key: LuaValue) -> LuaValue {
    if let LuaValue::NUMBER(number) = &key {
        if let Some(int) = number.to_exact_int() {
            return LuaValue::from(int);
        }
    }
    key
}

/// Zero-based array index for `key`, if it is an integer key in 1..=bound
fn array_index(key: &LuaValue, bound: usize) -> Option<usize> {
    if let LuaValue::NUMBER(number) = key {
        if let Some(int) = number.to_exact_int() {
            if int >= 1 && (int as u64) <= bound as u64 {
                return Some(int as usize - 1);
            }
        }
    }
    None
}

impl LuaType for LuaTable {
    const CONTAINER_NAME: &'static str = "table";
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LuaTable {
    fn coerce(value: &T) -> Option<Self> {
        if let LuaValue::TABLE(table) = value.clone().into() {
            Some(table)
        } else {
            None
        }
    }
}

impl AsLuaPointer for LuaTable {
    fn as_lua_pointer(&self) -> usize {
        ref_to_pointer(self.inner.as_ref())
    }
}

impl Debug for LuaTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "table: 0x{:08x}", self.as_lua_pointer())
    }
}

impl Display for LuaTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "table: 0x{:08x}", self.as_lua_pointer())
    }
}

impl PartialEq for LuaTable {
    fn eq(&self, other: &Self) -> bool {
        self.as_lua_pointer() == other.as_lua_pointer()
    }
}
