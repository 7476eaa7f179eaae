use crate::types::value::number::LuaNumber;
use crate::types::value::string::LuaString;
use crate::types::value::function::LuaFunction;
use crate::types::value::thread::LuaThread;
use crate::types::value::table::LuaTable;
use crate::types::varargs::Varargs;
use crate::error::ArgumentError;
use crate::constants::types::{LUA_FLOAT, LUA_INT};
use std::fmt::{Display, Formatter};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::cmp::Ordering;
use crate::types::{AsLuaPointer, LuaType, CoerceFrom};

pub mod number;
pub mod string;
pub mod table;
pub mod function;
pub mod thread;

/// Metatables shared by all values of a type; Tables carry their own
#[derive(Default)]
pub struct TypeMetatables {
    pub(crate) boolean: Option<LuaTable>,
    pub(crate) number: Option<LuaTable>,
    pub(crate) string: Option<LuaTable>,
    pub(crate) function: Option<LuaTable>,
    pub(crate) thread: Option<LuaTable>,
}

#[derive(Debug, Clone)]
pub enum LuaValue {
    NIL,
    BOOLEAN(bool),
    NUMBER(LuaNumber),
    STRING(LuaString),
    FUNCTION(LuaFunction),
    THREAD(LuaThread),
    TABLE(LuaTable),
}

impl LuaValue {
    pub const CONST_NIL: LuaValue = LuaValue::NIL;
}

impl LuaType for LuaValue {
    const CONTAINER_NAME: &'static str = "value";

    fn type_name(&self) -> &'static str {
        match self {
            LuaValue::NIL => "nil",
            LuaValue::BOOLEAN(_) => "boolean",
            LuaValue::NUMBER(n) => n.type_name(),
            LuaValue::STRING(s) => s.type_name(),
            LuaValue::FUNCTION(f) => f.type_name(),
            LuaValue::THREAD(t) => t.type_name(),
            LuaValue::TABLE(t) => t.type_name(),
        }
    }
}

impl Default for LuaValue {
    fn default() -> Self {
        LuaValue::NIL
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::BOOLEAN(b)
    }
}

impl From<LUA_INT> for LuaValue {
    fn from(i: LUA_INT) -> Self {
        LuaValue::NUMBER(LuaNumber::INT(i))
    }
}

impl From<LUA_FLOAT> for LuaValue {
    fn from(f: LUA_FLOAT) -> Self {
        LuaValue::NUMBER(LuaNumber::FLOAT(f))
    }
}

impl From<usize> for LuaValue {
    fn from(i: usize) -> Self {
        LuaValue::NUMBER(LuaNumber::from(i))
    }
}

impl From<&str> for LuaValue {
    fn from(string: &str) -> Self {
        LuaValue::STRING(LuaString::from(string))
    }
}

impl From<&[u8]> for LuaValue {
    fn from(string: &[u8]) -> Self {
        LuaValue::STRING(LuaString::from(string))
    }
}

impl From<String> for LuaValue {
    fn from(s: String) -> Self {
        LuaValue::STRING(LuaString::from(s))
    }
}

impl From<Vec<u8>> for LuaValue {
    fn from(bytes: Vec<u8>) -> Self {
        LuaValue::STRING(LuaString::from(bytes))
    }
}

impl From<LuaNumber> for LuaValue {
    fn from(n: LuaNumber) -> Self {
        LuaValue::NUMBER(n)
    }
}

impl From<LuaString> for LuaValue {
    fn from(s: LuaString) -> Self {
        LuaValue::STRING(s)
    }
}

impl From<LuaFunction> for LuaValue {
    fn from(f: LuaFunction) -> Self {
        LuaValue::FUNCTION(f)
    }
}

impl From<function::NativeFunction> for LuaValue {
    fn from(f: function::NativeFunction) -> Self {
        LuaValue::FUNCTION(LuaFunction::RUST_FUNCTION(f))
    }
}

impl From<LuaThread> for LuaValue {
    fn from(t: LuaThread) -> Self {
        LuaValue::THREAD(t)
    }
}

impl From<LuaTable> for LuaValue {
    fn from(t: LuaTable) -> Self {
        LuaValue::TABLE(t)
    }
}

impl<T: Into<LuaValue>> From<Option<T>> for LuaValue {
    fn from(option: Option<T>) -> Self {
        option.map(Into::into).unwrap_or(LuaValue::NIL)
    }
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LuaValue {
    fn coerce(value: &T) -> Option<Self> {
        Some(T::clone(value).into())
    }
}

impl LuaValue {
    pub fn nil() -> &'static LuaValue {
        &LuaValue::CONST_NIL
    }

    /// Lua truthiness; Only `nil` and `false` are false
    pub fn truthy(&self) -> bool {
        !matches!(self, LuaValue::NIL | LuaValue::BOOLEAN(false))
    }

    pub fn get_metatable(&self, metatables: &TypeMetatables) -> Option<LuaTable> {
        match self {
            LuaValue::NIL => None,
            LuaValue::BOOLEAN(_) => metatables.boolean.clone(),
            LuaValue::NUMBER(_) => metatables.number.clone(),
            LuaValue::STRING(_) => metatables.string.clone(),
            LuaValue::FUNCTION(_) => metatables.function.clone(),
            LuaValue::TABLE(table) => table.metatable(),
            LuaValue::THREAD(_) => metatables.thread.clone(),
        }
    }

    /// Looks up a metamethod or metafield, returning `None` if absent
    pub fn metafield(&self, name: &str, metatables: &TypeMetatables) -> Option<LuaValue> {
        self.get_metatable(metatables)
            .map(|metatable| metatable.raw_get_into(name))
            .and_then(LuaValue::not_nil)
    }

    /// Handles the `__index` metamethod; Function-valued `__index` is not followed, as that requires a call
    pub fn index_with_metatable(&self, key: &LuaValue, metatables: &TypeMetatables) -> Result<LuaValue, ArgumentError> {
        let mut current = self.clone();
        // Bounded like Lua's MAXTAGLOOP, as `__index` chains may form a cycle
        for _ in 0..2000 {
            if let LuaValue::TABLE(table) = &current {
                let value = table.raw_get(key)?;
                if value != LuaValue::NIL {
                    return Ok(value);
                }
            }
            match current.metafield("__index", metatables) {
                Some(next @ LuaValue::TABLE(_)) | Some(next @ LuaValue::STRING(_)) => current = next,
                Some(_) => return Ok(LuaValue::NIL),
                None => {
                    return match current {
                        LuaValue::TABLE(_) => Ok(LuaValue::NIL),
                        other => Err(ArgumentError::AttemptToIndex(other.type_name())),
                    };
                }
            }
        }
        Err(ArgumentError::MetamethodLoop("__index"))
    }

    /// Handles the `__call` metamethod; Returns the function to call and the arguments to call it with
    pub fn prep_call_with_metatable(self, args: Varargs, metatables: &TypeMetatables) -> Result<(LuaFunction, Varargs), ArgumentError> {
        match self {
            LuaValue::FUNCTION(function) => Ok((function, args)),
            other => {
                match other.metafield("__call", metatables) {
                    Some(LuaValue::FUNCTION(function)) => Ok((function, Varargs::prepend(other, &args))),
                    _ => Err(ArgumentError::AttemptToCallNonFunction(other.type_name())),
                }
            }
        }
    }

    pub(crate) fn not_nil(self) -> Option<Self> {
        match self {
            LuaValue::NIL => None,
            _ => Some(self)
        }
    }
}

impl PartialEq<bool> for LuaValue {
    fn eq(&self, other: &bool) -> bool {
        self.truthy() == *other
    }
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::NIL, LuaValue::NIL) => true,
            (LuaValue::BOOLEAN(lhs), LuaValue::BOOLEAN(rhs)) => lhs == rhs,
            (LuaValue::NUMBER(lhs), LuaValue::NUMBER(rhs)) => match (lhs, rhs) {
                (LuaNumber::INT(lhs), LuaNumber::INT(rhs)) => lhs == rhs,
                (LuaNumber::INT(int), LuaNumber::FLOAT(float)) | (LuaNumber::FLOAT(float), LuaNumber::INT(int)) => {
                    LuaNumber::FLOAT(*float).to_exact_int() == Some(*int)
                }
                (LuaNumber::FLOAT(lhs), LuaNumber::FLOAT(rhs)) => lhs == rhs,
            },
            (LuaValue::STRING(lhs), LuaValue::STRING(rhs)) => lhs == rhs,
            (LuaValue::FUNCTION(lhs), LuaValue::FUNCTION(rhs)) => lhs == rhs,
            (LuaValue::THREAD(lhs), LuaValue::THREAD(rhs)) => lhs == rhs,
            (LuaValue::TABLE(lhs), LuaValue::TABLE(rhs)) => lhs == rhs,
            _ => false
        }
    }
}

impl PartialOrd for LuaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (LuaValue::NUMBER(lhs), LuaValue::NUMBER(rhs)) => lhs.partial_cmp(rhs),
            (LuaValue::STRING(lhs), LuaValue::STRING(rhs)) => lhs.partial_cmp(rhs),
            _ => None
        }
    }
}

/// LuaValue struct that implements (full) Eq
#[derive(Debug, Clone)]
pub(crate) struct LuaValueFullEq {
    pub(crate) inner: LuaValue
}

impl LuaValue {
    /// Fails for NaN, which is not equal to itself
    pub(crate) fn try_full_eq(self) -> Result<LuaValueFullEq, ()> {
        if self == self {
            Ok(LuaValueFullEq { inner: self })
        } else {
            Err(())
        }
    }
}

impl Eq for LuaValueFullEq {}

impl PartialEq for LuaValueFullEq {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Hash for LuaValueFullEq {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.inner {
            LuaValue::NIL => state.write_u8(0),
            LuaValue::BOOLEAN(b) => state.write_u8(if *b { 1 } else { 2 }),
            LuaValue::NUMBER(n) => {
                // Equal int and float keys must hash alike
                match n.to_exact_int() {
                    Some(int) => state.write_i64(int),
                    None => state.write(&n.as_float().to_le_bytes()),
                }
            }
            LuaValue::STRING(s) => state.write(s.as_bytes()),
            LuaValue::FUNCTION(f) => state.write_usize(f.as_lua_pointer()),
            LuaValue::THREAD(t) => state.write_usize(t.as_lua_pointer()),
            LuaValue::TABLE(t) => state.write_usize(t.as_lua_pointer()),
        }
    }
}

impl Display for LuaValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LuaValue::NIL => write!(f, "nil"),
            LuaValue::BOOLEAN(b) => write!(f, "{}", b),
            LuaValue::NUMBER(n) => write!(f, "{}", n),
            LuaValue::STRING(s) => write!(f, "{}", s),
            LuaValue::FUNCTION(function) => write!(f, "{}", function),
            LuaValue::THREAD(thread) => write!(f, "{}", thread),
            LuaValue::TABLE(table) => write!(f, "{}", table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_equal_integers() {
        assert_eq!(LuaValue::from(1.0), LuaValue::from(1 as LUA_INT));
        assert_ne!(LuaValue::from(1.5), LuaValue::from(1 as LUA_INT));
        assert_ne!(LuaValue::from(f64::NAN), LuaValue::from(f64::NAN));
    }

    #[test]
    fn truthiness() {
        assert!(!LuaValue::NIL.truthy());
        assert!(!LuaValue::from(false).truthy());
        assert!(LuaValue::from(0 as LUA_INT).truthy());
        assert!(LuaValue::from("").truthy());
    }

    #[test]
    fn index_follows_table_chain() {
        let metatables = TypeMetatables::default();
        let base = LuaTable::empty();
        base.raw_set("x", 10 as LUA_INT).unwrap();
        let meta = LuaTable::empty();
        meta.raw_set("__index", base).unwrap();
        let derived = LuaTable::empty();
        derived.set_metatable(Some(meta));
        let value = LuaValue::from(derived);
        assert_eq!(value.index_with_metatable(&LuaValue::from("x"), &metatables).unwrap(), LuaValue::from(10 as LUA_INT));
        assert_eq!(value.index_with_metatable(&LuaValue::from("y"), &metatables).unwrap(), LuaValue::NIL);
    }

    #[test]
    fn calling_a_number_fails() {
        let metatables = TypeMetatables::default();
        let result = LuaValue::from(3 as LUA_INT).prep_call_with_metatable(Varargs::empty(), &metatables);
        assert!(matches!(result, Err(ArgumentError::AttemptToCallNonFunction("number"))));
    }
}
