use crate::constants::types::{LUA_FLOAT, LUA_INT};
use crate::error::ArgumentError;
use crate::types::value::LuaValue;
use crate::types::value::number::LuaNumber;

pub mod varargs;
pub mod parameters;
pub mod value;

/// Rust types that stand in for a Lua type
pub trait LuaType: 'static {
    /// Name used in argument errors, e.g. "table" in "table expected, got nil"
    const CONTAINER_NAME: &'static str;

    /// Result of Lua's `type()` for this value
    fn type_name(&self) -> &'static str {
        Self::CONTAINER_NAME
    }
}

impl LuaType for LUA_INT {
    const CONTAINER_NAME: &'static str = "integer";
}

impl LuaType for LUA_FLOAT {
    const CONTAINER_NAME: &'static str = "number";
}

/// Identity of reference values, as shown by `tostring` and compared by `rawequal`
pub trait AsLuaPointer {
    fn as_lua_pointer(&self) -> usize;
}

#[inline(always)]
pub(crate) fn ref_to_pointer<T: ?Sized>(rf: &T) -> usize {
    rf as *const T as *const () as usize
}

/// Argument conversion used by `LuaParameters`; `coerce` follows Lua's string/number coercion rules
pub trait CoerceFrom<T: Into<LuaValue> + Clone>: LuaType + Sized {
    fn coerce(value: &T) -> Option<Self>;

    fn coerce_from(value: &T) -> Result<Self, ArgumentError> {
        Self::coerce(value).ok_or_else(|| ArgumentError::CannotCoerce { expected: Self::CONTAINER_NAME, found: T::into(T::clone(value)).type_name() })
    }
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LUA_INT {
    fn coerce(value: &T) -> Option<Self> {
        match value.clone().into() {
            LuaValue::NUMBER(number) => number.to_exact_int(),
            LuaValue::STRING(s) => s.try_utf8().ok().and_then(LuaNumber::parse).and_then(|n| n.to_exact_int()),
            _ => None
        }
    }
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LUA_FLOAT {
    fn coerce(value: &T) -> Option<Self> {
        match value.clone().into() {
            LuaValue::NUMBER(number) => Some(number.as_float()),
            LuaValue::STRING(s) => s.try_utf8().ok().and_then(LuaNumber::parse).map(|n| n.as_float()),
            _ => None
        }
    }
}
