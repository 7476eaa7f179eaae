use crate::types::value::LuaValue;
use crate::error::ArgumentError;
use crate::types::{LuaType, CoerceFrom};

pub trait LuaParameters {
    fn get_value(&self, index: usize) -> Option<&LuaValue>;

    fn get_value_or_nil(&self, index: usize) -> &LuaValue {
        self.get_value(index).unwrap_or(LuaValue::nil())
    }

    fn try_coerce<T: CoerceFrom<LuaValue>>(&self, index: usize) -> Result<T, ArgumentError> where T: LuaType {
        let value = self.get_value(index).unwrap_or(&LuaValue::NIL);
        T::coerce_from(value)
            .map_err(|argerr| {
                match argerr {
                    ArgumentError::CannotCoerce { expected, found } => {
                        // Lua reports absent arguments as "no value" rather than "nil"
                        let found = if self.get_value(index).is_none() { "no value" } else { found };
                        ArgumentError::InvalidArgument { expected: String::from(expected), found, index }
                    }
                    other => other,
                }
            })
    }

    /// Like `try_coerce`, but absent and nil arguments yield `None`
    fn opt_coerce<T: CoerceFrom<LuaValue>>(&self, index: usize) -> Result<Option<T>, ArgumentError> where T: LuaType {
        match self.get_value(index) {
            None | Some(LuaValue::NIL) => Ok(None),
            Some(_) => self.try_coerce(index).map(Some),
        }
    }

    /// Argument that must be present, of any type
    fn check_any(&self, index: usize) -> Result<&LuaValue, ArgumentError> {
        self.get_value(index).ok_or_else(|| ArgumentError::InvalidArgument { expected: String::from("value"), found: "no value", index })
    }
}

impl LuaParameters for [LuaValue] {
    fn get_value(&self, index: usize) -> Option<&LuaValue> {
        self.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::types::LUA_INT;
    use crate::types::value::string::LuaString;

    #[test]
    fn coercion_errors_name_the_argument() {
        let params = [LuaValue::from(true)];
        let err = params[..].try_coerce::<LUA_INT>(0).unwrap_err();
        assert_eq!(format!("{}", err), "bad argument #1 (integer expected, got boolean)");
        let err = params[..].try_coerce::<LuaString>(1).unwrap_err();
        assert_eq!(format!("{}", err), "bad argument #2 (string expected, got no value)");
    }

    #[test]
    fn optional_arguments() {
        let params = [LuaValue::NIL, LuaValue::from("12")];
        assert_eq!(params[..].opt_coerce::<LUA_INT>(0).unwrap(), None);
        assert_eq!(params[..].opt_coerce::<LUA_INT>(1).unwrap(), Some(12));
        assert_eq!(params[..].opt_coerce::<LUA_INT>(5).unwrap(), None);
    }
}
