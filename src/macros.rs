/// Wraps a native function item as a `NativeFunction` named after it
#[macro_export]
macro_rules! lua_func {
    ($func:ident) => {
        $crate::types::value::function::NativeFunction::from_parts(stringify!($func), $func)
    };
    ($name:expr, $func:path) => {
        $crate::types::value::function::NativeFunction::from_parts($name, $func)
    };
}

/// Sets multiple entries of a table, propagating the first error
#[macro_export]
macro_rules! set_table {
    ($table:expr, $($key:expr => $value:expr),+ $(,)?) => {{
        let table: &$crate::types::value::table::LuaTable = &$table;
        (|| -> Result<(), $crate::error::ArgumentError> {
            $(table.raw_set($key, $value)?;)+
            Ok(())
        })()
    }};
}
