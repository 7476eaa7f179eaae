use tracing::debug;
use crate::constants::LUA_GNAME;
use crate::error::LuaError;
use crate::types::value::function::NativeFunction;
use crate::types::value::table::LuaTable;
use crate::vm::ExecutionState;

pub mod basic;
pub mod table;
pub mod string;
pub mod utf8;
pub mod math;
pub mod coroutine;
pub mod debug;

/// Static registration record of one standard library
pub struct LibraryDescriptor {
    /// Global name of the library table; `_G` installs into the global table itself
    pub name: &'static str,
    pub functions: &'static [(&'static str, NativeFunction)],
    /// Installs the library's non-function fields and sequence functions
    pub install_extras: fn(&mut ExecutionState, &LuaTable) -> Result<(), LuaError>,
}

impl LibraryDescriptor {
    pub fn is_base(&self) -> bool {
        self.name == LUA_GNAME
    }
}

/// Standard libraries in installation order; The base library comes first so later libraries may rely on it
pub static LIBRARIES: [LibraryDescriptor; 7] = [
    basic::LIBRARY,
    table::LIBRARY,
    string::LIBRARY,
    utf8::LIBRARY,
    math::LIBRARY,
    coroutine::LIBRARY,
    debug::LIBRARY,
];

pub(crate) fn no_extras(_execstate: &mut ExecutionState, _table: &LuaTable) -> Result<(), LuaError> {
    Ok(())
}

/// Installs a single library; Existing bindings of the same names are overwritten
pub fn open_lib(execstate: &mut ExecutionState, library: &LibraryDescriptor) -> Result<(), LuaError> {
    let globals = execstate.globals();
    let table = if library.is_base() {
        globals.clone()
    } else {
        LuaTable::try_with_capacity(0, library.functions.len())?
    };
    for (name, function) in library.functions {
        table.raw_set(*name, *function)?;
    }
    (library.install_extras)(execstate, &table)?;
    if !library.is_base() {
        globals.raw_set(library.name, table)?;
    }
    debug!(target: "lua_runtime::stdlib", library = library.name, functions = library.functions.len(), "library installed");
    Ok(())
}

/// Installs every standard library, in the order of `LIBRARIES`
pub fn open_libs(execstate: &mut ExecutionState) -> Result<(), LuaError> {
    for library in LIBRARIES.iter() {
        open_lib(execstate, library)?;
    }
    Ok(())
}
