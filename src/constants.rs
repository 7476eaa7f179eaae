/// Raw types
#[allow(non_camel_case_types)]
pub mod types {
    pub type LUA_INT = i64;
    pub type LUA_INT_UNSIGNED = u64;
    pub type LUA_FLOAT = f64;

    static _ASSERTIONS: () = {
        if std::mem::size_of::<LUA_INT>() != std::mem::size_of::<LUA_INT_UNSIGNED>() {
            panic!("Signed and Unsigned LUA_INT must have equal size in memory!")
        };
    };
}

pub const LUA_VERSION_MAJOR: &str = "5";
pub const LUA_VERSION_MINOR: &str = "4";

/// Value of the `_VERSION` global
pub const LUA_VERSION: &str = "Lua 5.4";

/// Suffix appended to environment variable names, so that multiple installed versions don't read each other's settings
pub fn version_suffix() -> String {
    format!("_{}_{}", LUA_VERSION_MAJOR, LUA_VERSION_MINOR)
}

/// Maximum depth of the frame stack of a single thread
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Maximum number of nested resumes
pub const DEFAULT_MAX_RESUME_DEPTH: usize = 200;

/// Maximum nesting of native calls, host calls and resumes across all threads; Mirrors LUAI_MAXCCALLS
pub const DEFAULT_MAX_HOST_DEPTH: usize = 200;

pub const LUA_PATH_DEFAULT: &str = {
    if cfg!(windows) {
        "!\\lua\\?.lua;!\\lua\\?\\init.lua;!\\?.lua;!\\?\\init.lua;.\\?.lua;.\\?\\init.lua"
    } else {
        "/usr/local/share/lua/5.4/?.lua;/usr/local/share/lua/5.4/?/init.lua;./?.lua;./?/init.lua"
    }
};

/// Name of the global table inside itself
pub const LUA_GNAME: &str = "_G";

pub const UTF8_PATTERN: &[u8] = b"[\x00-\x7F\xC2-\xFD][\x80-\xBF]*";
pub const UTF8_MAX: u32 = 0x7FFF_FFFF;
