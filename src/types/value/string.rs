use std::rc::Rc;
use crate::error::ArgumentError;
use std::fmt::{Display, Formatter};
use std::fmt;
use std::cmp::Ordering;
use crate::types::{LuaType, CoerceFrom};
use crate::types::value::LuaValue;

#[derive(Clone, Debug)]
pub enum LuaString {
    UNICODE(Rc<str>),
    BINARY(Rc<[u8]>),
}

impl LuaType for LuaString {
    const CONTAINER_NAME: &'static str = "string";
}

impl<T: Into<LuaValue> + Clone> CoerceFrom<T> for LuaString {
    fn coerce(value: &T) -> Option<Self> {
        match value.clone().into() {
            LuaValue::STRING(string) => Some(string),
            LuaValue::NUMBER(number) => Some(LuaString::from(format!("{}", number))),
            _ => None
        }
    }
}

impl From<&str> for LuaString {
    fn from(string: &str) -> Self {
        LuaString::UNICODE(Rc::from(string))
    }
}

impl From<String> for LuaString {
    fn from(string: String) -> Self {
        LuaString::UNICODE(Rc::from(string))
    }
}

impl From<&[u8]> for LuaString {
    fn from(string: &[u8]) -> Self {
        match std::str::from_utf8(string) {
            Ok(s) => LuaString::UNICODE(Rc::from(s)),
            Err(_) => LuaString::BINARY(Rc::from(string)),
        }
    }
}

impl From<Vec<u8>> for LuaString {
    fn from(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(string) => LuaString::UNICODE(Rc::from(string)),
            Err(err) => LuaString::BINARY(Rc::from(err.into_bytes())),
        }
    }
}

impl LuaString {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LuaString::UNICODE(string) => string.as_bytes(),
            LuaString::BINARY(bytes) => bytes,
        }
    }

    pub fn try_utf8(&self) -> Result<&str, ArgumentError> {
        match self {
            LuaString::UNICODE(unicode) => Ok(unicode),
            LuaString::BINARY(bytes) => {
                debug_assert!(std::str::from_utf8(bytes).is_err());
                Err(ArgumentError::InvalidType { expected: "unicode string", found: "binary string" })
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LuaString::UNICODE(s) => s.len(),
            LuaString::BINARY(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for LuaString {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LuaString::UNICODE(string) => write!(f, "{}", *string),
            LuaString::BINARY(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<str> for LuaString {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for LuaString {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialOrd for LuaString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_bytes().partial_cmp(other.as_bytes())
    }
}
