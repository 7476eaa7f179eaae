use crate::types::value::LuaValue;
use std::ops::{Bound, RangeBounds};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Varargs { inner: Vec<LuaValue> }

impl Varargs {
    pub fn nil() -> Varargs {
        Varargs { inner: vec![LuaValue::NIL] }
    }

    pub fn empty() -> Varargs {
        Varargs { inner: vec![] }
    }

    pub fn first(&self) -> &LuaValue {
        self.inner.get(0).unwrap_or(&LuaValue::NIL)
    }

    pub fn into_first(self) -> LuaValue {
        self.inner.into_iter().next().unwrap_or(LuaValue::NIL)
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    pub fn n(&self, i: usize) -> &LuaValue {
        self.inner.get(i).unwrap_or(&LuaValue::NIL)
    }

    /// Values in `range`, clamped to the values present
    pub fn select_range<T: RangeBounds<usize>>(&self, range: T) -> Varargs {
        let len = self.inner.len();
        let start = match range.start_bound() {
            Bound::Included(i) => *i,
            Bound::Excluded(i) => i.saturating_add(1),
            Bound::Unbounded => 0,
        }.min(len);
        let end = match range.end_bound() {
            Bound::Included(i) => i.saturating_add(1),
            Bound::Excluded(i) => *i,
            Bound::Unbounded => len,
        }.min(len).max(start);
        Varargs { inner: self.inner[start..end].to_vec() }
    }

    pub fn as_slice(&self) -> &[LuaValue] {
        &self.inner[..]
    }

    pub fn into_vec(self) -> Vec<LuaValue> {
        self.inner
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LuaValue> {
        self.inner.iter()
    }

    pub fn prepend<T: Into<Varargs>>(prefix: T, body: &Self) -> Varargs {
        let mut new_varargs = prefix.into();
        new_varargs.inner.extend_from_slice(&body.inner[..]);
        new_varargs
    }

    /// Truncates or pads with nil to exactly `count` values
    pub fn adjusted(mut self, count: usize) -> Varargs {
        self.inner.resize(count, LuaValue::NIL);
        self
    }
}

impl IntoIterator for Varargs {
    type Item = LuaValue;
    type IntoIter = std::vec::IntoIter<LuaValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<T: Into<LuaValue>> From<T> for Varargs {
    fn from(val: T) -> Self {
        Varargs {
            inner: vec![val.into()]
        }
    }
}

impl From<&[LuaValue]> for Varargs {
    fn from(slice: &[LuaValue]) -> Self {
        Varargs { inner: Vec::from(slice) }
    }
}

impl From<Vec<LuaValue>> for Varargs {
    fn from(inner: Vec<LuaValue>) -> Self {
        Varargs { inner }
    }
}

impl<T: Into<LuaValue>, U: Into<LuaValue>> From<(T, U)> for Varargs {
    fn from(tuple: (T, U)) -> Self {
        Varargs { inner: vec![tuple.0.into(), tuple.1.into()] }
    }
}

impl<T: Into<LuaValue>, U: Into<LuaValue>, V: Into<LuaValue>> From<(T, U, V)> for Varargs {
    fn from(tuple: (T, U, V)) -> Self {
        Varargs { inner: vec![tuple.0.into(), tuple.1.into(), tuple.2.into()] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::types::LUA_INT;

    #[test]
    fn select_range_clamps() {
        let varargs = Varargs::from(vec![LuaValue::from(1 as LUA_INT), LuaValue::from(2 as LUA_INT), LuaValue::from(3 as LUA_INT)]);
        assert_eq!(varargs.select_range(1..).count(), 2);
        assert_eq!(varargs.select_range(..=0).into_first(), LuaValue::from(1 as LUA_INT));
        assert_eq!(varargs.select_range(5..).count(), 0);
        assert_eq!(varargs.select_range(2..1).count(), 0);
    }

    #[test]
    fn adjusted_pads_with_nil() {
        let varargs = Varargs::from(1 as LUA_INT).adjusted(3);
        assert_eq!(varargs.count(), 3);
        assert_eq!(varargs.n(2), &LuaValue::NIL);
    }
}
