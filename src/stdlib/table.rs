use std::cmp::Ordering;
use crate::vm::{ExecutionState, helper};
use crate::error::{TraceableError, ArgumentError, LuaError};
use crate::types::value::LuaValue;
use crate::types::value::string::LuaString;
use crate::types::varargs::Varargs;
use crate::types::value::table::LuaTable;
use crate::types::value::function::NativeFunction;
use crate::types::parameters::LuaParameters;
use crate::constants::types::LUA_INT;
use crate::types::{LuaType, CoerceFrom};
use crate::stdlib::{LibraryDescriptor, no_extras};

pub fn concat(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let separator = params.opt_coerce::<LuaString>(1)?;
    let separator = separator.as_ref().map(LuaString::as_bytes).unwrap_or(&b""[..]);
    let start = params.opt_coerce::<LUA_INT>(2)?.unwrap_or(1);
    let end = match params.opt_coerce::<LUA_INT>(3)? {
        Some(end) => end,
        None => table.len() as LUA_INT,
    };

    let mut buffer = Vec::new();
    let mut index = start;
    while index <= end {
        let value = table.raw_get_into(index);
        let string = match &value {
            LuaValue::STRING(_) | LuaValue::NUMBER(_) => LuaString::coerce_from(&value)?,
            other => return Err(ArgumentError::InvalidTableContent { expected: "string", found: other.type_name(), key: LuaValue::from(index) }.into()),
        };
        if index != start {
            buffer.try_reserve(separator.len())?;
            buffer.extend_from_slice(separator)
        }
        buffer.try_reserve(string.len())?;
        buffer.extend_from_slice(string.as_bytes());
        index = match index.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Varargs::from(LuaString::from(buffer)))
}

pub fn insert(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let end = table.len() as LUA_INT + 1;
    match params.len() {
        2 => {
            table.raw_set(end, params[1].clone())?;
        }
        3 => {
            let position = params.try_coerce::<LUA_INT>(1)?;
            if position < 1 || position > end {
                return Err(ArgumentError::OutOfRange { message: "position out of bounds", index: 1 }.into());
            }
            let mut index = end;
            while index > position {
                table.raw_set(index, table.raw_get_into(index - 1))?;
                index -= 1;
            }
            table.raw_set(position, params[2].clone())?;
        }
        _ => return Err(LuaError::user_str("wrong number of arguments to 'insert'").into()),
    }
    Ok(Varargs::empty())
}

/// `table.move(a1, f, e, t [,a2])`
pub fn lua_move(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let source = params.try_coerce::<LuaTable>(0)?;
    let from = params.try_coerce::<LUA_INT>(1)?;
    let end = params.try_coerce::<LUA_INT>(2)?;
    let target = params.try_coerce::<LUA_INT>(3)?;
    let destination = params.opt_coerce::<LuaTable>(4)?.unwrap_or_else(|| source.clone());
    if end >= from {
        if from <= 0 && end >= LUA_INT::MAX + from {
            return Err(ArgumentError::OutOfRange { message: "too many elements to move", index: 2 }.into());
        }
        let count = end - from;
        if target > LUA_INT::MAX - count {
            return Err(ArgumentError::OutOfRange { message: "destination wrap around", index: 3 }.into());
        }
        // Copy backwards when the ranges overlap with the destination after the source
        if target > end || target <= from || destination != source {
            for offset in 0..=count {
                destination.raw_set(target + offset, source.raw_get_into(from + offset))?;
            }
        } else {
            for offset in (0..=count).rev() {
                destination.raw_set(target + offset, source.raw_get_into(from + offset))?;
            }
        }
    }
    Ok(Varargs::from(destination))
}

pub fn pack(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = LuaTable::try_with_capacity(params.len(), 1)?;
    for (index, value) in params.iter().enumerate() {
        table.raw_set(index + 1, value.clone())?;
    }
    table.raw_set("n", params.len())?;
    Ok(Varargs::from(table))
}

pub fn remove(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let size = table.len() as LUA_INT;
    let position = params.opt_coerce::<LUA_INT>(1)?.unwrap_or(size);
    // `size + 1` is allowed so that removing just past the end returns nil
    if position != size && (position < 1 || position > size + 1) {
        return Err(ArgumentError::OutOfRange { message: "position out of bounds", index: 1 }.into());
    }
    let removed = table.raw_get_into(position);
    let mut index = position;
    while index < size {
        table.raw_set(index, table.raw_get_into(index + 1))?;
        index += 1;
    }
    table.raw_set(index, LuaValue::NIL)?;
    Ok(Varargs::from(removed))
}

fn less_than(execstate: &mut ExecutionState, comparator: &Option<LuaValue>, lhs: &LuaValue, rhs: &LuaValue) -> Result<bool, TraceableError> {
    match comparator {
        Some(function) => {
            let result = helper::call(execstate, function.clone(), Varargs::from((lhs.clone(), rhs.clone())))?;
            Ok(result.first().truthy())
        }
        None => match lhs.partial_cmp(rhs) {
            Some(ordering) => Ok(ordering == Ordering::Less),
            None => match (lhs, rhs) {
                (LuaValue::NUMBER(_), LuaValue::NUMBER(_)) => Ok(false),    // NaN
                _ => Err(ArgumentError::IncomparableTypes { lhs_type: lhs.type_name(), rhs_type: rhs.type_name() }.into()),
            },
        },
    }
}

/// Stable merge sort; The comparator may fail, so the standard library's sort can't be used
fn merge_sort(execstate: &mut ExecutionState, comparator: &Option<LuaValue>, values: Vec<LuaValue>) -> Result<Vec<LuaValue>, TraceableError> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let mut left = values;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(execstate, comparator, left)?;
    let right = merge_sort(execstate, comparator, right)?;

    let mut merged = Vec::new();
    merged.try_reserve(left.len() + right.len())?;
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => less_than(execstate, comparator, r, l)?,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    Ok(merged)
}

pub fn sort(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let comparator = match params.get_value_or_nil(1) {
        LuaValue::NIL => None,
        function @ LuaValue::FUNCTION(_) => Some(function.clone()),
        other => return Err(ArgumentError::InvalidArgument { expected: String::from("function"), found: other.type_name(), index: 1 }.into()),
    };
    let size = table.len();
    let mut values = Vec::new();
    values.try_reserve(size)?;
    for index in 1..=size {
        values.push(table.raw_get_into(index));
    }
    let sorted = merge_sort(execstate, &comparator, values)?;
    for (index, value) in sorted.into_iter().enumerate() {
        table.raw_set(index + 1, value)?;
    }
    Ok(Varargs::empty())
}

pub fn unpack(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let table = params.try_coerce::<LuaTable>(0)?;
    let start = params.opt_coerce::<LUA_INT>(1)?.unwrap_or(1);
    let end = match params.opt_coerce::<LUA_INT>(2)? {
        Some(end) => end,
        None => table.len() as LUA_INT,
    };
    if start > end {
        return Ok(Varargs::empty());
    }
    let count = (end as i128 - start as i128 + 1) as u128;
    if count >= i32::MAX as u128 {
        return Err(LuaError::user_str("too many results to unpack").into());
    }
    let mut buffer = Vec::new();
    buffer.try_reserve(count as usize)?;
    for index in start..=end {
        buffer.push(table.raw_get_into(index));
    }
    Ok(Varargs::from(buffer))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("concat", lua_func!(concat)),
    ("insert", lua_func!(insert)),
    ("move", lua_func!("move", lua_move)),
    ("pack", lua_func!(pack)),
    ("remove", lua_func!(remove)),
    ("sort", lua_func!(sort)),
    ("unpack", lua_func!(unpack)),
];

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: "table",
    functions: FUNCTIONS,
    install_extras: no_extras,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::types::value::function::LuaFunction;

    fn state() -> ExecutionState {
        ExecutionState::with_stdlib(RuntimeConfig::default()).unwrap()
    }

    fn sequence(values: &[LUA_INT]) -> LuaTable {
        let table = LuaTable::empty();
        for (index, value) in values.iter().enumerate() {
            table.raw_set(index + 1, *value).unwrap();
        }
        table
    }

    fn contents(table: &LuaTable) -> Vec<LuaValue> {
        (1..=table.len()).map(|index| table.raw_get_into(index)).collect()
    }

    fn ints(values: &[LUA_INT]) -> Vec<LuaValue> {
        values.iter().map(|value| LuaValue::from(*value)).collect()
    }

    #[test]
    fn concat_joins_strings_and_numbers() {
        let mut execstate = state();
        let table = sequence(&[1, 2, 3]);
        let joined = concat(&mut execstate, &[LuaValue::from(table.clone()), LuaValue::from(", ")]).unwrap();
        assert_eq!(joined, Varargs::from("1, 2, 3"));
        table.raw_set(2 as LUA_INT, true).unwrap();
        let error = concat(&mut execstate, &[LuaValue::from(table)]).unwrap_err().trace("concat");
        assert_eq!(format!("{}", error.cause()), "invalid value (at index 2) in table (string expected, got boolean)");
    }

    #[test]
    fn insert_and_remove_shift_elements() {
        let mut execstate = state();
        let table = sequence(&[1, 3]);
        let value = LuaValue::from(table.clone());
        insert(&mut execstate, &[value.clone(), LuaValue::from(2 as LUA_INT), LuaValue::from(2 as LUA_INT)]).unwrap();
        insert(&mut execstate, &[value.clone(), LuaValue::from(4 as LUA_INT)]).unwrap();
        assert_eq!(contents(&table), ints(&[1, 2, 3, 4]));
        assert!(insert(&mut execstate, &[value.clone(), LuaValue::from(9 as LUA_INT), LuaValue::from(0 as LUA_INT)]).is_err());

        assert_eq!(remove(&mut execstate, &[value.clone(), LuaValue::from(1 as LUA_INT)]).unwrap(), Varargs::from(1 as LUA_INT));
        assert_eq!(remove(&mut execstate, &[value.clone()]).unwrap(), Varargs::from(4 as LUA_INT));
        assert_eq!(contents(&table), ints(&[2, 3]));
        assert_eq!(remove(&mut execstate, &[value, LuaValue::from(3 as LUA_INT)]).unwrap(), Varargs::nil());
    }

    #[test]
    fn move_handles_overlap() {
        let mut execstate = state();
        let table = sequence(&[1, 2, 3, 4]);
        let value = LuaValue::from(table.clone());
        lua_move(&mut execstate, &[value, LuaValue::from(1 as LUA_INT), LuaValue::from(3 as LUA_INT), LuaValue::from(2 as LUA_INT)]).unwrap();
        assert_eq!(contents(&table), ints(&[1, 1, 2, 3]));
    }

    #[test]
    fn pack_and_unpack() {
        let mut execstate = state();
        let packed = pack(&mut execstate, &[LuaValue::from("a"), LuaValue::NIL, LuaValue::from("c")]).unwrap().into_first();
        let table = LuaTable::coerce_from(&packed).unwrap();
        assert_eq!(table.raw_get_into("n"), LuaValue::from(3 as LUA_INT));
        let unpacked = unpack(&mut execstate, &[packed, LuaValue::from(1 as LUA_INT), LuaValue::from(3 as LUA_INT)]).unwrap();
        assert_eq!(unpacked, Varargs::from((LuaValue::from("a"), LuaValue::NIL, LuaValue::from("c"))));
    }

    #[test]
    fn sort_uses_comparator() {
        let mut execstate = state();
        let table = sequence(&[3, 1, 2]);
        sort(&mut execstate, &[LuaValue::from(table.clone())]).unwrap();
        assert_eq!(contents(&table), ints(&[1, 2, 3]));

        let descending = LuaFunction::closure("descending", |_, params| {
            Ok(Varargs::from(params.try_coerce::<LUA_INT>(0)? > params.try_coerce::<LUA_INT>(1)?))
        });
        sort(&mut execstate, &[LuaValue::from(table.clone()), LuaValue::from(descending)]).unwrap();
        assert_eq!(contents(&table), ints(&[3, 2, 1]));

        table.raw_set(2 as LUA_INT, "two").unwrap();
        assert!(sort(&mut execstate, &[LuaValue::from(table)]).is_err());
    }
}
