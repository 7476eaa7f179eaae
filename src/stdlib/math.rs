use std::cmp::Ordering;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use tracing::trace;
use crate::vm::ExecutionState;
use crate::types::value::table::LuaTable;
use crate::types::value::LuaValue;
use crate::types::varargs::Varargs;
use crate::error::{TraceableError, ArgumentError, LuaError};
use crate::types::value::function::NativeFunction;
use crate::constants::types::{LUA_INT, LUA_FLOAT, LUA_INT_UNSIGNED};
use crate::types::parameters::LuaParameters;
use crate::types::value::number::LuaNumber;
use crate::stdlib::LibraryDescriptor;

pub const HUGE: LUA_FLOAT = LUA_FLOAT::INFINITY;
pub const MAX_INTEGER: LUA_INT = LUA_INT::MAX;
pub const MIN_INTEGER: LUA_INT = LUA_INT::MIN;
pub const PI: LUA_FLOAT = std::f64::consts::PI as LUA_FLOAT;

pub fn abs(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LuaNumber>(0)?;
    Ok(Varargs::from(match number {
        LuaNumber::INT(int) => LuaNumber::INT(int.wrapping_abs()),
        LuaNumber::FLOAT(float) => LuaNumber::FLOAT(float.abs()),
    }))
}

pub fn acos(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.acos()))
}

pub fn asin(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.asin()))
}

pub fn atan(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let y = params.try_coerce::<LUA_FLOAT>(0)?;
    let x = params.opt_coerce::<LUA_FLOAT>(1)?.unwrap_or(1.0);
    Ok(Varargs::from(y.atan2(x)))
}

pub fn ceil(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LuaNumber>(0)?;
    Ok(Varargs::from(number.ceil()))
}

pub fn cos(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.cos()))
}

pub fn deg(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.to_degrees()))
}

pub fn exp(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.exp()))
}

pub fn floor(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LuaNumber>(0)?;
    Ok(Varargs::from(number.floor()))
}

/// Remainder of a division that rounds towards zero, as C's `fmod`
pub fn fmod(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let x = params.try_coerce::<LuaNumber>(0)?;
    let y = params.try_coerce::<LuaNumber>(1)?;
    match (x, y) {
        (LuaNumber::INT(_), LuaNumber::INT(0)) => Err(ArgumentError::OutOfRange { message: "zero", index: 1 }.into()),
        // Avoids the overflow of MIN_INTEGER % -1
        (LuaNumber::INT(lhs), LuaNumber::INT(rhs)) => Ok(Varargs::from(lhs.wrapping_rem(rhs))),
        (lhs, rhs) => Ok(Varargs::from(lhs.as_float() % rhs.as_float())),
    }
}

pub fn log(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let x = params.try_coerce::<LUA_FLOAT>(0)?;
    let base = params.opt_coerce::<LUA_FLOAT>(1)?;
    Ok(Varargs::from(match base {
        None => x.ln(),
        Some(base) if base == 2.0 => x.log2(),
        Some(base) if base == 10.0 => x.log10(),
        Some(base) => x.ln() / base.ln(),
    }))
}

fn extreme(params: &[LuaValue], keep: Ordering) -> Result<Varargs, TraceableError> {
    let mut result = params.try_coerce::<LuaNumber>(0)?;
    for index in 1..params.len() {
        let number = params.try_coerce::<LuaNumber>(index)?;
        if number.partial_cmp(&result) == Some(keep) {
            result = number;
        }
    }
    Ok(Varargs::from(result))
}

pub fn max(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    extreme(params, Ordering::Greater)
}

pub fn min(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    extreme(params, Ordering::Less)
}

pub fn modf(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LuaNumber>(0)?;
    match number {
        LuaNumber::INT(_) => Ok(Varargs::from((number, 0.0 as LUA_FLOAT))),
        LuaNumber::FLOAT(float) => {
            let truncated = float.trunc();
            let fraction = if float.is_infinite() { 0.0 } else { float - truncated };
            let integral = match LuaNumber::FLOAT(truncated).to_exact_int() {
                Some(int) => LuaNumber::INT(int),
                None => LuaNumber::FLOAT(truncated),
            };
            Ok(Varargs::from((integral, fraction)))
        }
    }
}

pub fn rad(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.to_radians()))
}

/// `random()` is a float in [0, 1), `random(m)` an integer in [1, m], `random(m, n)` an integer in [m, n]
/// and `random(0)` an integer with all bits random
pub fn random(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let (lower, upper) = match params.len() {
        0 => return Ok(Varargs::from(execstate.rng.gen::<LUA_FLOAT>())),
        1 => {
            let upper = params.try_coerce::<LUA_INT>(0)?;
            if upper == 0 {
                return Ok(Varargs::from(execstate.rng.gen::<LUA_INT>()));
            }
            (1, upper)
        }
        2 => (params.try_coerce::<LUA_INT>(0)?, params.try_coerce::<LUA_INT>(1)?),
        _ => return Err(LuaError::user_str("wrong number of arguments").into()),
    };
    if lower > upper {
        return Err(ArgumentError::OutOfRange { message: "interval is empty", index: params.len() - 1 }.into());
    }
    Ok(Varargs::from(execstate.rng.gen_range(lower..=upper)))
}

/// Reseeds the instance's generator; Without arguments the seed is drawn from the OS
pub fn randomseed(execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let seed = match params.opt_coerce::<LuaNumber>(0)? {
        None => execstate.rng.gen::<LUA_INT_UNSIGNED>(),
        Some(number) => {
            let high = params.opt_coerce::<LUA_INT>(1)?.unwrap_or(0) as LUA_INT_UNSIGNED;
            let low = match number {
                LuaNumber::INT(int) => int as LUA_INT_UNSIGNED,
                LuaNumber::FLOAT(float) => float.to_bits(),
            };
            low ^ high.rotate_left(32)
        }
    };
    execstate.rng = if params.is_empty() { StdRng::from_entropy() } else { StdRng::seed_from_u64(seed) };
    trace!(target: "lua_runtime::stdlib", seed, "random generator reseeded");
    Ok(Varargs::from(seed as LUA_INT))
}

pub fn sin(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.sin()))
}

pub fn sqrt(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.sqrt()))
}

pub fn tan(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let number = params.try_coerce::<LUA_FLOAT>(0)?;
    Ok(Varargs::from(number.tan()))
}

pub fn tointeger(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    params.check_any(0)?;
    match params.try_coerce::<LUA_INT>(0) {
        Ok(int) => Ok(Varargs::from(int)),
        Err(_) => Ok(Varargs::nil()),
    }
}

pub fn numtype(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    match params.check_any(0)? {
        LuaValue::NUMBER(LuaNumber::INT(_)) => Ok(Varargs::from("integer")),
        LuaValue::NUMBER(LuaNumber::FLOAT(_)) => Ok(Varargs::from("float")),
        _ => Ok(Varargs::nil()),
    }
}

pub fn ult(_execstate: &mut ExecutionState, params: &[LuaValue]) -> Result<Varargs, TraceableError> {
    let m = params.try_coerce::<LUA_INT>(0)?;
    let n = params.try_coerce::<LUA_INT>(1)?;
    Ok(Varargs::from((m as LUA_INT_UNSIGNED) < (n as LUA_INT_UNSIGNED)))
}

pub const FUNCTIONS: &[(&str, NativeFunction)] = &[
    ("abs", lua_func!(abs)),
    ("acos", lua_func!(acos)),
    ("asin", lua_func!(asin)),
    ("atan", lua_func!(atan)),
    ("ceil", lua_func!(ceil)),
    ("cos", lua_func!(cos)),
    ("deg", lua_func!(deg)),
    ("exp", lua_func!(exp)),
    ("floor", lua_func!(floor)),
    ("fmod", lua_func!(fmod)),
    ("log", lua_func!(log)),
    ("max", lua_func!(max)),
    ("min", lua_func!(min)),
    ("modf", lua_func!(modf)),
    ("rad", lua_func!(rad)),
    ("random", lua_func!(random)),
    ("randomseed", lua_func!(randomseed)),
    ("sin", lua_func!(sin)),
    ("sqrt", lua_func!(sqrt)),
    ("tan", lua_func!(tan)),
    ("tointeger", lua_func!(tointeger)),
    ("type", lua_func!("type", numtype)),
    ("ult", lua_func!(ult)),
];

fn install_extras(_execstate: &mut ExecutionState, table: &LuaTable) -> Result<(), LuaError> {
    crate::set_table!(table,
        "huge" => HUGE,
        "maxinteger" => MAX_INTEGER,
        "mininteger" => MIN_INTEGER,
        "pi" => PI,
    )?;
    Ok(())
}

pub const LIBRARY: LibraryDescriptor = LibraryDescriptor {
    name: "math",
    functions: FUNCTIONS,
    install_extras,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn seeded() -> ExecutionState {
        let config = RuntimeConfig { random_seed: Some(7), ..RuntimeConfig::default() };
        ExecutionState::new(config).unwrap()
    }

    #[test]
    fn floor_and_ceil_prefer_integers() {
        let mut execstate = seeded();
        assert_eq!(floor(&mut execstate, &[LuaValue::from(3.7)]).unwrap(), Varargs::from(3 as LUA_INT));
        assert_eq!(ceil(&mut execstate, &[LuaValue::from(-3.7)]).unwrap(), Varargs::from(-3 as LUA_INT));
        assert!(matches!(floor(&mut execstate, &[LuaValue::from(1e300)]).unwrap().first(), LuaValue::NUMBER(LuaNumber::FLOAT(_))));
    }

    #[test]
    fn fmod_truncates() {
        let mut execstate = seeded();
        assert_eq!(fmod(&mut execstate, &[LuaValue::from(-7 as LUA_INT), LuaValue::from(3 as LUA_INT)]).unwrap(), Varargs::from(-1 as LUA_INT));
        assert_eq!(fmod(&mut execstate, &[LuaValue::from(MIN_INTEGER), LuaValue::from(-1 as LUA_INT)]).unwrap(), Varargs::from(0 as LUA_INT));
        assert!(fmod(&mut execstate, &[LuaValue::from(1 as LUA_INT), LuaValue::from(0 as LUA_INT)]).is_err());
    }

    #[test]
    fn max_and_min_keep_number_kind() {
        let mut execstate = seeded();
        let params = [LuaValue::from(1 as LUA_INT), LuaValue::from(2.5), LuaValue::from(-4 as LUA_INT)];
        assert_eq!(max(&mut execstate, &params).unwrap(), Varargs::from(2.5));
        assert_eq!(min(&mut execstate, &params).unwrap(), Varargs::from(-4 as LUA_INT));
        assert!(max(&mut execstate, &[]).is_err());
    }

    #[test]
    fn random_respects_bounds() {
        let mut execstate = seeded();
        for _ in 0..100 {
            let value = random(&mut execstate, &[LuaValue::from(3 as LUA_INT), LuaValue::from(5 as LUA_INT)]).unwrap();
            match value.first() {
                LuaValue::NUMBER(LuaNumber::INT(int)) => assert!((3..=5).contains(int)),
                other => panic!("expected integer, got {:?}", other),
            }
        }
        assert!(random(&mut execstate, &[LuaValue::from(5 as LUA_INT), LuaValue::from(3 as LUA_INT)]).is_err());
    }

    #[test]
    fn seeding_makes_random_reproducible() {
        let mut first = seeded();
        let mut second = seeded();
        randomseed(&mut first, &[LuaValue::from(42 as LUA_INT)]).unwrap();
        randomseed(&mut second, &[LuaValue::from(42 as LUA_INT)]).unwrap();
        for _ in 0..10 {
            assert_eq!(random(&mut first, &[]).unwrap(), random(&mut second, &[]).unwrap());
        }
    }

    #[test]
    fn number_type_and_conversion() {
        let mut execstate = seeded();
        assert_eq!(numtype(&mut execstate, &[LuaValue::from(1 as LUA_INT)]).unwrap(), Varargs::from("integer"));
        assert_eq!(numtype(&mut execstate, &[LuaValue::from("1")]).unwrap(), Varargs::nil());
        assert_eq!(tointeger(&mut execstate, &[LuaValue::from(3.0)]).unwrap(), Varargs::from(3 as LUA_INT));
        assert_eq!(tointeger(&mut execstate, &[LuaValue::from(3.5)]).unwrap(), Varargs::nil());
        assert_eq!(ult(&mut execstate, &[LuaValue::from(1 as LUA_INT), LuaValue::from(-1 as LUA_INT)]).unwrap(), Varargs::from(true));
    }

    #[test]
    fn modf_splits() {
        let mut execstate = seeded();
        assert_eq!(modf(&mut execstate, &[LuaValue::from(-3.5)]).unwrap(), Varargs::from((-3 as LUA_INT, -0.5)));
    }
}
