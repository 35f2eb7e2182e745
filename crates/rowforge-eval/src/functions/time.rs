//! `TIMESTAMP` literal parsing.

use chrono::NaiveDateTime;
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn parse_naive(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), TIMESTAMP_FORMAT).map_err(|_| {
        ForgeError::InvalidTimestamp {
            input: input.to_owned(),
        }
    })
}

/// `TIMESTAMP '…'`: parses `YYYY-MM-DD HH:MM:SS[.fff]` in the context's
/// time zone.
#[derive(Debug)]
pub struct TimestampFunc;

impl Function for TimestampFunc {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let input = String::from_utf8_lossy(args[0].as_bytes()?).into_owned();
        let naive = parse_naive(&input)?;
        let ts = naive
            .and_local_timezone(ctx.time_zone)
            .single()
            .ok_or(ForgeError::InvalidTimestamp { input })?;
        Ok(Compiled::Constant(Value::Timestamp(ts)))
    }
}

/// `TIMESTAMP WITH TIME ZONE '…'`: like [`TimestampFunc`], but a trailing
/// whitespace-separated token may name the zone (resolved through the
/// context, e.g. `UTC` or `+08:00`). Without one the context zone applies.
#[derive(Debug)]
pub struct TimestampWithTimeZoneFunc;

impl Function for TimestampWithTimeZoneFunc {
    fn name(&self) -> &'static str {
        "timestamp_with_time_zone"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let input = String::from_utf8_lossy(args[0].as_bytes()?).into_owned();
        let trimmed = input.trim();

        let (datetime_part, zone) = match trimmed.rsplit_once(char::is_whitespace) {
            Some((head, tail)) => match ctx.parse_time_zone(tail.trim()) {
                Ok(offset) => (head, offset),
                Err(_) => (trimmed, ctx.time_zone),
            },
            None => (trimmed, ctx.time_zone),
        };

        let naive = parse_naive(datetime_part)?;
        let ts = naive
            .and_local_timezone(zone)
            .single()
            .ok_or(ForgeError::InvalidTimestamp { input })?;
        Ok(Compiled::Constant(Value::Timestamp(ts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: &dyn Function, ctx: &mut CompileContext, input: &str) -> Value {
        match func
            .compile(ctx, vec![Value::bytes(input.as_bytes().to_vec())])
            .unwrap()
        {
            Compiled::Constant(v) => v,
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_parse() {
        let mut ctx = CompileContext::new();
        let v = run(&TimestampFunc, &mut ctx, "2016-01-02 15:04:05.999");
        assert_eq!(v.to_string(), "2016-01-02 15:04:05.999");

        let v = run(&TimestampFunc, &mut ctx, "2016-01-02 15:04:05");
        assert_eq!(v.to_string(), "2016-01-02 15:04:05");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        let mut ctx = CompileContext::new();
        assert!(TimestampFunc
            .compile(&mut ctx, vec![Value::bytes(*b"not a time")])
            .is_err());
        assert!(TimestampFunc.compile(&mut ctx, vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn test_timestamp_with_zone_offset() {
        let mut ctx = CompileContext::new();
        let v = run(
            &TimestampWithTimeZoneFunc,
            &mut ctx,
            "2016-01-02 15:04:05.999 +08:00",
        );
        let ts = v.as_timestamp().unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 8 * 3600);
        // Civil instant compares equal to the same moment in UTC.
        let utc = run(&TimestampWithTimeZoneFunc, &mut ctx, "2016-01-02 07:04:05.999 UTC");
        assert_eq!(ts, utc.as_timestamp().unwrap());
    }

    #[test]
    fn test_timestamp_with_zone_falls_back_to_context() {
        let mut ctx = CompileContext::new();
        let v = run(&TimestampWithTimeZoneFunc, &mut ctx, "2016-01-02 15:04:05");
        assert_eq!(v.as_timestamp().unwrap().offset().local_minus_utc(), 0);
    }
}
