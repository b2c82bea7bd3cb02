use async_trait::async_trait;
use rand::Rng;

use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::value::{Map, Value};

use super::OpHandler;

#[derive(Debug, Clone, Copy, PartialEq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum MathFn {
    Sum,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Pow,
    Sqrt,
    Abs,
    Min,
    Max,
    Round,
    Floor,
    Ceil,
    Random,
}

fn nth(nums: &[f64], index: usize) -> f64 {
    nums.get(index).copied().unwrap_or(f64::NAN)
}

/// Left fold seeded by the first argument; an empty argument list is a
/// fatal input error.
fn fold_first(function: MathFn, nums: &[f64], f: impl Fn(f64, f64) -> f64) -> EvalResult<f64> {
    let (first, rest) = nums.split_first().ok_or_else(|| {
        EvalError::InvalidOperation(format!("math.{function} requires at least one argument"))
    })?;
    Ok(rest.iter().fold(*first, |acc, n| f(acc, *n)))
}

/// `math`: named arithmetic over number-coerced resolved arguments. An
/// unknown function name is fatal, unlike most ops.
pub(crate) struct Math;

#[async_trait]
impl OpHandler for Math {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(name) = op.get("fn").and_then(Value::as_str) else {
            return Err(EvalError::MissingField {
                op: "math",
                field: "fn",
            });
        };
        let function: MathFn = name
            .parse()
            .map_err(|_| EvalError::UnknownMathFunction(name.to_string()))?;
        let args = interp.resolve_args(op.get("args"), ctx).await?;
        let nums: Vec<f64> = args.iter().map(Value::to_number).collect();

        let result = match function {
            MathFn::Sum => nums.iter().sum(),
            MathFn::Subtract => fold_first(function, &nums, |a, b| a - b)?,
            MathFn::Multiply => nums.iter().product(),
            MathFn::Divide => fold_first(function, &nums, |a, b| a / b)?,
            MathFn::Mod => nth(&nums, 0) % nth(&nums, 1),
            MathFn::Pow => nth(&nums, 0).powf(nth(&nums, 1)),
            MathFn::Sqrt => nth(&nums, 0).sqrt(),
            MathFn::Abs => nth(&nums, 0).abs(),
            MathFn::Min => {
                if nums.iter().any(|n| n.is_nan()) {
                    f64::NAN
                } else {
                    nums.iter().copied().fold(f64::INFINITY, f64::min)
                }
            }
            MathFn::Max => {
                if nums.iter().any(|n| n.is_nan()) {
                    f64::NAN
                } else {
                    nums.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                }
            }
            // half-up rounding
            MathFn::Round => (nth(&nums, 0) + 0.5).floor(),
            MathFn::Floor => nth(&nums, 0).floor(),
            MathFn::Ceil => nth(&nums, 0).ceil(),
            MathFn::Random => {
                let mut rng = rand::thread_rng();
                if nums.len() == 2 {
                    // inclusive integer range
                    let (min, max) = (nums[0], nums[1]);
                    (rng.gen::<f64>() * (max - min + 1.0)).floor() + min
                } else {
                    rng.gen::<f64>()
                }
            }
        };
        Ok(Value::Number(result).into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::host::Host;

    async fn run(op: serde_json::Value) -> EvalResult<Value> {
        let interp = Interpreter::new(Host::in_memory());
        interp.execute(&op, &Context::new()).await
    }

    async fn num(op: serde_json::Value) -> f64 {
        match run(op).await.unwrap() {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_basic_functions() {
        assert_eq!(num(json!({"_op": "math", "fn": "sum", "args": [1, 2, 3]})).await, 6.0);
        assert_eq!(
            num(json!({"_op": "math", "fn": "subtract", "args": [10, 3, 2]})).await,
            5.0
        );
        assert_eq!(
            num(json!({"_op": "math", "fn": "multiply", "args": [2, 3, 4]})).await,
            24.0
        );
        assert_eq!(num(json!({"_op": "math", "fn": "divide", "args": [12, 4]})).await, 3.0);
        assert_eq!(num(json!({"_op": "math", "fn": "mod", "args": [7, 3]})).await, 1.0);
        assert_eq!(num(json!({"_op": "math", "fn": "pow", "args": [2, 10]})).await, 1024.0);
        assert_eq!(num(json!({"_op": "math", "fn": "sqrt", "args": [49]})).await, 7.0);
        assert_eq!(num(json!({"_op": "math", "fn": "abs", "args": [-3]})).await, 3.0);
        assert_eq!(num(json!({"_op": "math", "fn": "min", "args": [4, 1, 9]})).await, 1.0);
        assert_eq!(num(json!({"_op": "math", "fn": "max", "args": [4, 1, 9]})).await, 9.0);
        assert_eq!(num(json!({"_op": "math", "fn": "round", "args": [2.5]})).await, 3.0);
        assert_eq!(num(json!({"_op": "math", "fn": "round", "args": [-2.5]})).await, -2.0);
        assert_eq!(num(json!({"_op": "math", "fn": "floor", "args": [2.9]})).await, 2.0);
        assert_eq!(num(json!({"_op": "math", "fn": "ceil", "args": [2.1]})).await, 3.0);
    }

    #[tokio::test]
    async fn test_numeric_strings_coerce() {
        assert_eq!(
            num(json!({"_op": "math", "fn": "sum", "args": ["4", 2]})).await,
            6.0
        );
    }

    #[tokio::test]
    async fn test_nested_operation_arguments() {
        let op = json!({"_op": "math", "fn": "sum", "args": [
            {"_op": "math", "fn": "multiply", "args": [2, 3]},
            4,
        ]});
        assert_eq!(num(op).await, 10.0);
    }

    #[tokio::test]
    async fn test_random_ranges() {
        for _ in 0..20 {
            let unit = num(json!({"_op": "math", "fn": "random", "args": []})).await;
            assert!((0.0..1.0).contains(&unit));
            let ranged = num(json!({"_op": "math", "fn": "random", "args": [3, 5]})).await;
            assert!(ranged == ranged.trunc());
            assert!((3.0..=5.0).contains(&ranged));
        }
    }

    #[tokio::test]
    async fn test_unknown_function_is_fatal() {
        let result = run(json!({"_op": "math", "fn": "cbrt", "args": [8]})).await;
        assert!(matches!(result, Err(EvalError::UnknownMathFunction(_))));
    }

    #[tokio::test]
    async fn test_subtract_without_arguments_is_fatal() {
        let result = run(json!({"_op": "math", "fn": "subtract", "args": []})).await;
        assert!(matches!(result, Err(EvalError::InvalidOperation(_))));
    }
}
