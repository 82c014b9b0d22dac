//! Operations: thin adapters between a parsed script's typed command tree
//! and the Engine. Each `Operation` carries its arithmetic subtree as a
//! small stack-machine program, evaluates it against the current engine
//! scope/variables, then calls the matching `Engine` method with an
//! optional year matcher.

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, YearMatcher};
use crate::error::{EngineError, Res};
use crate::quantity::{combine_units_mul, Quantity};
use crate::streams::types::Channel;
use crate::streams::StreamName;

/// A single instruction in an arithmetic subtree's stack program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StackOp {
    Push(Quantity),
    PushVariable(String),
    Add,
    Sub,
    Mul,
    Div,
}

/// Runs a stack program to a single `Quantity`, reading variables from the
/// engine's current scope. `Add`/`Sub` require unit-compatible operands
/// (propagated from `Quantity`'s own arithmetic); `Mul`/`Div` combine units
/// lexically and leave normalization to the Unit Converter downstream.
pub fn eval_stack(program: &[StackOp], engine: &Engine) -> Res<Quantity> {
    let mut stack: Vec<Quantity> = Vec::new();
    for op in program {
        match op {
            StackOp::Push(q) => stack.push(q.clone()),
            StackOp::PushVariable(name) => stack.push(engine.get_variable(name)),
            StackOp::Add | StackOp::Sub | StackOp::Mul | StackOp::Div => {
                let rhs = stack.pop().ok_or_else(stack_underflow)?;
                let lhs = stack.pop().ok_or_else(stack_underflow)?;
                let result = match op {
                    StackOp::Add => (lhs + rhs)?,
                    StackOp::Sub => (lhs - rhs)?,
                    StackOp::Mul => Quantity::new(lhs.value * rhs.value, combine_units_mul(&lhs.units, &rhs.units)),
                    StackOp::Div => {
                        if rhs.is_zero() {
                            Quantity::new(rust_decimal::Decimal::ZERO, combine_units_mul(&lhs.units, &rhs.units))
                        } else {
                            Quantity::new(lhs.value / rhs.value, combine_units_mul(&lhs.units, &rhs.units))
                        }
                    }
                    _ => unreachable!(),
                };
                stack.push(result);
            }
        }
    }
    stack.pop().ok_or_else(stack_underflow)
}

fn stack_underflow() -> EngineError {
    EngineError::ValidationError("arithmetic stack program is malformed (underflow)".to_string())
}

/// The typed command surface a parsed script hands the engine — one
/// variant per mutating command, plus the scope-navigation commands that
/// a script's stanza/application/substance blocks resolve to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationKind {
    SetApplication(String),
    SetSubstance(String),
    SetStanza(String),
    SetStream {
        stream: StreamName,
        value: Vec<StackOp>,
        year: Option<YearMatcher>,
        propagate: bool,
    },
    ChangeStream {
        stream: StreamName,
        delta: Vec<StackOp>,
        year: Option<YearMatcher>,
    },
    Cap {
        stream: StreamName,
        max: Vec<StackOp>,
        year: Option<YearMatcher>,
        displace_target: Option<String>,
    },
    Floor {
        stream: StreamName,
        min: Vec<StackOp>,
        year: Option<YearMatcher>,
        displace_target: Option<String>,
    },
    Recharge {
        population: Vec<StackOp>,
        intensity: Vec<StackOp>,
        year: Option<YearMatcher>,
    },
    Retire {
        rate: Vec<StackOp>,
        year: Option<YearMatcher>,
    },
    Recover {
        amount: Vec<StackOp>,
        yield_rate: Vec<StackOp>,
        displacement: Option<Vec<StackOp>>,
        year: Option<YearMatcher>,
    },
    Replace {
        amount: Vec<StackOp>,
        stream: StreamName,
        dest_substance: String,
        year: Option<YearMatcher>,
    },
    Equals {
        intensity: Vec<StackOp>,
        year: Option<YearMatcher>,
    },
    Enable {
        stream: StreamName,
        year: Option<YearMatcher>,
    },
    SetInitialCharge {
        value: Vec<StackOp>,
        channel: Channel,
        year: Option<YearMatcher>,
    },
    DefineVariable(String),
    SetVariable {
        name: String,
        value: Vec<StackOp>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self { kind }
    }

    pub fn apply(&self, engine: &mut Engine) -> Res<()> {
        match &self.kind {
            OperationKind::SetApplication(name) => {
                engine.set_application(name.clone());
                Ok(())
            }
            OperationKind::SetSubstance(name) => {
                engine.set_substance(name.clone());
                Ok(())
            }
            OperationKind::SetStanza(name) => engine.set_stanza(name.clone()),
            OperationKind::SetStream { stream, value, year, propagate } => {
                let value = eval_stack(value, engine)?;
                engine.set_stream(*stream, value, year.clone(), *propagate)
            }
            OperationKind::ChangeStream { stream, delta, year } => {
                let delta = eval_stack(delta, engine)?;
                engine.change_stream(*stream, delta, year.clone())
            }
            OperationKind::Cap { stream, max, year, displace_target } => {
                let max = eval_stack(max, engine)?;
                engine.cap(*stream, max, year.clone(), displace_target.clone())
            }
            OperationKind::Floor { stream, min, year, displace_target } => {
                let min = eval_stack(min, engine)?;
                engine.floor(*stream, min, year.clone(), displace_target.clone())
            }
            OperationKind::Recharge { population, intensity, year } => {
                let population = eval_stack(population, engine)?;
                let intensity = eval_stack(intensity, engine)?;
                engine.recharge(population, intensity, year.clone())
            }
            OperationKind::Retire { rate, year } => {
                let rate = eval_stack(rate, engine)?;
                engine.retire(rate, year.clone())
            }
            OperationKind::Recover { amount, yield_rate, displacement, year } => {
                let amount = eval_stack(amount, engine)?;
                let yield_rate = eval_stack(yield_rate, engine)?;
                let displacement = match displacement {
                    Some(program) => Some(eval_stack(program, engine)?),
                    None => None,
                };
                engine.recover(amount, yield_rate, displacement, year.clone())
            }
            OperationKind::Replace { amount, stream, dest_substance, year } => {
                let amount = eval_stack(amount, engine)?;
                engine.replace(amount, *stream, dest_substance.clone(), year.clone())
            }
            OperationKind::Equals { intensity, year } => {
                let intensity = eval_stack(intensity, engine)?;
                engine.equals(intensity, year.clone())
            }
            OperationKind::Enable { stream, year } => engine.enable(*stream, year.clone()),
            OperationKind::SetInitialCharge { value, channel, year } => {
                let value = eval_stack(value, engine)?;
                engine.set_initial_charge(value, *channel, year.clone())
            }
            OperationKind::DefineVariable(name) => {
                engine.define_variable(name);
                Ok(())
            }
            OperationKind::SetVariable { name, value } => {
                let value = eval_stack(value, engine)?;
                engine.set_variable(name, value);
                Ok(())
            }
        }
    }
}

/// Applies an ordered list of operations against the engine, stopping at
/// the first failure. Discarding any already-computed results for the
/// failed run is the driver's responsibility; this just surfaces the
/// first error rather than best-effort continuing.
pub fn apply_all(operations: &[Operation], engine: &mut Engine) -> Res<()> {
    for operation in operations {
        operation.apply(engine)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stack_program_evaluates_left_to_right() {
        let mut engine = Engine::new(2025, 2030);
        engine.set_application("A");
        engine.set_substance("B");
        let program = vec![
            StackOp::Push(Quantity::new(dec!(100), "kg")),
            StackOp::Push(Quantity::new(dec!(10), "%")),
            StackOp::Mul,
        ];
        let result = eval_stack(&program, &engine).unwrap();
        assert_eq!(result.value, dec!(1000));
    }

    #[test]
    fn apply_all_runs_operations_in_order() {
        let mut engine = Engine::new(2025, 2030);
        let ops = vec![
            Operation::new(OperationKind::SetApplication("Domestic Refrigeration".to_string())),
            Operation::new(OperationKind::SetSubstance("HFC-134a".to_string())),
            Operation::new(OperationKind::SetInitialCharge {
                value: vec![StackOp::Push(Quantity::new(dec!(1), "kg/unit"))],
                channel: Channel::Sales,
                year: None,
            }),
            Operation::new(OperationKind::SetStream {
                stream: StreamName::Manufacture,
                value: vec![StackOp::Push(Quantity::new(dec!(100000), "kg"))],
                year: None,
                propagate: true,
            }),
        ];
        apply_all(&ops, &mut engine).unwrap();
        let population = engine.get_stream(StreamName::Equipment, None, None).unwrap();
        assert_eq!(population.value, dec!(100000));
    }

    #[test]
    fn empty_stack_program_is_a_validation_error() {
        let engine = Engine::new(2025, 2030);
        let err = eval_stack(&[StackOp::Add], &engine);
        assert!(matches!(err, Err(EngineError::ValidationError(_))));
    }
}
