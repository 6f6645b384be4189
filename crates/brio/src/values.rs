use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ast::NodeId;
use crate::diagnostics::RuntimeError;
use crate::runtime::environment::Env;

/// Fixed money scale: sub-units per whole unit, independent of currency.
pub const MONEY_SCALE: i64 = 10_000;

/// Handle into the [`crate::store::ValueStore`]. Stable for the runtime's
/// lifetime; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyValue {
    /// Signed amount in sub-units (`MONEY_SCALE` per whole unit).
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateValue {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateValue {
    /// Validates the day against the month length, including the leap rule.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, RuntimeError> {
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(RuntimeError::InvalidValue(format!(
                "{year:04}-{month:02}-{day:02} is not a calendar date"
            )));
        }
        Ok(Self { year, month, day })
    }

    pub(crate) fn to_naive(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .unwrap_or(NaiveDate::MIN)
    }

    pub(crate) fn from_naive(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeValue {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
}

impl TimeValue {
    pub fn new(hour: u32, minute: u32, second: u32, millisecond: u32) -> Result<Self, RuntimeError> {
        if hour > 23 || minute > 59 || second > 59 || millisecond > 999 {
            return Err(RuntimeError::InvalidValue(format!(
                "{hour:02}:{minute:02}:{second:02}.{millisecond:03} is not a clock time"
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
            millisecond,
        })
    }

    pub const MIDNIGHT: TimeValue = TimeValue {
        hour: 0,
        minute: 0,
        second: 0,
        millisecond: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTimeValue {
    pub date: DateValue,
    pub time: TimeValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioValue {
    pub numerator: f64,
    pub denominator: f64,
}

impl RatioValue {
    pub fn new(numerator: f64, denominator: f64) -> Result<Self, RuntimeError> {
        if denominator == 0.0 {
            return Err(RuntimeError::InvalidValue(
                "ratio denominator must be nonzero".to_string(),
            ));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordValue {
    pub fields: HashMap<String, ValueId>,
    pub parent: Option<ValueId>,
}

pub type NativeFn = std::sync::Arc<
    dyn Fn(&mut crate::store::ValueStore, &[ValueId], crate::diagnostics::Position) -> Result<ValueId, RuntimeError>
        + Send
        + Sync,
>;

/// What runs when a function value is called: a user-defined body in the
/// AST arena, or a native primitive installed by the runtime.
#[derive(Clone)]
pub enum FunctionBody {
    Ast(NodeId),
    Native(NativeFn),
}

impl PartialEq for FunctionBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FunctionBody::Ast(a), FunctionBody::Ast(b)) => a == b,
            (FunctionBody::Native(a), FunctionBody::Native(b)) => {
                std::sync::Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Ast(id) => f.debug_tuple("Ast").field(id).finish(),
            FunctionBody::Native(_) => write!(f, "Native(<fn>)"),
        }
    }
}

#[derive(Clone)]
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<String>,
    pub body: FunctionBody,
    /// Environment captured at definition time; `None` for functions built
    /// through the API and natives, which run against the globals.
    pub env: Option<Env>,
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({}/{})", self.name, self.params.len())
    }
}

/// Lifecycle point at which a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    DataChanged,
    Timer,
    Startup,
    Shutdown,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerValue {
    pub name: String,
    pub event: TriggerEvent,
    pub condition: NodeId,
    pub action: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintValue {
    pub name: String,
    pub condition: NodeId,
    pub healing: Option<NodeId>,
}

/// The runtime's uniform value: one arm per kind in the data model.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    Money(MoneyValue),
    Time(TimeValue),
    Date(DateValue),
    DateTime(DateTimeValue),
    Percentage(f64),
    Ratio(RatioValue),
    Boolean(bool),
    /// No value observed yet.
    Unknown,
    /// Explicit absence.
    Nil,
    List(Vec<ValueId>),
    Record(RecordValue),
    Function(FunctionValue),
    Trigger(TriggerValue),
    Constraint(ConstraintValue),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Money(_) => "money",
            Value::Time(_) => "time",
            Value::Date(_) => "date",
            Value::DateTime(_) => "date_time",
            Value::Percentage(_) => "percentage",
            Value::Ratio(_) => "ratio",
            Value::Boolean(_) => "boolean",
            Value::Unknown => "unknown",
            Value::Nil => "nil",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Function(_) => "function",
            Value::Trigger(_) => "trigger",
            Value::Constraint(_) => "constraint",
        }
    }
}
