use std::fmt;
use std::str::FromStr;

use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::worksheets::error::WorksheetError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Add, Operation::Sub, Operation::Mul, Operation::Div];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Sub => "-",
            Operation::Mul => "x",
            Operation::Div => "÷",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operation| operation.symbol() == symbol)
    }

    /// Division floors; `None` when dividing by zero.
    pub fn apply(&self, x: i64, y: i64) -> Option<i64> {
        match self {
            Operation::Add => x.checked_add(y),
            Operation::Sub => x.checked_sub(y),
            Operation::Mul => x.checked_mul(y),
            Operation::Div => {
                if y == 0 {
                    None
                } else {
                    Some(x.div_euclid(y))
                }
            }
        }
    }
}

impl FromStr for Operation {
    type Err = WorksheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|operation| operation.name() == lowered).ok_or(WorksheetError::UnsupportedOperation(lowered))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for Operation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

struct OperationVisitor;

impl<'de> Visitor<'de> for OperationVisitor {
    type Value = Operation;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("one of add, sub, mul or div")
    }

    fn visit_str<E>(self, value: &str) -> Result<Operation, E>
    where
        E: de::Error,
    {
        Operation::from_str(value).map_err(|_| de::Error::unknown_variant(value, &["add", "sub", "mul", "div"]))
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(OperationVisitor)
    }
}
