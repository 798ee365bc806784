use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Direction of an `opt` request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Trigger {
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct TriggerParseError(String);

impl fmt::Display for TriggerParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expected \"in\" or \"out\", got \"{}\"", self.0)
    }
}

impl Error for TriggerParseError {}

impl FromStr for Trigger {
    type Err = TriggerParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in" => Ok(Trigger::In),
            "out" => Ok(Trigger::Out),
            _ => Err(TriggerParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let trigger = match self {
            Trigger::In => "in",
            Trigger::Out => "out",
        };
        write!(f, "{}", trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_either_case() {
        assert_eq!("IN".parse::<Trigger>().unwrap(), Trigger::In);
        assert_eq!("out".parse::<Trigger>().unwrap(), Trigger::Out);
        assert_eq!(Trigger::Out.to_string(), "out");
    }

    #[test]
    fn rejects_anything_else() {
        let error = "maybe".parse::<Trigger>().unwrap_err();
        assert_eq!(error.to_string(), "expected \"in\" or \"out\", got \"maybe\"");
    }
}
