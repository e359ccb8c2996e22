//! Reserved node names and named-child slots
//!
//! The rule engine identifies operators and functions by name. This module
//! is the single catalogue of the names the editor treats specially.

use std::fmt;
use std::str::FromStr;

// ============ Logical ============

pub const AND: &str = "AND";
pub const OR: &str = "OR";
pub const NOT: &str = "Not";

// ============ Binary operators ============

pub const EQUAL: &str = "=";
pub const NOT_EQUAL: &str = "!=";
pub const GREATER: &str = ">";
pub const LESS: &str = "<";
pub const GREATER_OR_EQUAL: &str = ">=";
pub const LESS_OR_EQUAL: &str = "<=";

pub const ADD: &str = "+";
pub const SUBTRACT: &str = "-";
pub const MULTIPLY: &str = "*";
pub const DIVIDE: &str = "/";

pub const IS_IN_LIST: &str = "IsInList";
pub const IS_NOT_IN_LIST: &str = "IsNotInList";
pub const STRING_CONTAINS: &str = "StringContains";
pub const STRING_NOT_CONTAIN: &str = "StringNotContain";
pub const STRING_STARTS_WITH: &str = "StringStartsWith";
pub const STRING_ENDS_WITH: &str = "StringEndsWith";
pub const CONTAINS_ANY_OF: &str = "ContainsAnyOf";
pub const CONTAINS_NONE_OF: &str = "ContainsNoneOf";

pub const COMPARISON_OPERATORS: &[&str] = &[
    EQUAL,
    NOT_EQUAL,
    GREATER,
    LESS,
    GREATER_OR_EQUAL,
    LESS_OR_EQUAL,
];

pub const ARITHMETIC_OPERATORS: &[&str] = &[ADD, SUBTRACT, MULTIPLY, DIVIDE];

pub const LIST_AND_STRING_OPERATORS: &[&str] = &[
    IS_IN_LIST,
    IS_NOT_IN_LIST,
    STRING_CONTAINS,
    STRING_NOT_CONTAIN,
    STRING_STARTS_WITH,
    STRING_ENDS_WITH,
    CONTAINS_ANY_OF,
    CONTAINS_NONE_OF,
];

// ============ Unary operators ============

pub const IS_EMPTY: &str = "IsEmpty";
pub const IS_NOT_EMPTY: &str = "IsNotEmpty";

pub const UNARY_OPERATORS: &[&str] = &[NOT, IS_EMPTY, IS_NOT_EMPTY];

// ============ Functions ============

pub const AGGREGATION: &str = "Aggregation";
pub const FILTER: &str = "Filter";
pub const LIST: &str = "List";
pub const PAYLOAD: &str = "Payload";
pub const DATABASE_ACCESS: &str = "DatabaseAccess";
pub const CUSTOM_LIST_ACCESS: &str = "CustomListAccess";
pub const TIME_ADD: &str = "TimeAdd";
pub const TIME_NOW: &str = "TimeNow";

/// Wire name of the "operand not yet chosen" placeholder
pub const UNDEFINED: &str = "Undefined";

// ============ Named-child slots ============

pub const SLOT_AGGREGATOR: &str = "aggregator";
pub const SLOT_TABLE_NAME: &str = "tableName";
pub const SLOT_FIELD_NAME: &str = "fieldName";
pub const SLOT_FILTERS: &str = "filters";
pub const SLOT_LABEL: &str = "label";
pub const SLOT_OPERATOR: &str = "operator";
pub const SLOT_VALUE: &str = "value";
pub const SLOT_PATH: &str = "path";
pub const SLOT_CUSTOM_LIST_ID: &str = "customListId";
pub const SLOT_TIMESTAMP_FIELD: &str = "timestampField";
pub const SLOT_DURATION: &str = "duration";
pub const SLOT_SIGN: &str = "sign";

pub fn is_binary_operator(name: &str) -> bool {
    COMPARISON_OPERATORS.contains(&name)
        || ARITHMETIC_OPERATORS.contains(&name)
        || LIST_AND_STRING_OPERATORS.contains(&name)
}

pub fn is_unary_operator(name: &str) -> bool {
    UNARY_OPERATORS.contains(&name)
}

pub fn is_logical(name: &str) -> bool {
    name == AND || name == OR
}

/// How many positional children a node of this name carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n operands; removing one leaves an `Undefined` placeholder
    Fixed(usize),
    /// Any number of operands; removing one deletes the slot
    Variadic,
    /// Not known to the editor; operands are left for the server to judge
    Unchecked,
}

pub fn arity(name: &str) -> Arity {
    if is_binary_operator(name) {
        Arity::Fixed(2)
    } else if is_unary_operator(name) || name == PAYLOAD {
        Arity::Fixed(1)
    } else if is_logical(name) || name == LIST {
        Arity::Variadic
    } else if name == TIME_NOW {
        Arity::Fixed(0)
    } else {
        Arity::Unchecked
    }
}

/// Named children a function must carry before the engine can evaluate it
pub fn required_named_children(name: &str) -> &'static [&'static str] {
    match name {
        AGGREGATION => &[SLOT_AGGREGATOR, SLOT_TABLE_NAME, SLOT_FIELD_NAME, SLOT_FILTERS],
        FILTER => &[SLOT_OPERATOR, SLOT_TABLE_NAME, SLOT_FIELD_NAME, SLOT_VALUE],
        DATABASE_ACCESS => &[SLOT_TABLE_NAME, SLOT_FIELD_NAME, SLOT_PATH],
        CUSTOM_LIST_ACCESS => &[SLOT_CUSTOM_LIST_ID],
        TIME_ADD => &[SLOT_TIMESTAMP_FIELD, SLOT_DURATION, SLOT_SIGN],
        _ => &[],
    }
}

/// Operators usable inside an aggregation filter
pub const FILTER_OPERATORS: &[&str] = &[
    EQUAL,
    NOT_EQUAL,
    GREATER,
    LESS,
    GREATER_OR_EQUAL,
    LESS_OR_EQUAL,
    IS_IN_LIST,
    IS_NOT_IN_LIST,
    IS_EMPTY,
    IS_NOT_EMPTY,
    STRING_STARTS_WITH,
    STRING_ENDS_WITH,
];

/// Statistic computed by an aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregator {
    Avg,
    Count,
    CountDistinct,
    Max,
    Min,
    Sum,
}

impl Aggregator {
    pub const ALL: [Aggregator; 6] = [
        Aggregator::Avg,
        Aggregator::Count,
        Aggregator::CountDistinct,
        Aggregator::Max,
        Aggregator::Min,
        Aggregator::Sum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Aggregator::Avg => "AVG",
            Aggregator::Count => "COUNT",
            Aggregator::CountDistinct => "COUNT_DISTINCT",
            Aggregator::Max => "MAX",
            Aggregator::Min => "MIN",
            Aggregator::Sum => "SUM",
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregator::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown aggregator: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_operators_are_not_binary() {
        assert!(!is_binary_operator(AND));
        assert!(!is_binary_operator(OR));
        assert!(is_binary_operator(IS_IN_LIST));
        assert!(is_binary_operator(ADD));
    }

    #[test]
    fn arity_by_name() {
        assert_eq!(arity(GREATER), Arity::Fixed(2));
        assert_eq!(arity(IS_EMPTY), Arity::Fixed(1));
        assert_eq!(arity(AND), Arity::Variadic);
        assert_eq!(arity(LIST), Arity::Variadic);
        assert_eq!(arity(AGGREGATION), Arity::Unchecked);
    }

    #[test]
    fn aggregator_round_trips_through_str() {
        for agg in Aggregator::ALL {
            assert_eq!(agg.as_str().parse::<Aggregator>(), Ok(agg));
        }
        assert!("MEDIAN".parse::<Aggregator>().is_err());
    }
}
