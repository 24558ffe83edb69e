//! Query Builder Types - Core types and enums for query building

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order by direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One WHERE fragment and the connective joining it to the previous one
///
/// The connective is emitted verbatim and ignored for the first fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereFragment {
    pub connective: String,
    pub condition: String,
}

/// ORDER BY entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub column: String,
    pub direction: OrderDirection,
}
