use crate::domain::values::change_action::ChangeAction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One member of the index on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub symbol: String,
    pub rank: u32,
    pub market_cap: f64,
    pub weight: f64,
}

/// Index membership for one date, ordered by rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub date: NaiveDate,
    pub members: Vec<Constituent>,
}

impl Composition {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            members: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, symbol: &str) -> Option<&Constituent> {
        self.members.iter().find(|m| m.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.member(symbol).is_some()
    }

    pub fn total_weight(&self) -> f64 {
        self.members.iter().map(|m| m.weight).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionChange {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: ChangeAction,
    pub previous_rank: Option<u32>,
    pub new_rank: Option<u32>,
    pub market_cap: f64,
}
