//! Cylinder banks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two cylinder groups, tracked independently until combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    /// Front cylinder.
    Front,
    /// Rear cylinder.
    Rear,
}

impl Bank {
    /// Both banks, front first.
    pub const ALL: [Bank; 2] = [Bank::Front, Bank::Rear];

    /// Position in [`Bank::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Bank::Front => 0,
            Bank::Rear => 1,
        }
    }

    /// Capitalised label used in output file names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Bank::Front => "Front",
            Bank::Rear => "Rear",
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bank::Front => "front",
            Bank::Rear => "rear",
        })
    }
}

/// A pair of values, one per bank.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerBank<T> {
    /// Front-cylinder value.
    pub front: T,
    /// Rear-cylinder value.
    pub rear: T,
}

impl<T> PerBank<T> {
    /// Build from a function of the bank.
    pub fn from_fn(mut f: impl FnMut(Bank) -> T) -> Self {
        Self {
            front: f(Bank::Front),
            rear: f(Bank::Rear),
        }
    }

    /// Value for `bank`.
    pub fn get(&self, bank: Bank) -> &T {
        match bank {
            Bank::Front => &self.front,
            Bank::Rear => &self.rear,
        }
    }

    /// Mutable value for `bank`.
    pub fn get_mut(&mut self, bank: Bank) -> &mut T {
        match bank {
            Bank::Front => &mut self.front,
            Bank::Rear => &mut self.rear,
        }
    }

    /// Map both values.
    pub fn map<U>(self, mut f: impl FnMut(Bank, T) -> U) -> PerBank<U> {
        PerBank {
            front: f(Bank::Front, self.front),
            rear: f(Bank::Rear, self.rear),
        }
    }
}
