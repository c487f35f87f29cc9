//! Domain categories used to scope learned rankings.
//!
//! Theorem domain tags are free-form text. They are bucketed into a closed
//! set of categories so that learned state can live in a fixed-size table
//! instead of a string-keyed map.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Coarse economic domain bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DomainCategory {
    Macroeconomic,
    Microeconomic,
    Monetary,
    Fiscal,
    International,
    General,
    Behavioral,
    Development,
    Institutional,
    Experimental,
}

impl DomainCategory {
    pub const COUNT: usize = 10;

    /// All categories, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Macroeconomic,
        Self::Microeconomic,
        Self::Monetary,
        Self::Fiscal,
        Self::International,
        Self::General,
        Self::Behavioral,
        Self::Development,
        Self::Institutional,
        Self::Experimental,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Macroeconomic => "macroeconomic",
            Self::Microeconomic => "microeconomic",
            Self::Monetary => "monetary",
            Self::Fiscal => "fiscal",
            Self::International => "international",
            Self::General => "general",
            Self::Behavioral => "behavioral",
            Self::Development => "development",
            Self::Institutional => "institutional",
            Self::Experimental => "experimental",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse the exact name produced by [`Self::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Classify a free-form domain tag.
    ///
    /// Picks the longest category name that occurs in the tag (or, for tags of
    /// at least four characters, that contains the tag, so "macro" still maps to
    /// macroeconomic). Unknown tags fall back to [`DomainCategory::General`].
    pub fn classify(domain: &str) -> Self {
        let tag = domain.trim().to_lowercase();
        if tag.is_empty() {
            return Self::General;
        }

        Self::ALL
            .into_iter()
            .filter(|category| {
                let name = category.as_str();
                tag.contains(name) || (tag.len() >= 4 && name.contains(tag.as_str()))
            })
            .fold(None, |best: Option<Self>, category| match best {
                Some(b) if b.as_str().len() >= category.as_str().len() => Some(b),
                _ => Some(category),
            })
            .unwrap_or(Self::General)
    }
}

impl std::fmt::Display for DomainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed-size table with one slot per [`DomainCategory`].
#[derive(Debug, Clone, PartialEq)]
pub struct DomainTable<T> {
    slots: [T; DomainCategory::COUNT],
}

impl<T> DomainTable<T> {
    /// Build a table by evaluating `init` for every category.
    pub fn from_fn(mut init: impl FnMut(DomainCategory) -> T) -> Self {
        Self {
            slots: DomainCategory::ALL.map(&mut init),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DomainCategory, &T)> {
        DomainCategory::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DomainCategory, &mut T)> {
        DomainCategory::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<T: Default> Default for DomainTable<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<DomainCategory> for DomainTable<T> {
    type Output = T;

    fn index(&self, category: DomainCategory) -> &T {
        &self.slots[category.index()]
    }
}

impl<T> IndexMut<DomainCategory> for DomainTable<T> {
    fn index_mut(&mut self, category: DomainCategory) -> &mut T {
        &mut self.slots[category.index()]
    }
}
