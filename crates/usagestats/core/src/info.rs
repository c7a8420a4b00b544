// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Statistics keys
//!
//! A [`StatisticsInfo`] names one candidate (`value`) inside one situation
//! (`context`). Composite infos bundle several elementary pairs that are
//! recorded independently and combined on read.

use std::fmt;
use std::slice;

/// Separator used when building the context/value of a composite info
const COMPOSITE_SEPARATOR: &str = "|";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InfoKind {
    Empty,
    Elementary,
    Composite(Vec<StatisticsInfo>),
}

/// Immutable (context, value) pair used as a statistics key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatisticsInfo {
    context: String,
    value: String,
    kind: InfoKind,
}

/// The "no information" sentinel. Every store operation on it is a no-op.
pub static EMPTY: StatisticsInfo = StatisticsInfo {
    context: String::new(),
    value: String::new(),
    kind: InfoKind::Empty,
};

impl StatisticsInfo {
    /// Creates an elementary info
    pub fn new(context: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            value: value.into(),
            kind: InfoKind::Elementary,
        }
    }

    /// Returns the process-wide empty sentinel
    pub fn empty() -> &'static StatisticsInfo {
        &EMPTY
    }

    /// Builds a composite info from several parts.
    ///
    /// Empty parts are dropped and nested composites are flattened. No
    /// remaining parts yields the empty sentinel, a single remaining part is
    /// returned as is.
    pub fn composite(parts: impl IntoIterator<Item = StatisticsInfo>) -> Self {
        let mut conjuncts = Vec::new();
        for part in parts {
            match part.kind {
                InfoKind::Empty => {}
                InfoKind::Elementary => conjuncts.push(part),
                InfoKind::Composite(inner) => conjuncts.extend(inner),
            }
        }

        match conjuncts.len() {
            0 => EMPTY.clone(),
            1 => conjuncts.remove(0),
            _ => {
                let context = conjuncts.iter().map(|c| c.context.as_str()).collect::<Vec<_>>().join(COMPOSITE_SEPARATOR);
                let value = conjuncts.iter().map(|c| c.value.as_str()).collect::<Vec<_>>().join(COMPOSITE_SEPARATOR);
                Self {
                    context,
                    value,
                    kind: InfoKind::Composite(conjuncts),
                }
            }
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// True only for the empty sentinel (and its clones), regardless of
    /// what `context` and `value` contain.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, InfoKind::Empty)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, InfoKind::Composite(_))
    }

    /// Elementary components of this info.
    ///
    /// A non-composite info yields itself, so the sequence always has at
    /// least one element. Calling this again restarts the sequence.
    pub fn conjuncts(&self) -> slice::Iter<'_, StatisticsInfo> {
        match &self.kind {
            InfoKind::Composite(parts) => parts.iter(),
            InfoKind::Empty | InfoKind::Elementary => slice::from_ref(self).iter(),
        }
    }
}

impl fmt::Display for StatisticsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty>");
        }
        write!(f, "{}:{}", self.context, self.value)
    }
}
