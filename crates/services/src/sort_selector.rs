//! # Sort strategy selector
//!
//! Maps the raw `sort`, `desc`, `limit` and `since` query values onto a
//! validated [`PageQuery`].
//!
//! # Developer Note
//! `sort` is lenient (unknown names mean `flat`) while `desc`, `limit` and
//! `since` are strict. Clients depend on both behaviours, so keep them apart.

use domains::{DomainError, Direction, PageQuery, Result, SortMode};
use serde::Deserialize;

use crate::cursor;

/// Query parameters exactly as the transport layer received them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawPageParams {
    pub sort: Option<String>,
    pub since: Option<String>,
    pub desc: Option<String>,
    pub limit: Option<String>,
}

impl RawPageParams {
    pub fn new(sort: &str) -> Self {
        Self {
            sort: Some(sort.to_string()),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: impl ToString) -> Self {
        self.since = Some(since.to_string());
        self
    }

    pub fn desc(mut self, desc: bool) -> Self {
        self.desc = Some(desc.to_string());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SortSelector {
    /// Used when the request carries no `limit`
    default_limit: u32,
}

impl SortSelector {
    pub fn new(default_limit: u32) -> Self {
        Self { default_limit }
    }

    pub fn select(&self, params: &RawPageParams) -> Result<PageQuery> {
        let mode = params
            .sort
            .as_deref()
            .map(SortMode::from_name)
            .unwrap_or_default();

        let direction = match params.desc.as_deref() {
            None | Some("") => Direction::Asc,
            Some(raw) => Direction::from_desc(parse_bool(raw)?),
        };

        let limit = match params.limit.as_deref() {
            None | Some("") => self.default_limit,
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                DomainError::invalid(format!("limit must be a non-negative integer, got '{raw}'"))
            })?,
        };

        let shape = cursor::decode(mode, params.since.as_deref())?;

        Ok(PageQuery {
            shape,
            direction,
            limit,
        })
    }
}

/// Accepts the usual boolean spellings: 1/0, t/f and true/false in lower,
/// upper or title case.
fn parse_bool(raw: &str) -> Result<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(DomainError::invalid(format!(
            "desc must be a boolean, got '{other}'"
        ))),
    }
}
