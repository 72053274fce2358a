use std::fmt;

use chrono::NaiveDate;

/// Family of derived views a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// A day's record list
    Items,
    /// A day's summary counts
    Summary,
    /// A week's aggregate, keyed by the week's Monday
    Weekly,
    /// An owner's cross-project grouping
    Projects,
}

impl CacheScope {
    pub const ALL: [CacheScope; 4] = [
        CacheScope::Items,
        CacheScope::Summary,
        CacheScope::Weekly,
        CacheScope::Projects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheScope::Items => "items",
            CacheScope::Summary => "summary",
            CacheScope::Weekly => "weekly",
            CacheScope::Projects => "projects",
        }
    }
}

/// Colon-delimited key: `scope:owner:param1:param2...`.
///
/// Any leading run of segments followed by `:` is a valid invalidation prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: CacheScope,
    pub owner: String,
    pub params: Vec<String>,
}

impl CacheKey {
    pub fn new(scope: CacheScope, owner: &str) -> Self {
        CacheKey {
            scope,
            owner: owner.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, p: impl ToString) -> Self {
        self.params.push(p.to_string());
        self
    }

    pub fn items(owner: &str, date: NaiveDate) -> Self {
        Self::new(CacheScope::Items, owner).param(date)
    }

    pub fn summary(owner: &str, date: NaiveDate) -> Self {
        Self::new(CacheScope::Summary, owner).param(date)
    }

    pub fn weekly(owner: &str, week_start: NaiveDate) -> Self {
        Self::new(CacheScope::Weekly, owner).param(week_start)
    }

    pub fn projects(owner: &str) -> Self {
        Self::new(CacheScope::Projects, owner).param("all")
    }

    /// Prefix matching every key of `scope` for `owner`
    pub fn scope_prefix(scope: CacheScope, owner: &str) -> String {
        format!("{}:{}:", scope.as_str(), owner)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.owner)?;
        for p in &self.params {
            write!(f, ":{}", p)?;
        }
        Ok(())
    }
}
