//! Column sorting for listings, shared by the server-rendered table and the
//! client payload. Size and date ties fall back to ascending name order.

use std::cmp::Ordering;

use crate::sys_listing::core::EntryInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Size,
    Date,
}

impl SortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Date => "date",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "size" => Some(Self::Size),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: SortColumn,
    pub order: SortOrder,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: SortColumn::Name,
            order: SortOrder::Asc,
        }
    }
}

impl SortState {
    /// State after clicking `column`: the same column flips direction,
    /// a different column starts ascending.
    pub fn clicked(self, column: SortColumn) -> Self {
        if column == self.column {
            let order = match self.order {
                SortOrder::Asc => SortOrder::Desc,
                SortOrder::Desc => SortOrder::Asc,
            };
            Self { column, order }
        } else {
            Self {
                column,
                order: SortOrder::Asc,
            }
        }
    }

    /// Read `sort=` and `order=` from a raw query string; anything
    /// unrecognized keeps the default.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut state = Self::default();
        for pair in query.unwrap_or_default().split('&') {
            let mut it = pair.splitn(2, '=');
            let key = it.next().unwrap_or_default();
            let value = it.next().unwrap_or_default();
            match key {
                "sort" => {
                    if let Some(column) = SortColumn::parse(value) {
                        state.column = column;
                    }
                }
                "order" => match value {
                    "asc" => state.order = SortOrder::Asc,
                    "desc" => state.order = SortOrder::Desc,
                    _ => {}
                },
                _ => {}
            }
        }
        state
    }

    pub fn to_query(self) -> String {
        format!("?sort={}&order={}", self.column.as_str(), self.order.as_str())
    }

    pub fn compare(self, a: &EntryInfo, b: &EntryInfo) -> Ordering {
        let by_name = || a.name.cmp(&b.name);
        let primary = match self.column {
            SortColumn::Name => by_name(),
            SortColumn::Size => a.size.cmp(&b.size),
            SortColumn::Date => a.modified.cmp(&b.modified),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(by_name)
    }
}

pub fn sort_entries(entries: &mut [EntryInfo], state: SortState) {
    entries.sort_by(|a, b| state.compare(a, b));
}
