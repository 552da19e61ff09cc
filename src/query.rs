use crate::codec::SqlValue;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::params::ParameterSet;
use crate::predicate::Predicate;
use crate::schema::{Dialect, TableDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

const OWNER_PARAM: &str = "__owner";
const SORT_KEY_PARAM: &str = "__sort_key";
const OFFSET_PARAM: &str = "__offset";
const LIMIT_PARAM: &str = "__limit";
/// Parameter holding the primary key in by-key statements
pub const KEY_PARAM: &str = "__key";

/// Something that knows which owner the current caller acts for
pub trait OwnershipContext {
    fn owner_id(&self) -> Option<Uuid>;
}

/// Optional owner applied to every query against an owned table.
///
/// An unscoped query sees every row; a scoped one sees only rows whose
/// ownership column equals the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerScope {
    owner: Option<Uuid>,
}

impl OwnerScope {
    pub fn unscoped() -> Self {
        Self { owner: None }
    }

    pub fn owned_by(owner: Uuid) -> Self {
        Self { owner: Some(owner) }
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn is_scoped(&self) -> bool {
        self.owner.is_some()
    }
}

impl<C: OwnershipContext> From<&C> for OwnerScope {
    fn from(context: &C) -> Self {
        Self {
            owner: context.owner_id(),
        }
    }
}

impl From<Option<Uuid>> for OwnerScope {
    fn from(owner: Option<Uuid>) -> Self {
        Self { owner }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One page of a listing as requested by a caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// 1-based; zero is treated as the first page
    pub page_number: u32,
    /// Zero selects the configured default
    pub page_size: u32,
    pub sort_by: Option<String>,
    pub direction: SortDirection,
    pub filter: Option<Predicate>,
}

impl PageRequest {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_by = Some(column.into());
        self.direction = direction;
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }
}

/// Page size bounds applied to every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        PageLimits::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for PageLimits {
    fn from(config: &StoreConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

impl PageLimits {
    /// Clamp a request to a valid `(page_number, page_size)`.
    pub fn normalize(&self, page_number: u32, page_size: u32) -> (u32, u32) {
        let max = self.max_page_size.max(1);
        let size = match page_size {
            0 => self.default_page_size.clamp(1, max),
            n if n > max => {
                warn!(requested = n, max, "page size clamped");
                max
            }
            n => n,
        };
        (page_number.max(1), size)
    }
}

/// A page of results with the total count of matching rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_items: u64,
    pub page_size: u32,
    pub page_number: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.page_size))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total_items: self.total_items,
            page_size: self.page_size,
            page_number: self.page_number,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Statement text with `@name` placeholders and its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: ParameterSet,
}

/// Count and page statements for one page request
#[derive(Debug, Clone, PartialEq)]
pub struct PagedQuery {
    pub count: BuiltQuery,
    pub page: BuiltQuery,
    pub page_number: u32,
    pub page_size: u32,
}

/// Builds the statements run against one table.
///
/// Builders are pure: they only read the descriptor and return SQL text with
/// its parameters.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    table: &'a TableDescriptor,
    dialect: Dialect,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(table: &'a TableDescriptor, dialect: Dialect) -> Self {
        Self { table, dialect }
    }

    /// `(@__owner IS NULL OR "<owner>" = @__owner)` for owned tables
    pub fn tenant_clause(&self) -> Option<String> {
        self.table.owner_column.as_ref().map(|owner| {
            format!(
                "(@{p} IS NULL OR {} = @{p})",
                self.dialect.quote(owner),
                p = OWNER_PARAM
            )
        })
    }

    /// Tenant clause AND-ed with the translated filter, as ` WHERE ...` or empty
    fn where_clause(
        &self,
        scope: &OwnerScope,
        filter: Option<&Predicate>,
        extra: Option<String>,
    ) -> Result<(String, ParameterSet)> {
        let mut clauses = Vec::new();
        let mut params = ParameterSet::new();

        if let Some(extra) = extra {
            clauses.push(extra);
        }
        if let Some(tenant) = self.tenant_clause() {
            clauses.push(tenant);
            params.insert(OWNER_PARAM, SqlValue::from(scope.owner()));
        }
        if let Some(predicate) = filter {
            let translated = predicate.translate(self.table, self.dialect)?;
            clauses.push(translated.sql);
            params.extend(translated.params);
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        Ok((sql, params))
    }

    fn key_clause(&self) -> String {
        format!(
            "{} = @{}",
            self.dialect.quote(&self.table.primary_key().name),
            KEY_PARAM
        )
    }

    fn from_table(&self) -> String {
        self.dialect.quote(&self.table.name)
    }

    /// All matching rows in primary key order
    pub fn select(&self, scope: &OwnerScope, filter: Option<&Predicate>) -> Result<BuiltQuery> {
        let (where_sql, params) = self.where_clause(scope, filter, None)?;
        Ok(BuiltQuery {
            sql: format!(
                "SELECT * FROM {}{} ORDER BY {} ASC",
                self.from_table(),
                where_sql,
                self.dialect.quote(&self.table.primary_key().name)
            ),
            params,
        })
    }

    /// First matching row in primary key order
    pub fn select_first(&self, scope: &OwnerScope, filter: Option<&Predicate>) -> Result<BuiltQuery> {
        let mut query = self.select(scope, filter)?;
        query.sql.push(' ');
        query.sql.push_str(&self.dialect.paging_clause(OFFSET_PARAM, LIMIT_PARAM));
        query.params.insert(OFFSET_PARAM, 0i64);
        query.params.insert(LIMIT_PARAM, 1i64);
        Ok(query)
    }

    /// Row with primary key `key`, within the scope
    pub fn select_by_key(&self, scope: &OwnerScope, key: SqlValue) -> Result<BuiltQuery> {
        let (where_sql, mut params) = self.where_clause(scope, None, Some(self.key_clause()))?;
        params.insert(KEY_PARAM, key);
        Ok(BuiltQuery {
            sql: format!("SELECT * FROM {}{}", self.from_table(), where_sql),
            params,
        })
    }

    /// Number of matching rows, in a column named `count`
    pub fn count(&self, scope: &OwnerScope, filter: Option<&Predicate>) -> Result<BuiltQuery> {
        let (where_sql, params) = self.where_clause(scope, filter, None)?;
        Ok(BuiltQuery {
            sql: format!(
                "SELECT COUNT(*) AS {} FROM {}{}",
                self.dialect.quote("count"),
                self.from_table(),
                where_sql
            ),
            params,
        })
    }

    /// Count and page statements for `request`.
    ///
    /// The sort column is matched against the table's allow-list and only
    /// ever travels as a bound value; an unknown column sorts by primary key.
    pub fn page(&self, scope: &OwnerScope, request: &PageRequest, limits: PageLimits) -> Result<PagedQuery> {
        let (page_number, page_size) = limits.normalize(request.page_number, request.page_size);
        let offset = i64::from(page_number - 1) * i64::from(page_size);

        let count = self.count(scope, request.filter.as_ref())?;
        let (where_sql, mut params) = self.where_clause(scope, request.filter.as_ref(), None)?;

        let sort_key = request
            .sort_by
            .as_deref()
            .filter(|column| self.table.sortable.iter().any(|s| s == column));
        if let (Some(requested), None) = (request.sort_by.as_deref(), sort_key) {
            warn!(table = %self.table.name, column = requested, "ignoring sort by column outside the allow-list");
        }
        params.insert(SORT_KEY_PARAM, sort_key.map(str::to_string));
        params.insert(OFFSET_PARAM, offset);
        params.insert(LIMIT_PARAM, i64::from(page_size));

        let sql = format!(
            "SELECT * FROM {}{} ORDER BY {} {}",
            self.from_table(),
            where_sql,
            self.order_terms(request.direction),
            self.dialect.paging_clause(OFFSET_PARAM, LIMIT_PARAM)
        );

        Ok(PagedQuery {
            count,
            page: BuiltQuery { sql, params },
            page_number,
            page_size,
        })
    }

    fn order_terms(&self, direction: SortDirection) -> String {
        let mut terms: Vec<String> = self
            .table
            .sortable
            .iter()
            .map(|column| {
                format!(
                    "CASE WHEN @{} = '{}' THEN {} END {}",
                    SORT_KEY_PARAM,
                    column.replace('\'', "''"),
                    self.dialect.quote(column),
                    direction
                )
            })
            .collect();
        terms.push(format!(
            "{} {}",
            self.dialect.quote(&self.table.primary_key().name),
            direction
        ));
        terms.join(", ")
    }

    /// INSERT of every field, returning the stored row.
    ///
    /// Parameters are named after the fields. An auto-increment key is left
    /// to the database when `include_key` is false.
    pub fn insert(&self, include_key: bool) -> BuiltQuery {
        let fields: Vec<_> = self
            .table
            .fields
            .iter()
            .filter(|f| include_key || !f.primary_key)
            .collect();
        let columns: Vec<String> = fields.iter().map(|f| self.dialect.quote(&f.name)).collect();
        let values: Vec<String> = fields.iter().map(|f| format!("@{}", f.name)).collect();

        BuiltQuery {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.from_table(),
                columns.join(", "),
                values.join(", ")
            ),
            params: ParameterSet::new(),
        }
    }

    /// Single-statement UPDATE of every non-key field of the row `@__key`.
    ///
    /// The ownership column is never rewritten; a row outside the scope is
    /// left untouched and reported as zero affected rows.
    pub fn update(&self, scope: &OwnerScope, key: SqlValue) -> Result<BuiltQuery> {
        let assignments: Vec<String> = self
            .table
            .fields
            .iter()
            .filter(|f| !f.primary_key && Some(&f.name) != self.table.owner_column.as_ref())
            .map(|f| format!("{} = @{}", self.dialect.quote(&f.name), f.name))
            .collect();

        let (where_sql, mut params) = self.where_clause(scope, None, Some(self.key_clause()))?;
        params.insert(KEY_PARAM, key);

        // A table with only a key and owner still reports whether the row matched
        let set = if assignments.is_empty() {
            let key_column = self.dialect.quote(&self.table.primary_key().name);
            format!("{} = {}", key_column, key_column)
        } else {
            assignments.join(", ")
        };

        Ok(BuiltQuery {
            sql: format!("UPDATE {} SET {}{}", self.from_table(), set, where_sql),
            params,
        })
    }

    /// Single-statement DELETE of the row `@__key` within the scope
    pub fn delete(&self, scope: &OwnerScope, key: SqlValue) -> Result<BuiltQuery> {
        let (where_sql, mut params) = self.where_clause(scope, None, Some(self.key_clause()))?;
        params.insert(KEY_PARAM, key);
        Ok(BuiltQuery {
            sql: format!("DELETE FROM {}{}", self.from_table(), where_sql),
            params,
        })
    }
}
