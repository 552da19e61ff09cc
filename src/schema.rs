use crate::codec::DECIMAL_SCALE;
use crate::error::{QueryError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// Prefix reserved for parameters generated by the query builders.
pub(crate) const RESERVED_PREFIX: &str = "__";

/// Semantic type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Decimal,
    Text,
    Bool,
    Timestamp,
    /// Time of day, stored in a TIME column.
    Duration,
    Uuid,
    Bytes,
    /// Stored as the variant's index; the slice lists serde variant names in order.
    Enum(&'static [&'static str]),
}

impl FieldType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    /// Whether `<`, `<=`, `>` and `>=` are meaningful for this type.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FieldType::Bool | FieldType::Bytes)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Text => "text",
            FieldType::Bool => "bool",
            FieldType::Timestamp => "timestamp",
            FieldType::Duration => "duration",
            FieldType::Uuid => "uuid",
            FieldType::Bytes => "bytes",
            FieldType::Enum(_) => "enum",
        }
    }
}

/// SQL flavour spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Quote an identifier so that case is preserved.
    pub fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", index),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Earliest date-time the engine stores; `DateTime::<Utc>::MIN_UTC` is rewritten to this.
    pub fn min_timestamp(&self) -> DateTime<Utc> {
        let (year, month, day) = match self {
            Dialect::Sqlite => (1, 1, 1),
            // 4714-11-24 BC in the proleptic Gregorian calendar
            Dialect::Postgres => (-4713, 11, 24),
        };
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Row window framing appended after ORDER BY.
    pub fn paging_clause(&self, offset_param: &str, limit_param: &str) -> String {
        match self {
            Dialect::Sqlite => format!("LIMIT @{} OFFSET @{}", limit_param, offset_param),
            Dialect::Postgres => format!(
                "OFFSET @{} ROWS FETCH NEXT @{} ROWS ONLY",
                offset_param, limit_param
            ),
        }
    }

    fn column_type(&self, field: &FieldDescriptor) -> String {
        let sized = |base: &str, fallback: &str| match field.max_length {
            Some(len) => format!("{}({})", base, len),
            None => fallback.to_string(),
        };

        match (self, field.field_type) {
            (_, FieldType::Text) => sized("VARCHAR", "TEXT"),
            (Dialect::Postgres, FieldType::Int8 | FieldType::Int16) => "SMALLINT".to_string(),
            (Dialect::Sqlite, FieldType::Int8) => "TINYINT".to_string(),
            (Dialect::Sqlite, FieldType::Int16) => "SMALLINT".to_string(),
            (Dialect::Postgres, FieldType::Int32) => "INTEGER".to_string(),
            (Dialect::Sqlite, FieldType::Int32) => "INT".to_string(),
            (_, FieldType::Int64) => "BIGINT".to_string(),
            (Dialect::Postgres, FieldType::Float) => "DOUBLE PRECISION".to_string(),
            (Dialect::Sqlite, FieldType::Float) => "DOUBLE".to_string(),
            (Dialect::Postgres, FieldType::Decimal) => format!("NUMERIC(18,{})", DECIMAL_SCALE),
            // Integer count of 10^-DECIMAL_SCALE units
            (Dialect::Sqlite, FieldType::Decimal) => "BIGINT".to_string(),
            (_, FieldType::Bool) => "BOOLEAN".to_string(),
            (Dialect::Postgres, FieldType::Timestamp) => "TIMESTAMPTZ".to_string(),
            (Dialect::Sqlite, FieldType::Timestamp) => "DATETIME".to_string(),
            (_, FieldType::Duration) => "TIME".to_string(),
            (Dialect::Postgres, FieldType::Uuid) => "UUID".to_string(),
            (Dialect::Sqlite, FieldType::Uuid) => "BLOB".to_string(),
            (Dialect::Postgres, FieldType::Bytes) => "BYTEA".to_string(),
            (Dialect::Sqlite, FieldType::Bytes) => sized("VARBINARY", "BLOB"),
            (_, FieldType::Enum(_)) => "INTEGER".to_string(),
        }
    }

    fn default_value(&self, field: &FieldDescriptor, context: ColumnContext) -> &'static str {
        if field.collection {
            return "''";
        }

        let altering = context == ColumnContext::AddColumn;
        match (self, field.field_type) {
            (_, FieldType::Text) => "''",
            (_, FieldType::Float | FieldType::Decimal) => "0",
            (_, FieldType::Enum(_)) => "0",
            (_, t) if t.is_integer() => "0",
            (Dialect::Postgres, FieldType::Bool) => "FALSE",
            (Dialect::Sqlite, FieldType::Bool) => "0",
            (Dialect::Postgres, FieldType::Timestamp) => "CURRENT_TIMESTAMP",
            // SQLite refuses non-constant defaults in ALTER TABLE ADD COLUMN
            (Dialect::Sqlite, FieldType::Timestamp) if altering => "'1970-01-01T00:00:00.000000000Z'",
            // Same fixed-width nanosecond text as bound timestamps
            (Dialect::Sqlite, FieldType::Timestamp) => {
                "(strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000000Z')"
            }
            (Dialect::Postgres, FieldType::Duration) => "(CURRENT_TIME AT TIME ZONE 'UTC')",
            (Dialect::Sqlite, FieldType::Duration) if altering => "'00:00:00'",
            (Dialect::Sqlite, FieldType::Duration) => "CURRENT_TIME",
            (Dialect::Postgres, FieldType::Uuid) => "gen_random_uuid()",
            (Dialect::Sqlite, FieldType::Uuid) if altering => "X'00000000000000000000000000000000'",
            (Dialect::Sqlite, FieldType::Uuid) => "(randomblob(16))",
            (Dialect::Postgres, FieldType::Bytes) => "''::bytea",
            (Dialect::Sqlite, FieldType::Bytes) => "X''",
            _ => "0",
        }
    }
}

/// Which statement a column definition is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnContext {
    CreateTable,
    AddColumn,
}

/// Field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
    pub max_length: Option<u32>,
    /// Ordered sequence of values stored as one delimited column.
    pub collection: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            primary_key: false,
            max_length: None,
            collection: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    /// Rendered NOT NULL with a default.
    ///
    /// Text and collection columns stay nullable so rows written before the
    /// column existed remain valid.
    pub fn requires_value(&self) -> bool {
        self.primary_key || (!self.nullable && !self.field_type.is_text() && !self.collection)
    }

    /// The key is generated by the database when the caller leaves it unset.
    pub fn is_auto_increment(&self) -> bool {
        self.primary_key && self.field_type.is_integer()
    }
}

/// Table descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Column holding the row owner, filtered by every scoped query.
    pub owner_column: Option<String>,
    /// Columns a caller may sort a page by.
    pub sortable: Vec<String>,
    key_index: usize,
}

impl TableDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.key_index]
    }

    pub fn owner_field(&self) -> Option<&FieldDescriptor> {
        self.owner_column.as_deref().and_then(|name| self.field(name))
    }
}

/// Declarative builder for a table descriptor
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    owner_column: Option<String>,
    sortable: Vec<String>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            owner_column: None,
            sortable: Vec::new(),
        }
    }

    /// Add a fully specified field
    pub fn column(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add the primary key
    pub fn key(self, name: &str, field_type: FieldType) -> Self {
        self.column(FieldDescriptor::new(name, field_type).primary_key())
    }

    /// Add a required field
    pub fn field(self, name: &str, field_type: FieldType) -> Self {
        self.column(FieldDescriptor::new(name, field_type))
    }

    /// Add a nullable field
    pub fn optional(self, name: &str, field_type: FieldType) -> Self {
        self.column(FieldDescriptor::new(name, field_type).nullable())
    }

    /// Add an ordered list of text values
    pub fn list(self, name: &str) -> Self {
        self.column(FieldDescriptor::new(name, FieldType::Text).collection())
    }

    /// Constrain the length of the most recently added field
    pub fn max_length(mut self, len: u32) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.max_length = Some(len);
        }
        self
    }

    /// Add a nullable UUID ownership column used for tenant scoping
    pub fn owned_by(mut self, name: &str) -> Self {
        self.owner_column = Some(name.to_string());
        self.optional(name, FieldType::Uuid)
    }

    /// Columns callers may sort pages by
    pub fn sortable(mut self, columns: &[&str]) -> Self {
        self.sortable.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn build(self) -> Result<TableDescriptor> {
        if self.name.is_empty() {
            return Err(QueryError::Schema("Table name is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() || field.name.starts_with(RESERVED_PREFIX) {
                return Err(QueryError::Schema(format!(
                    "Invalid field name '{}' on {}",
                    field.name, self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(QueryError::Schema(format!(
                    "Duplicate field {} on {}",
                    field.name, self.name
                )));
            }
        }

        let keys: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let key_index = match keys.as_slice() {
            [index] => *index,
            [] => {
                return Err(QueryError::Schema(format!(
                    "{} has no primary key",
                    self.name
                )))
            }
            _ => {
                return Err(QueryError::Schema(format!(
                    "{} declares {} primary keys",
                    self.name,
                    keys.len()
                )))
            }
        };

        if let Some(owner) = &self.owner_column {
            let valid = self
                .fields
                .iter()
                .any(|f| &f.name == owner && f.field_type == FieldType::Uuid && !f.collection);
            if !valid {
                return Err(QueryError::Schema(format!(
                    "Owner column {} on {} must be a UUID field",
                    owner, self.name
                )));
            }
        }

        for column in &self.sortable {
            match self.fields.iter().find(|f| &f.name == column) {
                Some(f) if !f.collection && f.field_type.is_ordered() => {}
                _ => {
                    return Err(QueryError::Schema(format!(
                        "{} cannot sort by {}",
                        self.name, column
                    )))
                }
            }
        }

        Ok(TableDescriptor {
            name: self.name,
            fields: self.fields,
            owner_column: self.owner_column,
            sortable: self.sortable,
            key_index,
        })
    }
}

/// A record type persisted in its own table.
///
/// Field values travel through serde, so the serialized field names must
/// match the names declared in [`Entity::describe`].
pub trait Entity: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    fn describe() -> TableBuilder;

    /// Cached descriptor for this type
    fn table() -> Result<Arc<TableDescriptor>> {
        descriptor_of::<Self>()
    }
}

static DESCRIPTORS: LazyLock<RwLock<HashMap<TypeId, Arc<TableDescriptor>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Descriptor for `T`, built on first use and shared for the process lifetime.
pub fn descriptor_of<T: Entity>() -> Result<Arc<TableDescriptor>> {
    let type_id = TypeId::of::<T>();

    if let Some(found) = DESCRIPTORS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return Ok(Arc::clone(found));
    }

    let built = Arc::new(T::describe().build()?);
    let mut cache = DESCRIPTORS.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(type_id).or_insert(built)))
}

/// Schema generator
#[derive(Debug, Clone, Default)]
pub struct SchemaGenerator {
    tables: Vec<Arc<TableDescriptor>>,
    by_type: HashMap<TypeId, usize>,
}

impl SchemaGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    pub fn register<T: Entity>(&mut self) -> Result<()> {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return Ok(());
        }

        let table = T::table()?;
        if self.tables.iter().any(|t| t.name == table.name) {
            return Err(QueryError::Schema(format!(
                "Table {} already registered by another type",
                table.name
            )));
        }

        self.by_type.insert(type_id, self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<T: Entity>(mut self) -> Result<Self> {
        self.register::<T>()?;
        Ok(self)
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Registered tables in registration order
    pub fn tables(&self) -> &[Arc<TableDescriptor>] {
        &self.tables
    }

    /// Query returning a row when `@name` is an existing database, if the dialect has databases.
    pub fn database_exists_query(&self, dialect: Dialect) -> Option<&'static str> {
        match dialect {
            Dialect::Postgres => Some("SELECT 1 FROM pg_database WHERE datname = @name"),
            Dialect::Sqlite => None,
        }
    }

    /// Statement creating database `name`; run only when the existence check finds nothing.
    pub fn create_database_statement(&self, dialect: Dialect, name: &str) -> Option<String> {
        match dialect {
            Dialect::Postgres => Some(format!("CREATE DATABASE {}", dialect.quote(name))),
            // The file is created when the connection opens
            Dialect::Sqlite => None,
        }
    }

    /// Generate CREATE TABLE statements for all registered entities
    pub fn generate_ddl(&self, dialect: Dialect) -> Result<Vec<String>> {
        self.tables
            .iter()
            .map(|table| self.create_table_statement(dialect, table))
            .collect()
    }

    /// Generate CREATE TABLE SQL for a single table
    pub fn create_table_statement(&self, dialect: Dialect, table: &TableDescriptor) -> Result<String> {
        let column_defs = table
            .fields
            .iter()
            .map(|field| {
                self.column_definition(dialect, table, field, ColumnContext::CreateTable)
                    .map(|def| format!("    {}", def))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            dialect.quote(&table.name),
            column_defs.join(",\n")
        ))
    }

    /// Generate ALTER TABLE SQL adding `field` to an existing table
    pub fn add_column_statement(
        &self,
        dialect: Dialect,
        table: &TableDescriptor,
        field: &FieldDescriptor,
    ) -> Result<String> {
        if field.primary_key {
            return Err(QueryError::Schema(format!(
                "Primary key {} cannot be added to existing table {}",
                field.name, table.name
            )));
        }

        let def = self.column_definition(dialect, table, field, ColumnContext::AddColumn)?;
        Ok(match dialect {
            Dialect::Postgres => format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
                dialect.quote(&table.name),
                def
            ),
            // No IF NOT EXISTS in SQLite; the caller checks the live columns first
            Dialect::Sqlite => format!("ALTER TABLE {} ADD COLUMN {}", dialect.quote(&table.name), def),
        })
    }

    /// Render one column definition
    pub fn column_definition(
        &self,
        dialect: Dialect,
        table: &TableDescriptor,
        field: &FieldDescriptor,
        context: ColumnContext,
    ) -> Result<String> {
        if field.collection && !field.field_type.is_text() {
            return Err(QueryError::UnsupportedType {
                table: table.name.clone(),
                field: field.name.clone(),
                detail: format!("collections of {} have no column mapping", field.field_type.name()),
            });
        }

        let name = dialect.quote(&field.name);

        if field.is_auto_increment() {
            return Ok(match dialect {
                Dialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name),
                Dialect::Postgres => format!(
                    "{} {} GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY",
                    name,
                    dialect.column_type(field)
                ),
            });
        }

        let mut def = format!("{} {}", name, dialect.column_type(field));
        if field.requires_value() {
            def.push_str(" NOT NULL DEFAULT ");
            def.push_str(dialect.default_value(field, context));
        }
        if field.primary_key {
            def.push_str(" PRIMARY KEY");
        }

        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Bin {
        id: i64,
        label: String,
        capacity: i32,
        tags: Vec<String>,
        owner_id: Option<uuid::Uuid>,
    }

    impl Entity for Bin {
        fn describe() -> TableBuilder {
            TableBuilder::new("Bins")
                .key("id", FieldType::Int64)
                .field("label", FieldType::Text)
                .max_length(64)
                .field("capacity", FieldType::Int32)
                .list("tags")
                .owned_by("owner_id")
                .sortable(&["label", "capacity"])
        }
    }

    #[test]
    fn test_schema_generation_sqlite() {
        let generator = SchemaGenerator::new().with::<Bin>().unwrap();

        let ddl = generator.generate_ddl(Dialect::Sqlite).unwrap();
        assert_eq!(ddl.len(), 1);
        let ddl = &ddl[0];
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS \"Bins\""));
        assert!(ddl.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(ddl.contains("\"label\" VARCHAR(64),"));
        assert!(ddl.contains("\"capacity\" INT NOT NULL DEFAULT 0"));
        assert!(ddl.contains("\"tags\" TEXT,"));
        assert!(ddl.contains("\"owner_id\" BLOB\n"));
    }

    #[test]
    fn test_schema_generation_postgres() {
        let generator = SchemaGenerator::new().with::<Bin>().unwrap();

        let ddl = generator.generate_ddl(Dialect::Postgres).unwrap().remove(0);
        assert!(ddl.contains("\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY"));
        assert!(ddl.contains("\"capacity\" INTEGER NOT NULL DEFAULT 0"));
        assert!(ddl.contains("\"owner_id\" UUID\n"));
    }

    #[test]
    fn test_not_null_rule() {
        let table = TableBuilder::new("Things")
            .key("code", FieldType::Text)
            .field("seen_at", FieldType::Timestamp)
            .optional("weight", FieldType::Decimal)
            .field("note", FieldType::Text)
            .build()
            .unwrap();
        let generator = SchemaGenerator::new();
        let def = |name: &str, dialect| {
            generator
                .column_definition(dialect, &table, table.field(name).unwrap(), ColumnContext::CreateTable)
                .unwrap()
        };

        assert_eq!(
            def("code", Dialect::Postgres),
            "\"code\" TEXT NOT NULL DEFAULT '' PRIMARY KEY"
        );
        assert_eq!(
            def("seen_at", Dialect::Postgres),
            "\"seen_at\" TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP"
        );
        assert_eq!(def("weight", Dialect::Postgres), "\"weight\" NUMERIC(18,3)");
        assert_eq!(def("weight", Dialect::Sqlite), "\"weight\" BIGINT");
        assert_eq!(def("note", Dialect::Sqlite), "\"note\" TEXT");
        assert_eq!(
            def("seen_at", Dialect::Sqlite),
            "\"seen_at\" DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000000Z')"
        );
    }

    #[test]
    fn test_add_column_uses_constant_default_on_sqlite() {
        let table = TableBuilder::new("Things")
            .key("id", FieldType::Uuid)
            .field("seen_at", FieldType::Timestamp)
            .build()
            .unwrap();
        let generator = SchemaGenerator::new();

        let sql = generator
            .add_column_statement(Dialect::Sqlite, &table, table.field("seen_at").unwrap())
            .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"Things\" ADD COLUMN \"seen_at\" DATETIME NOT NULL DEFAULT '1970-01-01T00:00:00.000000000Z'"
        );

        let sql = generator
            .add_column_statement(Dialect::Postgres, &table, table.field("seen_at").unwrap())
            .unwrap();
        assert!(sql.starts_with("ALTER TABLE \"Things\" ADD COLUMN IF NOT EXISTS \"seen_at\""));

        let err = generator
            .add_column_statement(Dialect::Sqlite, &table, table.primary_key())
            .unwrap_err();
        assert!(matches!(err, QueryError::Schema(_)));
    }

    #[test]
    fn test_uuid_key_has_generated_default() {
        let table = TableBuilder::new("Tokens")
            .key("id", FieldType::Uuid)
            .build()
            .unwrap();
        let generator = SchemaGenerator::new();

        let pg = generator
            .column_definition(Dialect::Postgres, &table, table.primary_key(), ColumnContext::CreateTable)
            .unwrap();
        assert_eq!(pg, "\"id\" UUID NOT NULL DEFAULT gen_random_uuid() PRIMARY KEY");
    }

    #[test]
    fn test_unsupported_collection_type() {
        let table = TableBuilder::new("Readings")
            .key("id", FieldType::Int64)
            .column(FieldDescriptor::new("samples", FieldType::Float).collection())
            .build()
            .unwrap();

        let err = SchemaGenerator::new()
            .create_table_statement(Dialect::Sqlite, &table)
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedType { ref field, .. } if field == "samples"));
    }

    #[test]
    fn test_descriptor_validation() {
        let no_key = TableBuilder::new("A").field("x", FieldType::Int32).build();
        assert!(matches!(no_key, Err(QueryError::Schema(_))));

        let two_keys = TableBuilder::new("A")
            .key("x", FieldType::Int32)
            .key("y", FieldType::Int32)
            .build();
        assert!(matches!(two_keys, Err(QueryError::Schema(_))));

        let duplicate = TableBuilder::new("A")
            .key("x", FieldType::Int32)
            .field("x", FieldType::Text)
            .build();
        assert!(matches!(duplicate, Err(QueryError::Schema(_))));

        let bad_sort = TableBuilder::new("A")
            .key("x", FieldType::Int32)
            .list("tags")
            .sortable(&["tags"])
            .build();
        assert!(matches!(bad_sort, Err(QueryError::Schema(_))));

        let reserved = TableBuilder::new("A").key("__x", FieldType::Int32).build();
        assert!(matches!(reserved, Err(QueryError::Schema(_))));
    }

    #[test]
    fn test_descriptor_cached_once() {
        let first = Bin::table().unwrap();
        let second = descriptor_of::<Bin>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.primary_key().name, "id");
        assert_eq!(first.owner_field().unwrap().name, "owner_id");
    }

    #[test]
    fn test_postgres_create_database() {
        let generator = SchemaGenerator::new();
        assert_eq!(
            generator.create_database_statement(Dialect::Postgres, "inventory"),
            Some("CREATE DATABASE \"inventory\"".to_string())
        );
        assert!(generator.create_database_statement(Dialect::Sqlite, "x").is_none());
        assert!(generator.database_exists_query(Dialect::Sqlite).is_none());
    }

    #[test]
    fn test_min_timestamp_floor() {
        assert_eq!(
            Dialect::Sqlite.min_timestamp().to_rfc3339(),
            "0001-01-01T00:00:00+00:00"
        );
        assert!(Dialect::Postgres.min_timestamp() > DateTime::<Utc>::MIN_UTC);
    }
}
