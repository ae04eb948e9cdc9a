/// Query Execution Module
///
/// Per-call options and the result normalization algorithm: walks every
/// result set of an executed statement, applies the row, column and set
/// reductions and produces the payload stored in a `Response`.
use super::driver::{Cursor, DriverResult};
use super::response::Payload;
use super::value::{Keyed, Row, Value};

/// How the rows of each result set are reduced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowReduction {
    /// Keep every row, in order.
    #[default]
    NoReduction,
    /// Keep only the first row.
    FirstRowOnly,
    /// Keep every row, keyed by the value of the named field.
    KeyedByField(String),
}

/// Options of an execute call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptions {
    pub rows: RowReduction,
    /// Reduce each row to its values.
    pub single_col: bool,
    /// Keep only the last result set.
    pub single_set: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_row(mut self) -> Self {
        self.rows = RowReduction::FirstRowOnly;
        self
    }

    pub fn keyed_by(mut self, field: impl Into<String>) -> Self {
        self.rows = RowReduction::KeyedByField(field.into());
        self
    }

    pub fn single_col(mut self) -> Self {
        self.single_col = true;
        self
    }

    pub fn single_set(mut self) -> Self {
        self.single_set = true;
        self
    }
}

/// One or more SQL statements submitted together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statements(Vec<String>);

impl Statements {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for Statements {
    fn from(sql: &str) -> Self {
        Statements(vec![sql.to_string()])
    }
}

impl From<String> for Statements {
    fn from(sql: String) -> Self {
        Statements(vec![sql])
    }
}

impl From<Vec<String>> for Statements {
    fn from(list: Vec<String>) -> Self {
        Statements(list)
    }
}

impl From<Vec<&str>> for Statements {
    fn from(list: Vec<&str>) -> Self {
        Statements(list.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Statements {
    fn from(list: &[&str]) -> Self {
        Statements(list.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Statements {
    fn from(list: [&str; N]) -> Self {
        Statements(list.iter().map(|s| s.to_string()).collect())
    }
}

/// A statement handed to the executor: raw SQL still to be submitted, or a
/// prepared statement the driver already executed.
#[derive(Debug)]
pub enum StatementInput<'a, C> {
    Sql(&'a str),
    Executed { sql: &'a str, cursor: C },
}

impl<C> StatementInput<'_, C> {
    pub fn sql(&self) -> &str {
        match self {
            StatementInput::Sql(sql) => sql,
            StatementInput::Executed { sql, .. } => sql,
        }
    }
}

/// Walks every result set of `cursor` and applies `options`.
///
/// Returns the payload (`None` only if the driver produced no set at all)
/// and the driver's rows-affected count.
pub fn collect_result<C: Cursor>(cursor: &mut C, options: &QueryOptions) -> DriverResult<(Option<Payload>, i64)> {
    let mut sets: Vec<Payload> = Vec::new();
    loop {
        sets.push(reduce_set(cursor, options)?);
        if !cursor.next_result_set()? {
            break;
        }
    }

    if options.single_set && sets.len() > 1 {
        sets = sets.split_off(sets.len() - 1);
    }
    let payload = match sets.len() {
        0 => None,
        1 => sets.pop(),
        _ => Some(Payload::Sets(sets)),
    };
    Ok((payload, cursor.rows_affected()))
}

fn reduce_set<C: Cursor>(cursor: &mut C, options: &QueryOptions) -> DriverResult<Payload> {
    match &options.rows {
        RowReduction::FirstRowOnly => {
            let row = cursor.fetch_row()?;
            Ok(match row {
                Some(row) if options.single_col => Payload::Scalar(row.into_values().into_iter().next().unwrap_or(Value::Null)),
                Some(row) => Payload::Row(row),
                None if options.single_col => Payload::Scalar(Value::Null),
                None => Payload::Null,
            })
        }
        RowReduction::KeyedByField(field) if options.single_col => {
            let mut keyed: Keyed<Value> = Keyed::new();
            while let Some(row) = cursor.fetch_row()? {
                let key = row.get(field).and_then(Value::to_key);
                match key {
                    Some(key) => {
                        if let Some(last) = row.into_values().pop() {
                            keyed.insert(key, last);
                        }
                    }
                    None => row.into_values().into_iter().for_each(|v| keyed.append(v)),
                }
            }
            Ok(Payload::KeyedValues(keyed))
        }
        RowReduction::KeyedByField(field) => {
            let mut keyed: Keyed<Row> = Keyed::new();
            while let Some(row) = cursor.fetch_row()? {
                let key = row.get(field).and_then(Value::to_key);
                match key {
                    Some(key) => keyed.insert(key, row),
                    None => keyed.append(row),
                }
            }
            Ok(Payload::KeyedRows(keyed))
        }
        RowReduction::NoReduction if options.single_col => {
            let mut values = Vec::new();
            while let Some(row) = cursor.fetch_row()? {
                values.extend(row.into_values());
            }
            Ok(Payload::Values(values))
        }
        RowReduction::NoReduction => {
            let mut rows = Vec::new();
            while let Some(row) = cursor.fetch_row()? {
                rows.push(row);
            }
            Ok(Payload::Rows(rows))
        }
    }
}
