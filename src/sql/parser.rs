//! Fixture script parser: CREATE TABLE and INSERT INTO ... VALUES.
//!
//! Anything else in the script (indexes, ALTER, SET, COPY headers) is skipped.

use super::dialect::Dialect;
use super::lexer::{Lexer, Token};
use super::types::map_type;
use crate::table::{Column, Table, TableError};
use crate::value::{Value, ValueType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("Unexpected token: {0:?}")]
    UnexpectedToken(Token),
    #[error("Expected {expected}, found {found:?}")]
    Expected { expected: String, found: Token },
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("INSERT into unknown table {0}")]
    UnknownTable(String),
    #[error("Table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },
    #[error("Table {table}: {found} values for {expected} columns")]
    ValueCount {
        table: String,
        expected: usize,
        found: usize,
    },
    #[error("Table {table}, column {column}: cannot read {literal:?} as {expected}")]
    BadLiteral {
        table: String,
        column: String,
        literal: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// A relation declared and filled by a fixture script.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureTable {
    pub name: String,
    pub table: Table,
}

struct Declared {
    name: String,
    columns: Vec<(String, ValueType)>,
    rows: Vec<Vec<Value>>,
}

/// Parse a fixture script into tables, in declaration order.
pub fn parse_sql(input: &str, dialect: Dialect) -> Result<Vec<FixtureTable>, SqlParseError> {
    let dialect = dialect.resolve(input);
    let mut lexer = Lexer::new(input);
    let tokens = lexer.tokenize();
    let mut parser = Parser::new(tokens, dialect);
    parser.parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
}

impl Parser {
    fn new(tokens: Vec<Token>, dialect: Dialect) -> Self {
        Self {
            tokens,
            pos: 0,
            dialect,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), SqlParseError> {
        if self.current() == &token {
            self.advance();
            Ok(())
        } else if self.current() == &Token::Eof {
            Err(SqlParseError::UnexpectedEof)
        } else {
            Err(SqlParseError::Expected {
                expected: expected.to_string(),
                found: self.current().clone(),
            })
        }
    }

    fn parse(&mut self) -> Result<Vec<FixtureTable>, SqlParseError> {
        let mut declared: Vec<Declared> = Vec::new();

        while self.current() != &Token::Eof {
            match self.current() {
                Token::Create => {
                    self.advance();
                    if self.current() != &Token::Table {
                        // CREATE INDEX, VIEW, SCHEMA ...
                        self.skip_statement();
                        continue;
                    }
                    self.advance();
                    self.skip_if_not_exists();
                    if let Some(table) = self.parse_create_table()? {
                        declared.retain(|d| d.name != table.name);
                        declared.push(table);
                    }
                }
                Token::Insert => {
                    self.advance();
                    self.expect(Token::Into, "INTO")?;
                    self.parse_insert(&mut declared)?;
                }
                _ => self.skip_statement(),
            }
        }

        declared
            .into_iter()
            .map(|d| -> Result<FixtureTable, SqlParseError> {
                let mut data: Vec<Vec<Value>> = vec![Vec::with_capacity(d.rows.len()); d.columns.len()];
                for row in d.rows {
                    for (slot, value) in data.iter_mut().zip(row) {
                        slot.push(value);
                    }
                }
                let columns = d
                    .columns
                    .into_iter()
                    .zip(data)
                    .map(|((name, dtype), values)| Column {
                        name,
                        dtype,
                        values,
                    })
                    .collect();
                Ok(FixtureTable {
                    name: d.name,
                    table: Table::from_columns(columns)?,
                })
            })
            .collect()
    }

    fn skip_if_not_exists(&mut self) {
        if self.current() == &Token::If {
            self.advance();
            if self.current() == &Token::Not {
                self.advance();
            }
            if self.current() == &Token::Exists {
                self.advance();
            }
        }
    }

    /// Table name, dropping any `schema.` prefix.
    fn parse_table_name(&mut self) -> Option<String> {
        let mut name = match self.current() {
            Token::Ident(name) => name.clone(),
            _ => return None,
        };
        self.advance();
        while self.current() == &Token::Dot {
            self.advance();
            if let Token::Ident(part) = self.current() {
                name = part.clone();
                self.advance();
            }
        }
        Some(name)
    }

    fn parse_create_table(&mut self) -> Result<Option<Declared>, SqlParseError> {
        let Some(name) = self.parse_table_name() else {
            self.skip_statement();
            return Ok(None);
        };
        if self.current() != &Token::LParen {
            // CREATE TABLE ... AS SELECT and friends carry no rows we can load.
            self.skip_statement();
            return Ok(None);
        }
        self.advance();

        let mut columns = Vec::new();
        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => self.advance(),
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                Token::Primary
                | Token::Foreign
                | Token::Unique
                | Token::Constraint
                | Token::Check
                | Token::Index
                | Token::Key => self.skip_definition(),
                Token::Ident(col) => {
                    let col = col.clone();
                    self.advance();
                    let raw_type = self.collect_type();
                    columns.push((col, map_type(&raw_type, self.dialect)));
                    self.skip_definition();
                }
                other => return Err(SqlParseError::UnexpectedToken(other.clone())),
            }
        }
        self.skip_statement();

        Ok(Some(Declared {
            name,
            columns,
            rows: Vec::new(),
        }))
    }

    /// Type words and their `(n, m)` suffix, e.g. `NUMERIC(12,2)`.
    fn collect_type(&mut self) -> String {
        const CONTINUATIONS: [&str; 6] = ["precision", "varying", "with", "without", "time", "zone"];
        let mut parts: Vec<String> = Vec::new();
        while let Token::Ident(word) = self.current() {
            let continues = CONTINUATIONS.contains(&word.to_lowercase().as_str());
            if !parts.is_empty() && !continues {
                break;
            }
            parts.push(word.clone());
            self.advance();
        }
        if self.current() == &Token::LParen {
            let mut suffix = String::from("(");
            self.advance();
            while !matches!(self.current(), Token::RParen | Token::Eof) {
                match self.current() {
                    Token::Num(n) => suffix.push_str(n),
                    Token::Comma => suffix.push(','),
                    _ => {}
                }
                self.advance();
            }
            self.advance();
            suffix.push(')');
            parts.push(suffix);
        }
        parts.join(" ").replace(" (", "(")
    }

    /// Skip to the comma or closing paren that ends one column or constraint.
    fn skip_definition(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => return,
                Token::RParen => depth -= 1,
                Token::Comma if depth == 0 => return,
                Token::Eof => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_statement(&mut self) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
        if self.current() == &Token::Semicolon {
            self.advance();
        }
    }

    fn parse_insert(&mut self, declared: &mut [Declared]) -> Result<(), SqlParseError> {
        let name = self.parse_table_name().ok_or_else(|| SqlParseError::Expected {
            expected: "table name".to_string(),
            found: self.current().clone(),
        })?;
        let target = declared
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| SqlParseError::UnknownTable(name.clone()))?;

        // Optional explicit column list.
        let positions: Vec<usize> = if self.current() == &Token::LParen {
            self.advance();
            let mut positions = Vec::new();
            loop {
                match self.current() {
                    Token::Ident(col) => {
                        let idx = target
                            .columns
                            .iter()
                            .position(|(c, _)| c == col)
                            .ok_or_else(|| SqlParseError::UnknownColumn {
                                table: name.clone(),
                                column: col.clone(),
                            })?;
                        positions.push(idx);
                        self.advance();
                    }
                    Token::Comma => self.advance(),
                    Token::RParen => {
                        self.advance();
                        break;
                    }
                    Token::Eof => return Err(SqlParseError::UnexpectedEof),
                    other => return Err(SqlParseError::UnexpectedToken(other.clone())),
                }
            }
            positions
        } else {
            (0..target.columns.len()).collect()
        };

        self.expect(Token::Values, "VALUES")?;

        loop {
            self.expect(Token::LParen, "(")?;
            let mut literals = Vec::new();
            loop {
                match self.current() {
                    Token::RParen => {
                        self.advance();
                        break;
                    }
                    Token::Comma => self.advance(),
                    Token::Eof => return Err(SqlParseError::UnexpectedEof),
                    token => {
                        literals.push(token.clone());
                        self.advance();
                    }
                }
            }
            if literals.len() != positions.len() {
                return Err(SqlParseError::ValueCount {
                    table: name,
                    expected: positions.len(),
                    found: literals.len(),
                });
            }

            let mut row = vec![Value::Null; target.columns.len()];
            for (literal, &idx) in literals.iter().zip(&positions) {
                let (column, dtype) = &target.columns[idx];
                row[idx] = literal_value(literal, *dtype).ok_or_else(|| {
                    SqlParseError::BadLiteral {
                        table: name.clone(),
                        column: column.clone(),
                        literal: format!("{:?}", literal),
                        expected: dtype.name(),
                    }
                })?;
            }
            target.rows.push(row);

            if self.current() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.skip_statement();
        Ok(())
    }
}

/// Coerce one literal token to the declared column type.
fn literal_value(token: &Token, dtype: ValueType) -> Option<Value> {
    match token {
        Token::Null => Some(Value::Null),
        Token::True => Some(Value::Int(1)),
        Token::False => Some(Value::Int(0)),
        Token::Num(n) => match dtype {
            ValueType::Int => n
                .parse()
                .ok()
                .map(Value::Int)
                .or_else(|| n.parse().ok().map(Value::Float)),
            ValueType::Text => Some(Value::Text(n.clone())),
            ValueType::Float | ValueType::Null => n.parse().ok().map(Value::Float),
            ValueType::Date | ValueType::Timestamp => None,
        },
        // An empty string literal is a value in SQL, not a missing one.
        Token::Str(s) if dtype == ValueType::Text => Some(Value::Text(s.clone())),
        Token::Str(s) => Value::parse_as(s, dtype),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPES: &str = r#"
-- PostgreSQL database dump
CREATE TABLE IF NOT EXISTS public.type_cuisine_table (
    type_cuisine_id SERIAL PRIMARY KEY,
    type_cuisine_name VARCHAR(100) NOT NULL UNIQUE
);

CREATE TABLE recipe_table (
    recipe_id SERIAL PRIMARY KEY,
    recipe_name VARCHAR(200) NOT NULL,
    type_cuisine_id INT REFERENCES type_cuisine_table(type_cuisine_id),
    created_at TIMESTAMP DEFAULT NOW(),
    rating NUMERIC(3, 1),
    CONSTRAINT uq_recipe UNIQUE (recipe_name)
);

CREATE INDEX idx_recipe_cuisine ON recipe_table (type_cuisine_id);

INSERT INTO type_cuisine_table VALUES (1, 'Padang'), (2, 'Thai');
INSERT INTO recipe_table (recipe_id, recipe_name, type_cuisine_id, rating)
VALUES (10, 'Rendang', 1, 4.8), (11, 'Som Tam', 2, NULL);
"#;

    #[test]
    fn test_parse_tables_and_rows() {
        let tables = parse_sql(RECIPES, Dialect::Auto).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "type_cuisine_table");

        let recipes = &tables[1].table;
        assert_eq!(
            recipes.column_names(),
            vec!["recipe_id", "recipe_name", "type_cuisine_id", "created_at", "rating"]
        );
        assert_eq!(recipes.row_count(), 2);
        assert_eq!(recipes.value(0, "recipe_name"), Some(&Value::from("Rendang")));
        assert_eq!(recipes.value(0, "rating"), Some(&Value::Float(4.8)));
        assert_eq!(recipes.value(1, "rating"), Some(&Value::Null));
        assert_eq!(recipes.value(1, "created_at"), Some(&Value::Null));
        assert_eq!(recipes.column("created_at").unwrap().dtype, ValueType::Timestamp);
    }

    #[test]
    fn test_declared_types_survive_empty_tables() {
        let tables = parse_sql("CREATE TABLE t (a INTEGER, b DATE);", Dialect::Generic).unwrap();
        let t = &tables[0].table;
        assert!(t.is_empty());
        assert_eq!(t.column("a").unwrap().dtype, ValueType::Int);
        assert_eq!(t.column("b").unwrap().dtype, ValueType::Date);
    }

    #[test]
    fn test_date_literals() {
        let sql = "CREATE TABLE orders (order_id INT, order_date DATE);
                   INSERT INTO orders VALUES (1, '2024-03-01');";
        let tables = parse_sql(sql, Dialect::Generic).unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(tables[0].table.value(0, "order_date"), Some(&Value::Date(date)));
    }

    #[test]
    fn test_insert_into_unknown_table() {
        let err = parse_sql("INSERT INTO ghost VALUES (1);", Dialect::Generic).unwrap_err();
        assert!(matches!(err, SqlParseError::UnknownTable(name) if name == "ghost"));
    }

    #[test]
    fn test_value_count_mismatch() {
        let sql = "CREATE TABLE t (a INT, b INT); INSERT INTO t VALUES (1);";
        let err = parse_sql(sql, Dialect::Generic).unwrap_err();
        assert!(matches!(err, SqlParseError::ValueCount { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_bad_literal() {
        let sql = "CREATE TABLE t (d DATE); INSERT INTO t VALUES ('yesterday');";
        let err = parse_sql(sql, Dialect::Generic).unwrap_err();
        assert!(matches!(err, SqlParseError::BadLiteral { .. }));
    }
}
