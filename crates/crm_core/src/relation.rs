//! Row sets with a declared column schema.
//!
//! Optional CRM inputs arrive from loaders that may not populate every
//! column. A [`Relation`] carries the rows together with the set of columns
//! the source actually provided, so stages can run a schema-presence check
//! before relying on a field.

use std::collections::BTreeSet;

/// A record type with a fixed list of column names.
pub trait Columnar {
    /// Every column the record type can carry.
    const COLUMNS: &'static [&'static str];
}

/// Rows of `T` plus the columns present in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation<T> {
    columns: BTreeSet<String>,
    rows: Vec<T>,
}

impl<T: Columnar> Relation<T> {
    /// Wraps rows whose source provided every column of `T`.
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            columns: T::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Wraps rows whose source provided only the given columns.
    pub fn with_columns<I, S>(rows: Vec<T>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }
}

impl<T> Relation<T> {
    /// Returns the rows.
    #[inline]
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Mutable access to the rows.
    #[inline]
    pub fn rows_mut(&mut self) -> &mut [T] {
        &mut self.rows
    }

    /// Consumes the relation, returning its rows.
    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when there are no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `true` when the source provided the column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Lists required columns the source did not provide.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.columns.contains(**c))
            .map(|c| c.to_string())
            .collect()
    }
}

/// Returns the required columns absent from an optional relation.
///
/// `None` when the relation itself is absent.
pub fn missing_required<T>(relation: Option<&Relation<T>>, required: &[&str]) -> Option<Vec<String>> {
    relation.map(|r| r.missing_columns(required))
}
