// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A composable query builder for the relational driver, plus an analyzer
//! that flags `SELECT *`, cartesian joins, and suspected N+1 query storms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone)]
pub struct Join {
    pub table: String,
    pub on: String,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    joins: Vec<Join>,
    wheres: Vec<String>,
    order_by: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl Query {
    pub fn select(table: impl Into<String>, columns: &[&str]) -> Self {
        Self { table: table.into(), columns: columns.iter().map(|c| c.to_string()).collect(), ..Default::default() }
    }

    pub fn join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(Join { table: table.into(), on: on.into() });
        self
    }

    pub fn where_(mut self, clause: impl Into<String>) -> Self {
        self.wheres.push(clause.into());
        self
    }

    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u32) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn columns_is_star(&self) -> bool {
        self.columns.iter().any(|c| c == "*")
    }

    /// Render to a parameterless SQL string. Real bind parameters are
    /// supplied separately by callers through `rusqlite::params!` at the
    /// call site; this builder only composes shape, never values.
    pub fn to_sql(&self) -> String {
        let columns = if self.columns.is_empty() { "*".to_string() } else { self.columns.join(", ") };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        for join in &self.joins {
            sql.push_str(&format!(" JOIN {} ON {}", join.table, join.on));
        }
        if !self.wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.wheres.join(" AND ")));
        }
        if let Some(order) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    fn has_cartesian_join(&self) -> bool {
        self.joins.iter().any(|j| j.on.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerWarning {
    SelectStar,
    CartesianJoin,
    SuspectedNPlusOne { shape: String, count: u32 },
}

/// Flags common anti-patterns. N+1 detection tracks how many times each
/// normalized query shape (table + where-clause skeleton, ignoring bind
/// values) has been issued within the analyzer's lifetime; `threshold`
/// bounds how many repeats are tolerated before it's flagged.
pub struct Analyzer {
    threshold: u32,
    shape_counts: std::sync::Mutex<HashMap<String, AtomicU32>>,
}

impl Analyzer {
    pub fn new(threshold: u32) -> Self {
        Self { threshold, shape_counts: std::sync::Mutex::new(HashMap::new()) }
    }

    pub fn analyze(&self, query: &Query) -> Vec<AnalyzerWarning> {
        let mut warnings = Vec::new();
        if query.columns_is_star() {
            warnings.push(AnalyzerWarning::SelectStar);
        }
        if query.has_cartesian_join() {
            warnings.push(AnalyzerWarning::CartesianJoin);
        }
        let shape = query.to_sql();
        let mut shapes = self.shape_counts.lock().unwrap_or_else(|e| e.into_inner());
        let counter = shapes.entry(shape.clone()).or_insert_with(|| AtomicU32::new(0));
        let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.threshold {
            warnings.push(AnalyzerWarning::SuspectedNPlusOne { shape, count });
        }
        warnings
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(20)
    }
}
