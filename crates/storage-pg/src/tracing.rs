// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::{DB_COLLECTION_NAME, DB_QUERY_TEXT};
use sqlx::postgres::PgQueryResult;
use tracing::Span;

use crate::telemetry::DB_CLIENT_ROWS_DELETED_COUNTER;

/// An extension trait for [`sqlx::Execute`] that records the SQL statement as
/// `db.query.text` in a tracing span
pub trait ExecuteExt<'q, DB>: Sized {
    /// Records the statement as `db.query.text` in the current span
    #[must_use]
    fn traced(self) -> Self {
        self.record(&Span::current())
    }

    /// Records the statement as `db.query.text` in the given span
    #[must_use]
    fn record(self, span: &Span) -> Self;
}

impl<'q, DB, T> ExecuteExt<'q, DB> for T
where
    T: sqlx::Execute<'q, DB>,
    DB: sqlx::Database,
{
    fn record(self, span: &Span) -> Self {
        span.record(DB_QUERY_TEXT, self.sql());
        self
    }
}

/// Returns the number of rows a bulk statement touched, and records it as
/// `db.rows_affected` in the current span
pub(crate) fn rows_affected(result: &PgQueryResult) -> usize {
    let rows = result.rows_affected();
    Span::current().record("db.rows_affected", rows);
    rows.try_into().unwrap_or(usize::MAX)
}

/// Same as [`rows_affected`], also counting the rows deleted from `table`
pub(crate) fn rows_deleted(table: &'static str, result: &PgQueryResult) -> usize {
    DB_CLIENT_ROWS_DELETED_COUNTER.add(
        result.rows_affected(),
        &[KeyValue::new(DB_COLLECTION_NAME, table)],
    );
    rows_affected(result)
}
