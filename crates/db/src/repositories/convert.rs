//! Row and error conversions shared by the repositories.

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use serde::de::DeserializeOwned;
use vaultline_core::error::RepositoryError;
use vaultline_shared::types::{ActorId, PageRequest, PageResponse};

/// Maps a driver error, turning unique violations into `Conflict`.
pub(crate) fn db_err(err: DbErr) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => RepositoryError::Conflict(detail),
        _ => RepositoryError::Database(err.to_string()),
    }
}

pub(crate) fn corrupt(what: &str, detail: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Corrupt(format!("{what}: {detail}"))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| corrupt("unserializable column", e))
}

pub(crate) fn from_json<T: DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> Result<T, RepositoryError> {
    serde_json::from_value(value).map_err(|e| corrupt(column, e))
}

pub(crate) fn actor(column: &str, raw: &str) -> Result<ActorId, RepositoryError> {
    ActorId::new(raw).ok_or_else(|| corrupt(column, "blank actor"))
}

pub(crate) fn parse_column<T>(
    column: &str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    parse(raw).ok_or_else(|| corrupt(column, format!("unexpected value '{raw}'")))
}

pub(crate) fn utc(ts: DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

pub(crate) fn page_of<T>(data: Vec<T>, page: &PageRequest, total: u64) -> PageResponse<T> {
    let page = page.normalized();
    PageResponse::new(data, page.page, page.per_page, total)
}
