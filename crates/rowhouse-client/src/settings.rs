//! Per-call settings.
//!
//! Every operation takes an optional [`Settings`]; values set here win over
//! the client-wide defaults when the query string and headers are composed.

use std::collections::BTreeMap;

use crate::config::canonical_header;

/// Options applied to a single query, insert or command.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub(crate) query_id: Option<String>,
    pub(crate) session_id: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) server_settings: BTreeMap<String, String>,
    pub(crate) roles: Option<Vec<String>>,
    pub(crate) http_headers: BTreeMap<String, String>,
}

impl Settings {
    /// Creates empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags the call with a query id for correlation.
    pub fn query_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    /// Binds the call to a server session.
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Overrides the database for this call.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Adds a server setting; wins over the client default on conflict.
    pub fn server_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_settings.insert(name.into(), value.into());
        self
    }

    /// Replaces the roles for this call.
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a custom header; wins over the client default by canonical name.
    pub fn http_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers
            .insert(canonical_header(&name.into()), value.into());
        self
    }

    /// Adds a list-valued custom header, joined with commas.
    pub fn http_header_list<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let joined = values
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>()
            .join(",");
        self.http_headers.insert(canonical_header(&name.into()), joined);
        self
    }
}
