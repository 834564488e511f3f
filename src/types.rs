use serde::{Deserialize, Serialize};

// Request bodies / queries for folio endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocateRequest {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateBatchRequest {
    pub count: i64,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolioResponse {
    pub folio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolioBatchResponse {
    pub count: usize,
    pub folios: Vec<String>,
}

/// `folio` is `null` while nothing has been issued in the scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastIssuedResponse {
    pub subsystem: String,
    pub year: i32,
    pub folio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeExistsResponse {
    pub subsystem: String,
    pub year: i32,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub subsystem: String,
    pub year: i32,
    /// `false` when the scope had no counter and nothing was changed.
    pub reset: bool,
}
