//! Request listing filter.

use super::record::NetworkRequestRecord;

/// Default number of records returned by a listing.
const DEFAULT_LIST_LIMIT: usize = 50;

/// Filter for [`NetworkRecorder::list`](super::NetworkRecorder::list).
///
/// All given criteria must match. Method and resource-type matching ignore
/// case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    /// Maximum records returned, counted from the first seen.
    pub limit: usize,
    /// Accepted HTTP methods; `None` accepts all.
    pub methods: Option<Vec<String>>,
    /// Accepted resource types; `None` accepts all.
    pub resource_types: Option<Vec<String>>,
    /// Keep only failed requests (status >= 400 or an error text).
    pub only_failed: bool,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            methods: None,
            resource_types: None,
            only_failed: false,
        }
    }
}

impl RequestFilter {
    /// Sets the limit.
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts to the given HTTP methods.
    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to the given resource types.
    #[must_use]
    pub fn with_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Keeps only failed requests.
    #[inline]
    #[must_use]
    pub fn only_failed(mut self, enabled: bool) -> Self {
        self.only_failed = enabled;
        self
    }

    /// Returns `true` if `record` passes every criterion.
    #[must_use]
    pub fn matches(&self, record: &NetworkRequestRecord) -> bool {
        member(self.methods.as_deref(), record.method.as_deref())
            && member(self.resource_types.as_deref(), record.resource_type.as_deref())
            && (!self.only_failed || record.is_failed())
    }
}

/// `None` accepts everything; otherwise `value` must be present and listed.
fn member(accepted: Option<&[String]>, value: Option<&str>) -> bool {
    match accepted {
        None => true,
        Some(accepted) => value.is_some_and(|value| {
            accepted
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(value))
        }),
    }
}
