//! Per-request trace records.
//!
//! One record per handled request, populated as the pipeline advances and
//! emitted exactly once at request end. Every field is always present,
//! empty or not, so downstream aggregation sees a stable schema.

/// The trace record for one request.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub path: String,
    pub method: String,
    pub user: String,
    pub groups: Vec<String>,
    /// Snapshot of the request body as forwarded (post-rewrite).
    pub body: String,
    /// Index names the request referenced, post-rewrite.
    pub indices: Vec<String>,
    /// Response status: the upstream's on allow, 401 on deny.
    pub code: u16,
    pub elapsed: u64,
    /// Pipeline failure, e.g. a body read error. Empty on the happy path.
    pub error: String,
    /// Denial reason. Empty when the request was allowed.
    pub message: String,
}

impl Trace {
    /// Emit the record through the structured logger.
    ///
    /// Denials are expected traffic and log at info; only pipeline errors
    /// log at error level.
    pub fn emit(&self) {
        if self.error.is_empty() {
            tracing::info!(
                code = self.code,
                method = %self.method,
                path = %self.path,
                elapsed = self.elapsed,
                user = %self.user,
                groups = ?self.groups,
                body = %self.body,
                indices = ?self.indices,
                error = %self.error,
                message = %self.message,
                "request handled"
            );
        } else {
            tracing::error!(
                code = self.code,
                method = %self.method,
                path = %self.path,
                elapsed = self.elapsed,
                user = %self.user,
                groups = ?self.groups,
                body = %self.body,
                indices = ?self.indices,
                error = %self.error,
                message = %self.message,
                "request failed"
            );
        }
    }
}
