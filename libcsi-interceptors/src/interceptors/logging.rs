//! Request/response logging.
//!
//! [`LoggingInterceptor`] writes one line per enabled direction per call.
//! Request lines look like
//!
//! ```text
//! /csi.Controller/CreateVolume: REQ 0001: version=0.1.0, name=pvc-1
//! ```
//!
//! and response lines carry either the error message or the response
//! payload:
//!
//! ```text
//! /csi.Controller/CreateVolume: REP 0001: volume_id=4, capacity_bytes=1024
//! ```
//!
//! The `REQ`/`REP` token is omitted when the call has no correlation id, and
//! the field section is omitted when every field is empty.  Redacted fields
//! (by default `user_credentials`) are never rendered.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::context::CallContext;
use crate::error::CsiError;
use crate::interceptor::{Interceptor, Next};
use crate::message::{CsiRequest, CsiResponse, Method};

/// Fields that are never logged unless explicitly configured otherwise.
pub const DEFAULT_REDACTED_FIELDS: &[&str] = &["user_credentials"];

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync {
    /// Write one complete line, without a trailing newline.
    fn write_line(&self, line: &str);
}

/// Which side of the call a [`TracingSink`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// Emits each line as an `info` event on the `csi::request` or
/// `csi::response` target.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    direction: Direction,
}

impl TracingSink {
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl LogSink for TracingSink {
    fn write_line(&self, line: &str) {
        match self.direction {
            Direction::Request => info!(target: "csi::request", "{line}"),
            Direction::Response => info!(target: "csi::response", "{line}"),
        }
    }
}

/// Writes lines to any [`std::io::Write`], e.g. stdout or a file.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl WriterSink<std::io::Stdout> {
    /// A sink writing to the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl WriterSink<std::io::Stderr> {
    /// A sink writing to the process's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{line}") {
            warn!(error = %e, "failed to write CSI log line");
        }
    }
}

/// Keeps lines in memory; handy for tests and for embedding callers that
/// ship logs elsewhere.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every line written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_owned());
    }
}

/// Renders requests and responses to independently enabled sinks.
pub struct LoggingInterceptor {
    request_sink: Option<Arc<dyn LogSink>>,
    response_sink: Option<Arc<dyn LogSink>>,
    redacted: Vec<String>,
}

impl LoggingInterceptor {
    /// Stable name reported by [`Interceptor::name`].
    pub const NAME: &'static str = "logging";

    /// An interceptor with both directions disabled and the default
    /// redaction list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_sink: None,
            response_sink: None,
            redacted: DEFAULT_REDACTED_FIELDS
                .iter()
                .map(|f| (*f).to_owned())
                .collect(),
        }
    }

    /// Log requests to `sink`.
    #[must_use]
    pub fn with_request_logging(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.request_sink = Some(sink);
        self
    }

    /// Log responses to `sink`.
    #[must_use]
    pub fn with_response_logging(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.response_sink = Some(sink);
        self
    }

    /// Replace the list of field names that are never rendered.
    #[must_use]
    pub fn with_redacted_fields(mut self, fields: Vec<String>) -> Self {
        self.redacted = fields;
        self
    }

    fn request_line(&self, ctx: &CallContext, req: &CsiRequest) -> String {
        let mut parts = vec![req.method().full_name().to_owned()];
        if let Some(id) = ctx.request_id() {
            parts.push(format!("REQ {id:04}"));
        }
        let fields = req.render_fields(&self.redacted);
        if !fields.is_empty() {
            parts.push(fields);
        }
        parts.join(": ")
    }

    fn response_line(
        &self,
        method: Method,
        request_id: Option<u64>,
        result: &Result<CsiResponse, CsiError>,
    ) -> String {
        let mut parts = vec![method.full_name().to_owned()];
        if let Some(id) = request_id {
            parts.push(format!("REP {id:04}"));
        }
        let body = match result {
            Ok(rep) => rep.render_fields(&self.redacted),
            Err(e) => e.to_string(),
        };
        if !body.is_empty() {
            parts.push(body);
        }
        parts.join(": ")
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn intercept(
        &self,
        ctx: CallContext,
        req: CsiRequest,
        next: Next<'_>,
    ) -> Result<CsiResponse, CsiError> {
        if let Some(sink) = &self.request_sink {
            sink.write_line(&self.request_line(&ctx, &req));
        }

        let method = req.method();
        let request_id = ctx.request_id();
        let result = next.run(ctx, req).await;

        if let Some(sink) = &self.response_sink {
            sink.write_line(&self.response_line(method, request_id, &result));
        }
        result
    }
}
