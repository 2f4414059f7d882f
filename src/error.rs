//! Error types for the renderer core.
//!
//! Two error families exist, matching §7 of the design: `FatalError` aborts
//! initialization or the whole process (mirrors `hal::device::CreationError`
//! in the teacher workspace), while `ErrorKind` is recorded on a context and
//! never unwinds past the command handler that raised it.

use thiserror::Error;

/// Errors that abort renderer or context creation outright.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to create a GL context")]
    ContextCreation,
    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),
    #[error("host GL version is below the minimum required (3.1 core)")]
    UnsupportedDriver,
}

/// Context-local error kinds, recorded on a [`crate::subcontext::SubContext`]
/// and never propagated as a `Result` past the command that raised them —
/// the decoder drops the rest of that single command and continues.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    #[error("unknown error")]
    Unknown,
    #[error("illegal shader (handle {handle}): {reason}")]
    IllegalShader { handle: u32, reason: String },
    #[error("illegal handle {0}")]
    IllegalHandle(u32),
    #[error("illegal resource {0}")]
    IllegalResource(u32),
    #[error("illegal surface (handle {0})")]
    IllegalSurface(u32),
    #[error("illegal vertex format (handle {0})")]
    IllegalVertexFormat(u32),
    #[error("illegal command buffer: {0}")]
    IllegalCmdBuffer(String),
}

/// One recorded error, with enough context to log per §7 ("command name,
/// context id, debug name, error-kind string, and value").
#[derive(Debug, Clone)]
pub struct ContextError {
    pub command: &'static str,
    pub ctx_id: u32,
    pub kind: ErrorKind,
}

impl ContextError {
    pub fn new(command: &'static str, ctx_id: u32, kind: ErrorKind) -> Self {
        ContextError {
            command,
            ctx_id,
            kind,
        }
    }

    pub fn log(&self) {
        log::error!(
            "[ctx {}] {} failed: {}",
            self.ctx_id,
            self.command,
            self.kind
        );
    }
}

/// Outcome of validating and running a single decoded command.
pub type CmdResult = Result<(), ErrorKind>;
