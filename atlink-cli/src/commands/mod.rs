//! Command implementations.
//!
//! Each group of subcommands lives in its own module; they all drive the
//! phone through a [`Session`].

pub(crate) mod alarms;
pub(crate) mod completions;
pub(crate) mod device;
pub(crate) mod messages;
pub(crate) mod objects;

use anyhow::Result;
use atlink::{Channel, ConnectionParams, Operation, Outcome, Request, Response, Transfer};
use log::debug;
use std::fmt;

/// A request that ended with a non-zero outcome code.
#[derive(Debug)]
pub(crate) struct Failed {
    /// Negative outcome code.
    pub code: i32,
    /// Human-readable summary.
    pub message: String,
    /// Library error text, when it adds something.
    pub detail: Option<String>,
}

impl Failed {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub(crate) fn from_error(error: &atlink::Error) -> Self {
        Self::new(error.code(), error.to_string())
    }

    fn from_outcome(operation: Operation, outcome: Outcome) -> Self {
        let message = operation.msg_for_error(outcome.code);
        Self {
            code: outcome.code,
            message: message.to_string(),
            detail: outcome.error.filter(|e| e != message),
        }
    }

    /// Process exit status: the magnitude of the code.
    pub(crate) fn exit_status(&self) -> u8 {
        u8::try_from(self.code.unsigned_abs()).unwrap_or(u8::MAX)
    }
}

impl fmt::Display for Failed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failed {}

/// One CLI invocation's view of the phone.
pub(crate) struct Session {
    transfer: Transfer,
    channel: Box<dyn Channel>,
    json: bool,
    quiet: bool,
}

impl Session {
    pub(crate) fn new(transfer: Transfer, channel: Box<dyn Channel>, json: bool, quiet: bool) -> Self {
        Self {
            transfer,
            channel,
            json,
            quiet,
        }
    }

    /// Connection parameters in use.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn params(&self) -> &ConnectionParams {
        self.transfer.params()
    }

    /// Whether results go to stdout as JSON.
    pub(crate) fn json(&self) -> bool {
        self.json
    }

    /// Whether status chatter on stderr is wanted.
    pub(crate) fn chatty(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Run one request; a failing outcome becomes a [`Failed`] error.
    pub(crate) fn call(&mut self, request: Request) -> Result<Response> {
        self.call_with_progress(request, &mut |_, _| {})
    }

    /// Like [`Session::call`], reporting upload progress.
    pub(crate) fn call_with_progress(
        &mut self,
        request: Request,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Response> {
        let operation = request.operation();
        let outcome = self
            .transfer
            .run_with_progress(&mut self.channel, request, progress);
        debug!("{operation} finished with code {}", outcome.code);

        if !outcome.is_success() {
            return Err(Failed::from_outcome(operation, outcome).into());
        }
        Ok(outcome.response.unwrap_or(Response::Done))
    }

    /// Print a successful response as JSON to stdout.
    pub(crate) fn print_json(&self, response: Response) -> Result<()> {
        let outcome = Outcome {
            code: atlink::error::codes::OK,
            response: Some(response),
            error: None,
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        Ok(())
    }

    /// Report a request that produced no records.
    pub(crate) fn done(&self, message: &str) -> Result<()> {
        if self.json {
            return self.print_json(Response::Done);
        }
        if !self.quiet {
            eprintln!("{} {message}", console::style("✓").green());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlink::error::codes;
    use atlink::{Category, FakePhone};

    fn session() -> Session {
        let transfer = Transfer::new(ConnectionParams::new("fake", 115200)).unwrap();
        Session::new(transfer, Box::new(FakePhone::new()), false, true)
    }

    #[test]
    fn test_failed_exit_status_is_code_magnitude() {
        assert_eq!(Failed::new(codes::UNSUPPORTED_TYPE, "x").exit_status(), 4);
        assert_eq!(Failed::new(codes::UPLOAD_CLOSE, "x").exit_status(), 17);
    }

    #[test]
    fn test_failed_from_outcome_keeps_distinct_detail() {
        let outcome = Outcome {
            code: codes::REJECTED,
            response: None,
            error: Some("Phone rejected command: ERROR".to_string()),
        };
        let failed = Failed::from_outcome(Operation::Delete, outcome);
        assert_eq!(failed.message, "No such object on the phone");
        assert_eq!(failed.detail.as_deref(), Some("Phone rejected command: ERROR"));
    }

    #[test]
    fn test_session_call_success() {
        let mut session = session();
        let response = session
            .call(Request::List(Category::Rings))
            .unwrap();
        let Response::Elements(elements) = response else {
            panic!("expected elements");
        };
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].filename(), "Tune");
    }

    #[test]
    fn test_session_call_failure_maps_code() {
        let mut session = session();
        let err = session
            .call(Request::Delete("00FF".to_string()))
            .unwrap_err();
        let failed = err.downcast_ref::<Failed>().unwrap();
        assert_eq!(failed.code, codes::REJECTED);
    }
}
