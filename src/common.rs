// Licensed under the Apache-2.0 license

//! Shared driver-kit plumbing: the injectable logger used by every controller.

use core::fmt::{self, Write as _};
use heapless::String;

/// Capacity of the scratch buffer used to render formatted log messages.
pub const LOG_LINE_CAPACITY: usize = 96;

/// Minimal logging sink injected into controllers as a type parameter.
///
/// Implementations must not block for long: the I2C engine logs from inside
/// its transaction paths.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);

    /// Format into a fixed buffer and forward to [`Logger::debug`].
    ///
    /// Messages longer than [`LOG_LINE_CAPACITY`] are truncated.
    fn debug_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.debug(&render(args));
    }

    /// Format into a fixed buffer and forward to [`Logger::error`].
    fn error_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.error(&render(args));
    }
}

fn render(args: fmt::Arguments<'_>) -> String<LOG_LINE_CAPACITY> {
    let mut line = String::new();
    // A full buffer only truncates the message.
    let _ = line.write_fmt(args);
    line
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
    fn debug_fmt(&mut self, _args: fmt::Arguments<'_>) {}
    fn error_fmt(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Logger writing one line per message to any `embedded_io` byte sink,
/// typically a UART.
pub struct WriterLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, msg: &str) {
        // Logging must never fail a bus transaction.
        let _ = write!(self.writer, "[{level}] {msg}\r\n");
    }
}

impl<W: embedded_io::Write> Logger for WriterLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("DEBUG", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("ERROR", msg);
    }
}
