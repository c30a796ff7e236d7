//! Textual introspection sink.

use std::fmt;

/// Indenting writer used by every `view` method.
pub struct Viewer<'a> {
    sink: &'a mut dyn fmt::Write,
    indent: usize,
}

impl<'a> Viewer<'a> {
    /// Wrap any [`fmt::Write`] sink.
    pub fn new(sink: &'a mut dyn fmt::Write) -> Self {
        Self { sink, indent: 0 }
    }

    /// Write one line at the current indentation.
    pub fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        for _ in 0..self.indent {
            self.sink.write_char(' ')?;
        }
        self.sink.write_fmt(args)?;
        self.sink.write_char('\n')
    }

    /// Run `body` one level deeper.
    pub fn indented<F>(&mut self, body: F) -> fmt::Result
    where
        F: FnOnce(&mut Viewer<'a>) -> fmt::Result,
    {
        self.indent += 2;
        let result = body(self);
        self.indent -= 2;
        result
    }
}
