/// Line-oriented output buffer with four-space indentation.
#[derive(Debug, Default)]
pub(crate) struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.buf.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Appends already formatted lines as they are.
    pub fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Writes `text` (normally ending in `{`) and indents what follows.
    pub fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedents and writes `text` (normally `}`).
    pub fn close(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Closes one block and opens the next on the same line, as in `} else {`.
    pub fn reopen(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_blocks_indent() {
        let mut w = CodeWriter::new();
        w.open("fn f() {");
        w.open("loop {");
        w.line("break;");
        w.close("}");
        w.close("}");
        assert_eq!(w.finish(), "fn f() {\n    loop {\n        break;\n    }\n}\n");
    }
}
