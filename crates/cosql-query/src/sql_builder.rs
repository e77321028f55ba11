//! Text buffer with line-oriented indentation

/// Builds query text, indenting every line started while the indent level is
/// above zero. Newlines must go through `append_line` so indentation is
/// tracked.
#[derive(Debug, Clone)]
pub struct IndentedStringBuilder {
    buffer: String,
    indent: usize,
    indent_size: usize,
    indent_pending: bool,
}

impl IndentedStringBuilder {
    pub fn new(indent_size: usize) -> Self {
        Self {
            buffer: String::new(),
            indent: 0,
            indent_size,
            indent_pending: false,
        }
    }

    pub fn append(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.do_indent();
            self.buffer.push_str(text);
        }
        self
    }

    /// Append `text` followed by a newline
    pub fn append_line(&mut self, text: &str) -> &mut Self {
        self.append(text);
        self.buffer.push('\n');
        self.indent_pending = true;
        self
    }

    /// Append every line of `text` at the current indent, ending with a
    /// newline
    pub fn append_lines(&mut self, text: &str) -> &mut Self {
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                self.append_line("");
            }
            self.append(line);
        }
        self.append_line("")
    }

    pub fn increment_indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub fn decrement_indent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    fn do_indent(&mut self) {
        if self.indent_pending && self.indent > 0 {
            self.buffer
                .extend(std::iter::repeat(' ').take(self.indent * self.indent_size));
        }
        self.indent_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indents_new_lines_only() {
        let mut sql = IndentedStringBuilder::new(2);
        sql.append_line("EXISTS (").increment_indent();
        sql.append("SELECT 1").append_line("").append("FROM c");
        sql.decrement_indent().append(")");

        assert_eq!(sql.as_str(), "EXISTS (\n  SELECT 1\n  FROM c)");
    }

    #[test]
    fn test_append_lines() {
        let mut sql = IndentedStringBuilder::new(4);
        sql.append_line("(").increment_indent();
        sql.append_lines("SELECT *\nFROM root c");
        sql.decrement_indent().append(")");

        assert_eq!(sql.into_string(), "(\n    SELECT *\n    FROM root c\n)");
    }

    #[test]
    fn test_decrement_saturates() {
        let mut sql = IndentedStringBuilder::new(2);
        sql.decrement_indent().append_line("a").append("b");
        assert_eq!(sql.as_str(), "a\nb");
    }
}
