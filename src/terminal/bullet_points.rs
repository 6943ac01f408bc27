const INDENT_SIZE: usize = 2;

/// Prints nested bullet point lists, e.g. the summary at the end of a run.
pub struct BulletPointPrinter<W: LineWriter + Clone> {
    writer: W,
    nesting: usize,
}

impl<W: LineWriter + Clone> BulletPointPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, nesting: 0 }
    }

    pub fn print_header(&self, header: impl std::fmt::Display) {
        self.writer.write_line(&format!("{}{}", self.indentation(), header));
    }

    pub fn print_item(&self, message: impl std::fmt::Display) {
        self.writer
            .write_line(&format!("{}• {}", self.indentation(), message));
    }

    /// Print each item, or `empty` if there are none.
    pub fn print_items<T: std::fmt::Display>(
        &self,
        items: impl IntoIterator<Item = T>,
        empty: impl std::fmt::Display,
    ) {
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            self.print_item(empty);
        }
        for item in items {
            self.print_item(item);
        }
    }

    pub fn indent(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            nesting: self.nesting + 1,
        }
    }

    fn indentation(&self) -> String {
        " ".repeat(self.nesting * INDENT_SIZE)
    }
}

impl BulletPointPrinter<StdoutLineWriter> {
    pub fn new_stdout() -> Self {
        Self::new(StdoutLineWriter)
    }
}

pub trait LineWriter {
    fn write_line(&self, line: &str);
}

#[derive(Clone, Copy)]
pub struct StdoutLineWriter;
impl LineWriter for StdoutLineWriter {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingWriter(Rc<RefCell<Vec<String>>>);
    impl LineWriter for RecordingWriter {
        fn write_line(&self, line: &str) {
            self.0.borrow_mut().push(line.to_string());
        }
    }

    #[test]
    fn nested_items() {
        let writer = RecordingWriter::default();
        let printer = BulletPointPrinter::new(writer.clone());
        printer.print_header("Imported:");
        printer.print_item("first");
        printer.indent().print_items(["a", "b"], "(none)");
        printer.indent().indent().print_items(Vec::<String>::new(), "(none)");
        assert_eq!(
            vec!["Imported:", "• first", "  • a", "  • b", "    • (none)"],
            *writer.0.borrow()
        );
    }
}
