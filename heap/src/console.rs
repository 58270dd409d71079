use std::io::{self, BufRead, Write};

use crate::ObjectError;

/// Blocking console used by the read and write built-ins.
pub struct Console {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl Console {
    pub fn new(input: impl BufRead + 'static, output: impl Write + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }

    /// Prompt with `> ` and read one decimal integer per line.
    pub fn read_int(&mut self) -> Result<i32, ObjectError> {
        self.output.write_all(b"> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ObjectError::EndOfInput);
        }
        let trimmed = line.trim();
        trimmed
            .parse()
            .map_err(|_| ObjectError::InvalidInput(trimmed.to_owned()))
    }

    pub fn write_int(&mut self, n: i32) -> Result<(), ObjectError> {
        writeln!(self.output, "{n}")?;
        self.output.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_prompts_and_parses() {
        let out = Captured::default();
        let mut console = Console::new(Cursor::new("  17 \n-4\n"), out.clone());
        assert_eq!(console.read_int().unwrap(), 17);
        assert_eq!(console.read_int().unwrap(), -4);
        assert_eq!(out.0.borrow().as_slice(), b"> > ");
    }

    #[test]
    fn read_reports_end_of_input_and_garbage() {
        let mut console = Console::new(Cursor::new("abc\n"), io::sink());
        assert!(matches!(
            console.read_int(),
            Err(ObjectError::InvalidInput(s)) if s == "abc"
        ));
        assert!(matches!(console.read_int(), Err(ObjectError::EndOfInput)));
    }

    #[test]
    fn write_prints_one_number_per_line() {
        let out = Captured::default();
        let mut console = Console::new(io::empty(), out.clone());
        console.write_int(3).unwrap();
        console.write_int(-12).unwrap();
        assert_eq!(out.0.borrow().as_slice(), b"3\n-12\n");
    }
}
