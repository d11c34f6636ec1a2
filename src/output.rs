//! Buffered, line-oriented destination for generated assembly.

use std::io::{self, BufWriter, Write};

pub struct AsmWriter<W: Write> {
    inner: BufWriter<W>,
    lines: usize,
}

impl<W: Write> AsmWriter<W> {
    pub fn new(inner: W) -> Self {
        AsmWriter {
            inner: BufWriter::new(inner),
            lines: 0,
        }
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.inner, "{}", line)?;
        self.lines += 1;
        Ok(())
    }

    pub fn write_lines<I, S>(&mut self, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Lines written to the current destination.
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Flush everything pending into the current destination, then switch
    /// to `inner`. Hands back the previous destination.
    pub fn rebind(&mut self, inner: W) -> io::Result<W> {
        self.inner.flush()?;
        self.lines = 0;
        let old = std::mem::replace(&mut self.inner, BufWriter::new(inner));
        old.into_inner().map_err(|e| e.into_error())
    }

    /// Flush and release the destination.
    pub fn finish(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}

#[test]
fn test_lines_are_terminated() {
    let mut out = AsmWriter::new(Vec::new());
    out.write_line("@SP").unwrap();
    out.write_lines(["AM=M-1", "D=M"]).unwrap();
    assert_eq!(out.lines_written(), 3);
    assert_eq!(out.finish().unwrap(), b"@SP\nAM=M-1\nD=M\n");
}

#[test]
fn test_rebind_flushes_previous() {
    let mut out = AsmWriter::new(Vec::new());
    out.write_line("(Foo)").unwrap();
    let first = out.rebind(Vec::new()).unwrap();
    assert_eq!(first, b"(Foo)\n");
    assert_eq!(out.lines_written(), 0);
    out.write_line("(Bar)").unwrap();
    assert_eq!(out.finish().unwrap(), b"(Bar)\n");
}
