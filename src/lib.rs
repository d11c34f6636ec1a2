//! Hack VM translator: lowers stack-machine VM code into Hack assembly.
//!
//! - `tokenizer` splits source lines into whitespace-separated tokens.
//! - `parser` classifies each line into a typed [`Command`].
//! - `translator` turns commands into assembly, owning all label state.
//! - `output` buffers the generated lines for whatever sink the caller picks.

use std::io::{BufRead, Write};

pub mod ast;
pub mod error;
pub mod output;
pub mod parser;
pub mod tokenizer;
pub mod translator;

pub use ast::{ArithmeticOp, Command, CommandKind, Segment};
pub use error::VmError;
pub use parser::{parse, Parser};
pub use translator::Translator;

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Emit `SP = 256; call Sys.init 0` ahead of everything else.
    pub bootstrap: bool,
    /// Annotate generated code with the VM command it came from.
    pub comments: bool,
}

/// Feed one source unit through `translator`, returning how many commands it
/// held. Errors raised while lowering are tagged with their line.
pub fn translate_unit<R: BufRead, W: Write>(
    translator: &mut Translator<W>,
    reader: R,
) -> Result<usize, VmError> {
    let mut parser = Parser::new(reader);
    let mut count = 0;

    while parser.has_more_commands()? {
        parser.advance()?;
        if let Some(command) = parser.command() {
            translator
                .translate(command)
                .map_err(|source| VmError::Located {
                    line: parser.line(),
                    source: Box::new(source),
                })?;
            count += 1;
        }
    }

    Ok(count)
}

/// Translate named in-memory units, in order, into a single program.
pub fn translate_program<'a, I>(units: I, options: Options) -> Result<String, VmError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut translator = Translator::new(Vec::new(), "").with_comments(options.comments);
    if options.bootstrap {
        translator.write_bootstrap()?;
    }
    for (name, source) in units {
        translator.set_output_unit(name);
        translate_unit(&mut translator, source.as_bytes())?;
    }
    let bytes = translator.close()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[test]
fn test_translate_unit_locates_errors() {
    let mut translator = Translator::new(Vec::new(), "Main");
    let err = translate_unit(&mut translator, "push constant 1\n\ngoto END\n".as_bytes()).unwrap_err();
    assert_eq!(err.to_string(), "line 3: `goto END` appears before any function declaration");
}

#[test]
fn test_translate_unit_counts_commands() {
    let mut translator = Translator::new(Vec::new(), "Main");
    let n = translate_unit(&mut translator, "// header\npush constant 1\nneg\n\n".as_bytes()).unwrap();
    assert_eq!(n, 2);
    assert_eq!(translator.lines_written(), 10);
}
