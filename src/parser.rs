use std::io::BufRead;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    sequence::pair,
    IResult,
};

use crate::ast::{ArithmeticOp::*, Segment::*, *};
use crate::error::VmError;
use crate::tokenizer::Tokenizer;

/// Largest literal an A-instruction can carry.
pub const MAX_LITERAL: i64 = 0x7FFF;

#[derive(Debug, PartialEq, Clone, Copy)]
enum Mnemonic {
    Arithmetic(ArithmeticOp),
    Push,
    Pop,
    Label,
    Goto,
    IfGoto,
    Function,
    Call,
    Return,
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |c: &str| c.parse())(input)
}

#[test]
fn test_integer() {
    assert_eq!(integer("17"), Ok(("", 17)));
    assert_eq!(integer("-3"), Ok(("", -3)));
    assert!(integer("x1").is_err());
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        value(Constant, tag("constant")),
        value(Local, tag("local")),
        value(Static, tag("static")),
        value(Argument, tag("argument")),
        value(This, tag("this")),
        value(That, tag("that")),
        value(Pointer, tag("pointer")),
        value(Temp, tag("temp")),
    ))(input)
}

#[test]
fn test_segment() {
    assert_eq!(segment("pointer"), Ok(("", Pointer)));
    assert_eq!(segment("that"), Ok(("", That)));
    assert!(segment("heap").is_err());
}

fn arithmetic(input: &str) -> IResult<&str, ArithmeticOp> {
    alt((
        value(Add, tag("add")),
        value(Sub, tag("sub")),
        value(Neg, tag("neg")),
        value(Eq, tag("eq")),
        value(Gt, tag("gt")),
        value(Lt, tag("lt")),
        value(And, tag("and")),
        value(Or, tag("or")),
        value(Not, tag("not")),
    ))(input)
}

fn mnemonic(input: &str) -> IResult<&str, Mnemonic> {
    alt((
        map(arithmetic, Mnemonic::Arithmetic),
        value(Mnemonic::Push, tag("push")),
        value(Mnemonic::Pop, tag("pop")),
        value(Mnemonic::Label, tag("label")),
        value(Mnemonic::Goto, tag("goto")),
        value(Mnemonic::IfGoto, tag("if-goto")),
        value(Mnemonic::Function, tag("function")),
        value(Mnemonic::Call, tag("call")),
        value(Mnemonic::Return, tag("return")),
    ))(input)
}

#[test]
fn test_mnemonic() {
    assert_eq!(mnemonic("neg"), Ok(("", Mnemonic::Arithmetic(Neg))));
    assert_eq!(mnemonic("if-goto"), Ok(("", Mnemonic::IfGoto)));
    assert!(all_consuming(mnemonic)("Push").is_err());
    assert!(all_consuming(mnemonic)("addx").is_err());
}

/// Pulls commands out of VM source one line at a time.
///
/// Drive it with `has_more_commands` / `advance`; after each `advance`,
/// `command` is the parsed command or `None` for a blank or comment line.
pub struct Parser<R> {
    tokenizer: Tokenizer<R>,
    current: Option<Command>,
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: R) -> Self {
        Parser {
            tokenizer: Tokenizer::new(reader),
            current: None,
        }
    }

    pub fn has_more_commands(&mut self) -> Result<bool, VmError> {
        Ok(self.tokenizer.has_more_commands()?)
    }

    pub fn advance(&mut self) -> Result<(), VmError> {
        self.current = None;
        self.tokenizer.read_next_command()?;
        if let Some(op) = self.tokenizer.next_token() {
            self.current = Some(self.parse_command(op)?);
        }
        Ok(())
    }

    pub fn command(&self) -> Option<&Command> {
        self.current.as_ref()
    }

    pub fn take_command(&mut self) -> Option<Command> {
        self.current.take()
    }

    pub fn command_type(&self) -> Option<CommandKind> {
        self.current.as_ref().map(Command::kind)
    }

    pub fn arg1(&self) -> &str {
        self.expect_command().arg1()
    }

    pub fn arg2(&self) -> u16 {
        self.expect_command().arg2()
    }

    /// Line number of the command most recently advanced to.
    pub fn line(&self) -> usize {
        self.tokenizer.line()
    }

    fn expect_command(&self) -> &Command {
        match &self.current {
            Some(command) => command,
            None => panic!("no current command on line {}", self.line()),
        }
    }

    fn parse_command(&mut self, op: String) -> Result<Command, VmError> {
        let line = self.line();
        let mut rest = vec![];
        while let Some(token) = self.tokenizer.next_token() {
            rest.push(token);
        }

        let parsed = all_consuming(mnemonic)(op.as_str()).ok().map(|(_, m)| m);
        let kind = match parsed {
            Some(m) => m,
            None => {
                rest.insert(0, op);
                return Ok(Command::Invalid(rest));
            }
        };

        let command = match kind {
            Mnemonic::Arithmetic(arith) => {
                operands::<0>(line, &op, rest, "no operands")?;
                Command::Arithmetic(arith)
            }
            Mnemonic::Push | Mnemonic::Pop => {
                let [seg, index] = operands(line, &op, rest, "a segment and an index")?;
                let parsed = all_consuming(segment)(seg.as_str()).ok().map(|(_, s)| s);
                let seg = match parsed {
                    Some(s) => s,
                    None => return Err(bad_operand(line, &op, "segment", seg)),
                };
                let index = count(line, &op, "index", index)?;
                if kind == Mnemonic::Push {
                    Command::Push(seg, index)
                } else if seg == Constant {
                    return Err(VmError::PopConstant { line });
                } else {
                    Command::Pop(seg, index)
                }
            }
            Mnemonic::Label | Mnemonic::Goto | Mnemonic::IfGoto => {
                let [target] = operands(line, &op, rest, "a label")?;
                match kind {
                    Mnemonic::Label => Command::Label(target),
                    Mnemonic::Goto => Command::Goto(target),
                    _ => Command::IfGoto(target),
                }
            }
            Mnemonic::Function => {
                let [name, locals] = operands(line, &op, rest, "a name and a local count")?;
                Command::Function(name, count(line, &op, "local count", locals)?)
            }
            Mnemonic::Call => {
                let [name, args] = operands(line, &op, rest, "a name and an argument count")?;
                Command::Call(name, count(line, &op, "argument count", args)?)
            }
            Mnemonic::Return => {
                operands::<0>(line, &op, rest, "no operands")?;
                Command::Return
            }
        };
        Ok(command)
    }
}

fn operands<const N: usize>(
    line: usize,
    op: &str,
    tokens: Vec<String>,
    expected: &'static str,
) -> Result<[String; N], VmError> {
    tokens.try_into().map_err(|tokens: Vec<String>| VmError::Arity {
        line,
        op: op.to_string(),
        expected,
        found: std::iter::once(op.to_string()).chain(tokens).collect::<Vec<_>>().join(" "),
    })
}

fn bad_operand(line: usize, op: &str, what: &'static str, token: String) -> VmError {
    VmError::BadOperand {
        line,
        op: op.to_string(),
        what,
        token,
    }
}

fn count(line: usize, op: &str, what: &'static str, token: String) -> Result<u16, VmError> {
    let parsed = all_consuming(integer)(token.as_str()).ok().map(|(_, v)| v);
    match parsed {
        Some(value) if value < 0 => Err(VmError::Negative {
            line,
            op: op.to_string(),
            value,
        }),
        Some(value) if value <= MAX_LITERAL => Ok(value as u16),
        _ => Err(bad_operand(line, op, what, token)),
    }
}

/// Parse a whole source text. Blank and comment lines produce nothing;
/// unknown mnemonics come back as `Command::Invalid`.
pub fn parse(input: &str) -> Result<Vec<Command>, VmError> {
    let mut parser = Parser::new(input.as_bytes());
    let mut commands = vec![];

    while parser.has_more_commands()? {
        parser.advance()?;
        if let Some(command) = parser.take_command() {
            commands.push(command);
        }
    }

    Ok(commands)
}

#[test]
fn test_parse_program() {
    let src = "// Adds two numbers\n\
               push constant 7\n\
               push   local  2 // trailing\n\
               \n\
               add\n\
               pop that 0\n\
               label LOOP\n\
               if-goto LOOP\n\
               goto END\n\
               function Main.main 3\n\
               call Math.multiply 2\n\
               return\n";
    assert_eq!(
        parse(src).unwrap(),
        vec![
            Command::Push(Constant, 7),
            Command::Push(Local, 2),
            Command::Arithmetic(Add),
            Command::Pop(That, 0),
            Command::Label("LOOP".into()),
            Command::IfGoto("LOOP".into()),
            Command::Goto("END".into()),
            Command::Function("Main.main".into(), 3),
            Command::Call("Math.multiply".into(), 2),
            Command::Return,
        ]
    );
}

#[test]
fn test_unknown_mnemonic_is_invalid() {
    assert_eq!(
        parse("push constant 1\nmul x y\n").unwrap(),
        vec![
            Command::Push(Constant, 1),
            Command::Invalid(vec!["mul".into(), "x".into(), "y".into()]),
        ]
    );
    assert_eq!(parse("ADD").unwrap(), vec![Command::Invalid(vec!["ADD".into()])]);
}

#[test]
fn test_arity_errors() {
    match parse("push constant") {
        Err(VmError::Arity { line: 1, op, found, .. }) => {
            assert_eq!(op, "push");
            assert_eq!(found, "push constant");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(parse("add 1"), Err(VmError::Arity { .. })));
    assert!(matches!(parse("return now"), Err(VmError::Arity { .. })));
    assert!(matches!(parse("\n\ngoto"), Err(VmError::Arity { line: 3, .. })));
    assert!(matches!(parse("call Foo"), Err(VmError::Arity { .. })));
}

#[test]
fn test_operand_errors() {
    assert!(matches!(
        parse("push heap 1"),
        Err(VmError::BadOperand { what: "segment", .. })
    ));
    assert!(matches!(parse("pop local x"), Err(VmError::BadOperand { what: "index", .. })));
    assert!(matches!(parse("push constant 40000"), Err(VmError::BadOperand { .. })));
    assert!(matches!(parse("pop temp -1"), Err(VmError::Negative { value: -1, .. })));
    assert!(matches!(parse("function F -2"), Err(VmError::Negative { .. })));
    assert!(matches!(parse("pop constant 3"), Err(VmError::PopConstant { line: 1 })));
}

#[test]
fn test_cursor_accessors() {
    let mut parser = Parser::new("\npush static 4\nfunction Foo.bar 2\n".as_bytes());
    parser.advance().unwrap();
    assert_eq!(parser.command_type(), None);

    parser.advance().unwrap();
    assert_eq!(parser.command_type(), Some(CommandKind::Push));
    assert_eq!(parser.arg1(), "static");
    assert_eq!(parser.arg2(), 4);
    assert_eq!(parser.line(), 2);

    parser.advance().unwrap();
    assert_eq!(parser.arg1(), "Foo.bar");
    assert_eq!(parser.arg2(), 2);
    assert!(!parser.has_more_commands().unwrap());
}

#[test]
#[should_panic(expected = "no current command")]
fn test_accessor_without_command() {
    let mut parser = Parser::new("// nothing here\n".as_bytes());
    parser.advance().unwrap();
    parser.arg1();
}
