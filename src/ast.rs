use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Segment {
    Constant,
    Local,
    Static,
    Argument,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn name(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithmeticOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
        }
    }

    /// Number of stack operands consumed; every op leaves one result.
    pub fn arity(self) -> usize {
        match self {
            ArithmeticOp::Neg | ArithmeticOp::Not => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse classification of a command, one per mnemonic family.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommandKind {
    Arithmetic,
    Push,
    Pop,
    Label,
    Goto,
    If,
    Function,
    Call,
    Return,
    Invalid,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    // Stack Basics
    Arithmetic(ArithmeticOp),
    Push(Segment, u16),
    Pop(Segment, u16),

    // Control
    Label(String),
    Goto(String),
    IfGoto(String),

    // Functions
    Function(String, u16),
    Call(String, u16),
    Return,

    /// Unrecognised mnemonic, kept with its raw tokens for the diagnostic
    Invalid(Vec<String>),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Arithmetic(_) => CommandKind::Arithmetic,
            Command::Push(..) => CommandKind::Push,
            Command::Pop(..) => CommandKind::Pop,
            Command::Label(_) => CommandKind::Label,
            Command::Goto(_) => CommandKind::Goto,
            Command::IfGoto(_) => CommandKind::If,
            Command::Function(..) => CommandKind::Function,
            Command::Call(..) => CommandKind::Call,
            Command::Return => CommandKind::Return,
            Command::Invalid(_) => CommandKind::Invalid,
        }
    }

    /// First argument: the op name for arithmetic, the segment for push/pop,
    /// the target or function name otherwise.
    ///
    /// Panics for `return` and invalid commands, which have none.
    pub fn arg1(&self) -> &str {
        match self {
            Command::Arithmetic(op) => op.name(),
            Command::Push(seg, _) | Command::Pop(seg, _) => seg.name(),
            Command::Label(name)
            | Command::Goto(name)
            | Command::IfGoto(name)
            | Command::Function(name, _)
            | Command::Call(name, _) => name,
            Command::Return | Command::Invalid(_) => {
                panic!("arg1 is not defined for {:?} commands", self.kind())
            }
        }
    }

    /// Second argument: the index for push/pop, the local or argument count
    /// for function/call.
    ///
    /// Panics for every other kind.
    pub fn arg2(&self) -> u16 {
        match self {
            Command::Push(_, n) | Command::Pop(_, n) | Command::Function(_, n) | Command::Call(_, n) => *n,
            _ => panic!("arg2 is not defined for {:?} commands", self.kind()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Arithmetic(op) => write!(f, "{}", op),
            Command::Push(seg, n) => write!(f, "push {} {}", seg, n),
            Command::Pop(seg, n) => write!(f, "pop {} {}", seg, n),
            Command::Label(name) => write!(f, "label {}", name),
            Command::Goto(name) => write!(f, "goto {}", name),
            Command::IfGoto(name) => write!(f, "if-goto {}", name),
            Command::Function(name, n) => write!(f, "function {} {}", name, n),
            Command::Call(name, n) => write!(f, "call {} {}", name, n),
            Command::Return => f.write_str("return"),
            Command::Invalid(tokens) => f.write_str(&tokens.join(" ")),
        }
    }
}

#[test]
fn test_args() {
    let push = Command::Push(Segment::Local, 3);
    assert_eq!(push.arg1(), "local");
    assert_eq!(push.arg2(), 3);
    assert_eq!(Command::Arithmetic(ArithmeticOp::Gt).arg1(), "gt");
    assert_eq!(Command::Call("Math.max".into(), 2).arg1(), "Math.max");
}

#[test]
#[should_panic(expected = "arg1 is not defined for Return")]
fn test_arg1_on_return() {
    Command::Return.arg1();
}

#[test]
#[should_panic(expected = "arg2 is not defined for Goto")]
fn test_arg2_on_goto() {
    Command::Goto("LOOP".into()).arg2();
}

#[test]
fn test_display() {
    assert_eq!(Command::IfGoto("END".into()).to_string(), "if-goto END");
    assert_eq!(Command::Function("Main.main".into(), 2).to_string(), "function Main.main 2");
    assert_eq!(Command::Pop(Segment::That, 1).to_string(), "pop that 1");
}
