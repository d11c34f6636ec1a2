use std::fmt::Display;
use std::io::Write;

use log::{debug, trace};

use crate::ast::{ArithmeticOp, Command, Segment};
use crate::error::VmError;
use crate::output::AsmWriter;

macro_rules! svec {
    ($($x:expr),* $(,)?) => (vec![$($x.to_string()),*]);
}

const STACK_BASE: u16 = 256;
const POINTER_BASE: u32 = 3;
const TEMP_BASE: u32 = 5;
/// Words a call pushes above its arguments: return address, LCL, ARG, THIS, THAT
const FRAME_SIZE: u16 = 5;

/// Walks backwards through the saved frame on return; also the pop address cell
const FRAME_CELL: &str = "R13";
const RETURN_CELL: &str = "R14";

const BOOTSTRAP_RETURN: &str = "BOOTSTRAP$ret";

fn at<T: Display>(arg: T) -> String {
    format!("@{}", arg)
}

fn label_def(name: &str) -> String {
    format!("({})", name)
}

/// SP--, D = *SP
fn pop_d() -> Vec<String> {
    svec!["@SP", "AM=M-1", "D=M"]
}

/// *SP = D, SP++
fn push_d() -> Vec<String> {
    svec!["@SP", "A=M", "M=D", "@SP", "M=M+1"]
}

/// Cell holding the base address of an indirect segment
fn base_pointer(seg: Segment) -> Option<&'static str> {
    match seg {
        Segment::Local => Some("LCL"),
        Segment::Argument => Some("ARG"),
        Segment::This => Some("THIS"),
        Segment::That => Some("THAT"),
        _ => None,
    }
}

fn simple_un_op(op: char) -> Vec<String> {
    svec!["@SP", "A=M-1", format!("M={}M", op)]
}

// i.e. no conditions or jumps, just pop and run
fn simple_bin_op(comp: &str) -> Vec<String> {
    let mut code = pop_d();
    code.extend(svec![
        "A=A-1", // Looking at the left operand, will overwrite
        format!("M={}", comp)
    ]);
    code
}

fn call_sequence(function: &str, num_args: u16, return_label: &str) -> Vec<String> {
    let mut code = svec![at(return_label), "D=A"];
    code.extend(push_d());
    for pointer in ["LCL", "ARG", "THIS", "THAT"] {
        code.extend(svec![at(pointer), "D=M"]);
        code.extend(push_d());
    }
    code.extend(svec![
        "@SP",
        "D=M",
        at(num_args),
        "D=D-A",
        at(FRAME_SIZE),
        "D=D-A",
        "@ARG",
        "M=D", // ARG = SP - nArgs - 5
        "@SP",
        "D=M",
        "@LCL",
        "M=D", // LCL = SP
        at(function),
        "0;JMP",
        label_def(return_label)
    ]);
    code
}

fn return_sequence() -> Vec<String> {
    let mut code = svec![
        "@LCL",
        "D=M",
        at(FRAME_CELL),
        "M=D",
        at(FRAME_SIZE),
        "A=D-A",
        "D=M",
        at(RETURN_CELL),
        "M=D" // Return address saved before *ARG can clobber it
    ];
    code.extend(pop_d());
    code.extend(svec!["@ARG", "A=M", "M=D", "@ARG", "D=M+1", "@SP", "M=D"]);
    for pointer in ["THAT", "THIS", "ARG", "LCL"] {
        code.extend(svec![at(FRAME_CELL), "AM=M-1", "D=M", at(pointer), "M=D"]);
    }
    code.extend(svec![at(RETURN_CELL), "A=M", "0;JMP"]);
    code
}

/// Lowers VM commands to Hack assembly, one command at a time.
///
/// Comparison labels are numbered from a counter that lives as long as the
/// translator, so every unit fed through one instance shares a label space.
/// Return labels are numbered per enclosing function.
pub struct Translator<W: Write> {
    out: AsmWriter<W>,
    unit: String,
    gen_sym: usize,
    function: Option<String>,
    call_sym: usize,
    comments: bool,
}

impl<W: Write> Translator<W> {
    pub fn new(out: W, unit: &str) -> Self {
        Translator {
            out: AsmWriter::new(out),
            unit: unit.to_string(),
            gen_sym: 0,
            function: None,
            call_sym: 0,
            comments: false,
        }
    }

    /// Precede each command's code with a `// <command>` line.
    pub fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }

    /// Name used to qualify `static` variables from here on.
    pub fn set_output_unit(&mut self, unit: &str) {
        self.unit = unit.to_string();
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Lines written to the current output.
    pub fn lines_written(&self) -> usize {
        self.out.lines_written()
    }

    /// Switch to a new output and unit, keeping the label counters. Returns
    /// the previous output, fully flushed.
    pub fn rebind(&mut self, out: W, unit: &str) -> Result<W, VmError> {
        let old = self.out.rebind(out)?;
        self.set_output_unit(unit);
        Ok(old)
    }

    /// SP = 256, then call Sys.init and spin if it ever returns.
    pub fn write_bootstrap(&mut self) -> Result<(), VmError> {
        let mut code = if self.comments { svec!["// bootstrap"] } else { vec![] };
        code.extend(svec![at(STACK_BASE), "D=A", "@SP", "M=D"]);
        code.extend(call_sequence("Sys.init", 0, BOOTSTRAP_RETURN));
        code.extend(svec![at(BOOTSTRAP_RETURN), "0;JMP"]);
        self.out.write_lines(&code)?;
        Ok(())
    }

    pub fn translate(&mut self, command: &Command) -> Result<(), VmError> {
        debug!("{}: {}", self.unit, command);
        let mut code = if self.comments { svec![format!("// {}", command)] } else { vec![] };
        code.extend(self.lower(command)?);
        trace!("{} lines for `{}`", code.len(), command);
        self.out.write_lines(&code)?;
        Ok(())
    }

    /// Flush and hand back the output.
    pub fn close(self) -> Result<W, VmError> {
        Ok(self.out.finish()?)
    }

    fn lower(&mut self, command: &Command) -> Result<Vec<String>, VmError> {
        let code = match command {
            Command::Arithmetic(op) => self.arithmetic(*op),
            Command::Push(seg, index) => self.push(*seg, *index),
            Command::Pop(Segment::Constant, _) => {
                return Err(VmError::InvalidCommand {
                    tokens: command.to_string().split(' ').map(str::to_string).collect(),
                })
            }
            Command::Pop(seg, index) => self.pop(*seg, *index),
            Command::Label(label) => svec![label_def(&self.label_to_sym(label, command)?)],
            Command::Goto(label) => svec![
                at(self.label_to_sym(label, command)?),
                "0;JMP" // Unconditional jump
            ],
            Command::IfGoto(label) => {
                let target = self.label_to_sym(label, command)?;
                let mut code = pop_d();
                code.extend(svec![at(target), "D;JNE"]); // Anything but 0 is true
                code
            }
            Command::Function(name, num_locals) => self.function(name, *num_locals),
            Command::Call(name, num_args) => {
                let return_label = self.next_return_label(command)?;
                call_sequence(name, *num_args, &return_label)
            }
            Command::Return => return_sequence(),
            Command::Invalid(tokens) => {
                return Err(VmError::InvalidCommand {
                    tokens: tokens.clone(),
                })
            }
        };
        Ok(code)
    }

    fn next_gen_sym(&mut self) -> usize {
        let tmp = self.gen_sym;
        self.gen_sym += 1;
        tmp
    }

    fn current_function(&self, command: &Command) -> Result<&str, VmError> {
        self.function
            .as_deref()
            .ok_or_else(|| VmError::OutsideFunction {
                command: command.to_string(),
            })
    }

    /// VM labels are scoped to their function, under `L.` so they never meet
    /// the `ret.` return labels
    fn label_to_sym(&self, label: &str, command: &Command) -> Result<String, VmError> {
        Ok(format!("{}$L.{}", self.current_function(command)?, label))
    }

    fn next_return_label(&mut self, command: &Command) -> Result<String, VmError> {
        let label = format!("{}$ret.{}", self.current_function(command)?, self.call_sym);
        self.call_sym += 1;
        Ok(label)
    }

    fn function(&mut self, name: &str, num_locals: u16) -> Vec<String> {
        self.function = Some(name.to_string());
        self.call_sym = 0;

        let mut code = svec![label_def(name)];
        if num_locals > 0 {
            code.push("D=0".to_string());
            for _ in 0..num_locals {
                code.extend(push_d());
            }
        }
        code
    }

    fn arithmetic(&mut self, op: ArithmeticOp) -> Vec<String> {
        match op {
            ArithmeticOp::Add => simple_bin_op("D+M"),
            ArithmeticOp::Sub => simple_bin_op("M-D"),
            ArithmeticOp::And => simple_bin_op("D&M"),
            ArithmeticOp::Or => simple_bin_op("D|M"),
            ArithmeticOp::Neg => simple_un_op('-'),
            ArithmeticOp::Not => simple_un_op('!'),
            ArithmeticOp::Eq => self.compare_eq(),
            ArithmeticOp::Gt => self.compare("JGT"),
            ArithmeticOp::Lt => self.compare("JLT"),
        }
    }

    fn compare_eq(&mut self) -> Vec<String> {
        let true_sym = format!("$CMP_TRUE.{}", self.next_gen_sym());
        let mut code = pop_d();
        code.extend(svec![
            "A=A-1",
            "D=M-D",
            at(&true_sym),
            "D;JEQ", // D is already 0 when equal
            "D=1",
            label_def(&true_sym),
            "@SP",
            "A=M-1",
            "M=D-1" // 0 - 1 = true, 1 - 1 = false
        ]);
        code
    }

    fn compare(&mut self, jump: &str) -> Vec<String> {
        let sym = self.next_gen_sym();
        let true_sym = format!("$CMP_TRUE.{}", sym);
        let end_sym = format!("$CMP_END.{}", sym);
        let mut code = pop_d();
        code.extend(svec![
            "A=A-1",
            "D=M-D",
            at(&true_sym),
            format!("D;{}", jump),
            "D=0",
            at(&end_sym),
            "0;JMP",
            label_def(&true_sym),
            "D=-1",
            label_def(&end_sym),
            "@SP",
            "A=M-1",
            "M=D"
        ]);
        code
    }

    /// Address of a segment that needs no indirection
    fn direct(&self, seg: Segment, index: u16) -> String {
        match (seg, index) {
            (Segment::Static, _) => format!("{}.{}", self.unit, index),
            (Segment::Pointer, 0) => "THIS".to_string(),
            (Segment::Pointer, 1) => "THAT".to_string(),
            (Segment::Pointer, _) => (POINTER_BASE + u32::from(index)).to_string(),
            _ => (TEMP_BASE + u32::from(index)).to_string(),
        }
    }

    fn push(&self, seg: Segment, index: u16) -> Vec<String> {
        let mut code = match (seg, base_pointer(seg)) {
            (Segment::Constant, _) => svec![at(index), "D=A"],
            (_, Some(base)) => svec![
                at(base),
                "D=M",
                at(index),
                "A=D+A", // A = SEG+index
                "D=M"
            ],
            (_, None) => svec![at(self.direct(seg, index)), "D=M"],
        };
        code.extend(push_d());
        code
    }

    fn pop(&self, seg: Segment, index: u16) -> Vec<String> {
        match base_pointer(seg) {
            Some(base) => {
                let mut code = svec![
                    at(base),
                    "D=M",
                    at(index),
                    "D=D+A",
                    at(FRAME_CELL),
                    "M=D" // Park the target address before popping into D
                ];
                code.extend(pop_d());
                code.extend(svec![at(FRAME_CELL), "A=M", "M=D"]);
                code
            }
            None => {
                let mut code = pop_d();
                code.extend(svec![at(self.direct(seg, index)), "M=D"]);
                code
            }
        }
    }
}

#[cfg(test)]
fn lines(unit: &str, commands: &[Command]) -> Result<Vec<String>, VmError> {
    let mut translator = Translator::new(Vec::new(), unit);
    for command in commands {
        translator.translate(command)?;
    }
    let out = translator.close()?;
    Ok(String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
fn label_defs(code: &[String]) -> Vec<&str> {
    code.iter()
        .filter(|l| l.starts_with('('))
        .map(|l| l.trim_matches(|c| c == '(' || c == ')'))
        .collect()
}

#[test]
fn test_push_constant() {
    let code = lines("Main", &[Command::Push(Segment::Constant, 7)]).unwrap();
    assert_eq!(code, ["@7", "D=A", "@SP", "A=M", "M=D", "@SP", "M=M+1"]);
}

#[test]
fn test_binary_op() {
    let code = lines("Main", &[Command::Arithmetic(ArithmeticOp::Sub)]).unwrap();
    assert_eq!(code, ["@SP", "AM=M-1", "D=M", "A=A-1", "M=M-D"]);
}

#[test]
fn test_static_uses_unit_name() {
    let mut translator = Translator::new(Vec::new(), "Foo");
    translator.translate(&Command::Pop(Segment::Static, 3)).unwrap();
    translator.set_output_unit("Bar");
    translator.translate(&Command::Push(Segment::Static, 3)).unwrap();
    let text = String::from_utf8(translator.close().unwrap()).unwrap();
    assert!(text.contains("@Foo.3\nM=D\n"));
    assert!(text.contains("@Bar.3\nD=M\n"));
}

#[test]
fn test_pointer_and_temp_addresses() {
    let code = lines(
        "Main",
        &[
            Command::Pop(Segment::Pointer, 1),
            Command::Push(Segment::Temp, 6),
        ],
    )
    .unwrap();
    assert!(code.contains(&"@THAT".to_string()));
    assert!(code.contains(&"@11".to_string()));
}

#[test]
fn test_comparison_labels_are_unique() {
    let ops = [ArithmeticOp::Eq, ArithmeticOp::Gt, ArithmeticOp::Lt, ArithmeticOp::Eq];
    let mut commands = vec![Command::Function("A.f".into(), 0)];
    commands.extend(ops.iter().map(|op| Command::Arithmetic(*op)));
    commands.push(Command::Function("B.g".into(), 0));
    commands.extend(ops.iter().map(|op| Command::Arithmetic(*op)));

    let code = lines("Main", &commands).unwrap();
    let mut defs = label_defs(&code);
    let total = defs.len();
    defs.sort_unstable();
    defs.dedup();
    assert_eq!(defs.len(), total);
    assert!(defs.contains(&"$CMP_TRUE.7"));
}

#[test]
fn test_labels_are_scoped_to_function() {
    let code = lines(
        "Main",
        &[
            Command::Function("Main.loop".into(), 0),
            Command::Label("TOP".into()),
            Command::IfGoto("TOP".into()),
            Command::Function("Main.other".into(), 0),
            Command::Goto("TOP".into()),
        ],
    )
    .unwrap();
    assert!(code.contains(&"(Main.loop$L.TOP)".to_string()));
    assert!(code.contains(&"@Main.loop$L.TOP".to_string()));
    assert!(code.contains(&"@Main.other$L.TOP".to_string()));
}

#[test]
fn test_return_labels_per_call_site() {
    let code = lines(
        "Main",
        &[
            Command::Function("Main.a".into(), 0),
            Command::Call("Math.abs".into(), 1),
            Command::Call("Math.abs".into(), 1),
            Command::Function("Main.b".into(), 0),
            Command::Call("Math.abs".into(), 1),
        ],
    )
    .unwrap();
    assert_eq!(
        label_defs(&code),
        ["Main.a", "Main.a$ret.0", "Main.a$ret.1", "Main.b", "Main.b$ret.0"]
    );
}

#[test]
fn test_function_zeroes_locals() {
    let code = lines(
        "Main",
        &[Command::Function("Foo".into(), 2), Command::Return],
    )
    .unwrap();
    assert_eq!(code[..2], ["(Foo)", "D=0"]);
    assert_eq!(code.iter().filter(|l| *l == "M=M+1").count(), 2);
    assert_eq!(code.last().map(String::as_str), Some("0;JMP"));
}

#[test]
fn test_flow_outside_function_is_rejected() {
    for command in [
        Command::Label("L".into()),
        Command::Goto("L".into()),
        Command::IfGoto("L".into()),
        Command::Call("Foo".into(), 0),
    ] {
        match lines("Main", &[command.clone()]) {
            Err(VmError::OutsideFunction { command: text }) => assert_eq!(text, command.to_string()),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(lines("Main", &[Command::Return]).is_ok());
}

#[test]
fn test_invalid_commands_are_rejected() {
    let err = lines("Main", &[Command::Invalid(vec!["mul".into(), "2".into()])]).unwrap_err();
    assert_eq!(err.to_string(), "invalid command: `mul 2`");
    assert!(matches!(
        lines("Main", &[Command::Pop(Segment::Constant, 0)]),
        Err(VmError::InvalidCommand { .. })
    ));
}

#[test]
fn test_comments_and_bootstrap() {
    let mut translator = Translator::new(Vec::new(), "Sys").with_comments(true);
    translator.write_bootstrap().unwrap();
    translator.translate(&Command::Arithmetic(ArithmeticOp::Not)).unwrap();
    let text = String::from_utf8(translator.close().unwrap()).unwrap();
    assert!(text.starts_with("// bootstrap\n@256\nD=A\n@SP\nM=D\n@BOOTSTRAP$ret\n"));
    assert!(text.contains("@Sys.init\n0;JMP\n(BOOTSTRAP$ret)\n@BOOTSTRAP$ret\n0;JMP\n"));
    assert!(text.ends_with("// not\n@SP\nA=M-1\nM=!M\n"));
}

#[test]
fn test_rebind_keeps_counters() {
    let mut translator = Translator::new(Vec::new(), "A");
    translator.translate(&Command::Arithmetic(ArithmeticOp::Gt)).unwrap();
    let first = translator.rebind(Vec::new(), "B").unwrap();
    assert_eq!(translator.unit(), "B");
    translator.translate(&Command::Arithmetic(ArithmeticOp::Gt)).unwrap();
    let second = translator.close().unwrap();
    assert!(String::from_utf8(first).unwrap().contains("($CMP_TRUE.0)"));
    assert!(String::from_utf8(second).unwrap().contains("($CMP_TRUE.1)"));
}
