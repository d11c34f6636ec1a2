//! A minimal Hack computer: assembles Hack assembly text and runs it.
//!
//! Only the standard Hack `comp` table is accepted, so generated code that
//! relies on anything a real Hack assembler would reject fails loudly here.

#![allow(dead_code)]

use std::collections::HashMap;

pub const SP: usize = 0;
pub const LCL: usize = 1;
pub const ARG: usize = 2;
pub const THIS: usize = 3;
pub const THAT: usize = 4;

const RAM_SIZE: usize = 0x8000;

enum Instr {
    A(i16),
    C { dest: String, comp: String, jump: String },
}

pub struct Hack {
    pub ram: Vec<i16>,
    rom: Vec<Instr>,
    labels: HashMap<String, usize>,
    variables: HashMap<String, usize>,
    pc: usize,
    a: i16,
    d: i16,
}

fn predefined(symbol: &str) -> Option<usize> {
    let addr = match symbol {
        "SP" => SP,
        "LCL" => LCL,
        "ARG" => ARG,
        "THIS" => THIS,
        "THAT" => THAT,
        "SCREEN" => 0x4000,
        "KBD" => 0x6000,
        _ => return symbol.strip_prefix('R')?.parse().ok().filter(|r: &usize| *r < 16),
    };
    Some(addr)
}

fn eval(comp: &str, d: i16, a: i16, m: i16) -> i16 {
    let y = if comp.contains('M') { m } else { a };
    match comp.replace('M', "A").as_str() {
        "0" => 0,
        "1" => 1,
        "-1" => -1,
        "D" => d,
        "A" => y,
        "!D" => !d,
        "!A" => !y,
        "-D" => d.wrapping_neg(),
        "-A" => y.wrapping_neg(),
        "D+1" => d.wrapping_add(1),
        "A+1" => y.wrapping_add(1),
        "D-1" => d.wrapping_sub(1),
        "A-1" => y.wrapping_sub(1),
        "D+A" => d.wrapping_add(y),
        "D-A" => d.wrapping_sub(y),
        "A-D" => y.wrapping_sub(d),
        "D&A" => d & y,
        "D|A" => d | y,
        _ => panic!("non-standard comp `{}`", comp),
    }
}

fn jumps(jump: &str, out: i16) -> bool {
    match jump {
        "" => false,
        "JGT" => out > 0,
        "JEQ" => out == 0,
        "JGE" => out >= 0,
        "JLT" => out < 0,
        "JNE" => out != 0,
        "JLE" => out <= 0,
        "JMP" => true,
        _ => panic!("unknown jump `{}`", jump),
    }
}

impl Hack {
    pub fn assemble(asm: &str) -> Hack {
        let mut labels = HashMap::new();
        let mut lines = vec![];

        for raw in asm.lines() {
            let line = raw.split_once("//").map(|(s, _)| s).unwrap_or(raw).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(label) = line.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
                let previous = labels.insert(label.to_string(), lines.len());
                assert!(previous.is_none(), "duplicate label `{}`", label);
            } else {
                lines.push(line);
            }
        }

        let mut hack = Hack {
            ram: vec![0; RAM_SIZE],
            rom: vec![],
            labels,
            variables: HashMap::new(),
            pc: 0,
            a: 0,
            d: 0,
        };

        for line in lines {
            let instr = match line.strip_prefix('@') {
                Some(symbol) => Instr::A(hack.resolve(symbol)),
                None => {
                    let (rest, jump) = line.split_once(';').unwrap_or((line, ""));
                    let (dest, comp) = rest.split_once('=').unwrap_or(("", rest));
                    assert!(
                        dest.chars().all(|c| "AMD".contains(c)),
                        "bad dest in `{}`",
                        line
                    );
                    eval(comp, 0, 0, 0);
                    jumps(jump, 0);
                    Instr::C {
                        dest: dest.to_string(),
                        comp: comp.to_string(),
                        jump: jump.to_string(),
                    }
                }
            };
            hack.rom.push(instr);
        }

        hack
    }

    fn resolve(&mut self, symbol: &str) -> i16 {
        if symbol.starts_with(|c: char| c.is_ascii_digit()) {
            let value: u16 = symbol.parse().expect("numeric literal");
            assert!(value <= 0x7FFF, "literal {} too wide", value);
            return value as i16;
        }
        let addr = predefined(symbol)
            .or_else(|| self.labels.get(symbol).copied())
            .unwrap_or_else(|| {
                let next = 16 + self.variables.len();
                *self.variables.entry(symbol.to_string()).or_insert(next)
            });
        addr as i16
    }

    /// RAM address given to a variable symbol such as `Main.0`.
    pub fn variable(&self, symbol: &str) -> usize {
        self.variables[symbol]
    }

    pub fn has_variable(&self, symbol: &str) -> bool {
        self.variables.contains_key(symbol)
    }

    pub fn step(&mut self) {
        match &self.rom[self.pc] {
            Instr::A(value) => {
                self.a = *value;
                self.pc += 1;
            }
            Instr::C { dest, comp, jump } => {
                let addr = self.a as u16 as usize;
                let m = if comp.contains('M') { self.ram[addr] } else { 0 };
                let out = eval(comp, self.d, self.a, m);
                if dest.contains('M') {
                    self.ram[addr] = out;
                }
                if dest.contains('A') {
                    self.a = out;
                }
                if dest.contains('D') {
                    self.d = out;
                }
                self.pc = if jumps(jump, out) { addr } else { self.pc + 1 };
            }
        }
    }

    /// Run until execution falls off the end of the program.
    pub fn run(&mut self, max_steps: usize) {
        for _ in 0..max_steps {
            if self.pc >= self.rom.len() {
                return;
            }
            self.step();
        }
        panic!("still running after {} steps", max_steps);
    }

    /// Run until the instruction at `label` is about to execute.
    pub fn run_until(&mut self, label: &str, max_steps: usize) {
        let target = *self.labels.get(label).unwrap_or_else(|| panic!("no label `{}`", label));
        for _ in 0..max_steps {
            if self.pc == target {
                return;
            }
            assert!(self.pc < self.rom.len(), "ran off the end before `{}`", label);
            self.step();
        }
        panic!("`{}` not reached after {} steps", label, max_steps);
    }

    pub fn sp(&self) -> usize {
        self.ram[SP] as usize
    }

    /// Value on top of the stack.
    pub fn top(&self) -> i16 {
        self.ram[self.sp() - 1]
    }
}
