//! Streaming text parser.
//!
//! Reads a module line by line, tracking the current function and block.
//! Temp names are interned to dense integer ids on first definition; later
//! uses resolve through that map and unknown names produce a located parse
//! diagnostic. Call result types are resolved against callee signatures in a
//! post-pass so forward intra-module calls parse cleanly.

use crate::block::{BasicBlock, Param};
use crate::func::Function;
use crate::instr::Instr;
use crate::module::{Extern, Global, Module};
use crate::opcode::{Opcode, ResultRule};
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;
use viper_support::{Diag, Expected, SourceLoc};

/// One token scanned out of a line.
#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// Bare identifier (mnemonics, labels, type names, keywords).
    Ident(String),
    /// `%name` temp reference.
    Percent(String),
    /// `@name` symbol reference.
    At(String),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    LParen,
    RParen,
    Comma,
    Colon,
    Eq,
    Arrow,
    LBrace,
    RBrace,
}

/// Token plus the 1-based column it started at.
type Spanned = (Tok, u32);

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    file_id: u32,
    line: u32,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str, file_id: u32, line_no: u32) -> Self {
        Lexer {
            bytes: line.as_bytes(),
            pos: 0,
            file_id,
            line: line_no,
        }
    }

    fn loc(&self, col: u32) -> SourceLoc {
        SourceLoc::new(self.file_id, self.line, col)
    }

    fn err(&self, col: u32, msg: impl Into<String>) -> Diag {
        Diag::error(msg, self.loc(col))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn ident_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-'
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() && Self::ident_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn read_string(&mut self, col: u32) -> Result<Vec<u8>, Diag> {
        // Opening quote already consumed.
        let mut out = Vec::new();
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            match b {
                b'"' => return Ok(out),
                b'\\' => {
                    let esc = *self
                        .bytes
                        .get(self.pos)
                        .ok_or_else(|| self.err(col, "unterminated escape in string literal"))?;
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b't' => out.push(b'\t'),
                        b'\\' => out.push(b'\\'),
                        b'"' => out.push(b'"'),
                        b'x' => {
                            let hex = self
                                .bytes
                                .get(self.pos..self.pos + 2)
                                .and_then(|h| std::str::from_utf8(h).ok())
                                .and_then(|h| u8::from_str_radix(h, 16).ok())
                                .ok_or_else(|| self.err(col, "invalid \\x escape"))?;
                            self.pos += 2;
                            out.push(hex);
                        }
                        b'0'..=b'7' => {
                            // Up to three octal digits, first already read.
                            let mut value = (esc - b'0') as u32;
                            for _ in 0..2 {
                                match self.bytes.get(self.pos) {
                                    Some(&d) if d.is_ascii_digit() && d < b'8' => {
                                        value = value * 8 + (d - b'0') as u32;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            if value > 255 {
                                return Err(self.err(col, "octal escape out of range"));
                            }
                            out.push(value as u8);
                        }
                        other => {
                            return Err(self.err(
                                col,
                                format!("unknown escape '\\{}'", other as char),
                            ));
                        }
                    }
                }
                _ => out.push(b),
            }
        }
        Err(self.err(col, "unterminated string literal"))
    }

    fn read_number(&mut self, col: u32) -> Result<Tok, Diag> {
        let start = self.pos;
        if self.bytes[self.pos] == b'-' {
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b'0')
            && matches!(self.bytes.get(self.pos + 1), Some(b'x') | Some(b'X'))
        {
            self.pos += 2;
            let digits_start = self.pos;
            while self
                .bytes
                .get(self.pos)
                .is_some_and(|b| b.is_ascii_hexdigit())
            {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&self.bytes[digits_start..self.pos]).unwrap();
            let mag = u64::from_str_radix(digits, 16)
                .map_err(|_| self.err(col, "invalid hex literal"))?;
            let value = if self.bytes[start] == b'-' {
                (mag as i64).wrapping_neg()
            } else {
                mag as i64
            };
            return Ok(Tok::Int(value));
        }
        let mut is_float = false;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' | b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'+' | b'-' if is_float => self.pos += 1,
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.err(col, format!("invalid float literal '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| self.err(col, format!("invalid integer literal '{}'", text)))
        }
    }

    /// Scan the next token, or `None` at end of line.
    fn next(&mut self) -> Result<Option<Spanned>, Diag> {
        self.skip_ws();
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let col = self.pos as u32 + 1;
        let b = self.bytes[self.pos];
        let tok = match b {
            b'(' => {
                self.pos += 1;
                Tok::LParen
            }
            b')' => {
                self.pos += 1;
                Tok::RParen
            }
            b',' => {
                self.pos += 1;
                Tok::Comma
            }
            b':' => {
                self.pos += 1;
                Tok::Colon
            }
            b'=' => {
                self.pos += 1;
                Tok::Eq
            }
            b'{' => {
                self.pos += 1;
                Tok::LBrace
            }
            b'}' => {
                self.pos += 1;
                Tok::RBrace
            }
            b'%' => {
                self.pos += 1;
                Tok::Percent(self.read_ident())
            }
            b'@' => {
                self.pos += 1;
                Tok::At(self.read_ident())
            }
            b'"' => {
                self.pos += 1;
                Tok::Str(self.read_string(col)?)
            }
            b'-' => {
                if self.bytes.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Tok::Arrow
                } else {
                    self.read_number(col)?
                }
            }
            b'0'..=b'9' => self.read_number(col)?,
            _ if Lexer::ident_byte(b) => Tok::Ident(self.read_ident()),
            other => {
                return Err(self.err(col, format!("unexpected character '{}'", other as char)));
            }
        };
        Ok(Some((tok, col)))
    }
}

/// Token stream over one line with single-token lookahead.
struct Cursor<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Option<Spanned>>,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str, file_id: u32, line_no: u32) -> Self {
        Cursor {
            lexer: Lexer::new(line, file_id, line_no),
            peeked: None,
        }
    }

    fn loc(&self) -> SourceLoc {
        self.lexer.loc(self.lexer.pos as u32 + 1)
    }

    fn err(&self, msg: impl Into<String>) -> Diag {
        Diag::error(msg, self.loc())
    }

    fn peek(&mut self) -> Result<Option<&Spanned>, Diag> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next()?);
        }
        Ok(self.peeked.as_ref().unwrap().as_ref())
    }

    fn next(&mut self) -> Result<Option<Spanned>, Diag> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next(),
        }
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), Diag> {
        match self.next()? {
            Some((tok, _)) if tok == want => Ok(()),
            _ => Err(self.err(format!("expected {}", what))),
        }
    }

    fn expect_type(&mut self) -> Result<Type, Diag> {
        match self.next()? {
            Some((Tok::Ident(name), col)) => Type::parse(&name).ok_or_else(|| {
                Diag::error(format!("unknown type '{}'", name), self.lexer.loc(col))
            }),
            _ => Err(self.err("expected type")),
        }
    }

    fn at_end(&mut self) -> Result<bool, Diag> {
        Ok(self.peek()?.is_none())
    }
}

/// Per-function parse state: temp name interning and inferred temp types.
#[derive(Default)]
struct FuncState {
    temp_ids: HashMap<String, u32>,
    temp_types: HashMap<u32, Type>,
    next_temp: u32,
}

impl FuncState {
    fn define(&mut self, name: &str, ty: Type) -> u32 {
        if let Some(&id) = self.temp_ids.get(name) {
            // Redefinition: keep the id, the verifier reports the duplicate.
            self.temp_types.insert(id, ty);
            return id;
        }
        let id = self.next_temp;
        self.next_temp += 1;
        self.temp_ids.insert(name.to_string(), id);
        self.temp_types.insert(id, ty);
        id
    }

    fn resolve(&self, name: &str) -> Option<u32> {
        self.temp_ids.get(name).copied()
    }

    fn type_of(&self, value: &Value) -> Type {
        match value {
            Value::Temp(id) => self.temp_types.get(id).copied().unwrap_or(Type::I64),
            Value::ConstInt(_) => Type::I64,
            Value::ConstFloat(_) => Type::F64,
            Value::ConstStr(_) => Type::Str,
            Value::GlobalAddr(_) | Value::NullPtr => Type::Ptr,
        }
    }
}

struct Parser {
    module: Module,
    file_id: u32,
    state: FuncState,
    in_function: bool,
    have_block: bool,
}

impl Parser {
    fn new(file_id: u32) -> Self {
        Parser {
            module: Module::new(),
            file_id,
            state: FuncState::default(),
            in_function: false,
            have_block: false,
        }
    }

    fn cur_func(&mut self) -> &mut Function {
        self.module.functions.last_mut().expect("active function")
    }

    fn cur_block(&mut self) -> &mut BasicBlock {
        self.cur_func().blocks.last_mut().expect("active block")
    }

    fn parse_value(&self, cur: &mut Cursor<'_>) -> Result<Value, Diag> {
        match cur.next()? {
            Some((Tok::Percent(name), col)) => match self.state.resolve(&name) {
                Some(id) => Ok(Value::Temp(id)),
                None => Err(Diag::error(
                    format!("unknown temp '%{}'", name),
                    SourceLoc::new(self.file_id, cur.lexer.line, col),
                )),
            },
            Some((Tok::At(name), _)) => Ok(Value::GlobalAddr(name)),
            Some((Tok::Int(v), _)) => Ok(Value::ConstInt(v)),
            Some((Tok::Float(v), _)) => Ok(Value::ConstFloat(v)),
            Some((Tok::Str(bytes), col)) => String::from_utf8(bytes)
                .map(Value::ConstStr)
                .map_err(|_| {
                    Diag::error(
                        "string operand is not valid UTF-8",
                        SourceLoc::new(self.file_id, cur.lexer.line, col),
                    )
                }),
            Some((Tok::Ident(word), _)) if word == "null" => Ok(Value::NullPtr),
            _ => Err(cur.err("expected operand")),
        }
    }

    /// Comma-separated values until end of line or an unconsumed `)`.
    fn parse_value_list(&self, cur: &mut Cursor<'_>, until_paren: bool) -> Result<Vec<Value>, Diag> {
        let mut values = Vec::new();
        loop {
            match cur.peek()? {
                None => break,
                Some((Tok::RParen, _)) if until_paren => {
                    cur.next()?;
                    break;
                }
                _ => {}
            }
            values.push(self.parse_value(cur)?);
            match cur.peek()? {
                Some((Tok::Comma, _)) => {
                    cur.next()?;
                }
                Some((Tok::RParen, _)) if until_paren => {
                    cur.next()?;
                    break;
                }
                _ => break,
            }
        }
        Ok(values)
    }

    /// Branch target: optional `label` keyword, target name, optional `(args)`.
    fn parse_target(&self, cur: &mut Cursor<'_>) -> Result<(String, Vec<Value>), Diag> {
        let name = match cur.next()? {
            Some((Tok::Ident(word), _)) if word == "label" => match cur.next()? {
                Some((Tok::Ident(name), _)) => name,
                _ => return Err(cur.err("expected label name")),
            },
            Some((Tok::Ident(name), _)) => name,
            _ => return Err(cur.err("expected label")),
        };
        let args = if matches!(cur.peek()?, Some((Tok::LParen, _))) {
            cur.next()?;
            self.parse_value_list(cur, true)?
        } else {
            Vec::new()
        };
        Ok((name, args))
    }

    fn parse_extern(&mut self, cur: &mut Cursor<'_>) -> Result<(), Diag> {
        let name = match cur.next()? {
            Some((Tok::At(name), _)) => name,
            _ => return Err(cur.err("expected '@name' after 'extern'")),
        };
        cur.expect(Tok::LParen, "'('")?;
        let mut params = Vec::new();
        loop {
            match cur.peek()? {
                Some((Tok::RParen, _)) => {
                    cur.next()?;
                    break;
                }
                _ => {
                    params.push(cur.expect_type()?);
                    if matches!(cur.peek()?, Some((Tok::Comma, _))) {
                        cur.next()?;
                    }
                }
            }
        }
        cur.expect(Tok::Arrow, "'->'")?;
        let ret = cur.expect_type()?;
        self.module.externs.push(Extern::new(name, ret, params));
        Ok(())
    }

    fn parse_global(&mut self, cur: &mut Cursor<'_>) -> Result<(), Diag> {
        // global const? <ty> @name = "bytes"
        if matches!(cur.peek()?, Some((Tok::Ident(w), _)) if w == "const") {
            cur.next()?;
        }
        let ty = cur.expect_type()?;
        let name = match cur.next()? {
            Some((Tok::At(name), _)) => name,
            _ => return Err(cur.err("expected '@name' in global")),
        };
        cur.expect(Tok::Eq, "'='")?;
        let init = match cur.next()? {
            Some((Tok::Str(bytes), _)) => bytes,
            _ => return Err(cur.err("expected string initializer")),
        };
        self.module.globals.push(Global::new(name, ty, init));
        Ok(())
    }

    fn parse_func_header(&mut self, cur: &mut Cursor<'_>) -> Result<(), Diag> {
        let name = match cur.next()? {
            Some((Tok::At(name), _)) => name,
            _ => return Err(cur.err("expected '@name' after 'func'")),
        };
        cur.expect(Tok::LParen, "'('")?;
        self.state = FuncState::default();
        let mut params = Vec::new();
        loop {
            match cur.peek()? {
                Some((Tok::RParen, _)) => {
                    cur.next()?;
                    break;
                }
                _ => {
                    let ty = cur.expect_type()?;
                    let pname = match cur.next()? {
                        Some((Tok::Percent(pname), _)) => pname,
                        _ => return Err(cur.err("expected '%name' parameter")),
                    };
                    let id = self.state.define(&pname, ty);
                    params.push(Param::new(pname, ty, id));
                    if matches!(cur.peek()?, Some((Tok::Comma, _))) {
                        cur.next()?;
                    }
                }
            }
        }
        cur.expect(Tok::Arrow, "'->'")?;
        let ret = cur.expect_type()?;
        cur.expect(Tok::LBrace, "'{'")?;
        self.module.functions.push(Function::new(name, ret, params));
        self.in_function = true;
        self.have_block = false;
        Ok(())
    }

    /// Try to read the line as a block header; `None` means "not a header".
    fn try_parse_block_header(&mut self, line: &str, line_no: u32) -> Result<Option<()>, Diag> {
        let mut cur = Cursor::new(line, self.file_id, line_no);
        let label = match cur.next()? {
            Some((Tok::Ident(name), _)) => name,
            _ => return Ok(None),
        };
        let mut params = Vec::new();
        match cur.peek()? {
            Some((Tok::Colon, _)) => {
                cur.next()?;
            }
            Some((Tok::LParen, _)) => {
                cur.next()?;
                loop {
                    match cur.peek()? {
                        Some((Tok::RParen, _)) => {
                            cur.next()?;
                            break;
                        }
                        Some((Tok::Percent(_), _)) => {
                            let Some((Tok::Percent(pname), _)) = cur.next()? else {
                                unreachable!()
                            };
                            cur.expect(Tok::Colon, "':' after block parameter name")?;
                            let ty = cur.expect_type()?;
                            params.push((pname, ty));
                            if matches!(cur.peek()?, Some((Tok::Comma, _))) {
                                cur.next()?;
                            }
                        }
                        _ => return Ok(None),
                    }
                }
                cur.expect(Tok::Colon, "':' after block header")?;
            }
            _ => return Ok(None),
        }
        if !cur.at_end()? {
            return Ok(None);
        }
        let params: Vec<Param> = params
            .into_iter()
            .map(|(name, ty)| {
                let id = self.state.define(&name, ty);
                Param::new(name, ty, id)
            })
            .collect();
        self.cur_func().blocks.push(BasicBlock::with_params(label, params));
        self.have_block = true;
        Ok(Some(()))
    }

    fn parse_instruction(&mut self, line: &str, line_no: u32) -> Result<(), Diag> {
        let mut cur = Cursor::new(line, self.file_id, line_no);
        let loc = SourceLoc::new(self.file_id, line_no, 1);

        // Optional `%name =` result prefix.
        let mut result_name = None;
        if let Some((Tok::Percent(_), _)) = cur.peek()? {
            let Some((Tok::Percent(name), _)) = cur.next()? else {
                unreachable!()
            };
            cur.expect(Tok::Eq, "'=' after result temp")?;
            result_name = Some(name);
        }

        let (mnemonic, op_col) = match cur.next()? {
            Some((Tok::Ident(m), col)) => (m, col),
            _ => return Err(cur.err("expected opcode mnemonic")),
        };
        let op = Opcode::parse(&mnemonic).ok_or_else(|| {
            Diag::error(
                format!("unknown opcode '{}'", mnemonic),
                SourceLoc::new(self.file_id, line_no, op_col),
            )
        })?;

        let mut instr = Instr::new(op);
        instr.loc = loc;

        match op {
            Opcode::Call => {
                let callee = match cur.next()? {
                    Some((Tok::At(name), _)) => name,
                    _ => return Err(cur.err("expected '@callee' after 'call'")),
                };
                cur.expect(Tok::LParen, "'('")?;
                instr.operands = self.parse_value_list(&mut cur, true)?;
                instr.callee = Some(callee);
                // Result type resolved against the callee in a post-pass.
            }
            Opcode::Load => {
                instr.ty = cur.expect_type()?;
                cur.expect(Tok::Comma, "','")?;
                instr.operands.push(self.parse_value(&mut cur)?);
            }
            Opcode::Store => {
                instr.ty = cur.expect_type()?;
                cur.expect(Tok::Comma, "','")?;
                instr.operands.push(self.parse_value(&mut cur)?);
                cur.expect(Tok::Comma, "','")?;
                instr.operands.push(self.parse_value(&mut cur)?);
            }
            Opcode::Zext1 => {
                instr.ty = cur.expect_type()?;
                cur.expect(Tok::Comma, "','")?;
                instr.operands.push(self.parse_value(&mut cur)?);
            }
            Opcode::ConstNull => {
                instr.ty = cur.expect_type()?;
            }
            Opcode::Br => {
                let (label, args) = self.parse_target(&mut cur)?;
                instr.labels.push(label);
                instr.br_args.push(args);
            }
            Opcode::CBr => {
                instr.operands.push(self.parse_value(&mut cur)?);
                cur.expect(Tok::Comma, "','")?;
                let (then_label, then_args) = self.parse_target(&mut cur)?;
                cur.expect(Tok::Comma, "','")?;
                let (else_label, else_args) = self.parse_target(&mut cur)?;
                instr.labels.push(then_label);
                instr.labels.push(else_label);
                instr.br_args.push(then_args);
                instr.br_args.push(else_args);
            }
            Opcode::EhPush => {
                let (label, _) = self.parse_target(&mut cur)?;
                instr.labels.push(label);
            }
            Opcode::ResumeLabel => {
                instr.operands.push(self.parse_value(&mut cur)?);
                cur.expect(Tok::Comma, "','")?;
                let (label, args) = self.parse_target(&mut cur)?;
                instr.labels.push(label);
                instr.br_args.push(args);
            }
            _ => {
                instr.operands = self.parse_value_list(&mut cur, false)?;
            }
        }

        if !cur.at_end()? {
            return Err(cur.err(format!("trailing tokens after '{}'", mnemonic)));
        }

        // Infer the instruction type from the signature where the text does
        // not spell it explicitly.
        let sig = op.signature();
        match sig.result {
            ResultRule::Exact(ty) => instr.ty = ty,
            ResultRule::SameAsOperand => {
                instr.ty = instr
                    .operands
                    .first()
                    .map(|v| self.state.type_of(v))
                    .unwrap_or(Type::I64);
            }
            ResultRule::FromInstrType | ResultRule::FromCallee | ResultRule::None => {}
        }

        if let Some(name) = result_name {
            let ty = instr.ty;
            instr.result = Some(self.state.define(&name, ty));
        }

        if !self.have_block {
            return Err(Diag::error(
                "instruction outside block",
                SourceLoc::new(self.file_id, line_no, 1),
            ));
        }
        self.cur_block().push(instr);
        Ok(())
    }

    /// Resolve call result types now that every declaration is known.
    fn resolve_call_types(&mut self) {
        let externs: HashMap<String, Type> = self
            .module
            .externs
            .iter()
            .map(|e| (e.name.clone(), e.ret_type))
            .collect();
        let funcs: HashMap<String, Type> = self
            .module
            .functions
            .iter()
            .map(|f| (f.name.clone(), f.ret_type))
            .collect();
        for func in &mut self.module.functions {
            for block in &mut func.blocks {
                for instr in &mut block.instructions {
                    if instr.op != Opcode::Call {
                        continue;
                    }
                    if let Some(callee) = &instr.callee {
                        if let Some(&ty) =
                            externs.get(callee).or_else(|| funcs.get(callee))
                        {
                            instr.ty = ty;
                        }
                    }
                }
            }
        }
    }
}

/// Parse IL text into a module.
///
/// `file_id` is stamped into every diagnostic and instruction location.
/// CRLF input is tolerated; `;` starts a comment outside string literals.
pub fn parse_module(text: &str, file_id: u32) -> Expected<Module> {
    let mut parser = Parser::new(file_id);
    let mut saw_header = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let line = strip_comment(raw_line.trim_end_matches('\r'));
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !parser.in_function {
            let mut cur = Cursor::new(line, file_id, line_no);
            match cur.next()? {
                Some((Tok::Ident(word), _)) if word == "il" => {
                    if saw_header || !parser.module.externs.is_empty()
                        || !parser.module.functions.is_empty()
                    {
                        return Err(Diag::error(
                            "misplaced 'il' header",
                            SourceLoc::new(file_id, line_no, 1),
                        ));
                    }
                    match cur.next()? {
                        Some((Tok::Float(v), _)) if v == 0.1 => {}
                        _ => {
                            return Err(Diag::error(
                                "unsupported IL version (expected 'il 0.1')",
                                SourceLoc::new(file_id, line_no, 1),
                            ));
                        }
                    }
                    saw_header = true;
                }
                Some((Tok::Ident(word), _)) if word == "extern" => {
                    parser.parse_extern(&mut cur)?;
                }
                Some((Tok::Ident(word), _)) if word == "global" => {
                    parser.parse_global(&mut cur)?;
                }
                Some((Tok::Ident(word), _)) if word == "func" => {
                    parser.parse_func_header(&mut cur)?;
                }
                _ => {
                    return Err(Diag::error(
                        format!("unexpected line: {}", line),
                        SourceLoc::new(file_id, line_no, 1),
                    ));
                }
            }
        } else if line == "}" {
            parser.in_function = false;
            parser.have_block = false;
        } else if parser.try_parse_block_header(line, line_no)?.is_some() {
            // Block header consumed.
        } else {
            parser.parse_instruction(line, line_no)?;
        }
    }

    if parser.in_function {
        return Err(Diag::error(
            "unterminated function at end of input",
            SourceLoc::new(file_id, text.lines().count() as u32, 1),
        ));
    }

    parser.resolve_call_types();
    Ok(parser.module)
}

/// Strip a `;` comment, respecting string literals.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'\\' if in_string => i += 1,
            b';' if !in_string => return &line[..i],
            _ => {}
        }
        i += 1;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_module() {
        let text = "il 0.1\nfunc @main() -> i64 {\nentry:\n  ret 0\n}\n";
        let m = parse_module(text, 1).expect("parse");
        assert_eq!(m.functions.len(), 1);
        assert_eq!(m.functions[0].blocks[0].instructions.len(), 1);
        assert_eq!(m.functions[0].blocks[0].instructions[0].op, Opcode::Ret);
    }

    #[test]
    fn test_header_is_optional() {
        let text = "func @main() -> void {\nentry:\n  ret\n}\n";
        assert!(parse_module(text, 1).is_ok());
    }

    #[test]
    fn test_parse_extern_and_global() {
        let text = "extern @rt_len(str) -> i64\nglobal const str @msg = \"hi\\n\"\n";
        let m = parse_module(text, 1).expect("parse");
        assert_eq!(m.externs[0].params, vec![Type::Str]);
        assert_eq!(m.globals[0].init, b"hi\n");
    }

    #[test]
    fn test_octal_escape_in_global() {
        let text = "global const str @g = \"\\012A\"\n";
        let m = parse_module(text, 1).expect("parse");
        assert_eq!(m.globals[0].init, b"\nA");
    }

    #[test]
    fn test_temp_names_intern_densely() {
        let text = "func @f(i64 %a) -> i64 {\nentry:\n  %sum = add %a, 1\n  %twice = add %sum, %sum\n  ret %twice\n}\n";
        let m = parse_module(text, 1).expect("parse");
        let block = &m.functions[0].blocks[0];
        assert_eq!(block.instructions[0].result, Some(1));
        assert_eq!(block.instructions[1].result, Some(2));
        assert_eq!(block.instructions[1].operands, vec![Value::Temp(1), Value::Temp(1)]);
    }

    #[test]
    fn test_unknown_temp_is_located_diagnostic() {
        let text = "func @f() -> i64 {\nentry:\n  %x = add %missing, 1\n  ret %x\n}\n";
        let err = parse_module(text, 7).unwrap_err();
        assert!(err.message.contains("unknown temp '%missing'"));
        assert_eq!(err.loc.file_id, 7);
        assert_eq!(err.loc.line, 3);
        assert!(err.loc.column > 0);
    }

    #[test]
    fn test_parse_block_params_and_branch_args() {
        let text = "func @f() -> i64 {\nentry:\n  br body(1)\nbody(%n: i64):\n  ret %n\n}\n";
        let m = parse_module(text, 1).expect("parse");
        let f = &m.functions[0];
        assert_eq!(f.blocks[0].instructions[0].br_args[0], vec![Value::ConstInt(1)]);
        assert_eq!(f.blocks[1].params[0].ty, Type::I64);
        assert_eq!(f.blocks[1].params[0].id, 0);
    }

    #[test]
    fn test_parse_accepts_label_keyword() {
        let text = "func @f() -> void {\nentry:\n  br label done\ndone:\n  ret\n}\n";
        let m = parse_module(text, 1).expect("parse");
        assert_eq!(m.functions[0].blocks[0].instructions[0].labels[0], "done");
    }

    #[test]
    fn test_parse_cbr_with_args() {
        let text = "func @f(i1 %c) -> i64 {\nentry:\n  cbr %c, a(1), b(2)\na(%x: i64):\n  ret %x\nb(%y: i64):\n  ret %y\n}\n";
        let m = parse_module(text, 1).expect("parse");
        let cbr = &m.functions[0].blocks[0].instructions[0];
        assert_eq!(cbr.labels, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cbr.br_args[1], vec![Value::ConstInt(2)]);
    }

    #[test]
    fn test_forward_call_type_resolved() {
        let text = "func @main() -> i64 {\nentry:\n  %r = call @helper()\n  ret %r\n}\nfunc @helper() -> i64 {\nentry:\n  ret 5\n}\n";
        let m = parse_module(text, 1).expect("parse");
        assert_eq!(m.functions[0].blocks[0].instructions[0].ty, Type::I64);
    }

    #[test]
    fn test_comments_and_crlf_tolerated() {
        let text = "il 0.1\r\n; a comment\nfunc @main() -> i64 { ; trailing\nentry:\n  ret 0 ; done\n}\n";
        assert!(parse_module(text, 1).is_ok());
    }

    #[test]
    fn test_eh_syntax() {
        let text = concat!(
            "func @main() -> i64 {\n",
            "entry:\n",
            "  eh.push handler\n",
            "  br body\n",
            "body:\n",
            "  %r = sdiv.chk0 10, 0\n",
            "  eh.pop\n",
            "  ret 42\n",
            "handler(%err: error, %tok: resume_tok):\n",
            "  resume.next %tok\n",
            "}\n"
        );
        let m = parse_module(text, 1).expect("parse");
        let f = &m.functions[0];
        assert_eq!(f.blocks[2].params.len(), 2);
        assert_eq!(f.blocks[2].instructions[0].op, Opcode::ResumeNext);
        assert_eq!(f.blocks[0].instructions[0].labels[0], "handler");
    }

    #[test]
    fn test_unknown_opcode_diagnosed() {
        let text = "func @f() -> void {\nentry:\n  frobnicate 1\n}\n";
        let err = parse_module(text, 1).unwrap_err();
        assert!(err.message.contains("unknown opcode"));
    }

    #[test]
    fn test_hex_literals() {
        let text = "func @f() -> i64 {\nentry:\n  %x = add 0x10, 0\n  ret %x\n}\n";
        let m = parse_module(text, 1).expect("parse");
        assert_eq!(
            m.functions[0].blocks[0].instructions[0].operands[0],
            Value::ConstInt(16)
        );
    }
}
