//! Parsing of Majiro assembly text.
use mjo_isa::{
    Flags, Instruction, InvertMode, MjoType, Modifier, OperandKind, Scope, Target, by_mnemonic, opcode,
};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{map, map_opt, map_res, not, opt, recognize, value},
    error::{ErrorKind, FromExternalError, ParseError},
    multi::{many0, many0_count, separated_list0, separated_list1},
    number::complete::float,
    sequence::{delimited, pair, preceded, terminated, tuple},
};


/// Parse failure with the input remaining where it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError<'a> {
    pub input: &'a str,
    pub message: String,
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self {
            input,
            message: format!("unexpected input ({})", kind.description()),
        }
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        // keep whichever got further
        if other.input.len() <= self.input.len() { other } else { self }
    }
}

impl<'a, E: std::fmt::Display> FromExternalError<&'a str, E> for SyntaxError<'a> {
    fn from_external_error(input: &'a str, _: ErrorKind, e: E) -> Self {
        Self {
            input,
            message: e.to_string(),
        }
    }
}

type Res<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

fn failure<'a, O>(input: &'a str, message: impl Into<String>) -> Res<'a, O> {
    Err(nom::Err::Failure(SyntaxError {
        input,
        message: message.into(),
    }))
}

/// Promote a recoverable error to a failure with a better message.
fn expect<'a, O>(
    mut parser: impl FnMut(&'a str) -> Res<'a, O>,
    what: &'static str,
) -> impl FnMut(&'a str) -> Res<'a, O> {
    move |i: &'a str| match parser(i) {
        Err(nom::Err::Error(e)) => Err(nom::Err::Failure(SyntaxError {
            input: e.input,
            message: format!("expected {what}"),
        })),
        other => other,
    }
}

// Tokens

/// Whitespace and `;` comments.
fn ws(i: &str) -> Res<()> {
    value(
        (),
        many0_count(alt((multispace1, recognize(pair(char(';'), not_line_ending))))),
    )(i)
}

fn lex<'a, O>(parser: impl FnMut(&'a str) -> Res<'a, O>) -> impl FnMut(&'a str) -> Res<'a, O> {
    preceded(ws, parser)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@')
}

fn ident(i: &str) -> Res<&str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("."), tag("@")))),
    ))(i)
}

/// A keyword that is not the prefix of a longer word.
fn kw<'a>(word: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    terminated(tag_no_case(word), not(satisfy(is_word_char)))
}

fn hex32(i: &str) -> Res<u32> {
    map_res(hex_digit1, |s| u32::from_str_radix(s, 16))(i)
}

pub(crate) fn hash(i: &str) -> Res<u32> {
    preceded(char('$'), hex32)(i)
}

/// Decimal, `0x` hex or `$` hex integer, ending at a word boundary.
fn int(i: &str) -> Res<i64> {
    let number = alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |s| i64::from_str_radix(s, 16)),
        map_res(preceded(char('$'), hex_digit1), |s| i64::from_str_radix(s, 16)),
        map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| s.parse::<i64>()),
    ));
    terminated(number, not(satisfy(|c| is_word_char(c) || c == ':')))(i)
}

/// 32-bit value; unsigned spellings above `i32::MAX` wrap.
fn int32(i: &str) -> Res<i32> {
    map_opt(int, |v| {
        i32::try_from(v)
            .ok()
            .or_else(|| u32::try_from(v).ok().map(|u| u as i32))
    })(i)
}

fn string_lit(i: &str) -> Res<String> {
    let (rest, _) = char('"')(i)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    loop {
        match chars.next() {
            None => return failure(i, "unterminated string"),
            Some((n, '"')) => return Ok((&rest[n + 1..], out)),
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, c)) => out.push(c),
                None => return failure(i, "unterminated string"),
            },
            Some((_, c)) => out.push(c),
        }
    }
}

/// `%{key}`
fn external_key(i: &str) -> Res<&str> {
    delimited(tag("%{"), recognize(many0_count(satisfy(|c| c != '}' && c != '\n'))), char('}'))(i)
}

fn mjo_type(i: &str) -> Res<MjoType> {
    map_opt(ident, MjoType::from_keyword)(i)
}

fn type_list<'a>(open: char, close: char) -> impl FnMut(&'a str) -> Res<'a, Vec<MjoType>> {
    delimited(
        lex(char(open)),
        separated_list0(lex(char(',')), lex(mjo_type)),
        expect(lex(char(close)), "closing bracket of type list"),
    )
}

fn flags(mut i: &str) -> Res<Flags> {
    let mut ty = MjoType::Int;
    let mut scope = Scope::Persistent;
    let mut modifier = Modifier::None;
    let mut invert = InvertMode::None;
    let mut dimension = 0;
    while let Ok((rest, word)) = lex(ident)(i) {
        if let Some(t) = MjoType::from_keyword(word) {
            ty = t;
        } else if let Some(s) = Scope::from_keyword(word) {
            scope = s;
        } else if let Some(m) = Modifier::from_keyword(word) {
            modifier = m;
        } else if let Some(v) = InvertMode::from_keyword(word) {
            invert = v;
        } else if let Some(d) = dim_keyword(word) {
            dimension = d;
        } else {
            break;
        }
        i = rest;
    }
    Ok((i, Flags::new(ty, scope, modifier, invert, dimension)))
}

fn dim_keyword(word: &str) -> Option<u8> {
    match word.to_ascii_lowercase().as_str() {
        "dim1" => Some(1),
        "dim2" => Some(2),
        "dim3" => Some(3),
        _ => None,
    }
}

/// A branch reference: `@label`, or `@~hex`, `@~+hex`, `@~-hex` relative to
/// the end of the operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ref<'a> {
    Label(&'a str),
    Relative(i32),
}

fn reference(i: &str) -> Res<Ref> {
    let relative = preceded(
        char('~'),
        alt((
            map_opt(preceded(char('+'), hex32), |v| i32::try_from(v).ok()),
            map_opt(preceded(char('-'), hex32), |v| i32::try_from(v).ok().map(|v| -v)),
            map(hex32, |v| v as i32),
        )),
    );
    preceded(
        lex(char('@')),
        expect(alt((map(relative, Ref::Relative), map(ident, Ref::Label))), "label or relative offset"),
    )(i)
}

// Instruction parsing

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Form {
    /// Function/block text; branches name labels.
    Graph,
    /// Flat listing; branches are relative offsets.
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedInstruction<'a> {
    pub insn: Instruction,
    /// Branch labels in operand order, graph form only.
    pub labels: Vec<&'a str>,
}

fn resolve_ref<'a>(form: Form, at: &'a str, r: Ref<'a>, labels: &mut Vec<&'a str>) -> Result<Target, nom::Err<SyntaxError<'a>>> {
    match (form, r) {
        (Form::Graph, Ref::Label(name)) => {
            labels.push(name);
            Ok(Target::Block(labels.len() - 1))
        }
        (Form::List, Ref::Relative(d)) => Ok(Target::Offset(d)),
        (Form::Graph, Ref::Relative(_)) => Err(nom::Err::Failure(SyntaxError {
            input: at,
            message: "relative branch in function form; use a label".into(),
        })),
        (Form::List, Ref::Label(name)) => Err(nom::Err::Failure(SyntaxError {
            input: at,
            message: format!("label `{name}` in listing form; use a relative offset"),
        })),
    }
}

/// One instruction: mnemonic, then its operands in encoding order.
///
/// In graph form, branch targets are provisional `Target::Block` indices
/// into [`ParsedInstruction::labels`].
pub(crate) fn instruction<'a>(form: Form) -> impl FnMut(&'a str) -> Res<'a, ParsedInstruction<'a>> {
    move |i: &'a str| {
        let (i, _) = ws(i)?;
        let start = i;
        let (mut i, name) = ident(i)?;
        let op = if name == "phi" {
            opcode::phi()
        } else {
            match by_mnemonic(name) {
                Ok(op) => op,
                Err(_) => return failure(start, format!("unknown mnemonic `{name}`")),
            }
        };
        let mut insn = Instruction::new(op);
        let mut labels = Vec::new();

        for &kind in op.operands() {
            let at = i;
            i = match kind {
                OperandKind::TypeList => {
                    let (rest, types) = expect(type_list('[', ']'), "type list")(i)?;
                    insn.type_list = types;
                    rest
                }
                OperandKind::String => {
                    let (rest, _) = ws(i)?;
                    if let Ok((after, key)) = external_key(rest) {
                        if form == Form::List {
                            return failure(rest, "externalized string in listing form");
                        }
                        insn.external_key = Some(key.to_string());
                        after
                    } else {
                        let (rest, s) = expect(string_lit, "string literal")(rest)?;
                        insn.string = Some(s);
                        rest
                    }
                }
                OperandKind::Flags => {
                    let (rest, f) = flags(i)?;
                    insn.flags = f;
                    rest
                }
                OperandKind::Hash => {
                    let (rest, h) = expect(lex(hash), "hash")(i)?;
                    insn.hash = h;
                    rest
                }
                OperandKind::VarOffset => match lex(int)(i) {
                    Ok((rest, v)) => match i16::try_from(v) {
                        Ok(v) => {
                            insn.var_offset = v;
                            rest
                        }
                        Err(_) => return failure(at, format!("variable offset {v} out of range")),
                    },
                    Err(nom::Err::Error(_)) if insn.flags.scope() != Scope::Local => {
                        insn.var_offset = -1;
                        i
                    }
                    Err(_) => return failure(at, "expected variable offset"),
                },
                OperandKind::Reserved => i,
                OperandKind::Int => {
                    let (rest, v) = expect(lex(int32), "integer")(i)?;
                    insn.int_value = v;
                    rest
                }
                OperandKind::Float => {
                    let (rest, v) = expect(lex(float), "float")(i)?;
                    insn.float_value = v;
                    rest
                }
                OperandKind::ArgCount => {
                    let count = map_res(lex(digit1), |s: &str| s.parse::<u16>());
                    let (rest, n) = expect(delimited(lex(char('(')), count, lex(char(')'))), "(argument count)")(i)?;
                    insn.arg_count = n;
                    rest
                }
                OperandKind::Jump => {
                    let (rest, r) = expect(reference, "branch target")(i)?;
                    insn.jump = Some(resolve_ref(form, at, r, &mut labels)?);
                    rest
                }
                OperandKind::Line => {
                    let number = map_res(digit1, |s: &str| s.parse::<u16>());
                    let (rest, n) = expect(preceded(lex(char('#')), number), "#line")(i)?;
                    insn.line_number = n;
                    rest
                }
                OperandKind::Switch => {
                    let (rest, refs) = expect(separated_list1(lex(char(',')), reference), "case targets")(i)?;
                    for r in refs {
                        let target = resolve_ref(form, at, r, &mut labels)?;
                        insn.switch_cases.push(target);
                    }
                    rest
                }
                OperandKind::Phi => {
                    let (rest, _) = separated_list0(lex(char(',')), preceded(lex(char('@')), ident))(i)?;
                    rest
                }
            };
        }
        Ok((i, ParsedInstruction { insn, labels }))
    }
}

// Structural parsing

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedBlock<'a> {
    pub label: &'a str,
    pub instructions: Vec<ParsedInstruction<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedFunction<'a> {
    pub hash: u32,
    pub parameter_types: Vec<MjoType>,
    pub is_entry: bool,
    pub blocks: Vec<ParsedBlock<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexLine {
    pub hash: u32,
    pub offset: u32,
    pub is_entry: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Body<'a> {
    Graph(Vec<ParsedFunction<'a>>),
    List {
        index: Vec<IndexLine>,
        instructions: Vec<(u32, ParsedInstruction<'a>)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Document<'a> {
    pub read_mark: bool,
    pub body: Body<'a>,
}

fn read_mark(i: &str) -> Res<bool> {
    preceded(
        lex(kw("readmark")),
        expect(
            lex(alt((
                value(true, alt((kw("enabled"), kw("enable")))),
                value(false, alt((kw("disabled"), kw("disable")))),
            ))),
            "enable or disable",
        ),
    )(i)
}

fn entry_marker(i: &str) -> Res<bool> {
    map(opt(lex(alt((kw("entrypoint"), kw("entry"))))), |m| m.is_some())(i)
}

fn label_def(i: &str) -> Res<&str> {
    terminated(lex(ident), lex(char(':')))(i)
}

fn block(i: &str) -> Res<ParsedBlock> {
    let (mut i, label) = label_def(i)?;
    let mut instructions = Vec::new();
    while label_def(i).is_err() && lex(char::<_, SyntaxError>('}'))(i).is_err() {
        let (rest, insn) = expect(instruction(Form::Graph), "instruction")(i)?;
        instructions.push(insn);
        i = rest;
    }
    Ok((i, ParsedBlock { label, instructions }))
}

fn function(i: &str) -> Res<ParsedFunction> {
    let (i, _) = lex(kw("func"))(i)?;
    let (i, (hash, parameter_types, is_entry)) = tuple((
        expect(lex(hash), "function hash"),
        expect(type_list('(', ')'), "parameter list"),
        entry_marker,
    ))(i)?;
    let (i, blocks) = delimited(
        expect(lex(char('{')), "`{`"),
        many0(block),
        expect(lex(char('}')), "label or `}`"),
    )(i)?;
    Ok((
        i,
        ParsedFunction {
            hash,
            parameter_types,
            is_entry,
            blocks,
        },
    ))
}

fn index_line(i: &str) -> Res<IndexLine> {
    let offset = map_opt(int, |v| u32::try_from(v).ok());
    map(
        preceded(
            lex(kw("index")),
            tuple((expect(lex(hash), "function hash"), expect(lex(offset), "offset"), entry_marker)),
        ),
        |(hash, offset, is_entry)| IndexLine { hash, offset, is_entry },
    )(i)
}

fn address_line(i: &str) -> Res<(u32, ParsedInstruction)> {
    pair(
        terminated(lex(hex32), char(':')),
        expect(instruction(Form::List), "instruction"),
    )(i)
}

/// A complete document in either form.
pub(crate) fn document(i: &str) -> Res<Document> {
    let (i, read_mark) = map(opt(read_mark), |r| r.unwrap_or(true))(i)?;
    let (i, body) = if lex(kw("func"))(i).is_ok() {
        map(many0(function), Body::Graph)(i)?
    } else {
        map(pair(many0(index_line), many0(address_line)), |(index, instructions)| Body::List {
            index,
            instructions,
        })(i)?
    };
    let (i, _) = ws(i)?;
    if !i.is_empty() {
        return failure(i, "unexpected input");
    }
    Ok((i, Document { read_mark, body }))
}
