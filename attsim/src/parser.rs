//! Single-line parser for the supported AT&T subset.
//!
//! Every error carries the character range of the text it complains about
//! so front-ends can underline it.

use crate::cpu::Register;
use crate::error::{ParseError, ParseErrorKind};
use crate::instruction::{
    Condition, InstructionKind, ONE_SUFFIX, OperandRequirements, QUAD_ONLY, TWO_SUFFIX,
};
use crate::label::LabelTable;
use crate::line::{Instruction, Operands, ProgramLine, Statement};
use crate::operand::{Constant, LabelRef, MemoryOperand, Operand, Radix};
use crate::size::{OpSize, bit_length};
use crate::suggest::{suggest_mnemonic, suggest_register};
use std::ops::Range;

/// Parser state that outlives a single line: the next line number to hand
/// out and the label arena.
#[derive(Debug, Clone, Default)]
pub struct ParserSession {
    next_line: usize,
    labels: LabelTable,
}

impl ParserSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all labels and restarts numbering at zero.
    pub fn clear(&mut self) {
        self.next_line = 0;
        self.labels.clear();
    }

    /// Number the next parsed line will receive.
    pub fn set_line_number(&mut self, number: usize) {
        self.next_line = number;
    }

    pub fn line_number(&self) -> usize {
        self.next_line
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub(crate) fn labels_mut(&mut self) -> &mut LabelTable {
        &mut self.labels
    }

    /// Parses one line of source. On success the line receives the current
    /// line number and the counter advances; on failure nothing changes
    /// except that label names mentioned by the line may be interned.
    pub fn parse_line(&mut self, text: &str) -> Result<ProgramLine, ParseError> {
        let parser = LineParser {
            text,
            bytes: text.as_bytes(),
            number: self.next_line,
            labels: &mut self.labels,
        };
        let line = parser.parse().map_err(|e| to_char_offsets(text, e))?;
        self.next_line += 1;
        Ok(line)
    }
}

type Span = Range<usize>;

fn error(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> ParseError {
    ParseError::new(kind, message, span.start, span.end)
}

fn to_char_offsets(text: &str, mut err: ParseError) -> ParseError {
    let chars = |byte: usize| text.get(..byte).map_or(byte, |s| s.chars().count());
    err.start = chars(err.start);
    err.end = chars(err.end);
    err
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'.'
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Mnemonic decoded into a kind and its operand widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decoded {
    kind: InstructionKind,
    size: OpSize,
    source_size: OpSize,
}

impl Decoded {
    fn uniform(kind: InstructionKind, size: OpSize) -> Self {
        Self {
            kind,
            size,
            source_size: size,
        }
    }
}

fn condition_list() -> String {
    Condition::ALL.map(|c| c.name()).join(", ")
}

fn decode_mnemonic(mnemonic: &str) -> Result<Decoded, (ParseErrorKind, String)> {
    if mnemonic == "jmp" {
        return Ok(Decoded::uniform(InstructionKind::Jmp, OpSize::Byte));
    }
    let conditional: [(&str, fn(Condition) -> InstructionKind); 2] =
        [("set", InstructionKind::Set), ("j", InstructionKind::J)];
    for (prefix, make) in conditional {
        if let Some(cc) = mnemonic.strip_prefix(prefix) {
            return match Condition::from_name(cc) {
                Some(cc) => Ok(Decoded::uniform(make(cc), OpSize::Byte)),
                None => Err((
                    ParseErrorKind::InvalidSuffix,
                    format!(
                        "Invalid condition '{}' for {}; expected one of {}",
                        cc,
                        prefix,
                        condition_list()
                    ),
                )),
            };
        }
    }

    for kind in TWO_SUFFIX {
        let base = kind.base_name();
        let Some(rest) = mnemonic.strip_prefix(base.as_str()) else {
            continue;
        };
        let sizes: Vec<Option<OpSize>> = rest.chars().map(OpSize::from_suffix).collect();
        let [Some(source), Some(dest)] = sizes[..] else {
            return Err((
                ParseErrorKind::InvalidSuffix,
                "Need two suffixes: each one of b, w, l, or q".to_string(),
            ));
        };
        if source >= dest {
            return Err((
                ParseErrorKind::InvalidSuffix,
                "First suffix must be smaller than the second".to_string(),
            ));
        }
        return Ok(Decoded {
            kind,
            size: dest,
            source_size: source,
        });
    }

    let Some(kind) = ONE_SUFFIX
        .into_iter()
        .chain(QUAD_ONLY)
        .filter(|k| mnemonic.starts_with(k.base_name().as_str()))
        .max_by_key(|k| k.base_name().len())
    else {
        return Err((
            ParseErrorKind::InvalidMnemonic,
            format!("Unknown instruction '{}'", mnemonic),
        ));
    };
    let base = kind.base_name();
    let rest = &mnemonic[base.len()..];

    if QUAD_ONLY.contains(&kind) {
        return if rest == "q" {
            Ok(Decoded::uniform(kind, OpSize::Quad))
        } else {
            Err((
                ParseErrorKind::InvalidSuffix,
                format!("Instruction {} only takes the suffix q", base),
            ))
        };
    }

    let mut chars = rest.chars();
    match (chars.next().and_then(OpSize::from_suffix), chars.next()) {
        (Some(size), None) => Ok(Decoded::uniform(kind, size)),
        _ => Err((
            ParseErrorKind::InvalidSuffix,
            "Need one suffix: b, w, l, or q".to_string(),
        )),
    }
}

struct LineParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    number: usize,
    labels: &'a mut LabelTable,
}

impl LineParser<'_> {
    fn parse(mut self) -> Result<ProgramLine, ParseError> {
        let (body_end, comment) = match self.text.find('#') {
            Some(i) => (i, Some(self.text[i + 1..].to_string())),
            None => (self.text.len(), None),
        };
        let body = self.trim(0..body_end);
        let statement = if body.is_empty() {
            if comment.is_some() {
                Statement::Comment
            } else {
                Statement::Blank
            }
        } else {
            self.statement(body)?
        };
        Ok(ProgramLine {
            number: self.number,
            statement,
            comment,
            breakpoint: false,
        })
    }

    fn trim(&self, span: Span) -> Span {
        let mut start = span.start;
        let mut end = span.end;
        while start < end && self.bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        while end > start && self.bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        start..end
    }

    fn scan_ident(&self, start: usize, end: usize) -> usize {
        let mut pos = start;
        while pos < end && is_ident(self.bytes[pos]) {
            pos += 1;
        }
        pos
    }

    fn statement(&mut self, span: Span) -> Result<Statement, ParseError> {
        let nonsense = || {
            error(
                ParseErrorKind::Nonsense,
                "Expected an instruction or a label definition",
                span.clone(),
            )
        };
        if !is_ident_start(self.bytes[span.start]) {
            return Err(nonsense());
        }
        let word_end = self.scan_ident(span.start, span.end);
        let after = self.trim(word_end..span.end);
        if !after.is_empty() && self.bytes[after.start] == b':' {
            return self.label_definition(span.start..word_end, after.start + 1..span.end);
        }
        if word_end < span.end && !self.bytes[word_end].is_ascii_whitespace() {
            return Err(nonsense());
        }
        self.instruction(span.start..word_end, word_end..span.end)
    }

    fn label_definition(&mut self, name_span: Span, rest: Span) -> Result<Statement, ParseError> {
        let rest = self.trim(rest);
        if !rest.is_empty() {
            return Err(error(
                ParseErrorKind::TrailingGarbage,
                "Unexpected text after label definition",
                rest,
            ));
        }
        let name = &self.text[name_span.clone()];
        if let Some(reg) = Register::from_name(name) {
            return Err(error(
                ParseErrorKind::InvalidLabel,
                format!("Label '{}' has the same name as register {}", name, reg),
                name_span,
            ));
        }
        let id = self.labels.intern(name);
        if let Some(line) = self.labels.line(id) {
            return Err(error(
                ParseErrorKind::DuplicateLabel,
                format!("Label '{}' is already defined on line {}", name, line),
                name_span,
            ));
        }
        self.labels.define(id, self.number);
        Ok(Statement::Label {
            id,
            name: name.to_string(),
        })
    }

    fn instruction(&mut self, mnemonic_span: Span, rest: Span) -> Result<Statement, ParseError> {
        let mnemonic = self.text[mnemonic_span.clone()].to_ascii_lowercase();
        let spans = self.split_operands(rest)?;

        let decoded = decode_mnemonic(&mnemonic).map_err(|(kind, message)| {
            let message = match suggest_mnemonic(&mnemonic, self.register_size_hint(&spans)) {
                Some(candidate) if candidate != mnemonic => {
                    format!("{}. Did you mean {}?", message, candidate)
                }
                _ => message,
            };
            error(kind, message, mnemonic_span.clone())
        })?;

        let requirements = decoded.kind.requirements(decoded.size, decoded.source_size);
        if spans.len() != requirements.len() {
            let span = match (spans.first(), spans.last()) {
                (Some(first), Some(last)) => first.start..last.end,
                _ => mnemonic_span,
            };
            return Err(error(
                ParseErrorKind::WrongOperandCount,
                format!("{} should have {} operand(s)", mnemonic, requirements.len()),
                span,
            ));
        }
        if spans.len() == 2 && self.bytes[spans[1].start] == b'$' {
            return Err(error(
                ParseErrorKind::DestinationIsConstant,
                "destination cannot be a constant",
                spans[1].clone(),
            ));
        }

        let mut operands = Vec::with_capacity(spans.len());
        for (span, req) in spans.iter().zip(&requirements) {
            operands.push(self.operand(span.clone(), req)?);
        }
        if operands.iter().filter(|op| op.is_memory()).count() > 1 {
            return Err(error(
                ParseErrorKind::OperandMismatch,
                "At most one operand can be a memory reference",
                spans[1].clone(),
            ));
        }

        let mut operands = operands.into_iter();
        let operands = match (operands.next(), operands.next()) {
            (None, _) => Operands::Nullary,
            (Some(op), None) => Operands::Unary(op),
            (Some(source), Some(destination)) => Operands::Binary {
                source,
                destination,
            },
        };
        Ok(Statement::Instruction(Instruction {
            kind: decoded.kind,
            size: decoded.size,
            source_size: decoded.source_size,
            operands,
        }))
    }

    /// Splits on top-level commas; commas inside parentheses belong to a
    /// memory operand.
    fn split_operands(&self, rest: Span) -> Result<Vec<Span>, ParseError> {
        let rest = self.trim(rest);
        if rest.is_empty() {
            return Ok(Vec::new());
        }
        let mut pieces = Vec::new();
        let mut depth = 0i32;
        let mut start = rest.start;
        for pos in rest.clone() {
            match self.bytes[pos] {
                b'(' => depth += 1,
                b')' => depth -= 1,
                b',' if depth == 0 => {
                    pieces.push((start..pos, pos));
                    start = pos + 1;
                }
                _ => {}
            }
        }
        pieces.push((start..rest.end, rest.end.saturating_sub(1)));

        pieces
            .into_iter()
            .map(|(piece, comma)| {
                let piece = self.trim(piece);
                if piece.is_empty() {
                    Err(error(
                        ParseErrorKind::Nonsense,
                        "Expected an operand",
                        comma..comma + 1,
                    ))
                } else {
                    Ok(piece)
                }
            })
            .collect()
    }

    /// Width of the first register operand, used to rank suggestions.
    fn register_size_hint(&self, spans: &[Span]) -> Option<OpSize> {
        spans.iter().find_map(|span| {
            let text = self.text[span.clone()].strip_prefix('%')?;
            Register::from_name(text).map(|r| r.size())
        })
    }

    fn operand(&mut self, span: Span, req: &OperandRequirements) -> Result<Operand, ParseError> {
        let text = &self.text[span.clone()];
        let first = self.bytes[span.start];
        if text.contains('(') {
            self.memory_operand(span, req)
        } else if first == b'%' {
            self.register_operand(span, req)
        } else if is_ident_start(first) {
            self.label_operand(span, req)
        } else if first == b'$' {
            self.constant_operand(span, req)
        } else {
            Err(error(
                ParseErrorKind::Nonsense,
                format!("Unrecognized operand '{}'", text),
                span,
            ))
        }
    }

    /// Parses `%name` starting at `span.start`, returning the register and
    /// the end of its name.
    fn register_at(&self, span: Span) -> Result<(Register, usize), ParseError> {
        let name_end = self.scan_ident(span.start + 1, span.end);
        let name = &self.text[span.start + 1..name_end];
        if name.is_empty() {
            return Err(error(
                ParseErrorKind::InvalidRegister,
                "Expected a register name after '%'",
                span.start..span.start + 1,
            ));
        }
        match Register::from_name(name) {
            Some(reg) => Ok((reg, name_end)),
            None => {
                let mut message = format!("Invalid register '%{}'", name);
                if let Some(candidate) = suggest_register(name) {
                    message.push_str(&format!(". Did you mean {}?", candidate));
                }
                Err(error(
                    ParseErrorKind::InvalidRegister,
                    message,
                    span.start..name_end,
                ))
            }
        }
    }

    fn register_operand(
        &self,
        span: Span,
        req: &OperandRequirements,
    ) -> Result<Operand, ParseError> {
        let (reg, name_end) = self.register_at(span.clone())?;
        if name_end < span.end {
            return Err(error(
                ParseErrorKind::TrailingGarbage,
                "Unexpected text after register",
                self.trim(name_end..span.end),
            ));
        }
        if !req.register {
            return Err(error(
                ParseErrorKind::OperandMismatch,
                "This operand cannot be a register",
                span,
            ));
        }
        if reg.size() != req.size {
            return Err(error(
                ParseErrorKind::OperandMismatch,
                format!(
                    "{} is a {}-bit register but this operand must be {}-bit. Did you mean {}?",
                    reg,
                    reg.size().bits(),
                    req.size.bits(),
                    reg.with_size(req.size)
                ),
                span,
            ));
        }
        Ok(Operand::Register(reg))
    }

    fn label_operand(&mut self, span: Span, req: &OperandRequirements) -> Result<Operand, ParseError> {
        let name_end = self.scan_ident(span.start, span.end);
        if name_end < span.end {
            return Err(error(
                ParseErrorKind::TrailingGarbage,
                "Unexpected text after label",
                self.trim(name_end..span.end),
            ));
        }
        let name = &self.text[span.start..name_end];
        if !req.label {
            let message = match Register::from_name(name) {
                Some(reg) => format!("Registers need a '%' prefix. Did you mean {}?", reg),
                None => "This operand cannot be a label".to_string(),
            };
            return Err(error(ParseErrorKind::OperandMismatch, message, span));
        }
        let id = self.labels.intern(name);
        Ok(Operand::Label(LabelRef {
            id,
            name: name.to_string(),
        }))
    }

    fn constant_operand(&self, span: Span, req: &OperandRequirements) -> Result<Operand, ParseError> {
        let text = &self.text[span.clone()];
        if !req.constant {
            return Err(error(
                ParseErrorKind::OperandMismatch,
                "This operand cannot be a constant",
                span,
            ));
        }
        let body = &text[1..];
        let (negative, magnitude) = match body.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let bits = req.size.bits();
        let invalid = || {
            error(
                ParseErrorKind::InvalidConstant,
                format!("Invalid constant '{}'", text),
                span.clone(),
            )
        };
        let too_large = |needed: Option<u32>| {
            let message = match needed {
                Some(needed) => format!(
                    "Constant {} needs {} bits but this operand holds {}",
                    text, needed, bits
                ),
                None => format!("Constant {} does not fit in {} bits", text, bits),
            };
            error(ParseErrorKind::ConstantTooLarge, message, span.clone())
        };

        let (value, radix) = if let Some(hex) = magnitude
            .strip_prefix("0x")
            .or_else(|| magnitude.strip_prefix("0X"))
        {
            if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            let needed = hex.len() as u32 * 4;
            if needed > bits {
                return Err(too_large(Some(needed)));
            }
            let value = u64::from_str_radix(hex, 16).map_err(|_| invalid())? as i128;
            (value, Radix::Hex { digits: hex.len() })
        } else {
            if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let value: i128 = magnitude.parse().map_err(|_| too_large(None))?;
            let signed = if negative { -value } else { value };
            let needed = bit_length(signed) + 1;
            if needed > bits {
                return Err(too_large(Some(needed)));
            }
            (value, Radix::Decimal)
        };
        Ok(Operand::Constant(Constant {
            value: if negative { -value } else { value },
            radix,
        }))
    }

    fn memory_operand(&self, span: Span, req: &OperandRequirements) -> Result<Operand, ParseError> {
        let text = &self.text[span.clone()];
        if !req.memory {
            return Err(error(
                ParseErrorKind::OperandMismatch,
                "This operand cannot be a memory reference",
                span,
            ));
        }
        let malformed = |message: &str, at: Span| error(ParseErrorKind::InvalidMemoryOperand, message, at);

        let open = span.start + text.find('(').unwrap_or(0);
        let Some(close) = text.rfind(')').map(|i| span.start + i) else {
            return Err(malformed("Missing ')' in memory operand", span));
        };
        if close < open {
            return Err(malformed("Missing ')' in memory operand", span));
        }
        let trailing = self.trim(close + 1..span.end);
        if !trailing.is_empty() {
            return Err(error(
                ParseErrorKind::TrailingGarbage,
                "Unexpected text after memory operand",
                trailing,
            ));
        }

        let offset_span = self.trim(span.start..open);
        let offset = if offset_span.is_empty() {
            0
        } else {
            parse_displacement(&self.text[offset_span.clone()])
                .ok_or_else(|| malformed("Invalid displacement", offset_span))?
        };

        let mut parts = Vec::new();
        let mut start = open + 1;
        for pos in open + 1..close {
            if self.bytes[pos] == b',' {
                parts.push(self.trim(start..pos));
                start = pos + 1;
            }
        }
        parts.push(self.trim(start..close));
        if parts.len() > 3 {
            return Err(malformed(
                "A memory operand has the form offset(%base, %index, scale)",
                span,
            ));
        }

        let base = self.address_register(parts[0].clone(), "base", open..close + 1)?;
        let index = match parts.get(1) {
            Some(part) => Some(self.address_register(part.clone(), "index", part.clone())?),
            None => None,
        };
        let scale = match parts.get(2) {
            Some(part) => match &self.text[part.clone()] {
                "1" => 1,
                "2" => 2,
                "4" => 4,
                "8" => 8,
                _ => return Err(malformed("Scale must be 1, 2, 4, or 8", part.clone())),
            },
            None => 1,
        };
        Ok(Operand::Memory(MemoryOperand {
            offset,
            base,
            index,
            scale,
        }))
    }

    /// A 64-bit register filling all of `part`.
    fn address_register(&self, part: Span, role: &str, context: Span) -> Result<Register, ParseError> {
        if part.is_empty() || self.bytes[part.start] != b'%' {
            let at = if part.is_empty() { context } else { part };
            return Err(error(
                ParseErrorKind::InvalidMemoryOperand,
                format!("Memory operand needs a {} register", role),
                at,
            ));
        }
        let (reg, name_end) = self.register_at(part.clone())?;
        if name_end < part.end {
            return Err(error(
                ParseErrorKind::TrailingGarbage,
                "Unexpected text after register",
                self.trim(name_end..part.end),
            ));
        }
        if reg.size() != OpSize::Quad {
            return Err(error(
                ParseErrorKind::InvalidMemoryOperand,
                format!(
                    "The {} register must be 64-bit. Did you mean {}?",
                    role,
                    reg.with_size(OpSize::Quad)
                ),
                part,
            ));
        }
        Ok(reg)
    }
}

/// Signed decimal or `0x` hexadecimal displacement.
fn parse_displacement(text: &str) -> Option<i64> {
    let (negative, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match magnitude
        .strip_prefix("0x")
        .or_else(|| magnitude.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if magnitude.bytes().all(|b| b.is_ascii_digit()) => magnitude.parse().ok()?,
        None => return None,
    };
    Some(if negative { -value } else { value })
}
