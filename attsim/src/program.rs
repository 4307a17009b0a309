use crate::error::{ParseError, SourceError};
use crate::label::LabelTable;
use crate::line::{ProgramLine, Statement};
use crate::parser::ParserSession;

/// An ordered list of parsed lines plus the parser session that produced
/// them. Line numbers always equal positions in the list.
#[derive(Debug, Clone, Default)]
pub struct Program {
    lines: Vec<ProgramLine>,
    session: ParserSession,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole source text, one statement per line. All failing
    /// lines are reported, not just the first.
    pub fn from_source(source: &str) -> Result<Self, Vec<SourceError>> {
        let mut program = Program::new();
        let mut errors = Vec::new();
        for (line, text) in source.lines().enumerate() {
            if let Err(error) = program.push_line(text) {
                errors.push(SourceError {
                    line,
                    text: text.to_string(),
                    error,
                });
                // keep numbering aligned with the source
                program.lines.push(ProgramLine {
                    number: line,
                    statement: Statement::Blank,
                    comment: None,
                    breakpoint: false,
                });
                program.session.set_line_number(program.lines.len());
            }
        }
        if errors.is_empty() {
            Ok(program)
        } else {
            Err(errors)
        }
    }

    /// Canonical text of every line, newline separated.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    pub fn push_line(&mut self, text: &str) -> Result<usize, ParseError> {
        self.session.set_line_number(self.lines.len());
        let line = self.session.parse_line(text)?;
        self.lines.push(line);
        Ok(self.lines.len() - 1)
    }

    /// Parses `text` as a new line at `index`, shifting later lines down.
    pub fn insert_line(&mut self, index: usize, text: &str) -> Result<(), ParseError> {
        let index = index.min(self.lines.len());
        self.session.set_line_number(index);
        let result = self.session.parse_line(text);
        let outcome = result.map(|line| self.lines.insert(index, line));
        self.renumber();
        outcome
    }

    pub fn remove_line(&mut self, index: usize) -> Option<ProgramLine> {
        if index >= self.lines.len() {
            return None;
        }
        let removed = self.lines.remove(index);
        self.renumber();
        Some(removed)
    }

    /// Replaces the line at `index`. On a parse error the old line is kept.
    pub fn replace_line(&mut self, index: usize, text: &str) -> Result<(), ParseError> {
        let Some(old) = self.remove_line(index) else {
            return self.insert_line(index, text);
        };
        let breakpoint = old.breakpoint;
        match self.insert_line(index, text) {
            Ok(()) => {
                self.lines[index].breakpoint = breakpoint;
                Ok(())
            }
            Err(error) => {
                self.lines.insert(index, old);
                self.renumber();
                Err(error)
            }
        }
    }

    /// Empties the program and resets the parser session.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.session.clear();
    }

    /// Flips the breakpoint flag on a line and returns the new value.
    pub fn toggle_breakpoint(&mut self, index: usize) -> bool {
        match self.lines.get_mut(index) {
            Some(line) => {
                line.breakpoint = !line.breakpoint;
                line.breakpoint
            }
            None => false,
        }
    }

    pub fn is_breakpoint(&self, index: usize) -> bool {
        self.lines.get(index).is_some_and(|line| line.breakpoint)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&ProgramLine> {
        self.lines.get(index)
    }

    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    pub fn labels(&self) -> &LabelTable {
        self.session.labels()
    }

    pub fn session(&self) -> &ParserSession {
        &self.session
    }

    /// Restores `number == index` for every line, recomputes label
    /// definitions and points the parser at the end of the program.
    fn renumber(&mut self) {
        let labels = self.session.labels_mut();
        labels.undefine_all();
        for (index, line) in self.lines.iter_mut().enumerate() {
            line.number = index;
            if let Statement::Label { id, .. } = line.statement {
                labels.define(id, index);
            }
        }
        self.session.set_line_number(self.lines.len());
    }
}
