//! Compiled program images
//!
//! Programs are produced by an external assembler as an ordered list of
//! address -> byte entries grouped in sections. The machine only consumes
//! them: they are loaded once and never modified.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramEntry {
    pub address: u16,
    pub value: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// `.text`, `.data`, `.bss`, ...
    pub name: String,
    pub start_address: u16,
    pub entries: Vec<ProgramEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Assembler message, carried along opaque
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationMessage {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledProgram {
    pub sections: Vec<Section>,
    pub messages: Vec<CompilationMessage>,
}

impl CompiledProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single `.text` section holding `bytes` from `start_address` onwards
    pub fn from_bytes(start_address: u16, bytes: &[u8]) -> Self {
        let entries = bytes
            .iter()
            .enumerate()
            .map(|(i, value)| ProgramEntry {
                address: start_address.wrapping_add(i as u16),
                value: *value,
                comment: None,
            })
            .collect();

        Self {
            sections: vec![Section {
                name: ".text".to_string(),
                start_address,
                entries,
            }],
            messages: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Every entry of every section, in section order
    pub fn entries(&self) -> impl Iterator<Item = &ProgramEntry> {
        self.sections.iter().flat_map(|section| section.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.severity == Severity::Error)
    }
}

impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "{} @ ${:0>4X}", section.name, section.start_address)?;
            for entry in &section.entries {
                write!(f, "  ${:0>4X}: {:0>2X}", entry.address, entry.value)?;
                if let Some(comment) = &entry.comment {
                    write!(f, " ; {comment}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
