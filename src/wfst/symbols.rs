//! Symbol tables mapping labels to strings (OpenFST text format).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{EPSILON, Label, WfstError};

/// Epsilon symbol name used by OpenFST tables.
pub const EPSILON_SYMBOL: &str = "<eps>";

/// Bidirectional label <-> symbol mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    by_label: BTreeMap<Label, String>,
    by_symbol: HashMap<String, Label>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding only `<eps>` at label 0.
    pub fn with_epsilon() -> Self {
        let mut table = Self::new();
        table.by_label.insert(EPSILON, EPSILON_SYMBOL.to_string());
        table.by_symbol.insert(EPSILON_SYMBOL.to_string(), EPSILON);
        table
    }

    /// Add a symbol at the next free label, or return its existing label.
    pub fn add_symbol(&mut self, symbol: &str) -> Label {
        if let Some(&label) = self.by_symbol.get(symbol) {
            return label;
        }
        let label = self.by_label.keys().next_back().map_or(0, |&max| max + 1);
        self.by_label.insert(label, symbol.to_string());
        self.by_symbol.insert(symbol.to_string(), label);
        label
    }

    /// Add a symbol at an explicit label.
    ///
    /// # Errors
    /// Returns `DuplicateSymbol` if either the symbol or the label is already bound.
    pub fn add_pair(&mut self, symbol: &str, label: Label) -> Result<(), WfstError> {
        if self.by_symbol.contains_key(symbol) || self.by_label.contains_key(&label) {
            return Err(WfstError::DuplicateSymbol(symbol.to_string()));
        }
        self.by_label.insert(label, symbol.to_string());
        self.by_symbol.insert(symbol.to_string(), label);
        Ok(())
    }

    /// Look up the symbol for a label.
    pub fn find_symbol(&self, label: Label) -> Option<&str> {
        self.by_label.get(&label).map(String::as_str)
    }

    /// Look up the label for a symbol.
    pub fn find_label(&self, symbol: &str) -> Option<Label> {
        self.by_symbol.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Iterate `(label, symbol)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &str)> {
        self.by_label.iter().map(|(&label, symbol)| (label, symbol.as_str()))
    }

    /// Parse a table from OpenFST text: one `symbol label` pair per line.
    pub fn from_text(text: &str) -> Result<Self, WfstError> {
        let mut table = Self::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [] => continue,
                [symbol, label] => {
                    let label = label.parse::<Label>().map_err(|_| WfstError::Parse { line: line_no, message: format!("invalid label '{}'", label) })?;
                    table.add_pair(symbol, label)?;
                }
                _ => {
                    return Err(WfstError::Parse { line: line_no, message: format!("expected 'symbol label', got '{}'", line.trim()) });
                }
            }
        }
        Ok(table)
    }

    /// Read a table from an OpenFST text file.
    pub fn read(path: &Path) -> Result<Self, WfstError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text)
    }
}
