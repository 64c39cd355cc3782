//! Loader for the OpenFST AT&T text format (`fstprint` output).
//!
//! Arc lines carry `src dst ilabel olabel [weight]`, final-state lines carry
//! `state [weight]`. The source state of the first line is the start state.
//! Labels must be numeric; symbol tables are supplied separately.

use std::path::Path;

use tracing::debug;

use super::{FstArc, Label, StateId, SymbolTable, Wfst, WfstBuilder, WfstError};

/// Parse an AT&T text transducer.
///
/// # Arguments
/// * `text` - Transducer in AT&T text format
/// * `isyms` - Input symbol table (acoustic units)
/// * `osyms` - Output symbol table (words)
///
/// # Errors
/// Returns a `Parse` error naming the offending line, or any validation
/// failure of the assembled automaton.
pub fn parse_att(text: &str, isyms: SymbolTable, osyms: SymbolTable) -> Result<Wfst, WfstError> {
    let mut builder = WfstBuilder::new(isyms, osyms);
    let mut start_set = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        let source = parse_field::<StateId>(fields[0], line, "state")?;
        if !start_set {
            builder.ensure_state(source);
            builder.set_start(source);
            start_set = true;
        }

        match fields.len() {
            1 | 2 => {
                let cost = match fields.get(1) {
                    Some(w) => parse_weight(w, line)?,
                    None => 0.0,
                };
                builder.set_final(source, cost);
            }
            4 | 5 => {
                let dest = parse_field::<StateId>(fields[1], line, "state")?;
                let ilabel = parse_field::<Label>(fields[2], line, "input label")?;
                let olabel = parse_field::<Label>(fields[3], line, "output label")?;
                let weight = match fields.get(4) {
                    Some(w) => parse_weight(w, line)?,
                    None => 0.0,
                };
                builder.ensure_state(dest);
                builder.add_arc(source, FstArc::new(ilabel, olabel, weight, dest));
            }
            n => {
                return Err(WfstError::Parse { line, message: format!("expected 1, 2, 4 or 5 fields, got {}", n) });
            }
        }
    }

    debug!("Parsed AT&T transducer with {} states", builder.num_states());
    builder.build()
}

/// Read an AT&T text transducer and its symbol tables from disk.
///
/// # Arguments
/// * `fst_path` - AT&T text transducer
/// * `isyms_path` - Input symbol table file
/// * `osyms_path` - Output symbol table file
pub fn read_att(fst_path: &Path, isyms_path: &Path, osyms_path: &Path) -> Result<Wfst, WfstError> {
    let isyms = SymbolTable::read(isyms_path)?;
    let osyms = SymbolTable::read(osyms_path)?;
    let text = std::fs::read_to_string(fst_path)?;
    parse_att(&text, isyms, osyms)
}

fn parse_field<T: std::str::FromStr>(field: &str, line: usize, what: &str) -> Result<T, WfstError> {
    field.parse::<T>().map_err(|_| WfstError::Parse { line, message: format!("invalid {} '{}'", what, field) })
}

/// Parse a tropical weight. OpenFST prints `Infinity` for a zero-probability
/// final weight, which means "not final" and is rejected here.
fn parse_weight(field: &str, line: usize) -> Result<f64, WfstError> {
    let weight = parse_field::<f64>(field, line, "weight")?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(WfstError::Parse { line, message: format!("weight must be finite and non-negative, got '{}'", field) });
    }
    Ok(weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfst::Automaton;

    fn tables() -> (SymbolTable, SymbolTable) {
        let isyms = SymbolTable::from_text("<eps> 0\np_1 1\np_2 2\n").unwrap();
        let osyms = SymbolTable::from_text("<eps> 0\npeter 1\n").unwrap();
        (isyms, osyms)
    }

    #[test]
    fn test_parse_att() {
        let (isyms, osyms) = tables();
        let text = "0 1 1 0 0.5\n1 1 1 0\n1 2 2 1 0.25\n2 3 0 0\n3 1.5\n";
        let fst = parse_att(text, isyms, osyms).unwrap();

        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.num_states(), 4);
        assert_eq!(fst.num_arcs(), 4);
        assert_eq!(fst.arcs(1)[1], FstArc::new(2, 1, 0.25, 2));
        assert_eq!(fst.arcs(1)[0].weight, 0.0);
        assert!(fst.arcs(2)[0].is_epsilon());
        assert_eq!(fst.final_cost(3), Some(1.5));
        assert_eq!(fst.final_cost(2), None);
    }

    #[test]
    fn test_parse_att_start_from_first_line() {
        let (isyms, osyms) = tables();
        let fst = parse_att("2 0 1 0\n0\n", isyms, osyms).unwrap();
        assert_eq!(fst.start(), Some(2));
        assert_eq!(fst.num_states(), 3);
    }

    #[test]
    fn test_parse_att_errors() {
        let (isyms, osyms) = tables();
        assert!(matches!(parse_att("0 1 1\n", isyms.clone(), osyms.clone()), Err(WfstError::Parse { line: 1, .. })));
        assert!(matches!(parse_att("0 1 1 0 x\n", isyms.clone(), osyms.clone()), Err(WfstError::Parse { line: 1, .. })));
        assert!(matches!(parse_att("0 1 1 0\n1 Infinity\n", isyms.clone(), osyms.clone()), Err(WfstError::Parse { line: 2, .. })));
        assert!(matches!(parse_att("", isyms.clone(), osyms.clone()), Err(WfstError::NoStartState)));
        assert!(matches!(parse_att("0 1 9 0\n", isyms, osyms), Err(WfstError::UnknownInputLabel(9))));
    }
}
