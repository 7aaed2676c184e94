//! Hextuple ingestion: newline-delimited JSON six-arrays into a flat slice.
//!
//! Each line is one statement: `[subject, predicate, value, datatype,
//! language, graph]`. The graph term is accepted and ignored; the cache holds
//! a single merged view per distribution.

use super::error::DomainError;
use super::record::DataSlice;
use super::value::{Id, Value, XSD_INTEGER};

/// Datatype marker for a global (IRI-backed) reference.
pub const HEX_GLOBAL_ID: &str = "globalId";
/// Datatype marker for a local (blank-node style) reference.
pub const HEX_LOCAL_ID: &str = "localId";

const LOCAL_ID_PREFIX: &str = "_:";

type HexTuple = (String, String, String, String, String, String);

/// Parse a hextuple document into storage shape. Statements for the same
/// subject accumulate into one record, values in document order.
pub fn parse_hextuples(input: &str) -> Result<DataSlice, DomainError> {
    let mut slice = DataSlice::new();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (subject, predicate, value, datatype, language, _graph): HexTuple =
            serde_json::from_str(line).map_err(|err| {
                DomainError::validation(format!("hextuple on line {}: {err}", line_no + 1))
            })?;

        let value = decode_term(value, &datatype, &language).map_err(|err| {
            DomainError::validation(format!("hextuple on line {}: {err}", line_no + 1))
        })?;
        slice.entry(subject_id(&subject)).append_value(predicate, value)?;
    }

    Ok(slice)
}

fn subject_id(subject: &str) -> Id {
    if subject.starts_with(LOCAL_ID_PREFIX) {
        Id::Local(subject.to_owned())
    } else {
        Id::Global(subject.to_owned())
    }
}

fn decode_term(value: String, datatype: &str, language: &str) -> Result<Value, String> {
    match datatype {
        HEX_GLOBAL_ID => Ok(Value::Id(Id::Global(value))),
        HEX_LOCAL_ID => Ok(Value::Id(Id::Local(value))),
        XSD_INTEGER => value
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|err| format!("invalid integer term `{value}`: {err}")),
        _ if !language.is_empty() => Ok(Value::LangString {
            value,
            lang: language.to_owned(),
        }),
        _ => Ok(Value::Str(value)),
    }
}
