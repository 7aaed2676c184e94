//! Conversion from the transport (deep) shape to the storage (flat) shape.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::deep::{DeepRecord, DeepSlice};
use super::record::{DataSlice, Record};
use super::value::Value;

/// Flatten a transport-shaped document into the canonical storage shape.
///
/// Every record is emitted into the result exactly once per occurrence, in
/// pre-order: a parent's reference-only field map lands before any of its
/// children. Inlined children are rewritten in place to their id, so mixed
/// multi-valued fields keep their positions. A later emission for an id that
/// already exists overwrites the earlier record wholesale; there is no field
/// merge.
///
/// The walk is iterative with an explicit work stack and a visited-id set, so
/// pathological cyclic input terminates and stack depth stays bounded. A child
/// whose id was already visited is still rewritten to a reference but not
/// descended into again.
pub fn flatten(deep: DeepSlice) -> DataSlice {
    let mut out = DataSlice::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<DeepRecord> = deep.into_records().rev().collect();

    while let Some(record) = stack.pop() {
        let (id, fields) = record.into_parts();
        visited.insert(id.as_str().to_owned());

        let mut flat: IndexMap<String, Vec<Value>> = IndexMap::with_capacity(fields.len());
        let mut children: Vec<DeepRecord> = Vec::new();

        for (predicate, values) in fields {
            let mut rewritten = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Nested(child) => {
                        rewritten.push(Value::Id(child.id().clone()));
                        if visited.insert(child.id().as_str().to_owned()) {
                            children.push(child);
                        }
                    }
                    other => rewritten.push(other),
                }
            }
            flat.insert(predicate, rewritten);
        }

        out.insert(Record::from_parts(id, flat));

        // Reverse push so the first child in document order is walked next.
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value::Id;

    fn global(iri: &str) -> Id {
        Id::Global(iri.to_owned())
    }

    fn local(name: &str) -> Id {
        Id::Local(name.to_owned())
    }

    #[test]
    fn flat_input_is_unchanged() {
        let mut record = DeepRecord::new(global("https://example.com/"));
        record
            .set_field(
                "https://schema.org/name",
                vec![Value::lang_string("Home", "en")],
            )
            .expect("regular predicate");
        let mut deep = DeepSlice::new();
        deep.insert(record.clone());

        let flat = flatten(deep);

        assert_eq!(flat.len(), 1);
        let stored = flat.get("https://example.com/").expect("root kept");
        assert_eq!(
            stored.field("https://schema.org/name").expect("readable"),
            record.field("https://schema.org/name").expect("readable")
        );
    }

    #[test]
    fn nested_record_is_extracted_and_referenced() {
        let mut child = DeepRecord::new(local("_:b1"));
        child
            .set_field(
                "https://schema.org/name",
                vec![Value::lang_string("Author", "en")],
            )
            .expect("regular predicate");

        let mut root = DeepRecord::new(global("/"));
        root.set_field("https://schema.org/author", vec![Value::Nested(child)])
            .expect("regular predicate");

        let mut deep = DeepSlice::new();
        deep.insert(root);

        let flat = flatten(deep);

        assert_eq!(flat.len(), 2);
        let parent = flat.get("/").expect("root kept");
        assert_eq!(
            parent.field("https://schema.org/author").expect("readable"),
            Some([Value::local("_:b1")].as_slice())
        );
        let extracted = flat.get("_:b1").expect("child promoted to top level");
        assert_eq!(
            extracted
                .first_meaningful("https://schema.org/name")
                .expect("readable"),
            Some(&Value::lang_string("Author", "en"))
        );
    }

    #[test]
    fn mixed_multi_valued_field_keeps_positions() {
        let child = DeepRecord::new(local("_:b1"));
        let mut root = DeepRecord::new(global("/"));
        root.set_field(
            "https://schema.org/mentions",
            vec![
                Value::global("https://example.com/a"),
                Value::Nested(child),
                Value::global("https://example.com/b"),
            ],
        )
        .expect("regular predicate");

        let mut deep = DeepSlice::new();
        deep.insert(root);

        let flat = flatten(deep);
        let parent = flat.get("/").expect("root kept");
        assert_eq!(
            parent
                .field("https://schema.org/mentions")
                .expect("readable"),
            Some(
                [
                    Value::global("https://example.com/a"),
                    Value::local("_:b1"),
                    Value::global("https://example.com/b"),
                ]
                .as_slice()
            )
        );
    }

    #[test]
    fn grandchildren_are_promoted_too() {
        let mut grandchild = DeepRecord::new(local("_:b2"));
        grandchild
            .set_field("p", vec![Value::Int(2)])
            .expect("regular predicate");
        let mut child = DeepRecord::new(local("_:b1"));
        child
            .set_field("q", vec![Value::Nested(grandchild)])
            .expect("regular predicate");
        let mut root = DeepRecord::new(global("/"));
        root.set_field("r", vec![Value::Nested(child)])
            .expect("regular predicate");

        let mut deep = DeepSlice::new();
        deep.insert(root);

        let flat = flatten(deep);
        assert_eq!(flat.len(), 3);
        assert_eq!(
            flat.get("_:b1")
                .expect("child present")
                .field("q")
                .expect("readable"),
            Some([Value::local("_:b2")].as_slice())
        );
        assert!(flat.get("_:b2").is_some());
    }

    #[test]
    fn root_record_overrides_earlier_nested_copy() {
        // `/about` appears both inlined under the root and as its own root
        // entry; the root entry is emitted later and must win wholesale.
        let mut nested_copy = DeepRecord::new(global("/about"));
        nested_copy
            .set_field("stale", vec![Value::Int(1)])
            .expect("regular predicate");
        let mut front = DeepRecord::new(global("/"));
        front
            .set_field("link", vec![Value::Nested(nested_copy)])
            .expect("regular predicate");

        let mut canonical = DeepRecord::new(global("/about"));
        canonical
            .set_field("fresh", vec![Value::Int(2)])
            .expect("regular predicate");

        let mut deep = DeepSlice::new();
        deep.insert(front);
        deep.insert(canonical);

        let flat = flatten(deep);
        let about = flat.get("/about").expect("present");
        assert!(about.field("stale").expect("readable").is_none());
        assert!(about.field("fresh").expect("readable").is_some());
    }

    #[test]
    fn cyclic_input_terminates() {
        // b references itself through an inline copy; the walk must not loop.
        let mut inner = DeepRecord::new(local("_:b1"));
        inner
            .set_field("self", vec![Value::local("_:b1")])
            .expect("regular predicate");
        let mut outer = DeepRecord::new(local("_:b1"));
        outer
            .set_field("self", vec![Value::Nested(inner)])
            .expect("regular predicate");
        let mut root = DeepRecord::new(global("/"));
        root.set_field("loop", vec![Value::Nested(outer)])
            .expect("regular predicate");

        let mut deep = DeepSlice::new();
        deep.insert(root);

        let flat = flatten(deep);
        assert_eq!(flat.len(), 2);
        assert_eq!(
            flat.get("_:b1")
                .expect("present")
                .field("self")
                .expect("readable"),
            Some([Value::local("_:b1")].as_slice())
        );
    }
}
