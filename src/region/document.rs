//! Key-path access into a region's document tree

use serde_json::{Map, Value};

/// Hierarchical document holding a region's block info
pub type Document = Map<String, Value>;

/// Section at `path`, if every node along it is a document
pub fn section<'a, S: AsRef<str>>(doc: &'a Document, path: &[S]) -> Option<&'a Document> {
    path.iter()
        .try_fold(doc, |node, segment| node.get(segment.as_ref())?.as_object())
}

/// Value at `path`
pub fn get<'a, S: AsRef<str>>(doc: &'a Document, path: &[S]) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    section(doc, parents)?.get(last.as_ref())
}

/// Write `value` at `path`, replacing any non-document node in the way
pub fn set<S: AsRef<str>>(doc: &mut Document, path: &[S], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = doc;
    for segment in parents {
        let child = node
            .entry(segment.as_ref())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        let Value::Object(map) = child else {
            return;
        };
        node = map;
    }
    node.insert(last.as_ref().to_string(), value);
}

/// Remove the node at `path`, then delete every ancestor left empty by the
/// removal. The root itself is never removed.
pub fn remove_pruned<S: AsRef<str>>(doc: &mut Document, path: &[S]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    if rest.is_empty() {
        return doc.remove(first.as_ref());
    }

    let child = doc.get_mut(first.as_ref())?.as_object_mut()?;
    let removed = remove_pruned(child, rest)?;
    if child.is_empty() {
        doc.remove(first.as_ref());
    }
    Some(removed)
}
