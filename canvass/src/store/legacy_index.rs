//! Reverse index over a stored state tree
//!
//! Answers saved by older survey versions may live under paths that do not
//! match the key they are looked up by. The index maps every object key (and
//! the last segment of dotted keys) to its full path.

use super::entry::ResponseValue;

#[derive(Debug, Clone, Default)]
pub struct LegacyIndex {
    tree: serde_json::Value,
    entries: Vec<(String, Vec<String>)>,
}

impl LegacyIndex {
    pub fn build(tree: serde_json::Value) -> Self {
        let mut entries = Vec::new();
        collect(&tree, &mut Vec::new(), &mut entries);
        Self { tree, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest path whose key matches `token`
    pub fn find(&self, token: &str) -> Option<ResponseValue> {
        self.entries
            .iter()
            .rev()
            .filter(|(key, _)| key == token)
            .find_map(|(_, path)| {
                let leaf = path
                    .iter()
                    .try_fold(&self.tree, |node, segment| node.get(segment))?;
                ResponseValue::from_json(leaf)
            })
    }
}

fn collect(
    node: &serde_json::Value,
    path: &mut Vec<String>,
    entries: &mut Vec<(String, Vec<String>)>,
) {
    let serde_json::Value::Object(map) = node else {
        return;
    };
    for (key, child) in map {
        path.push(key.clone());
        entries.push((key.clone(), path.clone()));
        if let Some((_, last)) = key.rsplit_once('.') {
            entries.push((last.to_string(), path.clone()));
        }
        collect(child, path, entries);
        path.pop();
    }
}
