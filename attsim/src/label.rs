/// Handle into a [`LabelTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(usize);

impl LabelId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelEntry {
    name: String,
    line: Option<usize>,
}

/// Arena of every label name seen by the parser, defined or not.
///
/// Ids are stable for the lifetime of the table, so operands that mention a
/// label before its definition resolve once the definition is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, allocating an undefined entry the first time.
    pub fn intern(&mut self, name: &str) -> LabelId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        self.entries.push(LabelEntry {
            name: name.to_string(),
            line: None,
        });
        LabelId(self.entries.len() - 1)
    }

    pub fn lookup(&self, name: &str) -> Option<LabelId> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(LabelId)
    }

    pub fn name(&self, id: LabelId) -> &str {
        self.entries.get(id.0).map_or("", |e| e.name.as_str())
    }

    /// Line defining the label, if any.
    pub fn line(&self, id: LabelId) -> Option<usize> {
        self.entries.get(id.0).and_then(|e| e.line)
    }

    pub fn is_defined(&self, id: LabelId) -> bool {
        self.line(id).is_some()
    }

    pub fn define(&mut self, id: LabelId, line: usize) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.line = Some(line);
        }
    }

    /// Forgets every definition but keeps the ids.
    pub fn undefine_all(&mut self) {
        for entry in &mut self.entries {
            entry.line = None;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Defined labels as `(name, line)`, in definition order of the arena.
    pub fn defined(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.line.map(|line| (e.name.as_str(), line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reference_resolves_after_definition() {
        let mut labels = LabelTable::new();
        let id = labels.intern("loop");
        assert_eq!(labels.line(id), None);

        let loop_id = labels.intern("loop");
        labels.define(loop_id, 4);
        assert_eq!(labels.line(id), Some(4));
        assert_eq!(labels.name(id), "loop");
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_undefine_keeps_ids() {
        let mut labels = LabelTable::new();
        let a = labels.intern("a");
        labels.define(a, 0);
        labels.undefine_all();
        assert!(!labels.is_defined(a));
        assert_eq!(labels.lookup("a"), Some(a));
        assert_eq!(labels.defined().count(), 0);
    }
}
