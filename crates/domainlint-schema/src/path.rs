use std::fmt;

use serde::{Serialize, Serializer};

/// One step from a parent container to a child value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Root-relative location of a value inside a document.
///
/// Displays as `session_config.session_expiration_time` or `actions[1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocPath(Vec<PathSegment>);

impl DocPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn child(&self, segment: PathSegment) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty() || key.contains(['.', '[', ']', '"', ' '])
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    if needs_quoting(key) {
                        write!(f, "{key:?}")?;
                    } else {
                        f.write_str(key)?;
                    }
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for DocPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_keys_and_indices() {
        let path = DocPath::root()
            .child(PathSegment::Key("entities".into()))
            .child(PathSegment::Index(0))
            .child(PathSegment::Key("roles".into()));
        assert_eq!(path.to_string(), "entities[0].roles");
    }

    #[test]
    fn root_and_quoted_keys() {
        assert_eq!(DocPath::root().to_string(), "<root>");
        let path = DocPath::root()
            .child(PathSegment::Key("slots".into()))
            .child(PathSegment::Key("a.b".into()));
        assert_eq!(path.to_string(), "slots.\"a.b\"");
    }

    #[test]
    fn serializes_as_string() {
        let path = DocPath::root().child(PathSegment::Key("actions".into()));
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"actions\"");
    }
}
