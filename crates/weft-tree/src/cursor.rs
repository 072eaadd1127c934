//! Canonical paths into the document tree.
//!
//! A [`Cursor`] is an ordered sequence of map keys and sequence indices.
//! Sequences can also be addressed by name: when a step names a list, the
//! list is searched for an element whose identifying field (`name`, `key`
//! or `id`) matches, and [`Cursor::canonicalize`] rewrites such steps to
//! numeric indices against a concrete tree.
//!
//! The textual form is dotted: `a.b.0.c`. Bracketed indices (`a.b[0].c`)
//! are accepted on input.

use std::fmt;

use weft_util::{Error, Pos, Result};

use crate::value::Value;

/// Fields that identify a named element inside a sequence.
const NAMED_FIELDS: &[&str] = &["name", "key", "id"];

/// One step of a cursor path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    /// Map key, or named sequence element.
    Key(String),
    /// Numeric sequence index.
    Index(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(k) => f.write_str(k),
            Step::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A canonical path into a document tree.
///
/// # Examples
///
/// ```
/// use weft_tree::Cursor;
///
/// let cursor = Cursor::parse("jobs[0].name").unwrap();
/// assert_eq!(cursor.to_string(), "jobs.0.name");
/// assert!(Cursor::parse("jobs").unwrap().contains(&cursor));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cursor {
    steps: Vec<Step>,
}

impl Cursor {
    /// The root cursor (empty path).
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a cursor from steps.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Parse a dotted path. Bracketed numeric indices are accepted and
    /// all-digit segments are treated as indices.
    pub fn parse(path: &str) -> Result<Self> {
        let mut steps = Vec::new();
        if path.is_empty() {
            return Ok(Self { steps });
        }
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(Error::syntax(
                    Pos::DUMMY,
                    format!("malformed reference `{}`: empty path segment", path),
                ));
            }
            let mut rest = segment;
            // Leading name part, if any, before bracketed indices.
            if let Some(bracket) = rest.find('[') {
                let head = &rest[..bracket];
                if !head.is_empty() {
                    steps.push(Self::segment_step(head));
                }
                rest = &rest[bracket..];
                while let Some(stripped) = rest.strip_prefix('[') {
                    let close = stripped.find(']').ok_or_else(|| {
                        Error::syntax(
                            Pos::DUMMY,
                            format!("malformed reference `{}`: unclosed `[`", path),
                        )
                    })?;
                    let digits = &stripped[..close];
                    let index: usize = digits.parse().map_err(|_| {
                        Error::syntax(
                            Pos::DUMMY,
                            format!("malformed reference `{}`: bad index `{}`", path, digits),
                        )
                    })?;
                    steps.push(Step::Index(index));
                    rest = &stripped[close + 1..];
                }
                if !rest.is_empty() {
                    return Err(Error::syntax(
                        Pos::DUMMY,
                        format!("malformed reference `{}`: trailing `{}`", path, rest),
                    ));
                }
            } else {
                steps.push(Self::segment_step(rest));
            }
        }
        Ok(Self { steps })
    }

    fn segment_step(segment: &str) -> Step {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            Step::Index(segment.parse().unwrap_or(0))
        } else {
            Step::Key(segment.to_string())
        }
    }

    /// The steps of this cursor.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for the root cursor.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Extend with a key step, returning the child cursor.
    pub fn child_key(&self, key: &str) -> Cursor {
        let mut steps = self.steps.clone();
        steps.push(Step::Key(key.to_string()));
        Cursor { steps }
    }

    /// Extend with an index step, returning the child cursor.
    pub fn child_index(&self, index: usize) -> Cursor {
        let mut steps = self.steps.clone();
        steps.push(Step::Index(index));
        Cursor { steps }
    }

    /// The cursor one step up, or `None` at the root.
    pub fn parent(&self) -> Option<Cursor> {
        if self.steps.is_empty() {
            None
        } else {
            Some(Cursor {
                steps: self.steps[..self.steps.len() - 1].to_vec(),
            })
        }
    }

    /// True when `other` is this cursor or lies underneath it.
    pub fn contains(&self, other: &Cursor) -> bool {
        other.steps.len() >= self.steps.len() && other.steps[..self.steps.len()] == self.steps[..]
    }

    /// True when the two cursors address overlapping subtrees.
    pub fn overlaps(&self, other: &Cursor) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Resolve against a tree, returning the addressed value.
    pub fn resolve<'a>(&self, root: &'a Value) -> Result<&'a Value> {
        let mut current = root;
        for (depth, step) in self.steps.iter().enumerate() {
            current = self.descend(current, step, depth)?;
        }
        Ok(current)
    }

    /// Rewrite named sequence steps to numeric indices against a tree.
    pub fn canonicalize(&self, root: &Value) -> Result<Cursor> {
        let mut current = root;
        let mut steps = Vec::with_capacity(self.steps.len());
        for (depth, step) in self.steps.iter().enumerate() {
            match (current, step) {
                (Value::List(items), Step::Key(name)) => {
                    let index = find_named(items, name).ok_or_else(|| self.missing(depth))?;
                    steps.push(Step::Index(index));
                    current = &items[index];
                }
                _ => {
                    current = self.descend(current, step, depth)?;
                    steps.push(step.clone());
                }
            }
        }
        Ok(Cursor { steps })
    }

    fn descend<'a>(&self, current: &'a Value, step: &Step, depth: usize) -> Result<&'a Value> {
        match (current, step) {
            (Value::Map(m), Step::Key(k)) => m.get(k).ok_or_else(|| self.missing(depth)),
            (Value::List(items), Step::Index(i)) => {
                items.get(*i).ok_or_else(|| self.missing(depth))
            }
            (Value::List(items), Step::Key(name)) => find_named(items, name)
                .map(|i| &items[i])
                .ok_or_else(|| self.missing(depth)),
            (other, _) => Err(Error::reference(
                Pos::DUMMY,
                self.prefix_string(depth),
                format!("cannot descend into {}", other.type_name()),
            )),
        }
    }

    fn missing(&self, depth: usize) -> Error {
        Error::reference(
            Pos::DUMMY,
            self.prefix_string(depth + 1),
            "could not be found in the tree".to_string(),
        )
    }

    fn prefix_string(&self, depth: usize) -> String {
        Cursor {
            steps: self.steps[..depth.min(self.steps.len())].to_vec(),
        }
        .to_string()
    }

    /// Replace the value at this cursor. Intermediate steps must exist;
    /// the final step may insert a new map key.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        if self.steps.is_empty() {
            *root = value;
            return Ok(());
        }
        let parent = self.navigate_parent(root)?;
        let last = self.steps.last().unwrap();
        match (parent, last) {
            (Value::Map(m), Step::Key(k)) => {
                m.insert(k.clone(), value);
                Ok(())
            }
            (Value::List(items), Step::Index(i)) if *i < items.len() => {
                items[*i] = value;
                Ok(())
            }
            (Value::List(items), Step::Key(name)) => {
                let index = find_named(items, name)
                    .ok_or_else(|| self.missing(self.steps.len() - 1))?;
                items[index] = value;
                Ok(())
            }
            _ => Err(self.missing(self.steps.len() - 1)),
        }
    }

    /// Remove the value at this cursor.
    pub fn delete(&self, root: &mut Value) -> Result<()> {
        if self.steps.is_empty() {
            *root = Value::Null;
            return Ok(());
        }
        let parent = self.navigate_parent(root)?;
        let last = self.steps.last().unwrap();
        match (parent, last) {
            (Value::Map(m), Step::Key(k)) => {
                m.shift_remove(k)
                    .map(|_| ())
                    .ok_or_else(|| self.missing(self.steps.len() - 1))
            }
            (Value::List(items), Step::Index(i)) if *i < items.len() => {
                items.remove(*i);
                Ok(())
            }
            _ => Err(self.missing(self.steps.len() - 1)),
        }
    }

    fn navigate_parent<'a>(&self, root: &'a mut Value) -> Result<&'a mut Value> {
        let mut current = root;
        for (depth, step) in self.steps[..self.steps.len() - 1].iter().enumerate() {
            // Named list steps need an index probe before the mutable borrow.
            let index = match (&*current, step) {
                (Value::List(items), Step::Key(name)) => {
                    Some(find_named(items, name).ok_or_else(|| self.missing(depth))?)
                }
                _ => None,
            };
            current = match (current, step, index) {
                (Value::Map(m), Step::Key(k), _) => {
                    m.get_mut(k).ok_or_else(|| self.missing(depth))?
                }
                (Value::List(items), Step::Index(i), _) => {
                    items.get_mut(*i).ok_or_else(|| self.missing(depth))?
                }
                (Value::List(items), Step::Key(_), Some(i)) => &mut items[i],
                (other, _, _) => {
                    return Err(Error::reference(
                        Pos::DUMMY,
                        self.prefix_string(depth),
                        format!("cannot descend into {}", other.type_name()),
                    ))
                }
            };
        }
        Ok(current)
    }
}

/// Search a sequence for an element identified by `name`.
fn find_named(items: &[Value], name: &str) -> Option<usize> {
    for field in NAMED_FIELDS {
        for (i, item) in items.iter().enumerate() {
            if let Value::Map(m) = item {
                if let Some(Value::String(s)) = m.get(*field) {
                    if s == name {
                        return Some(i);
                    }
                }
            }
        }
    }
    None
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("$");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn tree() -> Value {
        serde_yaml::from_str(
            r#"
meta:
  env: prod
jobs:
  - name: web
    port: 80
  - name: worker
    port: 0
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_dotted() {
        let c = Cursor::parse("a.b.c").unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.to_string(), "a.b.c");
    }

    #[test]
    fn test_parse_bracketed_index() {
        let c = Cursor::parse("jobs[0].name").unwrap();
        assert_eq!(
            c.steps(),
            &[
                Step::Key("jobs".into()),
                Step::Index(0),
                Step::Key("name".into())
            ]
        );
        assert_eq!(c.to_string(), "jobs.0.name");
    }

    #[test]
    fn test_parse_digit_segment_is_index() {
        let c = Cursor::parse("jobs.1.port").unwrap();
        assert_eq!(c.steps()[1], Step::Index(1));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Cursor::parse("a..b").is_err());
        assert!(Cursor::parse("a[x]").is_err());
        assert!(Cursor::parse("a[0").is_err());
    }

    #[test]
    fn test_resolve() {
        let t = tree();
        let v = Cursor::parse("meta.env").unwrap().resolve(&t).unwrap();
        assert_eq!(v, &Value::from("prod"));

        let v = Cursor::parse("jobs.1.port").unwrap().resolve(&t).unwrap();
        assert_eq!(v, &Value::Int(0));
    }

    #[test]
    fn test_resolve_named_index() {
        let t = tree();
        let v = Cursor::parse("jobs.worker.port")
            .unwrap()
            .resolve(&t)
            .unwrap();
        assert_eq!(v, &Value::Int(0));
    }

    #[test]
    fn test_resolve_missing() {
        let t = tree();
        let err = Cursor::parse("meta.region").unwrap().resolve(&t);
        assert!(err.is_err());
    }

    #[test]
    fn test_canonicalize_named_index() {
        let t = tree();
        let c = Cursor::parse("jobs.web.port").unwrap().canonicalize(&t).unwrap();
        assert_eq!(c.to_string(), "jobs.0.port");
    }

    #[test]
    fn test_contains() {
        let outer = Cursor::parse("jobs").unwrap();
        let inner = Cursor::parse("jobs.0.name").unwrap();
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
        assert!(!Cursor::parse("meta").unwrap().overlaps(&outer));
    }

    #[test]
    fn test_set_and_delete() {
        let mut t = tree();
        Cursor::parse("meta.env")
            .unwrap()
            .set(&mut t, Value::from("dev"))
            .unwrap();
        assert_eq!(
            Cursor::parse("meta.env").unwrap().resolve(&t).unwrap(),
            &Value::from("dev")
        );

        Cursor::parse("meta.env").unwrap().delete(&mut t).unwrap();
        assert!(Cursor::parse("meta.env").unwrap().resolve(&t).is_err());
    }

    #[test]
    fn test_set_new_map_key() {
        let mut t = Value::Map(IndexMap::new());
        Cursor::parse("fresh")
            .unwrap()
            .set(&mut t, Value::Int(1))
            .unwrap();
        assert_eq!(
            Cursor::parse("fresh").unwrap().resolve(&t).unwrap(),
            &Value::Int(1)
        );
    }

    #[test]
    fn test_root_display() {
        assert_eq!(Cursor::root().to_string(), "$");
    }
}
