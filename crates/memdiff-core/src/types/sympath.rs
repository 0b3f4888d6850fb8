//! Symbolic path labels.

use std::fmt;
use std::sync::Arc;

/// Where in the object graph an address/type pair was reached
///
/// Paths are built by appending segments: `.name` for members, `[i]` for
/// elements and `*` for a pointer dereference, e.g.
/// `init_task.tasks.next*.comm`. Only the first path that reaches a given
/// `(type, address)` pair is ever reported, since later ones are deduplicated.
///
/// Cloning is cheap; every task carries its own path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymPath
{
    text: Arc<str>,
    depth: usize,
}

impl SymPath
{
    /// A root path naming a symbol
    pub fn root(name: &str) -> Self
    {
        Self {
            text: Arc::from(name),
            depth: 0,
        }
    }

    /// Path of a named member below this path
    pub fn member(&self, name: &str) -> Self
    {
        self.extend(&format!(".{name}"))
    }

    /// Path of the `index`-th element below this path
    pub fn index(&self, index: u64) -> Self
    {
        self.extend(&format!("[{index}]"))
    }

    /// Path of the object this path points at
    pub fn deref(&self) -> Self
    {
        self.extend("*")
    }

    /// Number of segments appended to the root
    pub fn depth(&self) -> usize
    {
        self.depth
    }

    /// The path as text
    pub fn as_str(&self) -> &str
    {
        &self.text
    }

    fn extend(&self, segment: &str) -> Self
    {
        let mut text = String::with_capacity(self.text.len() + segment.len());
        text.push_str(&self.text);
        text.push_str(segment);
        Self {
            text: Arc::from(text),
            depth: self.depth + 1,
        }
    }
}

impl fmt::Display for SymPath
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_path_segments()
    {
        let path = SymPath::root("init_task").member("tasks").member("next").deref().index(2);
        assert_eq!(path.as_str(), "init_task.tasks.next*[2]");
        assert_eq!(path.depth(), 4);
        assert_eq!(SymPath::root("jiffies").depth(), 0);
    }

    #[test]
    fn test_path_clone_is_independent()
    {
        let base = SymPath::root("modules");
        let child = base.member("list");
        assert_eq!(base.to_string(), "modules");
        assert_eq!(child.to_string(), "modules.list");
    }
}
