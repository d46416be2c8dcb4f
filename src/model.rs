use std::fmt;

/// Handle to an entry stored in a [`PlayTree`](crate::tree::PlayTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    #[default]
    Container,
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EntryFlags(u8);

impl EntryFlags {
    pub const NONE: Self = Self(0);
    pub const RANDOM: Self = Self(1 << 0);
    pub const RANDOM_PLAYED: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub(crate) kind: EntryKind,
    pub(crate) parent: Option<EntryId>,
    pub(crate) child: Option<EntryId>,
    pub(crate) prev: Option<EntryId>,
    pub(crate) next: Option<EntryId>,
    pub(crate) files: Vec<String>,
    pub(crate) params: Vec<Param>,
    pub(crate) flags: EntryFlags,
    pub(crate) loop_count: i32,
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn child(&self) -> Option<EntryId> {
        self.child
    }

    pub fn prev(&self) -> Option<EntryId> {
        self.prev
    }

    pub fn next(&self) -> Option<EntryId> {
        self.next
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Last parameter registered under `name`, compared case-insensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|param| param.name.eq_ignore_ascii_case(name))
            .map(|param| param.value.as_str())
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Repeat count: `0` plays once, `n > 0` adds `n` passes, negative loops forever.
    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Entry,
    Node,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterMode {
    #[default]
    Normal,
    Random,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_insert_and_remove() {
        let mut flags = EntryFlags::NONE;
        flags.insert(EntryFlags::RANDOM | EntryFlags::RANDOM_PLAYED);
        assert!(flags.contains(EntryFlags::RANDOM));
        flags.remove(EntryFlags::RANDOM);
        assert!(!flags.contains(EntryFlags::RANDOM));
        assert!(flags.contains(EntryFlags::RANDOM_PLAYED));
        assert!(!flags.contains(EntryFlags::NONE));
    }

    #[test]
    fn param_lookup_is_case_insensitive_and_prefers_last() {
        let entry = Entry {
            params: vec![Param::new("Volume", "10"), Param::new("volume", "20")],
            ..Entry::default()
        };
        assert_eq!(entry.param("VOLUME"), Some("20"));
        assert_eq!(entry.param("speed"), None);
    }
}
