use crate::error::{Error, Result};
use crate::model::{Entry, EntryFlags, EntryId, EntryKind, Param};
use std::ops::Index;
use tracing::{debug, error, warn};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Arena holding every entry of one or more playlist trees.
#[derive(Debug, Default)]
pub struct PlayTree {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
}

impl PlayTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> EntryId {
        self.live += 1;
        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(Entry::default());
            return EntryId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(Entry::default()),
        });
        EntryId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn node_mut(&mut self, id: EntryId) -> &mut Entry {
        match self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
        {
            Some(entry) => entry,
            None => panic!("stale entry handle {id}"),
        }
    }

    pub fn first_sibling(&self, id: EntryId) -> EntryId {
        let mut iter = id;
        while let Some(prev) = self[iter].prev {
            iter = prev;
        }
        iter
    }

    pub fn last_sibling(&self, id: EntryId) -> EntryId {
        let mut iter = id;
        while let Some(next) = self[iter].next {
            iter = next;
        }
        iter
    }

    pub fn siblings(&self, id: EntryId) -> Chain<'_> {
        Chain {
            tree: self,
            next: Some(self.first_sibling(id)),
        }
    }

    pub fn children(&self, id: EntryId) -> Chain<'_> {
        Chain {
            tree: self,
            next: self[id].child,
        }
    }

    pub fn append(&mut self, chain: EntryId, entry: EntryId) {
        if chain == entry {
            return;
        }
        self.remove(entry);

        let tail = self.last_sibling(chain);
        let parent = self[tail].parent;
        let node = self.node_mut(entry);
        node.parent = parent;
        node.prev = Some(tail);
        node.next = None;
        self.node_mut(tail).next = Some(entry);
    }

    pub fn prepend(&mut self, chain: EntryId, entry: EntryId) {
        if chain == entry {
            return;
        }
        self.remove(entry);

        let head = self.first_sibling(chain);
        let parent = self[head].parent;
        let node = self.node_mut(entry);
        node.prev = None;
        node.next = Some(head);
        node.parent = parent;
        self.node_mut(head).prev = Some(entry);

        if let Some(parent) = parent {
            debug_assert_eq!(self[parent].child, Some(head));
            self.node_mut(parent).child = Some(entry);
        }
    }

    pub fn insert_after(&mut self, at: EntryId, entry: EntryId) {
        if at == entry {
            return;
        }
        self.remove(entry);

        let parent = self[at].parent;
        let next = self[at].next;
        let node = self.node_mut(entry);
        node.parent = parent;
        node.prev = Some(at);
        node.next = next;
        if let Some(next) = next {
            debug_assert_eq!(self[next].prev, Some(at));
            self.node_mut(next).prev = Some(entry);
        }
        self.node_mut(at).next = Some(entry);
    }

    pub(crate) fn relink_children(&mut self, container: EntryId, order: &[EntryId]) {
        let mut prev = None;
        for (position, &member) in order.iter().enumerate() {
            let node = self.node_mut(member);
            node.prev = prev;
            node.next = order.get(position + 1).copied();
            prev = Some(member);
        }
        self.node_mut(container).child = order.first().copied();
    }

    pub fn remove(&mut self, id: EntryId) {
        let (prev, next, parent) = {
            let entry = &self[id];
            (entry.prev, entry.next, entry.parent)
        };

        match (prev, next) {
            (Some(prev), Some(next)) => {
                self.node_mut(prev).next = Some(next);
                self.node_mut(next).prev = Some(prev);
            }
            (Some(prev), None) => {
                self.node_mut(prev).next = None;
            }
            (None, next) => {
                if let Some(next) = next {
                    self.node_mut(next).prev = None;
                }
                if let Some(parent) = parent {
                    debug_assert_eq!(self[parent].child, Some(id));
                    self.node_mut(parent).child = next;
                }
            }
        }

        let node = self.node_mut(id);
        node.prev = None;
        node.next = None;
        node.parent = None;
    }

    /// Unlinks and releases `id`.
    ///
    /// With `with_children` the whole subtree goes too; otherwise the
    /// children survive as a detached chain with no parent.
    pub fn free(&mut self, id: EntryId, with_children: bool) {
        if with_children {
            let mut iter = self[id].child;
            while let Some(child) = iter {
                iter = self[child].next;
                self.free(child, true);
            }
            self.node_mut(id).child = None;
        }

        self.remove(id);

        let mut iter = self[id].child;
        while let Some(child) = iter {
            let node = self.node_mut(child);
            node.parent = None;
            iter = node.next;
        }

        let slot = &mut self.slots[id.index as usize];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        self.live -= 1;
    }

    pub fn free_list(&mut self, id: EntryId, with_children: bool) {
        let members: Vec<EntryId> = self.siblings(id).collect();
        for member in members {
            self.free(member, with_children);
        }
    }

    /// Replaces the children of `container` with the chain holding `chain`.
    ///
    /// The previous children are detached, not freed.
    pub fn set_child(&mut self, container: EntryId, chain: EntryId) -> Result<()> {
        if self[container].kind != EntryKind::Container {
            return Err(Error::NotAContainer(container));
        }
        if self.siblings(chain).any(|member| member == container) {
            return Err(Error::SelfReference(container));
        }

        let mut iter = self[container].child;
        while let Some(child) = iter {
            let node = self.node_mut(child);
            node.parent = None;
            iter = node.next;
        }

        let head = self.first_sibling(chain);
        if let Some(previous) = self[head].parent {
            if previous != container && self[previous].child == Some(head) {
                self.node_mut(previous).child = None;
            }
        }

        self.node_mut(container).child = Some(head);
        let mut iter = Some(head);
        while let Some(member) = iter {
            let node = self.node_mut(member);
            node.parent = Some(container);
            iter = node.next;
        }
        Ok(())
    }

    pub fn set_parent(&mut self, entry: EntryId, parent: EntryId) -> Result<()> {
        if let Some(old) = self[entry].parent {
            if old != parent {
                self.node_mut(old).child = None;
            }
        }
        self.set_child(parent, entry)
    }

    pub fn add_file(&mut self, id: EntryId, file: impl Into<String>) -> Result<()> {
        if self[id].child.is_some() {
            warn!(entry = %id, "refusing to add a file to an entry with children");
            return Err(Error::HasChildren(id));
        }

        let node = self.node_mut(id);
        if let Err(err) = node.files.try_reserve(1) {
            error!(entry = %id, "can't grow file list: {err}");
            return Err(err.into());
        }
        node.files.push(file.into());
        node.kind = EntryKind::Leaf;
        Ok(())
    }

    pub fn remove_file(&mut self, id: EntryId, file: &str) -> Result<bool> {
        if self[id].kind != EntryKind::Leaf {
            return Err(Error::NotALeaf(id));
        }

        let node = self.node_mut(id);
        let Some(position) = node.files.iter().rposition(|candidate| candidate == file) else {
            return Ok(false);
        };
        node.files.remove(position);
        if node.files.is_empty() {
            node.files = Vec::new();
        }
        Ok(true)
    }

    pub fn set_param(
        &mut self,
        id: EntryId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let node = self.node_mut(id);
        if let Err(err) = node.params.try_reserve(1) {
            error!(entry = %id, "can't grow parameter list: {err}");
            return Err(err.into());
        }
        node.params.push(Param::new(name, value));
        Ok(())
    }

    pub fn unset_param(&mut self, id: EntryId, name: &str) -> Result<()> {
        let node = self.node_mut(id);
        if node.params.is_empty() {
            return Err(Error::NoParams(id));
        }

        let Some(position) = node
            .params
            .iter()
            .rposition(|param| param.name.eq_ignore_ascii_case(name))
        else {
            return Err(Error::ParamNotFound(name.to_string()));
        };
        node.params.remove(position);
        if node.params.is_empty() {
            node.params = Vec::new();
        }
        Ok(())
    }

    pub fn set_params_from(&mut self, dest: EntryId, src: EntryId) -> Result<()> {
        let params = self[src].params.clone();
        let random = self[src].flags.contains(EntryFlags::RANDOM);

        for param in params {
            self.set_param(dest, param.name, param.value)?;
        }
        if random {
            self.node_mut(dest).flags.insert(EntryFlags::RANDOM);
        }
        Ok(())
    }

    pub fn insert_flags(&mut self, id: EntryId, flags: EntryFlags) {
        self.node_mut(id).flags.insert(flags);
    }

    /// Clears `flags` on `id` and on its descendants down to `depth` levels.
    /// A negative depth means the whole subtree.
    pub fn unset_flag(&mut self, id: EntryId, flags: EntryFlags, depth: i32) {
        self.node_mut(id).flags.remove(flags);

        if depth == 0 {
            return;
        }
        let depth = if depth > 0 { depth - 1 } else { depth };
        let mut iter = self[id].child;
        while let Some(child) = iter {
            self.unset_flag(child, flags, depth);
            iter = self[child].next;
        }
    }

    pub fn set_loop(&mut self, id: EntryId, loop_count: i32) {
        self.node_mut(id).loop_count = loop_count;
    }

    pub fn is_valid(&self, id: EntryId) -> bool {
        let entry = &self[id];
        match entry.kind {
            EntryKind::Leaf => entry.files.iter().any(|file| !file.is_empty()),
            EntryKind::Container => self.children(id).any(|child| self.is_valid(child)),
        }
    }

    /// Prunes every invalid subtree under `id`.
    ///
    /// Returns `None` when `id` itself had nothing playable and was freed.
    pub fn cleanup(&mut self, id: EntryId) -> Option<EntryId> {
        if !self.is_valid(id) {
            debug!(entry = %id, "pruning unplayable subtree");
            self.free(id, true);
            return None;
        }

        let children: Vec<EntryId> = self.children(id).collect();
        let mut survivors = Vec::with_capacity(children.len());
        for child in children {
            if self.is_valid(child) {
                survivors.push(child);
            } else {
                debug!(entry = %child, "pruning unplayable subtree");
                self.free(child, true);
            }
        }

        for child in survivors {
            self.cleanup(child);
        }
        Some(id)
    }

    pub fn add_file_entry(
        &mut self,
        chain: Option<EntryId>,
        file: impl Into<String>,
    ) -> Result<EntryId> {
        let entry = self.create();
        if let Err(err) = self.add_file(entry, file) {
            self.free(entry, false);
            return Err(err);
        }

        if let Some(chain) = chain {
            self.append(chain, entry);
            self.set_params_from(entry, chain)?;
        }
        Ok(entry)
    }

    pub fn check_links(&self, root: EntryId) -> anyhow::Result<()> {
        for member in self.siblings(root) {
            let entry = &self[member];
            if let Some(next) = entry.next {
                anyhow::ensure!(
                    self[next].prev == Some(member),
                    "{next}.prev does not point back to {member}"
                );
            }
            if let Some(prev) = entry.prev {
                anyhow::ensure!(
                    self[prev].next == Some(member),
                    "{prev}.next does not point to {member}"
                );
            }
            anyhow::ensure!(
                entry.parent == self[root].parent,
                "{member} has a different parent than its siblings"
            );
            anyhow::ensure!(
                entry.child.is_none() || entry.files.is_empty(),
                "{member} has both children and files"
            );

            if let Some(child) = entry.child {
                anyhow::ensure!(
                    self[child].prev.is_none(),
                    "{member}.child is not the head of its chain"
                );
                anyhow::ensure!(
                    self[child].parent == Some(member),
                    "{child} does not point back to its parent {member}"
                );
                self.check_links(child)?;
            }
        }
        Ok(())
    }
}

impl Index<EntryId> for PlayTree {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Entry {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("stale entry handle {id}"),
        }
    }
}

pub struct Chain<'a> {
    tree: &'a PlayTree,
    next: Option<EntryId>,
}

impl Iterator for Chain<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<EntryId> {
        let current = self.next?;
        self.next = self.tree[current].next;
        Some(current)
    }
}
