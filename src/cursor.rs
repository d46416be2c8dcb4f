use crate::error::{Error, Result};
use crate::model::{EntryFlags, EntryId, EntryKind, IterMode, Step};
use crate::scope::ConfigScope;
use crate::shuffle::shuffle_tree;
use crate::tree::PlayTree;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, warn};

/// Walks a playlist tree in playback order.
#[derive(Debug)]
pub struct Cursor<S: ConfigScope> {
    root: EntryId,
    current: Option<EntryId>,
    mode: IterMode,
    loop_counter: i32,
    loop_stack: Vec<i32>,
    file_index: Option<usize>,
    file_count: usize,
    entry_pushed: bool,
    scope: Option<S>,
    rng: SmallRng,
}

impl<S: ConfigScope> Cursor<S> {
    pub fn new(tree: &mut PlayTree, root: EntryId, scope: S) -> Result<Self> {
        Self::with_rng(tree, root, scope, SmallRng::from_os_rng())
    }

    pub fn with_rng(
        tree: &mut PlayTree,
        root: EntryId,
        scope: S,
        mut rng: SmallRng,
    ) -> Result<Self> {
        if !tree.contains(root) {
            return Err(Error::Stale(root));
        }
        if !tree.is_valid(root) {
            return Err(Error::NotPlayable(root));
        }

        shuffle_tree(tree, root, &mut rng);

        Ok(Self {
            root,
            current: None,
            mode: IterMode::Normal,
            loop_counter: level_budget(tree, root),
            loop_stack: Vec::new(),
            file_index: None,
            file_count: 0,
            entry_pushed: false,
            scope: Some(scope),
            rng,
        })
    }

    pub fn open(tree: &mut PlayTree, root: EntryId, scope: S, rng: SmallRng) -> Result<Self> {
        let root = tree.cleanup(root).ok_or(Error::NotPlayable(root))?;
        let mut cursor = Self::with_rng(tree, root, scope, rng)?;
        match cursor.step(tree, 0, false)? {
            Step::Entry => Ok(cursor),
            _ => Err(Error::NotPlayable(root)),
        }
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn current(&self) -> Option<EntryId> {
        self.current
    }

    pub fn mode(&self) -> IterMode {
        self.mode
    }

    pub fn loop_counter(&self) -> i32 {
        self.loop_counter
    }

    pub fn loop_stack(&self) -> &[i32] {
        &self.loop_stack
    }

    pub fn file_index(&self) -> Option<usize> {
        self.file_index
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn scope_pushed(&self) -> bool {
        self.entry_pushed
    }

    pub fn scope(&self) -> Option<&S> {
        self.scope.as_ref()
    }

    /// Moves the cursor `delta` entries forward (or backward when negative).
    ///
    /// A delta of zero resolves the current position. With `with_nodes`, the
    /// cursor stops on containers instead of entering them.
    pub fn step(&mut self, tree: &mut PlayTree, delta: i32, with_nodes: bool) -> Result<Step> {
        let mut d = delta;
        if self.current.is_none() {
            self.current = Some(self.root);
            d = 0;
        }

        loop {
            let current = self.current.ok_or(Error::Unpositioned)?;
            if !tree.contains(current) {
                return Err(Error::Stale(current));
            }

            self.close_entry_scope();
            self.mode = match tree[current].parent() {
                Some(parent) if tree[parent].flags().contains(EntryFlags::RANDOM) => {
                    IterMode::Random
                }
                _ => IterMode::Normal,
            };
            self.file_index = None;

            let candidate = match self.mode {
                IterMode::Random => self.random_sibling(tree, current),
                IterMode::Normal => {
                    let mut pos = Some(current);
                    let mut left = d;
                    while left != 0 {
                        let Some(at) = pos else { break };
                        pos = if left > 0 {
                            tree[at].next()
                        } else {
                            tree[at].prev()
                        };
                        left -= left.signum();
                    }
                    if d != 0 {
                        d = if left != 0 { left } else { d.signum() };
                    }
                    pos
                }
            };

            let Some(candidate) = candidate else {
                if self.mode == IterMode::Random && self.rewind_random_pass(tree, current) {
                    d = 0;
                    continue;
                }
                if self.mode == IterMode::Normal {
                    if let Some(wrapped) = self.wrap_level(tree, current, d) {
                        self.current = Some(wrapped);
                        d = 0;
                        continue;
                    }
                }
                if !self.ascend(tree)? {
                    return Ok(Step::End);
                }
                if d == 0 {
                    d = 1;
                }
                continue;
            };

            let valid = tree.is_valid(candidate);
            if valid && tree[candidate].kind() == EntryKind::Container {
                self.current = Some(candidate);
                if with_nodes {
                    return Ok(Step::Node);
                }
                self.descend(tree, candidate, d)?;
                d = 0;
                continue;
            }

            if !valid {
                if self.mode == IterMode::Random {
                    tree.insert_flags(candidate, EntryFlags::RANDOM_PLAYED);
                } else if d == 0 {
                    error!(entry = %candidate, "no valid entry to resolve onto");
                    return Err(Error::DeadEnd(candidate));
                }
                self.current = Some(candidate);
                continue;
            }

            self.current = Some(candidate);
            self.file_count = tree[candidate].files().len();
            self.open_entry_scope(tree, candidate);
            if self.mode == IterMode::Random {
                tree.insert_flags(candidate, EntryFlags::RANDOM_PLAYED);
            }
            return Ok(Step::Entry);
        }
    }

    /// Picks the next alternative file of the current entry.
    ///
    /// Forward starts at the first file, backward wraps from the first file
    /// onto the last. Once the last file is selected, moves yield `None`.
    /// A zero delta returns the current selection.
    pub fn file<'t>(&mut self, tree: &'t PlayTree, d: i32) -> Option<&'t str> {
        let current = self.current?;
        let files = tree.get(current)?.files();
        let count = files.len();
        if count == 0 {
            return None;
        }

        let index = match (d.signum(), self.file_index) {
            (0, index) => index?,
            (_, Some(index)) if index + 1 >= count => return None,
            (1, None) => 0,
            (1, Some(index)) => index + 1,
            (_, None | Some(0)) => count - 1,
            (_, Some(index)) => index - 1,
        };
        self.file_index = Some(index);
        files.get(index).map(String::as_str)
    }

    pub fn next_file(&mut self, tree: &mut PlayTree, d: i32) -> Result<Option<String>> {
        if let Some(file) = self.file(tree, d) {
            return Ok(Some(file.to_string()));
        }
        if d == 0 {
            return Ok(None);
        }

        loop {
            if self.step(tree, d, false)? != Step::Entry {
                return Ok(None);
            }
            if let Some(file) = self.file(tree, d) {
                return Ok(Some(file.to_string()));
            }
        }
    }

    pub fn insert_entry(&self, tree: &mut PlayTree, entry: EntryId) -> Result<()> {
        let current = self.current.ok_or(Error::Unpositioned)?;
        if current == self.root {
            return Err(Error::OutsideRoot(current));
        }
        tree.insert_after(current, entry);
        tree.set_params_from(entry, current)
    }

    pub fn replace_entry(&mut self, tree: &mut PlayTree, entry: EntryId) -> Result<()> {
        let current = self.current.ok_or(Error::Unpositioned)?;
        self.insert_entry(tree, entry)?;
        tree.free(current, true);
        self.current = Some(entry);
        self.file_count = tree[entry].files().len();
        self.file_index = None;
        Ok(())
    }

    pub fn goto_head(&mut self, tree: &mut PlayTree) -> Result<Step> {
        self.release_scopes();
        self.loop_stack.clear();
        self.loop_counter = level_budget(tree, self.root);
        self.current = Some(self.root);
        self.step(tree, 0, false)
    }

    pub fn copy(&self) -> Cursor<S> {
        Cursor {
            root: self.root,
            current: self.current,
            mode: self.mode,
            loop_counter: self.loop_counter,
            loop_stack: self.loop_stack.clone(),
            file_index: self.file_index,
            file_count: self.file_count,
            entry_pushed: false,
            scope: None,
            rng: self.rng.clone(),
        }
    }

    pub fn close(mut self) -> Option<S> {
        self.release_scopes();
        self.scope.take()
    }

    fn random_sibling(&mut self, tree: &PlayTree, current: EntryId) -> Option<EntryId> {
        let pool: Vec<EntryId> = tree
            .siblings(current)
            .filter(|id| !tree[*id].flags().contains(EntryFlags::RANDOM_PLAYED))
            .collect();
        if pool.is_empty() {
            return None;
        }
        Some(pool[self.rng.random_range(0..pool.len())])
    }

    // Only the current sibling group is rewound, and the pass is charged to
    // the cursor's level counter; the container's `loop` is never rewritten.
    fn rewind_random_pass(&mut self, tree: &mut PlayTree, current: EntryId) -> bool {
        if self.loop_counter == 0 {
            return false;
        }
        let members: Vec<EntryId> = tree.siblings(current).collect();
        if !members.iter().any(|id| tree.is_valid(*id)) {
            return false;
        }

        for member in members {
            tree.unset_flag(member, EntryFlags::RANDOM_PLAYED, -1);
        }
        if self.loop_counter > 0 {
            self.loop_counter -= 1;
        }
        debug!(entry = %current, remaining = self.loop_counter, "new shuffled pass");
        true
    }

    fn wrap_level(&mut self, tree: &PlayTree, current: EntryId, d: i32) -> Option<EntryId> {
        let parent = tree[current].parent()?;
        let budget = tree[parent].loop_count();
        let forward = d > 0 && self.loop_counter != 0;
        let backward = d < 0 && (self.loop_counter < 0 || self.loop_counter < budget);
        if budget == 0 || !(forward || backward) {
            return None;
        }

        let wrapped = if forward {
            first_valid(tree, tree.first_sibling(current), true)?
        } else {
            first_valid(tree, tree.last_sibling(current), false)?
        };
        if forward && self.loop_counter > 0 {
            self.loop_counter -= 1;
        } else if backward && self.loop_counter >= 0 && self.loop_counter < budget {
            self.loop_counter += 1;
        }
        debug!(container = %parent, remaining = self.loop_counter, "looping level");
        Some(wrapped)
    }

    fn ascend(&mut self, tree: &mut PlayTree) -> Result<bool> {
        self.file_index = None;
        let current = self.current.ok_or(Error::Unpositioned)?;
        let parent = tree[current].parent();
        if parent == tree[self.root].parent() {
            return Ok(false);
        }
        let Some(parent) = parent else {
            return Err(Error::OutsideRoot(current));
        };
        let Some(saved) = self.loop_stack.pop() else {
            error!(entry = %current, "loop stack exhausted below the cursor root");
            return Err(Error::OutsideRoot(current));
        };

        self.loop_counter = saved;
        self.current = Some(parent);
        if let Some(scope) = self.scope.as_mut() {
            scope.pop();
        }
        if let Some(grandparent) = tree[parent].parent() {
            if tree[grandparent].flags().contains(EntryFlags::RANDOM) {
                tree.insert_flags(parent, EntryFlags::RANDOM_PLAYED);
            }
        }
        debug!(container = %parent, depth = self.loop_stack.len(), "left level");
        Ok(true)
    }

    fn descend(&mut self, tree: &mut PlayTree, container: EntryId, d: i32) -> Result<()> {
        self.file_index = None;
        let Some(head) = tree[container].child() else {
            return Err(Error::DeadEnd(container));
        };
        let target = if d >= 0 {
            first_valid(tree, head, true)
        } else {
            first_valid(tree, tree.last_sibling(head), false)
        }
        .ok_or(Error::DeadEnd(container))?;

        if let Err(err) = self.loop_stack.try_reserve(1) {
            error!(container = %container, "can't grow loop stack: {err}");
            return Err(err.into());
        }
        self.loop_stack.push(self.loop_counter);
        self.loop_counter = tree[container].loop_count();

        if let Some(scope) = self.scope.as_mut() {
            open_scope(scope, tree, container);
        }
        if tree[container].flags().contains(EntryFlags::RANDOM) {
            let children: Vec<EntryId> = tree.children(container).collect();
            for child in children {
                tree.unset_flag(child, EntryFlags::RANDOM_PLAYED, 0);
            }
        }

        self.current = Some(target);
        debug!(container = %container, depth = self.loop_stack.len(), "entered level");
        Ok(())
    }

    fn open_entry_scope(&mut self, tree: &PlayTree, entry: EntryId) {
        if let Some(scope) = self.scope.as_mut() {
            open_scope(scope, tree, entry);
            self.entry_pushed = true;
        }
    }

    fn close_entry_scope(&mut self) {
        if !self.entry_pushed {
            return;
        }
        self.entry_pushed = false;
        if let Some(scope) = self.scope.as_mut() {
            scope.pop();
        }
    }

    fn release_scopes(&mut self) {
        self.close_entry_scope();
        if let Some(scope) = self.scope.as_mut() {
            for _ in &self.loop_stack {
                scope.pop();
            }
        }
        self.loop_stack.clear();
    }
}

impl<S: ConfigScope> Drop for Cursor<S> {
    fn drop(&mut self) {
        self.release_scopes();
    }
}

fn level_budget(tree: &PlayTree, entry: EntryId) -> i32 {
    tree[entry]
        .parent()
        .map(|parent| tree[parent].loop_count())
        .unwrap_or(0)
}

fn first_valid(tree: &PlayTree, from: EntryId, forward: bool) -> Option<EntryId> {
    let mut iter = Some(from);
    while let Some(id) = iter {
        if tree.is_valid(id) {
            return Some(id);
        }
        iter = if forward { tree[id].next() } else { tree[id].prev() };
    }
    None
}

fn open_scope<S: ConfigScope>(scope: &mut S, tree: &PlayTree, id: EntryId) {
    scope.push();
    for param in tree[id].params() {
        if let Err(err) = scope.apply_option(&param.name, &param.value) {
            warn!(
                entry = %id,
                option = %param.name,
                value = %param.value,
                "error while setting option: {err}"
            );
        }
    }
}
