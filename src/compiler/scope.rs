//! Lexical scopes: a tree of name tables. Each scope also keeps everything
//! registered into it, in order, so the package flush can replay it.

use indexmap::IndexMap;

use super::emit::Spy;
use super::error::CompileError;
use super::trace::Trace;
use super::variables::VarId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// Something registered into a scope for flushing.
#[derive(Debug, Clone)]
pub enum EntryKind {
    Variable(VarId),
    Spy(Spy),
}

/// A registration plus its global sequence number. Sorting on `seq` restores
/// the order things were registered in across a whole subtree.
#[derive(Debug, Clone)]
pub struct Entry {
    pub seq: u64,
    pub kind: EntryKind,
}

#[derive(Debug)]
pub struct Scope {
    name: String,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    names: IndexMap<String, VarId>,
    entries: Vec<Entry>,
    anonymous: u64,
    unit: bool,
}

impl Scope {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Whether this scope is the root of its own output unit.
    pub fn is_unit(&self) -> bool {
        self.unit
    }
}

/// Arena of every scope created during one compilation.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    seq: u64,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only the unnamed global scope.
    pub fn new() -> Self {
        let mut tree = Self {
            scopes: Vec::new(),
            seq: 0,
        };
        tree.push(String::new(), None);
        tree
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn get(&self, id: ScopeId) -> Result<&Scope, CompileError> {
        self.scopes
            .get(id.0)
            .ok_or_else(|| CompileError::internal(format!("Unknown scope #{}", id.0), Trace::default()))
    }

    fn get_mut(&mut self, id: ScopeId) -> Result<&mut Scope, CompileError> {
        self.scopes
            .get_mut(id.0)
            .ok_or_else(|| CompileError::internal(format!("Unknown scope #{}", id.0), Trace::default()))
    }

    fn push(&mut self, name: String, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        // A child continues its parent's counter, so a synthesized name never
        // shadows one that is already visible from the child.
        let anonymous = parent.and_then(|p| self.scopes.get(p.0)).map_or(0, |p| p.anonymous);
        self.scopes.push(Scope {
            name,
            parent,
            children: Vec::new(),
            names: IndexMap::new(),
            entries: Vec::new(),
            anonymous,
            unit: false,
        });
        if let Some(parent) = parent.and_then(|p| self.scopes.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    // ── Scope creation ───────────────────────────────────────────

    pub fn create_child(&mut self, parent: ScopeId, name: impl Into<String>) -> Result<ScopeId, CompileError> {
        self.get(parent)?;
        Ok(self.push(name.into(), Some(parent)))
    }

    /// `n` sibling children of `parent`, each named by an anonymous id.
    pub fn create_children(&mut self, parent: ScopeId, n: usize, prefix: &str) -> Result<Vec<ScopeId>, CompileError> {
        (0..n)
            .map(|_| {
                let name = self.next_anonymous_id(parent, prefix)?;
                self.create_child(parent, name)
            })
            .collect()
    }

    /// The member scope of a variable, named after it. The variable keeps
    /// the link in its `inner_scope`.
    pub fn create_inner(&mut self, parent: ScopeId, name: &str) -> Result<ScopeId, CompileError> {
        self.create_child(parent, name)
    }

    pub fn mark_unit(&mut self, id: ScopeId) -> Result<(), CompileError> {
        self.get_mut(id)?.unit = true;
        Ok(())
    }

    // ── Names ────────────────────────────────────────────────────

    /// Bind `name` in `scope`. Shadowing a name from an ancestor is fine;
    /// redeclaring one in the same scope is not.
    pub fn declare(&mut self, scope: ScopeId, name: &str, var: VarId, trace: Trace) -> Result<(), CompileError> {
        if self.get(scope)?.names.contains_key(name) {
            return Err(CompileError::duplicate_name(name, &self.path(scope)?, trace));
        }
        let seq = self.next_seq();
        let target = self.get_mut(scope)?;
        target.names.insert(name.to_string(), var);
        target.entries.push(Entry {
            seq,
            kind: EntryKind::Variable(var),
        });
        Ok(())
    }

    /// Look `name` up in `scope` only.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        self.scopes.get(scope.0).and_then(|s| s.names.get(name).copied())
    }

    /// Look `name` up in `scope` and then each ancestor, nearest first.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(var) = self.lookup(id, name) {
                return Some(var);
            }
            current = self.scopes.get(id.0).and_then(|s| s.parent);
        }
        None
    }

    /// A name no user declaration can take: `prefix` plus the next value of
    /// `scope`'s base-62 counter.
    pub fn next_anonymous_id(&mut self, scope: ScopeId, prefix: &str) -> Result<String, CompileError> {
        let target = self.get_mut(scope)?;
        let n = target.anonymous;
        target.anonymous += 1;
        Ok(format!("{prefix}{}", to_base62(n)))
    }

    // ── Deferred emission ────────────────────────────────────────

    pub fn register_spy(&mut self, scope: ScopeId, spy: Spy) -> Result<(), CompileError> {
        let seq = self.next_seq();
        self.get_mut(scope)?.entries.push(Entry {
            seq,
            kind: EntryKind::Spy(spy),
        });
        Ok(())
    }

    /// Drop the spies of `scope` and of its non-unit descendants. Variables
    /// stay declared.
    pub fn discard_spies(&mut self, scope: ScopeId) -> Result<(), CompileError> {
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            let current = self.get_mut(id)?;
            current.entries.retain(|entry| matches!(entry.kind, EntryKind::Variable(_)));
            for child in current.children.clone() {
                if !self.get(child)?.unit {
                    stack.push(child);
                }
            }
        }
        Ok(())
    }

    /// Every entry of `scope` and of its descendants that are not units of
    /// their own, in registration order.
    pub fn unit_entries(&self, scope: ScopeId) -> Result<Vec<&Entry>, CompileError> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            let current = self.get(id)?;
            out.extend(current.entries.iter());
            for child in &current.children {
                if !self.get(*child)?.unit {
                    stack.push(*child);
                }
            }
        }
        out.sort_by_key(|entry| entry.seq);
        Ok(out)
    }

    /// Every entry in the tree, in registration order.
    pub fn all_entries(&self) -> Vec<&Entry> {
        let mut out: Vec<&Entry> = self.scopes.iter().flat_map(|s| s.entries.iter()).collect();
        out.sort_by_key(|entry| entry.seq);
        out
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    // ── Paths ────────────────────────────────────────────────────

    /// Slash-separated names from the root down to `scope`, e.g. `main/anon_0`.
    pub fn path(&self, scope: ScopeId) -> Result<String, CompileError> {
        let mut segments = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id)?;
            if !s.name.is_empty() {
                segments.push(s.name.as_str());
            }
            current = s.parent;
        }
        segments.reverse();
        Ok(segments.join("/"))
    }
}

const BASE62: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Render `n` with the digits `0-9a-zA-Z`.
pub fn to_base62(mut n: u64) -> String {
    let mut digits = Vec::new();
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let digit = (n % 62) as usize;
        digits.push(char::from(BASE62[digit]));
        n /= 62;
        if n == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}
