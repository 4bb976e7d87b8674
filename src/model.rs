//! Node graph: a lazily populated, hierarchical namespace of state slots
//!
//! Slots live in an arena owned by the [`Model`] and are addressed by
//! [`SlotId`] handles. A slot is created the first time it is looked up,
//! receives a state index the first time it is marked as an input or
//! given a definition, and keeps that index forever. Indices are handed
//! out by one [`IndexAllocator`] per model, so they form a dense range in
//! first-use order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::bytecode::Program;
use crate::error::{Error, Result};
use crate::expr::Expr;

/// Position of a slot in the state vector
pub type SlotIndex = u32;

/// Handle to a slot inside one [`Model`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub(crate) const ROOT: SlotId = SlotId(0);

    /// Arena position of the slot (not its state index)
    pub fn id(self) -> usize {
        self.0
    }
}

/// Child key: either a field name or an array-style integer index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(i64),
}

impl Key {
    /// Parse one path segment; integer segments become [`Key::Index`]
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Name(segment.to_string()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(i: $t) -> Self {
                Key::Index(i as i64)
            }
        })*
    };
}

key_from_int!(i32, i64, u32, usize);

/// Monotonic index counter shared by every slot of one model
#[derive(Debug, Default)]
pub struct IndexAllocator {
    next: SlotIndex,
}

impl IndexAllocator {
    /// Consume and return the next free index
    pub fn next(&mut self) -> SlotIndex {
        let idx = self.next;
        self.next += 1;
        idx
    }

    /// Next index that would be handed out, without consuming it
    pub fn peek(&self) -> SlotIndex {
        self.next
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone)]
pub enum Assignment {
    /// Bind an expression as the slot's definition
    Expr(Expr),
    /// Assign each child in turn; the slot itself gets no index
    Children(Vec<(Key, Assignment)>),
}

impl From<Expr> for Assignment {
    fn from(expr: Expr) -> Self {
        Assignment::Expr(expr)
    }
}

impl From<&Expr> for Assignment {
    fn from(expr: &Expr) -> Self {
        Assignment::Expr(expr.clone())
    }
}

impl From<SlotId> for Assignment {
    fn from(slot: SlotId) -> Self {
        Assignment::Expr(Expr::reference(slot))
    }
}

impl<K: Into<Key>, V: Into<Assignment>> FromIterator<(K, V)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Assignment::Children(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug)]
struct SlotData {
    name: String,
    index: Option<SlotIndex>,
    input: bool,
    definition: Option<Expr>,
    /// Children in registration order
    children: Vec<(Key, SlotId)>,
    lookup: HashMap<Key, SlotId>,
}

impl SlotData {
    fn new(name: String) -> Self {
        Self {
            name,
            index: None,
            input: false,
            definition: None,
            children: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

/// The node graph of one network
///
/// Methods taking a [`SlotId`] panic if the handle came from another
/// model, except [`Model::index_of`] which reports [`Error::UnknownSlot`].
#[derive(Debug)]
pub struct Model {
    slots: Vec<SlotData>,
    allocator: IndexAllocator,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            slots: vec![SlotData::new(String::new())],
            allocator: IndexAllocator::default(),
        }
    }

    pub fn root(&self) -> SlotId {
        SlotId::ROOT
    }

    /// Existing child of `parent` under `key`, or a freshly registered one
    pub fn child(&mut self, parent: SlotId, key: impl Into<Key>) -> SlotId {
        let key = key.into();
        if let Some(&id) = self.slots[parent.0].lookup.get(&key) {
            return id;
        }

        let parent_name = &self.slots[parent.0].name;
        let name = if parent_name.is_empty() {
            key.to_string()
        } else {
            format!("{parent_name}.{key}")
        };

        let id = SlotId(self.slots.len());
        self.slots.push(SlotData::new(name));
        let data = &mut self.slots[parent.0];
        data.lookup.insert(key.clone(), id);
        data.children.push((key, id));
        id
    }

    /// Child of the root
    pub fn slot(&mut self, key: impl Into<Key>) -> SlotId {
        let root = self.root();
        self.child(root, key)
    }

    /// Walk `keys` down from `parent`, creating slots along the way
    pub fn path<K, I>(&mut self, parent: SlotId, keys: I) -> SlotId
    where
        K: Into<Key>,
        I: IntoIterator<Item = K>,
    {
        keys.into_iter().fold(parent, |slot, key| self.child(slot, key))
    }

    /// Dot-joined access path of the slot
    pub fn name(&self, slot: SlotId) -> &str {
        &self.slots[slot.0].name
    }

    /// Mark `slot` as an input and return its index
    ///
    /// A slot that already holds an index (input or defined) keeps it.
    pub fn mark_input(&mut self, slot: SlotId) -> SlotIndex {
        let data = &mut self.slots[slot.0];
        if let Some(idx) = data.index {
            return idx;
        }
        let idx = self.allocator.next();
        data.index = Some(idx);
        data.input = true;
        idx
    }

    /// Shorthand for marking a child of the root as an input
    pub fn input(&mut self, key: impl Into<Key>) -> SlotIndex {
        let slot = self.slot(key);
        self.mark_input(slot)
    }

    /// Index the next first-use would receive; equals the number of slots in use
    pub fn peek_next_index(&self) -> SlotIndex {
        self.allocator.peek()
    }

    /// Bind a definition to `slot`, or assign a mapping of children below it
    pub fn assign(&mut self, slot: SlotId, value: impl Into<Assignment>) -> Result<()> {
        let data = &self.slots[slot.0];
        if data.definition.is_some() || data.input {
            return Err(Error::AlreadyDefined {
                name: data.name.clone(),
            });
        }

        match value.into() {
            Assignment::Expr(expr) => {
                let data = &mut self.slots[slot.0];
                data.definition = Some(expr);
                if data.index.is_none() {
                    data.index = Some(self.allocator.next());
                }
                Ok(())
            }
            Assignment::Children(entries) => {
                for (key, value) in entries {
                    let child = self.child(slot, key);
                    self.assign(child, value)?;
                }
                Ok(())
            }
        }
    }

    /// State index of `slot`
    pub fn index_of(&self, slot: SlotId) -> Result<SlotIndex> {
        let data = self.slots.get(slot.0).ok_or(Error::UnknownSlot(slot.0))?;
        data.index.ok_or_else(|| Error::Undefined {
            name: data.name.clone(),
        })
    }

    pub fn definition(&self, slot: SlotId) -> Option<&Expr> {
        self.slots[slot.0].definition.as_ref()
    }

    pub fn is_input(&self, slot: SlotId) -> bool {
        self.slots[slot.0].input
    }

    /// Children of `slot` in registration order
    pub fn children(&self, slot: SlotId) -> &[(Key, SlotId)] {
        &self.slots[slot.0].children
    }

    /// Number of slots in the arena, indexed or not (the root included)
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Name to index table of every slot that holds an index
    pub fn symbols(&self) -> BTreeMap<String, SlotIndex> {
        self.slots
            .iter()
            .filter_map(|data| data.index.map(|idx| (data.name.clone(), idx)))
            .collect()
    }

    /// Compile the whole model, starting at the root
    pub fn compile(&self) -> Result<Program> {
        crate::compiler::compile(self, self.root())
    }
}
