//! Index arena backing the stylesheet and markup trees.
//!
//! Nodes are addressed by [`NodeId`]; structural edits only rewrite child
//! lists and parent links. A detached node keeps its slot but is no longer
//! reachable from the root.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Arena<T> {
    pub fn with_root(root: T) -> Self {
        Self {
            entries: vec![Entry {
                value: root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.entries[id.0].value
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.entries[id.0].value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.0].children
    }

    pub fn alloc(&mut self, value: T) -> NodeId {
        self.entries.push(Entry {
            value,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.entries.len() - 1)
    }

    /// Move `child` under `parent` at `index` (clamped to the child count).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.entries[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.entries[child.0].parent = Some(parent);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.entries[parent.0].children.len();
        self.insert_child(parent, len, child);
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.entries[id.0].parent.take() {
            self.entries[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.entries[id.0].children);
        for child in children {
            self.entries[child.0].parent = None;
        }
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Put `new` in `old`'s slot. Returns false when `old` is detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        let (Some(parent), Some(index)) = (self.parent(old), self.index_in_parent(old)) else {
            return false;
        };
        self.detach(old);
        self.insert_child(parent, index, new);
        true
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }
}
