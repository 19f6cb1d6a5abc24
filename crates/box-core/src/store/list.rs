//! # Shared List
//!
//! Doubly linked list with index access, stored in a slot arena. Index
//! lookups walk forward from the head when `index < len / 2`, otherwise
//! backward from the tail. Every operation runs under one mutex.

use parking_lot::Mutex;

struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Links<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Links<T> {
    fn new() -> Self {
        Links {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    fn node(&self, slot: usize) -> &Node<T> {
        match self.slots[slot] {
            Some(ref node) => node,
            None => unreachable!("linked slot is vacant"),
        }
    }

    #[inline]
    fn node_mut(&mut self, slot: usize) -> &mut Node<T> {
        match self.slots[slot] {
            Some(ref mut node) => node,
            None => unreachable!("linked slot is vacant"),
        }
    }

    /// Slot holding the element at `index`
    fn locate(&self, index: usize) -> Option<usize> {
        if index >= self.len {
            return None;
        }
        if index < self.len / 2 {
            let mut cur = self.head?;
            for _ in 0..index {
                cur = self.node(cur).next?;
            }
            Some(cur)
        } else {
            let mut cur = self.tail?;
            for _ in 0..(self.len - 1 - index) {
                cur = self.node(cur).prev?;
            }
            Some(cur)
        }
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    /// Link `value` before `at`, or at the tail when `at` is `None`
    fn link_before(&mut self, at: Option<usize>, value: T) {
        let prev = match at {
            Some(slot) => self.node(slot).prev,
            None => self.tail,
        };
        let slot = self.alloc(Node {
            value,
            prev,
            next: at,
        });
        match prev {
            Some(p) => self.node_mut(p).next = Some(slot),
            None => self.head = Some(slot),
        }
        match at {
            Some(n) => self.node_mut(n).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.len += 1;
    }

    fn unlink(&mut self, slot: usize) -> T {
        let node = match self.slots[slot].take() {
            Some(node) => node,
            None => unreachable!("linked slot is vacant"),
        };
        match node.prev {
            Some(p) => self.node_mut(p).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.node_mut(n).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(slot);
        self.len -= 1;
        node.value
    }
}

pub struct SharedList<T> {
    links: Mutex<Links<T>>,
}

impl<T> Default for SharedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedList<T> {
    pub fn new() -> Self {
        SharedList {
            links: Mutex::new(Links::new()),
        }
    }

    /// Append at the tail
    pub fn push(&self, value: T) {
        self.links.lock().link_before(None, value);
    }

    /// Prepend at the head
    pub fn unshift(&self, value: T) {
        let mut links = self.links.lock();
        let head = links.head;
        links.link_before(head, value);
    }

    /// Insert before `index`; `index == len` appends. Out of range hands
    /// the value back.
    pub fn insert(&self, index: usize, value: T) -> Result<(), T> {
        let mut links = self.links.lock();
        if index == links.len {
            links.link_before(None, value);
            return Ok(());
        }
        match links.locate(index) {
            Some(slot) => {
                links.link_before(Some(slot), value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Run `f` on the element at `index` under the lock
    pub fn get<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        let links = self.links.lock();
        let slot = links.locate(index)?;
        Some(f(&links.node(slot).value))
    }

    /// Replace the element at `index`, returning the previous one
    pub fn set(&self, index: usize, value: T) -> Result<T, T> {
        let mut links = self.links.lock();
        match links.locate(index) {
            Some(slot) => Ok(std::mem::replace(&mut links.node_mut(slot).value, value)),
            None => Err(value),
        }
    }

    /// Detach and return the element at `index`
    pub fn remove_at(&self, index: usize) -> Option<T> {
        let mut links = self.links.lock();
        let slot = links.locate(index)?;
        Some(links.unlink(slot))
    }

    /// Index of the first element matching `pred`
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        let links = self.links.lock();
        let mut cur = links.head;
        let mut index = 0;
        while let Some(slot) = cur {
            let node = links.node(slot);
            if pred(&node.value) {
                return Some(index);
            }
            cur = node.next;
            index += 1;
        }
        None
    }

    /// Visit every element head to tail while holding the lock
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        let links = self.links.lock();
        let mut cur = links.head;
        while let Some(slot) = cur {
            let node = links.node(slot);
            f(&node.value);
            cur = node.next;
        }
    }

    /// Drop every element
    pub fn clear(&self) {
        *self.links.lock() = Links::new();
    }

    pub fn len(&self) -> usize {
        self.links.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> SharedList<T> {
    pub fn get_cloned(&self, index: usize) -> Option<T> {
        self.get(index, T::clone)
    }
}
