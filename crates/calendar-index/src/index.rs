//! Augmented binary search tree over event start times.
//!
//! Each node groups every event that shares one start instant and caches two
//! end times: `span_end`, the latest reach among its own events, and `max_end`,
//! the latest reach anywhere in its subtree. An event reaches its end, or its
//! start when the end lies before it. `max_end` is what lets overlap queries
//! discard a subtree without visiting it.
//!
//! # Key design decisions
//!
//! - **Arena storage**: nodes live in a `Vec` and link to each other through
//!   `NodeId` indices. Freed slots go on a free list and are reused by the next
//!   insert, so deletion never shifts live nodes.
//! - **Iterative walks**: the tree is not balanced, and sorted input produces a
//!   linear chain. Every descent and traversal keeps an explicit path or stack
//!   instead of recursing.
//! - **Path repair**: a delete records the root-to-target path (extended down to
//!   the in-order successor when one is spliced) and recomputes `span_end` and
//!   `max_end` along it bottom-up.
//!
//! The index stores whatever it is given. [`crate::EventStore`] rejects events
//! with `end < start` before they get here; queries stay complete for them
//! anyway because the cached ends never fall below an event's start.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{CalendarError, Result};
use crate::event::Event;

type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    start: DateTime<Utc>,
    /// Events with this exact start, in insertion order. Never empty while live.
    events: Vec<Event>,
    span_end: DateTime<Utc>,
    max_end: DateTime<Utc>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Latest instant an event occupies. Equal to `end` for every valid event.
fn reach(event: &Event) -> DateTime<Utc> {
    event.end().max(event.start())
}

impl Node {
    fn new(event: Event) -> Self {
        let start = event.start();
        let end = reach(&event);
        Self {
            start,
            events: vec![event],
            span_end: end,
            max_end: end,
            left: None,
            right: None,
        }
    }
}

/// Interval index of events keyed by start time.
///
/// Duplicate events are kept: the index is a multiset and each copy must be
/// deleted on its own.
#[derive(Debug, Clone, Default)]
pub struct TemporalIndex {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
}

impl TemporalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events (not nodes).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct start instants currently in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Height of the tree, counting the root as depth 1. Zero when empty.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|id| (id, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.nodes[id];
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    /// Insert an event. Never rejects duplicates.
    ///
    /// Every node on the descent path has its `max_end` raised to cover the new
    /// event, so no repair pass is needed afterwards.
    pub fn insert(&mut self, event: Event) {
        let start = event.start();
        let end = reach(&event);
        self.len += 1;

        let Some(mut id) = self.root else {
            let root = self.alloc(event);
            self.root = Some(root);
            return;
        };

        loop {
            let node = &mut self.nodes[id];
            if end > node.max_end {
                node.max_end = end;
            }
            let next = match start.cmp(&node.start) {
                Ordering::Equal => {
                    if end > node.span_end {
                        node.span_end = end;
                    }
                    node.events.push(event);
                    return;
                }
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
            match next {
                Some(next) => id = next,
                None => {
                    let child = self.alloc(event);
                    let parent = &mut self.nodes[id];
                    if start < parent.start {
                        parent.left = Some(child);
                    } else {
                        parent.right = Some(child);
                    }
                    return;
                }
            }
        }
    }

    /// Remove one event matching `(subject, start, end)`.
    ///
    /// Only the node keyed by `start` is searched. When several identical
    /// events exist the earliest inserted is removed. Returns `true` iff an
    /// event was removed.
    pub fn delete_exact(&mut self, subject: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let mut path = Vec::new();
        let mut cursor = self.root;
        while let Some(id) = cursor {
            path.push(id);
            let node = &self.nodes[id];
            cursor = match start.cmp(&node.start) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => break,
            };
        }

        let Some(&target) = path.last() else {
            return false;
        };
        let node = &mut self.nodes[target];
        if node.start != start {
            return false;
        }
        let Some(position) = node
            .events
            .iter()
            .position(|e| e.end() == end && e.subject() == subject)
        else {
            return false;
        };

        node.events.remove(position);
        self.len -= 1;
        if node.events.is_empty() {
            self.remove_node(&mut path);
        }
        for &id in path.iter().rev() {
            self.refresh(id);
        }
        true
    }

    /// Find the first event matching `(subject, start, end)`.
    pub fn find_exact(&self, subject: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<&Event> {
        let id = self.find_node(start)?;
        self.nodes[id]
            .events
            .iter()
            .find(|e| e.end() == end && e.subject() == subject)
    }

    /// Every event with the given subject, in ascending start order.
    pub fn find_by_name(&self, subject: &str) -> Vec<&Event> {
        self.iter().filter(|e| e.subject() == subject).collect()
    }

    /// Every event in ascending start order; equal starts keep insertion order.
    pub fn all_events(&self) -> Vec<&Event> {
        self.iter().collect()
    }

    /// In-order iterator over all events.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            index: self,
            stack: Vec::new(),
            current: None,
            remaining: self.len,
        };
        iter.push_left(self.root);
        iter
    }

    /// Events overlapping the half-open window `[query_start, query_end)`.
    ///
    /// An event matches when `start < query_end && end > query_start`, or when
    /// it starts exactly at `query_start` (this keeps zero-length events at the
    /// window start). Results are in ascending start order.
    pub fn overlapping(&self, query_start: DateTime<Utc>, query_end: DateTime<Utc>) -> Vec<&Event> {
        // Larger keys can still match while they are below query_end, or equal to query_start.
        let key_bound = query_start.max(query_end);
        self.collect_where(
            |node| node.max_end < query_start,
            |node| node.start < key_bound,
            |e| (e.start() < query_end && e.end() > query_start) || e.start() == query_start,
        )
    }

    /// Events whose closed interval `[start, end]` contains `instant`.
    pub fn overlapping_at(&self, instant: DateTime<Utc>) -> Vec<&Event> {
        self.collect_where(
            |node| node.max_end < instant,
            |node| node.start < instant,
            |e| e.start() <= instant && instant <= e.end(),
        )
    }

    /// Verify ordering, node grouping and both cached end times on every node.
    ///
    /// # Errors
    /// Returns `CalendarError::Corrupted` describing the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen_events = 0;
        let mut seen_nodes = 0;
        let mut stack: Vec<(NodeId, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> =
            self.root.map(|id| (id, None, None)).into_iter().collect();

        while let Some((id, lower, upper)) = stack.pop() {
            let node = &self.nodes[id];
            seen_nodes += 1;
            seen_events += node.events.len();

            if lower.is_some_and(|lower| node.start <= lower)
                || upper.is_some_and(|upper| node.start >= upper)
            {
                return Err(corrupted(node, "key out of BST order"));
            }
            if node.events.iter().any(|e| e.start() != node.start) {
                return Err(corrupted(node, "event start differs from node key"));
            }
            let Some(span_end) = node.events.iter().map(reach).max() else {
                return Err(corrupted(node, "live node has no events"));
            };
            if node.span_end != span_end {
                return Err(corrupted(node, "stale span_end"));
            }
            let max_end = [node.left, node.right]
                .into_iter()
                .flatten()
                .map(|child| self.nodes[child].max_end)
                .fold(span_end, |acc, end| acc.max(end));
            if node.max_end != max_end {
                return Err(corrupted(node, "stale max_end"));
            }

            if let Some(left) = node.left {
                stack.push((left, lower, Some(node.start)));
            }
            if let Some(right) = node.right {
                stack.push((right, Some(node.start), upper));
            }
        }

        if seen_events != self.len {
            return Err(CalendarError::Corrupted(format!(
                "event count {} does not match reachable events {}",
                self.len, seen_events
            )));
        }
        if seen_nodes != self.node_count() {
            return Err(CalendarError::Corrupted(format!(
                "node count {} does not match reachable nodes {}",
                self.node_count(),
                seen_nodes
            )));
        }
        Ok(())
    }

    fn alloc(&mut self, event: Event) -> NodeId {
        debug!(start = %event.start(), "creating index node");
        let node = Node::new(event);
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id];
        node.events = Vec::new();
        node.left = None;
        node.right = None;
        self.free.push(id);
    }

    fn find_node(&self, start: DateTime<Utc>) -> Option<NodeId> {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            cursor = match start.cmp(&node.start) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Point `parent`'s link to `old` (or the root, when `parent` is `None`) at `new`.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let parent = &mut self.nodes[parent];
                if parent.left == Some(old) {
                    parent.left = new;
                } else {
                    parent.right = new;
                }
            }
        }
    }

    /// Unlink the emptied node at the end of `path`.
    ///
    /// On return `path` holds exactly the nodes whose cached ends may be stale,
    /// root first.
    fn remove_node(&mut self, path: &mut Vec<NodeId>) {
        let Some(&target) = path.last() else {
            return;
        };
        let parent = path.len().checked_sub(2).map(|i| path[i]);
        let node = &self.nodes[target];

        match (node.left, node.right) {
            (Some(_), Some(right)) => {
                let mut successor_parent = target;
                let mut successor = right;
                path.push(successor);
                while let Some(next) = self.nodes[successor].left {
                    successor_parent = successor;
                    successor = next;
                    path.push(successor);
                }
                path.pop();

                let events = std::mem::take(&mut self.nodes[successor].events);
                let successor_start = self.nodes[successor].start;
                let successor_right = self.nodes[successor].right;
                debug!(
                    removed = %self.nodes[target].start,
                    successor = %successor_start,
                    "splicing in-order successor"
                );

                let node = &mut self.nodes[target];
                node.start = successor_start;
                node.events = events;
                self.replace_child(Some(successor_parent), successor, successor_right);
                self.release(successor);
            }
            (child, None) | (None, child) => {
                debug!(start = %node.start, "removing index node");
                self.replace_child(parent, target, child);
                self.release(target);
                path.pop();
            }
        }
    }

    /// Recompute `span_end` and `max_end` from the node's events and children.
    fn refresh(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let span_end = node
            .events
            .iter()
            .map(reach)
            .max()
            .unwrap_or(node.start);
        let max_end = [node.left, node.right]
            .into_iter()
            .flatten()
            .map(|child| self.nodes[child].max_end)
            .fold(span_end, |acc, end| acc.max(end));

        let node = &mut self.nodes[id];
        node.span_end = span_end;
        node.max_end = max_end;
    }

    /// In-order walk that skips subtrees rejected by `prune` and right subtrees
    /// rejected by `descend_right`, collecting events accepted by `keep`.
    fn collect_where(
        &self,
        prune: impl Fn(&Node) -> bool,
        descend_right: impl Fn(&Node) -> bool,
        keep: impl Fn(&Event) -> bool,
    ) -> Vec<&Event> {
        let mut found = Vec::new();
        let mut stack = Vec::new();
        let mut cursor = self.root;

        loop {
            while let Some(id) = cursor {
                let node = &self.nodes[id];
                if prune(node) {
                    break;
                }
                stack.push(id);
                cursor = node.left;
            }
            let Some(id) = stack.pop() else {
                break;
            };
            let node = &self.nodes[id];
            for event in &node.events {
                if keep(event) {
                    found.push(event);
                }
            }
            cursor = if descend_right(node) { node.right } else { None };
        }

        found
    }
}

fn corrupted(node: &Node, message: &str) -> CalendarError {
    CalendarError::Corrupted(format!("node {}: {}", node.start.to_rfc3339(), message))
}

/// In-order iterator returned by [`TemporalIndex::iter`].
#[derive(Debug)]
pub struct Iter<'a> {
    index: &'a TemporalIndex,
    stack: Vec<NodeId>,
    current: Option<std::slice::Iter<'a, Event>>,
    remaining: usize,
}

impl Iter<'_> {
    fn push_left(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id);
            cursor = self.index.nodes[id].left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<&'a Event> {
        loop {
            if let Some(event) = self.current.as_mut().and_then(|events| events.next()) {
                self.remaining -= 1;
                return Some(event);
            }
            let id = self.stack.pop()?;
            let index = self.index;
            let node = &index.nodes[id];
            self.current = Some(node.events.iter());
            self.push_left(node.right);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a TemporalIndex {
    type Item = &'a Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
