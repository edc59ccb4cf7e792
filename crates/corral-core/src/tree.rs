// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ordered, named result tree assembled by the query executor.

use serde::Serialize;

/// A node of a result tree.
///
/// Collection nodes usually carry no object and hold one child per member.
/// Children keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    name: Option<String>,
    object: Option<T>,
    is_collection: bool,
    children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// A childless node.
    pub fn new(name: Option<String>, object: Option<T>, is_collection: bool) -> Self {
        Self {
            name,
            object,
            is_collection,
            children: Vec::new(),
        }
    }

    /// Name under which the node is attached to its parent.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Rename the node.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Carried object.
    pub fn object(&self) -> Option<&T> {
        self.object.as_ref()
    }

    /// Replace the carried object.
    pub fn set_object(&mut self, object: T) {
        self.object = Some(object);
    }

    /// Whether the node stands for a collection.
    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    /// Mark the node as standing for a collection or not.
    pub fn set_collection(&mut self, is_collection: bool) {
        self.is_collection = is_collection;
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[TreeNode<T>] {
        &self.children
    }

    /// Append a child, returning it for further building.
    pub fn add_child(&mut self, child: TreeNode<T>) -> &mut TreeNode<T> {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// First child named `name`.
    pub fn child(&self, name: &str) -> Option<&TreeNode<T>> {
        self.children.iter().find(|c| c.name() == Some(name))
    }

    /// Descendant reached by following `path` child names.
    pub fn descendant(&self, path: &[&str]) -> Option<&TreeNode<T>> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }
}
