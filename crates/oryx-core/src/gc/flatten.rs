//! Graph flattening
//!
//! Produces an index-based copy of everything reachable from a root value.
//! Each object and message appears exactly once, references between them
//! become node indices, so shared references and cycles survive the copy.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::class::ScopeId;
use crate::message::MessageId;
use crate::object::ObjectId;
use crate::value::Value;

/// Index of a node in a [`FlatGraph`]
pub type NodeIndex = usize;

/// One node of a flattened graph
#[derive(Debug, Clone, PartialEq)]
pub enum FlatNode {
    /// Nil
    Nil,
    /// Boolean
    Boolean(bool),
    /// Integer
    Integer(i64),
    /// String
    Str(Arc<str>),
    /// Array of element nodes
    Array(Vec<NodeIndex>),
    /// Object with its variables as `(scope, name, node)`
    Object {
        /// Class name
        class: Arc<str>,
        /// Whether the object had per-instance methods
        enhanced: bool,
        /// Variables ordered by scope then name
        variables: Vec<(ScopeId, Arc<str>, NodeIndex)>,
    },
    /// Message with target, arguments and stored result
    Message {
        /// Message name as text
        name: Arc<str>,
        /// Target node
        target: NodeIndex,
        /// Argument nodes
        args: Vec<NodeIndex>,
        /// Result node, once completed successfully
        result: Option<NodeIndex>,
        /// Whether the message had completed
        completed: bool,
    },
}

/// Flattened object graph
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGraph {
    nodes: Vec<FlatNode>,
    root: NodeIndex,
}

impl FlatGraph {
    /// Root node index
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// All nodes
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    /// Node at `index`
    pub fn node(&self, index: NodeIndex) -> Option<&FlatNode> {
        self.nodes.get(index)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Flatten everything reachable from `root`
pub fn flatten(root: &Value) -> FlatGraph {
    let mut flattener = Flattener::default();
    let root = flattener.add(root);
    FlatGraph {
        nodes: flattener.nodes,
        root,
    }
}

#[derive(Default)]
struct Flattener {
    nodes: Vec<FlatNode>,
    objects: FxHashMap<ObjectId, NodeIndex>,
    messages: FxHashMap<MessageId, NodeIndex>,
}

impl Flattener {
    fn push(&mut self, node: FlatNode) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn add(&mut self, value: &Value) -> NodeIndex {
        match value {
            Value::Nil => self.push(FlatNode::Nil),
            Value::Boolean(b) => self.push(FlatNode::Boolean(*b)),
            Value::Integer(i) => self.push(FlatNode::Integer(*i)),
            Value::Str(s) => self.push(FlatNode::Str(s.clone())),
            Value::Array(items) => {
                let children = items.iter().map(|item| self.add(item)).collect();
                self.push(FlatNode::Array(children))
            }
            Value::Object(object) => {
                if let Some(&index) = self.objects.get(&object.id()) {
                    return index;
                }
                // reserve the slot first so cycles resolve to it
                let index = self.push(FlatNode::Nil);
                self.objects.insert(object.id(), index);
                let variables = object
                    .variables()
                    .into_iter()
                    .map(|(scope, name, value)| {
                        let child = self.add(&value);
                        (scope, name, child)
                    })
                    .collect();
                self.nodes[index] = FlatNode::Object {
                    class: Arc::from(object.class().name()),
                    enhanced: object.has_enhanced_behavior(),
                    variables,
                };
                index
            }
            Value::Message(message) => {
                if let Some(&index) = self.messages.get(&message.id()) {
                    return index;
                }
                let index = self.push(FlatNode::Nil);
                self.messages.insert(message.id(), index);
                let target = self.add(&message.target());
                let args = message
                    .arguments()
                    .iter()
                    .map(|arg| self.add(arg))
                    .collect();
                let result = message.peek_result().map(|result| self.add(&result));
                self.nodes[index] = FlatNode::Message {
                    name: Arc::from(message.name().to_string()),
                    target,
                    args,
                    result,
                    completed: message.is_completed(),
                };
                index
            }
        }
    }
}
