use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One typed payload slot of a stub.
///
/// `Name` values go through the persistent name dictionary when serialized,
/// `Text` values are written inline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StubField {
    Name(#[serde(with = "crate::models::util::serde_opt_arc_str")] Option<Arc<str>>),
    Text(#[serde(with = "crate::models::util::serde_arc_str")] Arc<str>),
    Bool(bool),
    Int(i64),
}

impl StubField {
    pub fn name(s: &str) -> Self {
        StubField::Name(Some(Arc::from(s)))
    }

    pub fn text(s: &str) -> Self {
        StubField::Text(Arc::from(s))
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            StubField::Name(Some(s)) => Some(s),
            _ => None,
        }
    }
}

/// Structural summary of one declaration.
///
/// `stub_type` is the external id of the serializer that owns this node type.
/// The parent link is structural: a node is owned by its parent's `children`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StubNode {
    #[serde(with = "crate::models::util::serde_arc_str")]
    pub stub_type: Arc<str>,
    pub fields: Vec<StubField>,
    pub children: Vec<StubNode>,
}

impl StubNode {
    pub fn new(stub_type: &str) -> Self {
        Self {
            stub_type: Arc::from(stub_type),
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: StubField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_child(mut self, child: StubNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn field(&self, idx: usize) -> Option<&StubField> {
        self.fields.get(idx)
    }

    /// Visit the subtree in pre-order together with each node's ordinal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(u32, &'a StubNode)) {
        fn go<'a>(node: &'a StubNode, next: &mut u32, visit: &mut impl FnMut(u32, &'a StubNode)) {
            let ordinal = *next;
            *next += 1;
            visit(ordinal, node);
            for child in &node.children {
                go(child, next, visit);
            }
        }
        let mut next = 0;
        go(self, &mut next, visit);
    }
}
