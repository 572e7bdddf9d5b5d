//! Assembled code before jump resolution.
//!
//! A [`CodeSegment`] is a list of [`Node`]s, one per output byte. Nodes may
//! carry jump labels: a definition marks a branch target, a reference marks
//! an offset byte to be patched with the distance to its definition.

use serde::{Deserialize, Serialize};
use vexel_foundation::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Definition,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JumpLabel {
    pub id: String,
    pub kind: LabelKind,
}

impl JumpLabel {
    pub fn definition(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: LabelKind::Definition,
        }
    }

    pub fn reference(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: LabelKind::Reference,
        }
    }
}

/// One output byte and its labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub code: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<JumpLabel>,
}

impl Node {
    pub fn new(code: u8) -> Self {
        Self {
            code,
            labels: Vec::new(),
        }
    }

    pub fn with_label(code: u8, label: JumpLabel) -> Self {
        Self {
            code,
            labels: vec![label],
        }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &JumpLabel> {
        self.labels
            .iter()
            .filter(|label| label.kind == LabelKind::Definition)
    }

    pub fn references(&self) -> impl Iterator<Item = &JumpLabel> {
        self.labels
            .iter()
            .filter(|label| label.kind == LabelKind::Reference)
    }

    pub fn has_definitions(&self) -> bool {
        self.definitions().next().is_some()
    }

    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }

    /// A `Nop` byte that is not an offset placeholder.
    ///
    /// Offset placeholders are zero until patched, so they look like `Nop`
    /// but carry a reference.
    pub fn is_no_op(&self) -> bool {
        self.code == Op::Nop.as_byte() && !self.has_references()
    }

    /// A no-op whose only purpose is to carry branch target definitions.
    pub fn is_anchor(&self) -> bool {
        self.is_no_op() && self.has_definitions()
    }
}

/// An independently resolvable run of code.
///
/// Segments never share jump targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSegment {
    pub name: String,
    pub nodes: Vec<Node>,
}

impl CodeSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Bytes as they currently stand (placeholders unpatched).
    pub fn bytes(&self) -> Vec<u8> {
        self.nodes.iter().map(|node| node.code).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
