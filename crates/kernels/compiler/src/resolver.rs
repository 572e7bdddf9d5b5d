//! Jump resolution.
//!
//! Turns symbolic jump labels into relative byte offsets. Each
//! [`CodeSegment`] resolves on its own in two passes:
//!
//! 1. **Anchor collapse** - definition labels on `Nop` anchors move to the
//!    next real node and the anchor is deleted. A trailing anchor with
//!    nothing after it stays as an executable `Nop` so "jump to end" has a
//!    target.
//! 2. **Link** - each reference node is patched with the magnitude of
//!    `definition - reference`. The opcode before the offset byte decides
//!    the direction the interpreter will travel, so the sign must agree.
//!
//! Any failure aborts the segment; no partially patched code escapes.

use indexmap::map::Entry;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vexel_foundation::{calls_external, Op};

use crate::error::{CompileError, Result};
use crate::node::{CodeSegment, Node};

/// Largest jump magnitude an offset byte holds.
pub const MAX_JUMP_DISTANCE: isize = u8::MAX as isize;

/// Resolver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Resolve segments on the rayon pool.
    pub parallel: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Non-fatal findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveWarning {
    /// A node is both a jump target and an offset byte, so some jump lands
    /// inside another jump's operand.
    TargetIsCarrier {
        segment: String,
        label: String,
        index: usize,
    },
}

impl std::fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveWarning::TargetIsCarrier {
                segment,
                label,
                index,
            } => write!(
                f,
                "segment '{segment}': label '{label}' targets offset byte at node {index}"
            ),
        }
    }
}

/// Patched code of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSegment {
    pub name: String,
    pub code: Vec<u8>,
    pub warnings: Vec<ResolveWarning>,
}

/// All segments, concatenated in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub code: Vec<u8>,
    pub segments: Vec<ResolvedSegment>,
    pub warnings: Vec<ResolveWarning>,
}

impl Resolved {
    /// Whether any segment calls an external function.
    pub fn calls_external(&self) -> bool {
        calls_external(&self.code)
    }
}

/// Move anchor definitions onto the next real node and drop the anchors.
///
/// Idempotent: a collapsed segment has no anchors left except a trailing one.
pub fn collapse_anchors(nodes: &mut Vec<Node>) {
    // Walk backwards so a run of anchors lands on its target in scan order.
    for index in (0..nodes.len()).rev() {
        if !nodes[index].is_anchor() {
            continue;
        }
        let next = nodes[index + 1..]
            .iter()
            .position(|node| !node.is_no_op())
            .map(|offset| index + 1 + offset);
        if let Some(target) = next {
            let moved = std::mem::take(&mut nodes[index].labels);
            nodes[target].labels.splice(0..0, moved);
            nodes.remove(index);
        }
    }
}

/// Patch every reference in a collapsed segment.
pub fn link(segment: &str, nodes: &mut [Node]) -> Result<Vec<ResolveWarning>> {
    let mut definitions: IndexMap<&str, usize> = IndexMap::new();
    for (index, node) in nodes.iter().enumerate() {
        for label in node.definitions() {
            match definitions.entry(label.id.as_str()) {
                Entry::Occupied(existing) => {
                    return Err(CompileError::DuplicateLabel {
                        label: label.id.clone(),
                        first: *existing.get(),
                        second: index,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }
    }

    let mut patches = Vec::new();
    let mut warnings = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        for label in node.references() {
            let target = *definitions
                .get(label.id.as_str())
                .ok_or_else(|| CompileError::MissingLabel {
                    label: label.id.clone(),
                    index,
                })?;
            let distance = target as isize - index as isize;
            if distance.abs() > MAX_JUMP_DISTANCE {
                return Err(CompileError::JumpTooFar {
                    label: label.id.clone(),
                    distance,
                });
            }
            if distance.abs() <= 1 {
                return Err(CompileError::ImpossibleJump {
                    label: label.id.clone(),
                    distance,
                });
            }
            let preceding = index
                .checked_sub(1)
                .map(|before| nodes[before].code)
                .ok_or_else(|| CompileError::MisplacedReference {
                    label: label.id.clone(),
                    index,
                })?;
            check_direction(&label.id, index, preceding, distance)?;
            patches.push((index, distance.unsigned_abs() as u8));
        }
        if node.has_references() {
            for label in node.definitions() {
                warn!(segment, label = %label.id, index, "jump target is an offset byte");
                warnings.push(ResolveWarning::TargetIsCarrier {
                    segment: segment.to_string(),
                    label: label.id.clone(),
                    index,
                });
            }
        }
    }

    for (index, magnitude) in patches {
        nodes[index].code = magnitude;
    }
    Ok(warnings)
}

fn check_direction(label: &str, index: usize, preceding: u8, distance: isize) -> Result<()> {
    let Ok(op) = Op::from_byte(preceding) else {
        return Err(CompileError::MisplacedReference {
            label: label.to_string(),
            index,
        });
    };
    if !op.jumps_forward() && !op.jumps_backward() {
        return Err(CompileError::MisplacedReference {
            label: label.to_string(),
            index,
        });
    }
    let (ok, direction) = if distance > 0 {
        (op.jumps_forward(), "forward")
    } else {
        (op.jumps_backward(), "backward")
    };
    if !ok {
        return Err(CompileError::WrongDirection {
            label: label.to_string(),
            index,
            direction,
            preceding,
        });
    }
    Ok(())
}

/// Collapse and link one segment.
pub fn resolve_segment(segment: &CodeSegment) -> Result<ResolvedSegment> {
    let mut nodes = segment.nodes.clone();
    collapse_anchors(&mut nodes);
    let warnings =
        link(&segment.name, &mut nodes).map_err(|e| e.in_segment(segment.name.clone()))?;
    debug!(
        segment = %segment.name,
        before = segment.nodes.len(),
        after = nodes.len(),
        "resolved segment"
    );
    Ok(ResolvedSegment {
        name: segment.name.clone(),
        code: nodes.iter().map(|node| node.code).collect(),
        warnings,
    })
}

/// Resolve every segment and concatenate the results.
///
/// The first failing segment (in input order) is reported.
pub fn resolve_all(segments: &[CodeSegment], options: ResolveOptions) -> Result<Resolved> {
    let results: Vec<Result<ResolvedSegment>> = if options.parallel {
        segments.par_iter().map(resolve_segment).collect()
    } else {
        segments.iter().map(resolve_segment).collect()
    };
    let segments = results.into_iter().collect::<Result<Vec<_>>>()?;

    let mut resolved = Resolved::default();
    for segment in segments {
        resolved.code.extend_from_slice(&segment.code);
        resolved.warnings.extend(segment.warnings.iter().cloned());
        resolved.segments.push(segment);
    }
    Ok(resolved)
}
