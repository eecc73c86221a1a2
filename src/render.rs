//! Geometry queries over the externally rendered score.
//!
//! The renderer is a black box that turns MusicXML into a tree of glyphs
//! tagged with class markers. `GlyphSource` is the narrow view of that tree
//! the correlator needs; `GlyphTree` is an owned implementation the host
//! fills from its DOM (or a JSON snapshot of it).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Opaque handle of a rendered glyph.
pub type GlyphId = usize;

/// Axis-aligned bounding box in render coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }
}

/// Class markers the correlator looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlyphClass {
    StaffLine,
    Measure,
    Note,
    NoteHead,
    Stem,
    Other,
}

/// Read-only view of a rendered score.
pub trait GlyphSource {
    /// Staff lines in visual order: upper then lower staff of row 0, then row 1, ...
    fn staff_lines(&self) -> Vec<GlyphId>;

    /// Direct children of `parent` carrying `class`, in render order.
    fn children(&self, parent: GlyphId, class: GlyphClass) -> Vec<GlyphId>;

    /// Stem rendered outside the note container, if the renderer draws it as a sibling.
    fn stem_of(&self, _note: GlyphId) -> Option<GlyphId> {
        None
    }

    fn bbox(&self, glyph: GlyphId) -> Rect;
}

/// One node of a `GlyphTree`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlyphNode {
    pub class: GlyphClass,
    pub bbox: Rect,
    #[serde(default)]
    pub children: Vec<GlyphId>,
    /// Note container this glyph belongs to (for sibling stems)
    #[serde(default)]
    pub owner: Option<GlyphId>,
}

/// Arena-backed glyph tree. Node ids are indices into `nodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlyphTree {
    pub nodes: Vec<GlyphNode>,
    /// Staff lines in visual order
    pub staff_lines: Vec<GlyphId>,
    /// Owner note -> sibling stem
    #[serde(skip)]
    stems: HashMap<GlyphId, GlyphId>,
}

impl GlyphTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a tree snapshot serialized by the host.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut tree: Self = serde_json::from_str(json)?;
        tree.index_stems();
        Ok(tree)
    }

    /// Rebuild the owner -> stem lookup after `nodes` was edited directly.
    pub fn index_stems(&mut self) {
        self.stems = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.class == GlyphClass::Stem)
            .filter_map(|(id, n)| n.owner.map(|owner| (owner, id)))
            .collect();
    }

    /// Add a top-level staff line.
    pub fn add_staff_line(&mut self, bbox: Rect) -> GlyphId {
        let id = self.push(GlyphClass::StaffLine, bbox, None);
        self.staff_lines.push(id);
        id
    }

    /// Add a child glyph under `parent`.
    pub fn add_child(&mut self, parent: GlyphId, class: GlyphClass, bbox: Rect) -> GlyphId {
        let id = self.push(class, bbox, None);
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(id);
        }
        id
    }

    /// Add a stem drawn as a sibling of its note inside `parent`.
    pub fn add_sibling_stem(&mut self, parent: GlyphId, note: GlyphId, bbox: Rect) -> GlyphId {
        let id = self.push(GlyphClass::Stem, bbox, Some(note));
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(id);
        }
        self.stems.insert(note, id);
        id
    }

    fn push(&mut self, class: GlyphClass, bbox: Rect, owner: Option<GlyphId>) -> GlyphId {
        self.nodes.push(GlyphNode {
            class,
            bbox,
            children: Vec::new(),
            owner,
        });
        self.nodes.len() - 1
    }
}

impl GlyphSource for GlyphTree {
    fn staff_lines(&self) -> Vec<GlyphId> {
        self.staff_lines.clone()
    }

    fn children(&self, parent: GlyphId, class: GlyphClass) -> Vec<GlyphId> {
        self.nodes
            .get(parent)
            .map(|node| {
                node.children
                    .iter()
                    .copied()
                    .filter(|&c| self.nodes.get(c).is_some_and(|n| n.class == class))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn stem_of(&self, note: GlyphId) -> Option<GlyphId> {
        self.stems.get(&note).copied()
    }

    fn bbox(&self, glyph: GlyphId) -> Rect {
        self.nodes.get(glyph).map(|n| n.bbox).unwrap_or_default()
    }
}
