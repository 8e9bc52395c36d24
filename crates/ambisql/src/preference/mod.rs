//! Hierarchical store of clarified question/answer facts.
//!
//! The tree has a fixed shape: root -> category (level 1 label) -> subcategory
//! (level 2 label) -> leaf. Nodes are created lazily and never removed, and a
//! side index maps every `(level1, level2)` pair to its single leaf.

pub mod merge;

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;

use crate::error::ClarifyResult;
use crate::models::QaFact;
use crate::oracle::LanguageOracle;

pub use merge::{MergeOutcome, reconcile_merge, semantic_merge};

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Root,
    Category,
    Subcategory,
    Leaf,
}

impl NodeRole {
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Self::Root => 0,
            Self::Category => 1,
            Self::Subcategory => 2,
            Self::Leaf => 3,
        }
    }
}

/// Stable address of a leaf inside one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafId {
    category: usize,
    subcategory: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafNode {
    pub level1: String,
    pub level2: String,
    pub facts: Vec<QaFact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryNode {
    pub level2: String,
    pub leaf: LeafNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub level1: String,
    pub subcategories: Vec<SubcategoryNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreferenceTree {
    categories: Vec<CategoryNode>,

    #[serde(skip)]
    leaf_index: HashMap<(String, String), LeafId>,
}

impl PreferenceTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files one answered question under `(level1, level2)`.
    ///
    /// The first fact of a leaf is stored directly; later facts go through the
    /// oracle-backed semantic merge. On error the leaf keeps its previous facts.
    pub async fn add_fact(
        &mut self,
        oracle: &dyn LanguageOracle,
        level1: &str,
        level2: &str,
        fact: QaFact,
    ) -> ClarifyResult<LeafId> {
        let leaf_id = self.ensure_leaf(level1, level2);

        if self.leaf(leaf_id).facts.is_empty() {
            debug!(level1, level2, "first fact for topic, appending");
            self.leaf_mut(leaf_id).facts.push(fact);
            return Ok(leaf_id);
        }

        let merged = semantic_merge(oracle, &self.leaf(leaf_id).facts, fact).await?;
        self.leaf_mut(leaf_id).facts = merged;
        Ok(leaf_id)
    }

    #[must_use]
    pub fn lookup_leaf(&self, level1: &str, level2: &str) -> Option<&LeafNode> {
        self.leaf_id(level1, level2).map(|leaf_id| self.leaf(leaf_id))
    }

    #[must_use]
    pub fn leaf_id(&self, level1: &str, level2: &str) -> Option<LeafId> {
        self.leaf_index
            .get(&(level1.to_string(), level2.to_string()))
            .copied()
    }

    #[must_use]
    pub fn categories(&self) -> &[CategoryNode] {
        &self.categories
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts().count()
    }

    /// Every fact in rendering order, with its labels.
    pub fn facts(&self) -> impl Iterator<Item = (&str, &str, &QaFact)> {
        self.categories.iter().flat_map(|category| {
            category.subcategories.iter().flat_map(|subcategory| {
                subcategory.leaf.facts.iter().map(|fact| {
                    (
                        subcategory.leaf.level1.as_str(),
                        subcategory.leaf.level2.as_str(),
                        fact,
                    )
                })
            })
        })
    }

    /// Depth-first text rendering handed to detection prompts and SQL generation.
    ///
    /// Children appear in insertion order, so renders without intervening
    /// mutation are byte-identical.
    #[must_use]
    pub fn render_evidence(&self) -> String {
        let mut rendered = String::from("root");

        for category in &self.categories {
            push_line(&mut rendered, NodeRole::Category, &category.level1);
            for subcategory in &category.subcategories {
                let header = format!("{} {}", category.level1, subcategory.level2);
                push_line(&mut rendered, NodeRole::Subcategory, header.trim());
                for fact in &subcategory.leaf.facts {
                    let line = format!("Q: {} | A: {}", fact.question, fact.answer);
                    push_line(&mut rendered, NodeRole::Leaf, &line);
                }
            }
        }

        rendered
    }

    fn ensure_leaf(&mut self, level1: &str, level2: &str) -> LeafId {
        if let Some(leaf_id) = self.leaf_id(level1, level2) {
            return leaf_id;
        }

        let category = match self
            .categories
            .iter()
            .position(|node| node.level1 == level1)
        {
            Some(position) => position,
            None => {
                self.categories.push(CategoryNode {
                    level1: level1.to_string(),
                    subcategories: Vec::new(),
                });
                self.categories.len() - 1
            }
        };

        let subcategories = &mut self.categories[category].subcategories;
        subcategories.push(SubcategoryNode {
            level2: level2.to_string(),
            leaf: LeafNode {
                level1: level1.to_string(),
                level2: level2.to_string(),
                facts: Vec::new(),
            },
        });
        let leaf_id = LeafId {
            category,
            subcategory: subcategories.len() - 1,
        };

        self.leaf_index
            .insert((level1.to_string(), level2.to_string()), leaf_id);
        leaf_id
    }

    fn leaf(&self, leaf_id: LeafId) -> &LeafNode {
        &self.categories[leaf_id.category].subcategories[leaf_id.subcategory].leaf
    }

    fn leaf_mut(&mut self, leaf_id: LeafId) -> &mut LeafNode {
        &mut self.categories[leaf_id.category].subcategories[leaf_id.subcategory].leaf
    }
}

fn push_line(rendered: &mut String, role: NodeRole, text: &str) {
    let indent = INDENT.repeat(role.depth());
    let _ = write!(rendered, "\n{indent}{text}");
}
