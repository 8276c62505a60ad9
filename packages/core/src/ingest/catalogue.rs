//! Catalogue of Life tree walk
//!
//! ChecklistBank serves the Catalogue of Life classification one level at a
//! time: `GET {base}/tree/{id}/children` answers a page of child taxa. The walk
//! starts below a root taxon (`F`, Fungi), descends depth-first and turns every
//! taxon into a dataset row that names its parent in `parentGuid`.
//!
//! ChecklistBank inserts placeholder taxa named "Not assigned" for children
//! without a rank between them and their parent. Placeholders are dropped
//! together with everything beneath them.
//!
//! Fetching is behind [`ChildrenSource`] so the walk runs offline in tests;
//! `guildscope-ingest` implements it over HTTP.

use crate::ingest::IngestError;
use crate::models::rank;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// ChecklistBank dataset holding the current Catalogue of Life release
pub const DEFAULT_BASE_URL: &str = "https://api.checklistbank.org/dataset/313100";

/// Fungi
pub const DEFAULT_ROOT: &str = "F";

/// Levels below the root: phylum, class and order for Fungi
pub const DEFAULT_DEPTH: usize = 3;

/// Children requested per page
pub const PAGE_SIZE: usize = 1000;

/// Name ChecklistBank gives its placeholder taxa
pub const PLACEHOLDER_NAME: &str = "Not assigned";

/// One child taxon as ChecklistBank lists it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rank: Option<String>,
    /// Every other attribute of the taxon, kept for `raw_json`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreeNode {
    pub fn is_placeholder(&self) -> bool {
        self.name.trim() == PLACEHOLDER_NAME
    }

    /// Dataset row for this taxon under `parent`
    ///
    /// Ranks the dataset has no code for (kingdom, superorder, ...) are left
    /// null and load as unranked.
    pub fn to_row(&self, parent: Option<&str>) -> Value {
        let mut row = self.extra.clone();
        if let Some(rank) = &self.rank {
            row.insert("rank".to_string(), Value::from(rank.as_str()));
        }
        row.insert("guid".to_string(), Value::from(self.id.as_str()));
        row.insert("taxon".to_string(), Value::from(self.name.as_str()));
        row.insert(
            "taxonomicLevel".to_string(),
            self.rank
                .as_deref()
                .and_then(rank::from_label)
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        row.insert(
            "parentGuid".to_string(),
            parent.map(Value::from).unwrap_or(Value::Null),
        );
        Value::Object(row)
    }
}

/// One page of `tree/{id}/children`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChildrenPage {
    #[serde(default)]
    pub result: Vec<TreeNode>,
    /// Missing means this is the only page
    #[serde(default)]
    pub last: Option<bool>,
}

impl ChildrenPage {
    pub fn is_last(&self) -> bool {
        self.result.is_empty() || self.last.unwrap_or(true)
    }
}

/// URL of one page of `id`'s children
pub fn children_url(base: &str, id: &str, offset: usize) -> String {
    format!(
        "{}/tree/{}/children?limit={}&offset={}&type=project&insertPlaceholder=true",
        base.trim_end_matches('/'),
        id,
        PAGE_SIZE,
        offset
    )
}

/// Parse a children page fetched for `id`
pub fn parse_children(id: &str, body: &str) -> Result<ChildrenPage, IngestError> {
    serde_json::from_str(body).map_err(|e| IngestError::InvalidTreePage {
        id: id.to_string(),
        message: e.to_string(),
    })
}

/// Where the walk gets each taxon's children from
#[async_trait]
pub trait ChildrenSource: Send + Sync {
    /// Every child of `id`, placeholders included, in ChecklistBank order
    async fn children(&self, id: &str) -> Result<Vec<TreeNode>, IngestError>;
}

/// How far and how wide to walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeWalk {
    /// Taxon whose descendants are collected; not emitted itself
    pub root: String,
    /// Levels below the root; `None` walks to the leaves
    pub max_depth: Option<usize>,
    /// Stop after this many rows; `None` keeps all
    pub limit: Option<usize>,
}

impl Default for TreeWalk {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            max_depth: Some(DEFAULT_DEPTH),
            limit: None,
        }
    }
}

/// Rows gathered by [`walk_tree`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeHarvest {
    /// Dataset rows in depth-first pre-order
    pub rows: Vec<Value>,
    /// Placeholder taxa dropped along with their subtrees
    pub placeholders_skipped: usize,
    /// Children lists requested from the source
    pub requests: usize,
}

/// Walk the tree below `walk.root` depth-first.
///
/// Direct children of the root get no parent, so they load as top-level
/// records. Every deeper row names the taxon it was listed under.
pub async fn walk_tree(
    source: &dyn ChildrenSource,
    walk: &TreeWalk,
) -> Result<TreeHarvest, IngestError> {
    let limit = walk.limit.filter(|&n| n > 0);
    let mut harvest = TreeHarvest::default();

    // (node, parent id, depth below the root)
    let mut pending: Vec<(TreeNode, Option<String>, usize)> = Vec::new();
    let top = source.children(&walk.root).await?;
    harvest.requests += 1;
    pending.extend(top.into_iter().rev().map(|node| (node, None, 1)));

    while let Some((node, parent, depth)) = pending.pop() {
        if limit.is_some_and(|limit| harvest.rows.len() >= limit) {
            info!("Reached limit of {} taxa", harvest.rows.len());
            break;
        }
        if node.is_placeholder() {
            debug!("Skipping placeholder {} under {:?}", node.id, parent);
            harvest.placeholders_skipped += 1;
            continue;
        }

        harvest.rows.push(node.to_row(parent.as_deref()));

        if walk.max_depth.map_or(true, |max| depth < max) {
            let children = source.children(&node.id).await?;
            harvest.requests += 1;
            debug!("{} ({}) has {} children", node.name, node.id, children.len());
            pending.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| (child, Some(node.id.clone()), depth + 1)),
            );
        }
    }

    info!(
        "Walked {} taxa below {} ({} requests, {} placeholders skipped)",
        harvest.rows.len(),
        walk.root,
        harvest.requests,
        harvest.placeholders_skipped
    );
    Ok(harvest)
}
