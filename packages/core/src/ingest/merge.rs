//! Duplicate merging for taxon-keyed datasets
//!
//! NEMAGuild publishes several rows for the same taxon. They collapse into one:
//! the most recently ingested row is the base, citation sources from all rows
//! are unioned, and fields the base leaves null are filled from the others.

use crate::ingest::normalize::NormalizedRecord;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Separator used when rejoining merged citations
pub const CITATION_SEPARATOR: &str = " || ";

fn citation_splitter() -> &'static Regex {
    static SPLITTER: OnceLock<Regex> = OnceLock::new();
    SPLITTER.get_or_init(|| Regex::new(r"\s*(?:\|\||;)\s*").expect("static regex"))
}

/// Split every source on `||` / `;`, drop duplicates keeping first
/// occurrence, rejoin with `" || "`
pub fn merge_citations<'a, I>(sources: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for source in sources {
        for part in citation_splitter().split(source) {
            let part = part.trim();
            if !part.is_empty() && seen.insert(part.to_string()) {
                unique.push(part);
            }
        }
    }
    unique.join(CITATION_SEPARATOR)
}

/// Collapse rows describing the same taxon into one
pub fn merge_duplicate_records(mut records: Vec<NormalizedRecord>) -> Option<NormalizedRecord> {
    if records.len() <= 1 {
        return records.pop();
    }

    // Stable: ties keep input order
    records.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));

    let mut merged = records[0].clone();
    let citations: Vec<&str> = records
        .iter()
        .filter_map(|r| r.citation_source.as_deref())
        .collect();
    if !citations.is_empty() {
        merged.citation_source = Some(merge_citations(citations));
    }

    for other in &records[1..] {
        fill(&mut merged.guild, &other.guild);
        fill(&mut merged.notes, &other.notes);
        fill(&mut merged.trait_name, &other.trait_name);
        fill(&mut merged.confidence_ranking, &other.confidence_ranking);
        fill(&mut merged.trophic_mode, &other.trophic_mode);
        fill(&mut merged.growth_form, &other.growth_form);
        fill(&mut merged.guid, &other.guid);
        fill(&mut merged.mb_number, &other.mb_number);
        fill(&mut merged.parent_guid, &other.parent_guid);
    }

    Some(merged)
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

/// Group records by taxon (first-seen order) and merge each group.
///
/// Returns the merged records and how many rows were folded into others.
pub fn dedupe_by_taxon(records: Vec<NormalizedRecord>) -> (Vec<NormalizedRecord>, usize) {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<NormalizedRecord>> = HashMap::new();

    for record in records {
        let Some(taxon) = record.taxon.clone() else {
            continue;
        };
        groups
            .entry(taxon.clone())
            .or_insert_with(|| {
                order.push(taxon);
                Vec::new()
            })
            .push(record);
    }

    let mut folded = 0;
    let mut merged = Vec::with_capacity(order.len());
    for taxon in order {
        let Some(group) = groups.remove(&taxon) else {
            continue;
        };
        if group.len() > 1 {
            tracing::info!("Merging {} duplicate records for '{}'", group.len(), taxon);
            folded += group.len() - 1;
        }
        merged.extend(merge_duplicate_records(group));
    }
    (merged, folded)
}
