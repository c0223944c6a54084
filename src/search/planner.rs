use roaring::RoaringBitmap;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::types::{DocId, IndexedDoc, Requester};
use crate::filter::ast::Filter;
use crate::index::CatalogIndex;
use crate::index::evaluator::{self, EvalContext};
use crate::search::cursor::Cursor;

pub const LIMIT_MIN: usize = 1;
pub const LIMIT_MAX: usize = 200;

/// Candidate sets at or below this size always take the materialize path
const SELECTIVE_MAX: u64 = 5_000;
/// ... as do sets no larger than this fraction of the universe
const SELECTIVE_DENOMINATOR: u64 = 100;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub cursor: Option<Cursor>,
    pub q: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub hits: Vec<Arc<IndexedDoc>>,
    pub next_cursor: Option<Cursor>,
}

impl SearchPage {
    fn empty() -> Self {
        SearchPage {
            hits: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Evaluate a search against one index snapshot.
///
/// The candidate bitmap is the filter result intersected with the
/// requester's visibility union. Small candidate sets are materialized and
/// ranked; broad ones walk the precomputed sort order instead.
pub fn execute(
    index: &CatalogIndex,
    filter: Option<&Filter>,
    opts: &SearchOptions,
    requester: &Requester,
) -> Result<SearchPage> {
    let limit = opts.limit.clamp(LIMIT_MIN, LIMIT_MAX);
    let allowed = index.visibility.allowed_for(requester);
    if allowed.is_empty() {
        return Ok(SearchPage::empty());
    }

    let candidates = match filter {
        None => allowed,
        Some(filter) => {
            let ctx = EvalContext {
                postings: &index.postings,
                universe: &index.universe,
            };
            let mut matched = evaluator::eval(filter, &ctx)?.into_owned();
            matched &= &allowed;
            matched
        }
    };
    if candidates.is_empty() {
        return Ok(SearchPage::empty());
    }

    let folded_q = opts.q.as_deref().map(|q| q.to_ascii_lowercase());
    let candidate_count = candidates.len();
    let universe_count = index.universe.len();
    let selective = candidate_count <= SELECTIVE_MAX
        || candidate_count <= universe_count / SELECTIVE_DENOMINATOR;

    let hits = if selective {
        materialize_page(index, &candidates, limit, opts.cursor.as_ref(), folded_q.as_deref())
    } else {
        scan_page(index, &candidates, limit, opts.cursor.as_ref(), folded_q.as_deref())
    };

    let next_cursor = if hits.len() == limit {
        hits.last().map(|doc| Cursor::after(&doc.entry))
    } else {
        None
    };
    Ok(SearchPage { hits, next_cursor })
}

fn admit(doc: &IndexedDoc, cursor: Option<&Cursor>, folded_q: Option<&str>) -> bool {
    if let Some(cursor) = cursor {
        if !cursor.admits(&doc.entry) {
            return false;
        }
    }
    if let Some(q) = folded_q {
        if !doc.matches_text(q) {
            return false;
        }
    }
    true
}

/// Walk the candidate bitmap in doc-id order, keeping the best `limit`
/// docs by precomputed rank in a bounded sorted buffer
fn materialize_page(
    index: &CatalogIndex,
    candidates: &RoaringBitmap,
    limit: usize,
    cursor: Option<&Cursor>,
    folded_q: Option<&str>,
) -> Vec<Arc<IndexedDoc>> {
    let mut top: Vec<(u32, DocId)> = Vec::with_capacity(limit + 1);
    for raw_id in candidates.iter() {
        let doc_id = DocId(raw_id);
        let Some(doc) = index.registry.get(doc_id) else {
            continue;
        };
        if !admit(doc, cursor, folded_q) {
            continue;
        }
        let Some(&rank) = index.registry.rank.get(&doc_id) else {
            continue;
        };
        if top.len() == limit {
            match top.last() {
                Some(&(worst, _)) if rank >= worst => continue,
                _ => {}
            }
        }
        let pos = top.partition_point(|&(r, _)| r < rank);
        top.insert(pos, (rank, doc_id));
        top.truncate(limit);
    }
    top.iter()
        .filter_map(|(_, doc_id)| index.registry.get(*doc_id).cloned())
        .collect()
}

/// Walk the precomputed sort order, skipping non-candidates, until the
/// page fills
fn scan_page(
    index: &CatalogIndex,
    candidates: &RoaringBitmap,
    limit: usize,
    cursor: Option<&Cursor>,
    folded_q: Option<&str>,
) -> Vec<Arc<IndexedDoc>> {
    let mut hits = Vec::with_capacity(limit);
    for doc_id in &index.registry.sort_order {
        if !candidates.contains(doc_id.0) {
            continue;
        }
        let Some(doc) = index.registry.get(*doc_id) else {
            continue;
        };
        if !admit(doc, cursor, folded_q) {
            continue;
        }
        hits.push(doc.clone());
        if hits.len() == limit {
            break;
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Entry;
    use crate::filter::parser::parse;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str, updated_min: u32, attrs: &[(&str, &[&str])]) -> Entry {
        let attrs = attrs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect();
        Entry {
            id: id.to_string(),
            rev: 1,
            entry_type: "skill".to_string(),
            namespace: "acme".to_string(),
            name: format!("name {}", id),
            description: format!("description for {}", id),
            version: None,
            attrs,
            manifest: serde_json::Value::Null,
            meta: serde_json::Value::Null,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, updated_min, 0).unwrap(),
        }
    }

    fn index_of(entries: Vec<Entry>) -> CatalogIndex {
        let mut index = CatalogIndex::new();
        for e in entries {
            index.upsert(e, false);
        }
        index.resort();
        index
    }

    fn search(
        index: &CatalogIndex,
        filter: Option<&str>,
        opts: SearchOptions,
        requester: &Requester,
    ) -> SearchPage {
        let filter = filter.map(|f| parse(f).unwrap());
        execute(index, filter.as_ref(), &opts, requester).unwrap()
    }

    fn hit_ids(page: &SearchPage) -> Vec<&str> {
        page.hits.iter().map(|d| d.entry.id.as_str()).collect()
    }

    fn opts(limit: usize) -> SearchOptions {
        SearchOptions {
            limit,
            cursor: None,
            q: None,
        }
    }

    #[test]
    fn and_filter_with_sorted_results() {
        let index = index_of(vec![
            entry("a", 1, &[("capability", &["summarize"])]),
            entry("b", 2, &[("capability", &["extract"])]),
            entry("c", 3, &[("capability", &["summarize"])]),
        ]);
        let page = search(
            &index,
            Some("(&(type=skill)(capability=summarize))"),
            opts(20),
            &Requester::anonymous(),
        );
        assert_eq!(hit_ids(&page), vec!["c", "a"]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn visibility_gates_search() {
        let index = index_of(vec![
            entry("pub", 1, &[]),
            entry(
                "rag:acme:sec",
                2,
                &[
                    ("visibility", &["restricted"]),
                    ("allowed_group", &["finance"]),
                ],
            ),
        ]);

        let filtered = |requester: &Requester| {
            hit_ids(&search(&index, Some("(id=rag:acme:sec)"), opts(20), requester)).len()
        };
        assert_eq!(filtered(&Requester::anonymous()), 0);
        assert_eq!(
            filtered(&Requester::authenticated(None, vec!["ops".into()])),
            0
        );
        assert_eq!(
            filtered(&Requester::authenticated(
                None,
                vec!["finance".into(), "ops".into()]
            )),
            1
        );
    }

    #[test]
    fn cursor_pages_through_the_descending_order() {
        let index = index_of(vec![
            entry("i1", 1, &[]),
            entry("i2", 2, &[]),
            entry("i3", 3, &[]),
            entry("i4", 4, &[]),
            entry("i5", 5, &[]),
        ]);
        let anon = Requester::anonymous();

        let page1 = search(&index, None, opts(2), &anon);
        assert_eq!(hit_ids(&page1), vec!["i5", "i4"]);
        let cursor1 = page1.next_cursor.clone().unwrap();

        let page2 = search(
            &index,
            None,
            SearchOptions {
                limit: 2,
                cursor: Some(cursor1),
                q: None,
            },
            &anon,
        );
        assert_eq!(hit_ids(&page2), vec!["i3", "i2"]);
        let cursor2 = page2.next_cursor.clone().unwrap();

        let page3 = search(
            &index,
            None,
            SearchOptions {
                limit: 2,
                cursor: Some(cursor2),
                q: None,
            },
            &anon,
        );
        assert_eq!(hit_ids(&page3), vec!["i1"]);
        assert!(page3.next_cursor.is_none());
    }

    #[test]
    fn presence_and_negated_presence() {
        let index = index_of(vec![
            entry("d1", 1, &[("endpoint", &["https://example.test"])]),
            entry("d2", 2, &[]),
        ]);
        let anon = Requester::anonymous();

        let page = search(&index, Some("(endpoint=*)"), opts(20), &anon);
        assert_eq!(hit_ids(&page), vec!["d1"]);

        let page = search(&index, Some("(!(endpoint=*))"), opts(20), &anon);
        assert_eq!(hit_ids(&page), vec!["d2"]);
    }

    #[test]
    fn text_query_is_case_folded_substring() {
        let index = index_of(vec![
            entry("alpha", 1, &[]),
            entry("BETA", 2, &[]),
        ]);
        let page = search(
            &index,
            None,
            SearchOptions {
                limit: 20,
                cursor: None,
                q: Some("beTA".to_string()),
            },
            &Requester::anonymous(),
        );
        assert_eq!(hit_ids(&page), vec!["BETA"]);
    }

    #[test]
    fn empty_candidates_return_an_empty_page() {
        let index = index_of(vec![entry("a", 1, &[])]);
        let page = search(
            &index,
            Some("(type=widget)"),
            opts(20),
            &Requester::anonymous(),
        );
        assert!(page.hits.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn limit_is_clamped() {
        let index = index_of((0..10).map(|i| entry(&format!("e{}", i), i, &[])).collect());
        let page = search(&index, None, opts(0), &Requester::anonymous());
        assert_eq!(page.hits.len(), 1);
        let page = search(&index, None, opts(5000), &Requester::anonymous());
        assert_eq!(page.hits.len(), 10);
    }

    #[test]
    fn both_strategies_agree() {
        let entries: Vec<Entry> = (0..50)
            .map(|i| {
                let tag: &[&str] = if i % 3 == 0 { &["nlp"] } else { &["misc"] };
                entry(&format!("doc{:02}", i), i, &[("tag", tag)])
            })
            .collect();
        let index = index_of(entries);
        let filter = parse("(tag=nlp)").unwrap();
        let ctx = EvalContext {
            postings: &index.postings,
            universe: &index.universe,
        };
        let mut candidates = evaluator::eval(&filter, &ctx).unwrap().into_owned();
        candidates &= &index.visibility.allowed_for(&Requester::anonymous());

        for (cursor, q) in [
            (None, None),
            (None, Some("doc")),
            (
                Some(Cursor {
                    updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap(),
                    id: "doc30".to_string(),
                }),
                None,
            ),
        ] {
            let scanned = scan_page(&index, &candidates, 7, cursor.as_ref(), q);
            let materialized = materialize_page(&index, &candidates, 7, cursor.as_ref(), q);
            let ids = |hits: &[Arc<IndexedDoc>]| {
                hits.iter().map(|d| d.entry.id.clone()).collect::<Vec<_>>()
            };
            assert_eq!(ids(&scanned), ids(&materialized));
        }
    }
}
