use roaring::RoaringBitmap;

use crate::core::error::{Error, Result};
use crate::filter::ast::Filter;
use crate::filter::key::{self, ResolvedKey, TopField};
use crate::index::posting::PostingStore;
use crate::index::token::{self, Scope};

/// Read-only view of one index snapshot for filter evaluation
pub struct EvalContext<'a> {
    pub postings: &'a PostingStore,
    pub universe: &'a RoaringBitmap,
}

/// Evaluation result that borrows posting bitmaps until mutation is needed.
///
/// A borrowed bitmap always points into the posting store and is never
/// mutated; any operation that needs ownership promotes via clone.
#[derive(Debug)]
pub enum Candidates<'a> {
    Borrowed(&'a RoaringBitmap),
    Owned(RoaringBitmap),
}

impl<'a> Candidates<'a> {
    pub fn as_bitmap(&self) -> &RoaringBitmap {
        match self {
            Candidates::Borrowed(bitmap) => bitmap,
            Candidates::Owned(bitmap) => bitmap,
        }
    }

    pub fn into_owned(self) -> RoaringBitmap {
        match self {
            Candidates::Borrowed(bitmap) => bitmap.clone(),
            Candidates::Owned(bitmap) => bitmap,
        }
    }

    pub fn len(&self) -> u64 {
        self.as_bitmap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bitmap().is_empty()
    }
}

/// Equality-leaf token, canonicalizing integer-valued fields
fn eq_leaf_token(key: &str, key_pos: usize, value: &str, value_pos: usize) -> Result<String> {
    match key::resolve(key, key_pos)? {
        ResolvedKey::Top(TopField::Rev) => {
            let rev: i64 = value
                .parse()
                .map_err(|_| Error::invalid_filter(value_pos, "rev must be an integer"))?;
            Ok(token::eq_token(Scope::Top, TopField::Rev.as_str(), &rev.to_string()))
        }
        ResolvedKey::Top(field) => Ok(token::eq_token(Scope::Top, field.as_str(), value)),
        ResolvedKey::Attr(attr_key) => Ok(token::eq_token(Scope::Attr, &attr_key, value)),
    }
}

fn presence_leaf_token(key: &str, key_pos: usize) -> Result<String> {
    match key::resolve(key, key_pos)? {
        ResolvedKey::Top(field) => Ok(token::presence_token(Scope::Top, field.as_str())),
        ResolvedKey::Attr(attr_key) => Ok(token::presence_token(Scope::Attr, &attr_key)),
    }
}

/// Cardinality estimate used to order AND children before evaluation.
/// Never errors; an uncompilable leaf estimates 0 so the real error
/// surfaces when that leaf is evaluated first.
pub fn estimate(filter: &Filter, ctx: &EvalContext) -> u64 {
    match filter {
        Filter::Eq {
            key,
            key_pos,
            value,
            value_pos,
        } => eq_leaf_token(key, *key_pos, value, *value_pos)
            .ok()
            .and_then(|token| ctx.postings.get_eq(&token))
            .map(|bitmap| bitmap.len())
            .unwrap_or(0),
        Filter::Present { key, key_pos } => presence_leaf_token(key, *key_pos)
            .ok()
            .and_then(|token| ctx.postings.get_presence(&token))
            .map(|bitmap| bitmap.len())
            .unwrap_or(0),
        Filter::And(children) => children
            .iter()
            .map(|child| estimate(child, ctx))
            .min()
            .unwrap_or(0),
        Filter::Or(children) => children
            .iter()
            .map(|child| estimate(child, ctx))
            .fold(0u64, u64::saturating_add)
            .min(ctx.universe.len()),
        Filter::Not(child) => ctx.universe.len().saturating_sub(estimate(child, ctx)),
    }
}

/// Evaluate a filter to the bitmap of matching doc ids.
///
/// Deterministic for an unchanged snapshot: AND children are ordered by
/// ascending estimate (stable for ties) and intersected in place with an
/// early exit once the accumulator empties.
pub fn eval<'a>(filter: &Filter, ctx: &EvalContext<'a>) -> Result<Candidates<'a>> {
    match filter {
        Filter::Eq {
            key,
            key_pos,
            value,
            value_pos,
        } => {
            let token = eq_leaf_token(key, *key_pos, value, *value_pos)?;
            Ok(match ctx.postings.get_eq(&token) {
                Some(bitmap) => Candidates::Borrowed(bitmap),
                None => Candidates::Owned(RoaringBitmap::new()),
            })
        }
        Filter::Present { key, key_pos } => {
            let token = presence_leaf_token(key, *key_pos)?;
            Ok(match ctx.postings.get_presence(&token) {
                Some(bitmap) => Candidates::Borrowed(bitmap),
                None => Candidates::Owned(RoaringBitmap::new()),
            })
        }
        Filter::And(children) => {
            let mut ordered: Vec<(u64, &Filter)> = children
                .iter()
                .map(|child| (estimate(child, ctx), child))
                .collect();
            ordered.sort_by_key(|(est, _)| *est);

            let mut acc: Option<RoaringBitmap> = None;
            for (_, child) in ordered {
                let candidates = eval(child, ctx)?;
                match acc.as_mut() {
                    None => acc = Some(candidates.into_owned()),
                    Some(bitmap) => *bitmap &= candidates.as_bitmap(),
                }
                if acc.as_ref().is_some_and(|bitmap| bitmap.is_empty()) {
                    break;
                }
            }
            Ok(Candidates::Owned(acc.unwrap_or_default()))
        }
        Filter::Or(children) => {
            let mut acc = RoaringBitmap::new();
            for child in children {
                acc |= eval(child, ctx)?.as_bitmap();
            }
            Ok(Candidates::Owned(acc))
        }
        Filter::Not(child) => {
            let mut acc = ctx.universe.clone();
            acc -= eval(child, ctx)?.as_bitmap();
            Ok(Candidates::Owned(acc))
        }
    }
}
