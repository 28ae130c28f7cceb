//! Keyed joins over typed rows.
//!
//! Joins follow relational-merge semantics: a key repeated on both sides fans
//! out to every combination. Sides whose key is expected to be unique are
//! checked first, and the configured [`CardinalityPolicy`] decides whether a
//! repeat is logged or aborts the run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use crate::config::CardinalityPolicy;
use crate::error::{AcceptanceError, Result};

/// Name and duplicate-key policy of one join, used in diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec<'a> {
    pub name: &'a str,
    pub left_side: &'static str,
    pub right_side: &'static str,
    pub policy: CardinalityPolicy,
}

/// One row of an outer join.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Joined<'l, 'r, L, R> {
    Both(&'l L, &'r R),
    LeftOnly(&'l L),
    RightOnly(&'r R),
}

impl<'l, 'r, L, R> Joined<'l, 'r, L, R> {
    pub fn left(&self) -> Option<&'l L> {
        match *self {
            Self::Both(l, _) | Self::LeftOnly(l) => Some(l),
            Self::RightOnly(_) => None,
        }
    }

    pub fn right(&self) -> Option<&'r R> {
        match *self {
            Self::Both(_, r) | Self::RightOnly(r) => Some(r),
            Self::LeftOnly(_) => None,
        }
    }
}

/// Which side wins when both sides of a coalesce carry a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    Simulated,
    Observed,
}

/// Coalesce two optional values. The preferred side is used when present,
/// otherwise the other side fills in.
pub fn merge_with_precedence<T>(
    simulated: Option<T>,
    observed: Option<T>,
    precedence: Precedence,
) -> Option<T> {
    match precedence {
        Precedence::Simulated => simulated.or(observed),
        Precedence::Observed => observed.or(simulated),
    }
}

fn index_by_key<T, K: Ord>(rows: &[T], key: impl Fn(&T) -> K) -> BTreeMap<K, Vec<usize>> {
    let mut index: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        index.entry(key(row)).or_default().push(i);
    }
    index
}

/// Flag keys that repeat on one side and are looked up from the other.
/// A repeated key nothing looks up cannot fan out and is left alone.
fn check_unique<K: Ord + Debug>(
    index: &BTreeMap<K, Vec<usize>>,
    looked_up: impl Fn(&K) -> bool,
    side: &'static str,
    spec: &JoinSpec<'_>,
) -> Result<()> {
    for (key, positions) in index {
        if positions.len() < 2 || !looked_up(key) {
            continue;
        }
        match spec.policy {
            CardinalityPolicy::Warn => {
                tracing::warn!(
                    event = "join.fan_out",
                    join = spec.name,
                    side,
                    key = ?key,
                    count = positions.len(),
                    "join key expected unique"
                );
            }
            CardinalityPolicy::Error => {
                return Err(AcceptanceError::JoinCardinality {
                    join: spec.name.to_string(),
                    side,
                    key: format!("{key:?}"),
                    count: positions.len(),
                });
            }
        }
    }
    Ok(())
}

/// Keep every left row; attach each right row with an equal key.
/// The right key is expected to be unique among keys the left side uses.
pub fn left_join<'l, 'r, L, R, K>(
    left: &'l [L],
    right: &'r [R],
    left_key: impl Fn(&L) -> K,
    right_key: impl Fn(&R) -> K,
    spec: &JoinSpec<'_>,
) -> Result<Vec<(&'l L, Option<&'r R>)>>
where
    K: Ord + Debug,
{
    let left_keys: BTreeSet<K> = left.iter().map(&left_key).collect();
    let right_index = index_by_key(right, right_key);
    check_unique(&right_index, |k| left_keys.contains(k), spec.right_side, spec)?;

    let mut out = Vec::with_capacity(left.len());
    for row in left {
        match right_index.get(&left_key(row)) {
            Some(positions) => out.extend(positions.iter().map(|&i| (row, Some(&right[i])))),
            None => out.push((row, None)),
        }
    }
    Ok(out)
}

/// Keep only left rows with a match. The right key is expected to be unique.
pub fn inner_join<'l, 'r, L, R, K>(
    left: &'l [L],
    right: &'r [R],
    left_key: impl Fn(&L) -> K,
    right_key: impl Fn(&R) -> K,
    spec: &JoinSpec<'_>,
) -> Result<Vec<(&'l L, &'r R)>>
where
    K: Ord + Debug,
{
    Ok(left_join(left, right, left_key, right_key, spec)?
        .into_iter()
        .filter_map(|(l, r)| r.map(|r| (l, r)))
        .collect())
}

/// Keep every row of both sides. Both keys are expected to be unique.
///
/// Output order: left rows in input order (with their matches), then
/// right-only rows in input order.
pub fn outer_join<'l, 'r, L, R, K>(
    left: &'l [L],
    right: &'r [R],
    left_key: impl Fn(&L) -> K,
    right_key: impl Fn(&R) -> K,
    spec: &JoinSpec<'_>,
) -> Result<Vec<Joined<'l, 'r, L, R>>>
where
    K: Ord + Debug,
{
    let left_index = index_by_key(left, &left_key);
    let right_index = index_by_key(right, &right_key);
    check_unique(&left_index, |k| right_index.contains_key(k), spec.left_side, spec)?;
    check_unique(&right_index, |k| left_index.contains_key(k), spec.right_side, spec)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    for row in left {
        match right_index.get(&left_key(row)) {
            Some(positions) => out.extend(positions.iter().map(|&i| Joined::Both(row, &right[i]))),
            None => out.push(Joined::LeftOnly(row)),
        }
    }
    for row in right {
        if !left_index.contains_key(&right_key(row)) {
            out.push(Joined::RightOnly(row));
        }
    }
    Ok(out)
}
