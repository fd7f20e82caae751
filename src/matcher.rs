//! Window matching: pair saved [`WindowDescriptor`]s with live windows.
//!
//! # Scoring
//!
//! | Condition                                              | Points |
//! |--------------------------------------------------------|--------|
//! | live enumeration index == descriptor `window_index`    | +30    |
//! | live window is the application's main window           | +20    |
//!
//! Windows below the size threshold never take part.  The highest score
//! wins; ties go to the first candidate in enumeration order.  (Point
//! values come from [`MatchConfig`].)

use crate::config::MatchConfig;
use crate::model::{LiveWindow, WindowDescriptor};

/// Score `live` as a home for `target`.
pub fn score<W>(target: &WindowDescriptor, live: &LiveWindow<W>, config: &MatchConfig) -> u32 {
    let mut s = 0;
    if live.index == target.window_index {
        s += config.index_bonus;
    }
    if live.is_main {
        s += config.main_window_bonus;
    }
    s
}

/// Pick the best unused live window for `target`.
///
/// `used[i]` marks `candidates[i]` as already assigned.  When no eligible
/// (unused, large enough) candidate exists, falls back to an unused window
/// the platform reports as main.  Returns the index into `candidates`.
///
/// The main-window fallback skips the size threshold, so a small main
/// window can be picked and resized to the descriptor's frame.
pub fn best_match<W>(
    target: &WindowDescriptor,
    candidates: &[LiveWindow<W>],
    used: &[bool],
    config: &MatchConfig,
) -> Option<usize> {
    let is_free = |i: usize| !used.get(i).copied().unwrap_or(false);

    let mut best: Option<(usize, u32)> = None;
    for (i, live) in candidates.iter().enumerate() {
        if !is_free(i) || !live.frame.is_at_least(config.min_window_size) {
            continue;
        }
        let s = score(target, live, config);
        // Strictly greater keeps the first maximal element.
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }

    best.map(|(i, _)| i).or_else(|| {
        candidates
            .iter()
            .enumerate()
            .find(|(i, live)| is_free(*i) && live.is_main)
            .map(|(i, _)| i)
    })
}

/// Match every descriptor, in order, against one enumeration of live
/// windows.  No live window is assigned twice.
///
/// The result is parallel to `targets`; `None` means the descriptor is left
/// unpositioned.
pub fn match_batch<W>(
    targets: &[WindowDescriptor],
    candidates: &[LiveWindow<W>],
    config: &MatchConfig,
) -> Vec<Option<usize>> {
    let mut used = vec![false; candidates.len()];
    targets
        .iter()
        .map(|t| {
            let chosen = best_match(t, candidates, &used, config);
            if let Some(i) = chosen {
                used[i] = true;
            }
            chosen
        })
        .collect()
}

/// Refresh stored descriptors of one application from a fresh capture.
///
/// Pass one pairs descriptors with fresh captures of equal `window_index`
/// (first match wins).  Pass two hands the leftover fresh captures, in
/// order, to descriptors that are still unassigned.  Anything unmatched
/// after that keeps its stored geometry.  Identifiers never change.
///
/// Returns how many descriptors were updated.
pub fn resync_descriptors(stored: &mut [WindowDescriptor], fresh: &[WindowDescriptor]) -> usize {
    let mut fresh_used = vec![false; fresh.len()];
    let mut assigned = vec![false; stored.len()];

    for (si, desc) in stored.iter_mut().enumerate() {
        let hit = fresh
            .iter()
            .enumerate()
            .find(|(fi, f)| !fresh_used[*fi] && f.window_index == desc.window_index)
            .map(|(fi, _)| fi);
        if let Some(fi) = hit {
            desc.frame = fresh[fi].frame;
            fresh_used[fi] = true;
            assigned[si] = true;
        }
    }

    let mut leftovers = (0..fresh.len()).filter(|fi| !fresh_used[*fi]);
    for (si, desc) in stored.iter_mut().enumerate() {
        if assigned[si] {
            continue;
        }
        let Some(fi) = leftovers.next() else { break };
        desc.frame = fresh[fi].frame;
        desc.window_index = fresh[fi].window_index;
        assigned[si] = true;
    }

    assigned.iter().filter(|a| **a).count()
}
