use std::collections::HashSet;

use crate::services::ActiveUser;

/// Pick push recipients from a follower snapshot and an activity snapshot.
///
/// Keeps follower order, drops the author, duplicates and anyone absent from
/// `active`.
pub fn plan_recipients(author_id: i64, followers: &[i64], active: &[ActiveUser]) -> Vec<i64> {
    let active: HashSet<i64> = active.iter().map(|u| u.id).collect();
    let mut seen = HashSet::with_capacity(followers.len());

    followers
        .iter()
        .copied()
        .filter(|id| *id != author_id && active.contains(id) && seen.insert(*id))
        .collect()
}
