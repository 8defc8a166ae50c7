//! Deterministic child ordering
//!
//! Names listed in a folder's `order` override come first, in listed order.
//! Everything else follows case-insensitively, with the raw name as the
//! tie-breaker so that `a` and `A` always land in the same relative order.

use crate::text::fold_case;
use std::collections::HashMap;

/// Sort `items` in place by the name returned from `name_of`.
pub fn sort_by_name<T, F>(items: &mut [T], order_override: Option<&[String]>, name_of: F)
where
    F: Fn(&T) -> &str,
{
    let mut rank: HashMap<&str, usize> = HashMap::new();
    if let Some(order) = order_override {
        for (position, name) in order.iter().enumerate() {
            rank.entry(name.as_str()).or_insert(position);
        }
    }

    // Listed names sort before unlisted ones: `(false, position)` < `(true, 0)`.
    items.sort_by_cached_key(|item| {
        let name = name_of(item);
        let listed = rank.get(name).copied();
        (
            listed.is_none(),
            listed.unwrap_or(0),
            fold_case(name),
            name.to_string(),
        )
    });
}
