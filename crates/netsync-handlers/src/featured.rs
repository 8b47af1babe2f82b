//! `NEXT_PUBLIC_FEATURED_NETWORKS` rendering.
//!
//! The frontend reads a single-quoted, JSON-like list: the pinned entries
//! from configuration followed by the current network marked active.

use netsync_core::FeaturedNetworksConfig;

use crate::explorer::ExplorerTarget;

/// Render the featured-networks value for the network called `name`.
///
/// The current entry carries a `url` only when the explorer URL is known.
pub fn featured_networks(
    config: &FeaturedNetworksConfig,
    name: &str,
    explorer: Option<&ExplorerTarget>,
) -> String {
    let mut entries: Vec<String> = config
        .pinned
        .iter()
        .map(|network| {
            format!(
                "{{'title':'{}','url':'{}','group':'{}'}}",
                quote(&network.title),
                quote(&network.url),
                quote(&network.group)
            )
        })
        .collect();

    let current = match explorer {
        Some(target) => format!(
            "{{'title':'{}','url':'{}','group':'{}', 'isActive':true}}",
            quote(name),
            quote(&target.base_url()),
            quote(&config.group)
        ),
        None => format!(
            "{{'title':'{}','group':'{}', 'isActive':true}}",
            quote(name),
            quote(&config.group)
        ),
    };
    entries.push(current);

    format!("[{}]", entries.join(", "))
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
