//! Watchlist of monitored ASNs and prefixes.
use ipnet::IpNet;
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};
use tracing::warn;

/// Clear the host bits of a prefix, e.g. `10.0.0.1/24` becomes `10.0.0.0/24`.
///
/// Normalizing an already normalized prefix returns it unchanged.
pub fn normalize_prefix(prefix: IpNet) -> IpNet {
    prefix.trunc()
}

/// Parse a prefix string and normalize it, accepting host bits in the input.
pub fn parse_prefix(prefix: &str) -> Option<IpNet> {
    prefix.trim().parse::<IpNet>().ok().map(normalize_prefix)
}

/// Immutable set of monitored ASNs and normalized monitored prefixes.
///
/// Built once at startup and shared read-only for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    asns: HashSet<u32>,
    prefixes: BTreeSet<IpNet>,
}

impl Watchlist {
    /// Build a watchlist from ASNs and already parsed prefixes.
    pub fn new<A, P>(asns: A, prefixes: P) -> Self
    where
        A: IntoIterator<Item = u32>,
        P: IntoIterator<Item = IpNet>,
    {
        Self {
            asns: asns.into_iter().collect(),
            prefixes: prefixes.into_iter().map(normalize_prefix).collect(),
        }
    }

    /// Build a watchlist from prefix strings, skipping (and logging) the ones
    /// that fail to parse.
    pub fn from_strings<A, S>(asns: A, prefixes: &[S]) -> Self
    where
        A: IntoIterator<Item = u32>,
        S: AsRef<str>,
    {
        let parsed = prefixes.iter().filter_map(|p| {
            let p = p.as_ref();
            let res = parse_prefix(p);
            if res.is_none() {
                warn!("invalid monitored prefix {}, skipping", p);
            }
            res
        });
        Self::new(asns, parsed.collect::<Vec<_>>())
    }

    pub fn asns(&self) -> &HashSet<u32> {
        &self.asns
    }

    pub fn prefixes(&self) -> &BTreeSet<IpNet> {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.asns.is_empty() && self.prefixes.is_empty()
    }

    /// Returns the first ASN on the path (in path order) that is monitored.
    ///
    /// Any hop counts, not only the origin.
    pub fn matching_asn(&self, as_path: &[u32]) -> Option<u32> {
        as_path.iter().copied().find(|asn| self.asns.contains(asn))
    }

    /// Returns the most specific monitored prefix that equals or covers
    /// `prefix`. Both sides are compared in normalized form.
    pub fn matching_prefix(&self, prefix: &IpNet) -> Option<IpNet> {
        let prefix = normalize_prefix(*prefix);
        self.prefixes
            .iter()
            .filter(|monitored| monitored.contains(&prefix))
            .max_by_key(|monitored| monitored.prefix_len())
            .copied()
    }
}

impl Display for Watchlist {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut asns = self.asns.iter().collect::<Vec<_>>();
        asns.sort();
        write!(
            f,
            "asns=[{}], prefixes=[{}]",
            itertools::join(asns, ", "),
            itertools::join(&self.prefixes, ", ")
        )
    }
}
