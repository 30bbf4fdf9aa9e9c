//! Matching decoded BGP updates against the [Watchlist].
use crate::update::RawUpdate;
use crate::watchlist::{parse_prefix, Watchlist};
use ipnet::IpNet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Announcement,
    Withdrawal,
}

impl Display for MatchKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Announcement => write!(f, "announcement"),
            MatchKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

/// An update (or one withdrawn prefix of it) that hit the watchlist.
///
/// At least one of [matched_prefix][MatchEvent::matched_prefix] and
/// [matched_asn][MatchEvent::matched_asn] is always set.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub kind: MatchKind,
    /// announced or withdrawn prefix as it appeared on the wire
    pub prefix: String,
    pub as_path: Vec<u32>,
    pub origin_asn: Option<u32>,
    pub peer_asn: Option<u32>,
    pub timestamp: Option<f64>,
    pub host: String,
    /// monitored prefix covering [prefix][MatchEvent::prefix]
    pub matched_prefix: Option<IpNet>,
    /// first monitored ASN found on the path
    pub matched_asn: Option<u32>,
}

/// Match a single update against the watchlist.
///
/// Non-UPDATE messages yield nothing. Each matching withdrawn prefix yields
/// one withdrawal event, and a matching announced prefix yields a single
/// announcement event after them. An ASN hit anywhere on the path matches
/// every prefix of the message.
pub fn match_update(update: &RawUpdate, watchlist: &Watchlist) -> Vec<MatchEvent> {
    if !update.is_update() {
        return vec![];
    }

    let matched_asn = watchlist.matching_asn(&update.as_path);
    let origin_asn = update.origin_asn();
    let host = update.host().to_string();

    let build = |kind: MatchKind, prefix: &str| -> Option<MatchEvent> {
        // unparsable prefixes can still match on the path
        let matched_prefix = parse_prefix(prefix).and_then(|p| watchlist.matching_prefix(&p));
        if matched_prefix.is_none() && matched_asn.is_none() {
            return None;
        }
        Some(MatchEvent {
            kind,
            prefix: prefix.to_string(),
            as_path: update.as_path.clone(),
            origin_asn,
            peer_asn: update.peer_asn,
            timestamp: update.timestamp,
            host: host.clone(),
            matched_prefix,
            matched_asn,
        })
    };

    let mut events: Vec<MatchEvent> = update
        .withdrawn
        .iter()
        .filter_map(|p| build(MatchKind::Withdrawal, p))
        .collect();

    if let Some(prefix) = update.prefix.as_deref().filter(|p| !p.is_empty()) {
        events.extend(build(MatchKind::Announcement, prefix));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn sample_update() -> RawUpdate {
        RawUpdate {
            msg_type: "UPDATE".to_string(),
            prefix: Some("10.0.0.0/24".to_string()),
            as_path: vec![64512, 64500],
            peer_asn: Some(64512),
            timestamp: Some(1700000000.0),
            host: Some("rrc21".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_asn_match_announcement() {
        let wl = Watchlist::new([64500], []);
        let events = match_update(&sample_update(), &wl);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, MatchKind::Announcement);
        assert_eq!(e.matched_asn, Some(64500));
        assert_eq!(e.matched_prefix, None);
        assert_eq!(e.origin_asn, Some(64500));
        assert_eq!(e.host, "rrc21");
    }

    #[test]
    fn test_prefix_match_announcement() {
        let wl = Watchlist::new([], [net("10.0.0.0/16")]);
        let events = match_update(&sample_update(), &wl);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].matched_prefix, Some(net("10.0.0.0/16")));
        assert_eq!(events[0].matched_asn, None);
    }

    #[test]
    fn test_both_reasons_single_event() {
        let wl = Watchlist::new([64512], [net("10.0.0.0/16")]);
        let events = match_update(&sample_update(), &wl);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].matched_asn, Some(64512));
        assert_eq!(events[0].matched_prefix, Some(net("10.0.0.0/16")));
    }

    #[test]
    fn test_withdrawals_matched_individually() {
        let update = RawUpdate {
            prefix: None,
            as_path: vec![],
            withdrawn: vec!["10.0.0.0/24".to_string(), "192.168.0.0/24".to_string()],
            ..sample_update()
        };
        let wl = Watchlist::new([], [net("10.0.0.0/24")]);
        let events = match_update(&update, &wl);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, MatchKind::Withdrawal);
        assert_eq!(e.prefix, "10.0.0.0/24");
        assert_eq!(e.peer_asn, Some(64512));
        assert_eq!(e.timestamp, Some(1700000000.0));
        assert_eq!(e.host, "rrc21");
        // empty path falls back to the peer
        assert_eq!(e.origin_asn, Some(64512));
    }

    #[test]
    fn test_asn_match_covers_all_withdrawals_then_announcement() {
        let update = RawUpdate {
            withdrawn: vec!["172.16.0.0/12".to_string(), "192.168.0.0/24".to_string()],
            ..sample_update()
        };
        let wl = Watchlist::new([64500], []);
        let events = match_update(&update, &wl);
        let kinds = events.iter().map(|e| e.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                MatchKind::Withdrawal,
                MatchKind::Withdrawal,
                MatchKind::Announcement
            ]
        );
        assert_eq!(events[0].prefix, "172.16.0.0/12");
        assert_eq!(events[1].prefix, "192.168.0.0/24");
        for e in &events {
            assert_eq!(e.as_path, vec![64512, 64500]);
        }
    }

    #[test]
    fn test_non_update_discarded() {
        let update = RawUpdate {
            msg_type: "other".to_string(),
            ..sample_update()
        };
        let wl = Watchlist::new([64500], [net("10.0.0.0/8")]);
        assert!(match_update(&update, &wl).is_empty());
    }

    #[test]
    fn test_no_intersection_no_events() {
        let wl = Watchlist::new([1], [net("192.0.2.0/24")]);
        assert!(match_update(&sample_update(), &wl).is_empty());
        assert!(match_update(&sample_update(), &Watchlist::default()).is_empty());
    }

    #[test]
    fn test_less_specific_announcement_does_not_match() {
        let update = RawUpdate {
            prefix: Some("10.0.0.0/8".to_string()),
            ..sample_update()
        };
        let wl = Watchlist::new([], [net("10.0.0.0/16")]);
        assert!(match_update(&update, &wl).is_empty());
    }

    #[test]
    fn test_invalid_prefix_still_matches_on_asn() {
        let update = RawUpdate {
            prefix: Some("garbage".to_string()),
            ..sample_update()
        };
        let wl = Watchlist::new([64500], [net("10.0.0.0/8")]);
        let events = match_update(&update, &wl);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].matched_prefix, None);
        assert_eq!(events[0].prefix, "garbage");
    }

    #[test]
    fn test_every_event_has_a_reason() {
        let update = RawUpdate {
            withdrawn: vec![
                "10.0.0.0/24".to_string(),
                "10.1.0.0/24".to_string(),
                "8.8.8.0/24".to_string(),
            ],
            ..sample_update()
        };
        for wl in [
            Watchlist::new([], [net("10.0.0.0/15")]),
            Watchlist::new([64512], []),
            Watchlist::new([7], [net("8.0.0.0/8")]),
        ] {
            for e in match_update(&update, &wl) {
                assert!(e.matched_asn.is_some() || e.matched_prefix.is_some());
            }
        }
    }
}
