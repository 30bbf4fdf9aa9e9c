use crate::matcher::MatchEvent;
use chrono::DateTime;
use itertools::Itertools;

/// Render a match event into the alert text posted to the webhook.
pub fn format_event(event: &MatchEvent) -> String {
    let kind = event.kind.to_string().to_uppercase();

    let as_path = match event.as_path.is_empty() {
        true => "N/A".to_string(),
        false => event.as_path.iter().join(" → "),
    };

    let origin = event
        .origin_asn
        .map(|a| a.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let timestamp = event
        .timestamp
        .and_then(|ts| DateTime::from_timestamp(ts.trunc() as i64, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut matched = vec![];
    if let Some(asn) = event.matched_asn {
        matched.push(format!("ASN {}", asn));
    }
    if let Some(prefix) = event.matched_prefix {
        matched.push(format!("Prefix {}", prefix));
    }
    let matched = match matched.is_empty() {
        true => "".to_string(),
        false => format!(" (Matched: {})", matched.join(", ")),
    };

    format!(
        "🚨 BGP {}{}\n• Prefix: {}\n• AS Path: {}\n• Origin ASN: {}\n• RIS Collector: {}\n• Timestamp: {}",
        kind, matched, event.prefix, as_path, origin, event.host, timestamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchKind;

    fn event() -> MatchEvent {
        MatchEvent {
            kind: MatchKind::Announcement,
            prefix: "10.0.0.0/24".to_string(),
            as_path: vec![64512, 64500],
            origin_asn: Some(64500),
            peer_asn: Some(64512),
            timestamp: Some(1700000000.0),
            host: "rrc21".to_string(),
            matched_prefix: Some("10.0.0.0/16".parse().unwrap()),
            matched_asn: Some(64500),
        }
    }

    #[test]
    fn test_format_event() {
        assert_eq!(
            format_event(&event()),
            "🚨 BGP ANNOUNCEMENT (Matched: ASN 64500, Prefix 10.0.0.0/16)\n\
             • Prefix: 10.0.0.0/24\n\
             • AS Path: 64512 → 64500\n\
             • Origin ASN: 64500\n\
             • RIS Collector: rrc21\n\
             • Timestamp: 2023-11-14 22:13:20 UTC"
        );
    }

    #[test]
    fn test_format_missing_fields() {
        let e = MatchEvent {
            kind: MatchKind::Withdrawal,
            as_path: vec![],
            origin_asn: None,
            timestamp: None,
            matched_asn: None,
            ..event()
        };
        let text = format_event(&e);
        assert!(text.starts_with("🚨 BGP WITHDRAWAL (Matched: Prefix 10.0.0.0/16)\n"));
        assert!(text.contains("• AS Path: N/A\n"));
        assert!(text.contains("• Origin ASN: N/A\n"));
        assert!(text.ends_with("• Timestamp: N/A"));
    }
}
