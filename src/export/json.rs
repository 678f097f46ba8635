use anyhow::{Context, Result};
use std::io::Write;

use crate::state::Session;

/// Export session to pretty-printed JSON
pub fn export_json<W: Write>(session: &Session, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, session).context("Failed to serialize session")?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{Hop, HopOutcome, HopStats, Snapshot, Target};
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_export_json_contains_route_and_stats() {
        let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1));
        let mut session = Session::new("example.org".into(), Config::default());
        session.target = Some(Target::new("example.org".into(), ip));
        session.route = vec![
            Hop::timed_out(1),
            Hop::new(2, Some(ip), HopOutcome::DestinationReached),
        ];
        // Untouched stats keep best at +inf, which must still serialize
        let mut stats = BTreeMap::new();
        stats.insert(ip, HopStats::new(ip));
        session.snapshot = Some(Snapshot::new(1, stats));

        let mut buf = Vec::new();
        export_json(&session, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["host"], "example.org");
        assert_eq!(value["route"].as_array().unwrap().len(), 2);
        assert_eq!(value["route"][1]["outcome"], "DestinationReached");
        assert_eq!(value["snapshot"]["round"], 1);
        assert!(value["snapshot"]["stats"]["203.0.113.1"]["best_ms"].is_null());
    }
}
