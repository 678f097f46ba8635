use std::io::Write;

use crate::state::{Hop, HopOutcome, Session};

const HOST_WIDTH: usize = 32;

/// Generate a text report similar to mtr --report
pub fn generate_report<W: Write>(session: &Session, mut writer: W) -> std::io::Result<()> {
    match &session.target {
        Some(target) => writeln!(
            writer,
            "pathmon report for {} ({})",
            target.original, target.resolved
        )?,
        None => writeln!(writer, "pathmon report for {}", session.host)?,
    }
    writeln!(writer, "Started: {}", session.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer, "Rounds: {}", session.rounds())?;
    if !session.route.is_empty() && !session.complete() {
        writeln!(writer, "Destination not reached within {} hops", session.config.max_ttl)?;
    }
    writeln!(writer)?;

    write_hop_rows(session, &mut writer)
}

/// Write the hop table (header plus one row per discovered hop)
pub fn write_hop_rows<W: Write>(session: &Session, mut writer: W) -> std::io::Result<()> {
    writeln!(
        writer,
        "{:>3}  {:<width$} {:>6} {:>5} {:>5} {:>7} {:>7} {:>7} {:>7} {:>7}  {}",
        "#",
        "Host",
        "Loss%",
        "Sent",
        "Recv",
        "Best",
        "Avg",
        "Worst",
        "Last",
        "Jitter",
        "Stability",
        width = HOST_WIDTH
    )?;
    writeln!(writer, "{}", "-".repeat(HOST_WIDTH + 76))?;

    for hop in &session.route {
        writeln!(writer, "{}", format_row(session, hop))?;
    }

    Ok(())
}

fn host_column(hop: &Hop) -> String {
    match hop.outcome {
        HopOutcome::IcmpError => format!("{} (icmp error)", hop.host()),
        _ => hop.host(),
    }
}

fn format_row(session: &Session, hop: &Hop) -> String {
    let host = host_column(hop);

    let Some(stats) = session.hop_stats(hop) else {
        // `*` hops, or hops not probed yet
        let label = session
            .hop_stability(hop)
            .map(|s| s.label())
            .unwrap_or("");
        return format!(
            "{:>3}  {:<width$} {:>6} {:>5} {:>5} {:>7} {:>7} {:>7} {:>7} {:>7}  {}",
            hop.ttl,
            host,
            "-",
            "-",
            "-",
            "-",
            "-",
            "-",
            "-",
            "-",
            label,
            width = HOST_WIDTH
        )
        .trim_end()
        .to_string();
    };

    let stability = session
        .hop_stability(hop)
        .map(|s| s.label())
        .unwrap_or("");

    format!(
        "{:>3}  {:<width$} {:>5.1}% {:>5} {:>5} {:>7.1} {:>7.1} {:>7.1} {:>7.1} {:>7.1}  {}",
        hop.ttl,
        host,
        stats.loss_pct,
        stats.sent,
        stats.received,
        stats.best_or_zero(),
        stats.avg_ms,
        stats.worst_ms,
        stats.last_ms,
        stats.jitter_ms,
        stability,
        width = HOST_WIDTH
    )
}

/// Generate report to string
pub fn generate_report_string(session: &Session) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = generate_report(session, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{HopStats, Snapshot, Target};
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    fn session() -> Session {
        let mut session = Session::new("example.org".into(), Config::default());
        session.target = Some(Target::new("example.org".into(), ip(1)));
        session.route = vec![
            Hop::timed_out(1),
            Hop::new(2, Some(ip(9)), HopOutcome::IcmpError),
            Hop::new(3, Some(ip(1)), HopOutcome::DestinationReached),
        ];
        session
    }

    #[test]
    fn test_report_before_first_round() {
        let report = generate_report_string(&session());

        assert!(report.starts_with("pathmon report for example.org (203.0.113.1)\n"));
        assert!(report.contains("Rounds: 0"));
        assert!(!report.contains("Destination not reached"));
        assert!(report.contains("Loss%"));
        assert!(report.contains("Stability"));
        assert!(report.contains("203.0.113.9 (icmp error)"));
        assert!(report.contains("Testing..."));
    }

    #[test]
    fn test_report_rows_use_snapshot() {
        let mut session = session();
        let mut dest = HopStats::new(ip(1));
        dest.record_reply(Duration::from_millis(20));
        dest.record_timeout();
        // Never answered: best shows as 0.0
        let mut silent = HopStats::new(ip(9));
        silent.record_timeout();

        let mut stats = BTreeMap::new();
        stats.insert(ip(1), dest);
        stats.insert(ip(9), silent);
        session.snapshot = Some(Snapshot::new(2, stats));

        let report = generate_report_string(&session);
        let lines: Vec<&str> = report.lines().collect();
        let star = lines.iter().find(|l| l.trim_start().starts_with("1 ")).unwrap();
        let err = lines.iter().find(|l| l.trim_start().starts_with("2 ")).unwrap();
        let dest = lines.iter().find(|l| l.trim_start().starts_with("3 ")).unwrap();

        assert!(star.contains('*'));
        assert!(!star.contains("Testing"));
        assert!(err.contains("100.0%"));
        assert!(err.contains("    0.0"));
        assert!(dest.contains(" 50.0%"));
        assert!(dest.contains("20.0"));
        assert!(dest.ends_with("Testing..."));
        assert!(report.contains("Rounds: 2"));
    }

    #[test]
    fn test_incomplete_route_is_flagged() {
        let mut session = session();
        session.route.pop();
        let report = generate_report_string(&session);
        assert!(report.contains("Destination not reached within 40 hops"));
    }
}
