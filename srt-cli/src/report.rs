//! Report display and formatting

use crate::simulate::LoopbackReport;
use srt_filter::{FilterConfig, FilterStats, PacketFilter};
use srt_protocol::{LossReport, SeqNumber};

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a loss report as `a-b, c`
pub fn format_losses(losses: &LossReport) -> String {
    if losses.is_empty() {
        return "none".to_string();
    }
    losses
        .iter()
        .map(|range| range.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a list of sequence numbers, eliding the middle of long lists
pub fn format_seqs(seqs: &[SeqNumber]) -> String {
    const SHOWN: usize = 8;

    if seqs.is_empty() {
        return "none".to_string();
    }
    let mut text = seqs
        .iter()
        .take(SHOWN)
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if seqs.len() > SHOWN {
        text.push_str(&format!(", ... ({} total)", seqs.len()));
    }
    text
}

/// Display a parsed configuration
pub fn display_config(config: &FilterConfig) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ FILTER CONFIGURATION                                        │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Canonical: {}", config);
    println!("│ Type:      {}", config.filter_type());
    for (name, value) in config.parameters() {
        println!("│   {:12} = {}", name, value);
    }
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display what a built filter reserves and how it reports loss
pub fn display_filter(filter: &PacketFilter) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ FILTER INSTANCE                                             │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Name:         {}", filter.name());
    println!("│ ARQ level:    {}", filter.arq_level());
    println!(
        "│ Extra size:   {} of {}",
        format_bytes(filter.extra_size() as u64),
        format_bytes(filter.params().payload_size() as u64)
    );
    println!(
        "│ Data payload: {}",
        format_bytes(filter.data_payload_size() as u64)
    );
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display a loopback run
pub fn display_loopback(report: &LoopbackReport) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ LOOPBACK: {}", report.config);
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Data:     {} sent / {} dropped",
        report.data_sent, report.data_dropped
    );
    println!("│ Control:  {} dropped", report.control_dropped);
    println!("│ Reported: {}", format_losses(&report.losses));
    println!("│ Polled:   {}", format_losses(&report.final_poll));
    println!("│ Rebuilt:  {}", format_seqs(&report.rebuilt));
    println!("│ Missing:  {}", format_seqs(&report.unrecovered));
    if !report.mismatched.is_empty() {
        println!("│ CORRUPT:  {}", format_seqs(&report.mismatched));
    }
    println!("├──────────┬─────────┬─────────┬──────────┬─────────┬─────────┤");
    println!("│ Side     │ Fed     │ Ctl out │ Received │ Ctl in  │ Rebuilt │");
    println!("├──────────┼─────────┼─────────┼──────────┼─────────┼─────────┤");
    display_stats_row("sender", &report.sender);
    display_stats_row("receiver", &report.receiver);
    println!("└──────────┴─────────┴─────────┴──────────┴─────────┴─────────┘");
}

fn display_stats_row(side: &str, stats: &FilterStats) {
    println!(
        "│ {:8} │ {:7} │ {:7} │ {:8} │ {:7} │ {:7} │",
        side,
        stats.packets_fed,
        stats.control_sent,
        stats.packets_received,
        stats.control_received,
        stats.packets_rebuilt
    );
}
