use crate::{
    result::SessionSummary,
    utils::{accounting::WindowReport, pacing::SendReport, telemetry::LinkQuality},
};

fn mbit(bps: f64) -> f64 {
    bps / 1_000_000.0
}

pub fn print_sender_header() {
    println!("        Time       Send-Rate       Emit-Rate  P-Sent");
    println!("====================================================");
}

pub fn print_send_report(report: &SendReport) {
    println!(
        "  {:6.3} sec  {:7.3} Mbit/s  {:7.3} Mbit/s {:7}",
        report.elapsed.as_secs_f64(),
        mbit(report.send_rate_bps),
        mbit(report.emit_rate_bps),
        report.packets
    );
}

pub fn print_receiver_header() {
    println!(
        "          Rate      Loss       Delay         avgRate    avgLoss  sigLevel   sigQual"
    );
    println!(
        "==================================================================================="
    );
}

pub fn print_window_report(report: &WindowReport, link: LinkQuality) {
    println!(
        "{:7.3} Mbit/s  {:7.3}%  {:7.3} ms  {:7.3} Mbit/s  {:7.3}%  {:6} dB  {:5}/70",
        mbit(report.rate_bps),
        report.loss_pct,
        report.mean_delay_ms,
        mbit(report.avg_rate_bps),
        report.avg_loss_pct,
        link.level,
        link.quality
    );
}

pub fn print_summary(summary: &SessionSummary) {
    println!(
        "SESSION  Duration: {:.2}s\n  Received: {} pkts\n  Lost: {} pkts\n  Throughput: mean {:.3} Mbps, median {:.3} Mbps\n  Delay: mean {:.3} ms, median {:.3} ms",
        summary.duration.as_secs_f64(),
        summary.total_received,
        summary.total_lost,
        mbit(summary.mean_rate_bps),
        mbit(summary.median_rate_bps),
        summary.mean_delay_ms,
        summary.median_delay_ms
    );
}
