use crate::types::RunSummary;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    write_summary(&mut writer, summary)
}

fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> io::Result<()> {
    let outcome = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    writeln!(writer, "Probe {}", outcome)?;
    writeln!(writer, "  dispatched:  {}", summary.dispatched)?;
    writeln!(writer, "  processed:   {}", summary.processed())?;
    writeln!(writer, "  succeeded:   {}", summary.succeeded)?;
    writeln!(writer, "  failed:      {}", summary.failed)?;
    writeln!(writer, "  elapsed:     {}", ms(summary.elapsed))?;

    match &summary.latency {
        Some(latency) => {
            writeln!(writer, "Latency ({} samples)", summary.samples)?;
            writeln!(writer, "  avg:  {}", ms(latency.mean))?;
            writeln!(writer, "  min:  {}", ms(latency.min))?;
            writeln!(writer, "  p50:  {}", ms(latency.p50))?;
            writeln!(writer, "  p95:  {}", ms(latency.p95))?;
            writeln!(writer, "  p99:  {}", ms(latency.p99))?;
            writeln!(writer, "  max:  {}", ms(latency.max))?;
        }
        None => writeln!(writer, "No successful requests")?,
    }

    if !summary.errors.is_empty() {
        writeln!(writer, "Failures")?;
        for (class, count) in &summary.errors {
            writeln!(writer, "  {:<10} {}", class, count)?;
        }
        for (code, count) in &summary.status_codes {
            writeln!(writer, "  status {:<3} {}", code, count)?;
        }
    }

    writer.flush()
}

fn ms(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LatencySummary;

    fn render(summary: &RunSummary) -> String {
        let mut buf = Vec::new();
        write_summary(&mut buf, summary).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn distinguishes_no_successes_from_cancellation() {
        let failed = RunSummary {
            dispatched: 2,
            failed: 2,
            ..Default::default()
        };
        let text = render(&failed);
        assert!(text.contains("Probe completed"));
        assert!(text.contains("No successful requests"));

        let cancelled = RunSummary {
            dispatched: 1,
            cancelled: true,
            ..Default::default()
        };
        assert!(render(&cancelled).contains("Probe cancelled"));
    }

    #[test]
    fn prints_latency_and_failures() {
        let mut summary = RunSummary {
            dispatched: 3,
            succeeded: 2,
            failed: 1,
            samples: 2,
            latency: Some(LatencySummary {
                mean: Duration::from_micros(12_500),
                ..Default::default()
            }),
            ..Default::default()
        };
        summary.errors.insert("status", 1);
        summary.status_codes.insert(503, 1);

        let text = render(&summary);
        assert!(text.contains("Latency (2 samples)"));
        assert!(text.contains("avg:  12.50ms"));
        assert!(text.contains("status 503"));
    }
}
