//! Text reports printed at the end of a run.

use std::fmt::Write;

use anyhow::Result;
use circopt_analysis::{
    Direction, MarginConfig, MarginResult, OptimizeOutcome, YieldTally, is_close,
};

const DEFAULT_COLUMNS: usize = 80;

/// Terminal width from `COLUMNS`, 80 when unset or malformed.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .filter(|c| *c > 0)
        .unwrap_or(DEFAULT_COLUMNS)
}

/// One bar line per parameter followed by the critical margin.
///
/// ```text
/// R1: 28.1 [         ###|#####          ] 28.1
/// Critical margin: 28.1 % [R1-, R1+]
/// ```
pub fn format_margins(result: &MarginResult, config: &MarginConfig, columns: usize) -> String {
    let mut out = String::new();
    let Some(critical) = result.critical() else {
        return out;
    };

    let name_width = result.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut usable = columns.saturating_sub(15 + name_width).max(2);

    let mut adjust = "";
    if is_close(1.0 - config.min_search, config.max_search - 1.0) && usable % 2 == 1 {
        adjust = " ";
        usable -= 1;
    }
    let half = usable / 2;

    for (name, margin) in result.iter() {
        let negative = 100.0 - margin.negative.max(config.min_search) * 100.0;
        let positive = margin.positive.min(config.max_search) * 100.0 - 100.0;
        let _ = writeln!(
            out,
            "{:<width$}: {}{:>4.1} [{}|{}] {:>4.1}",
            name,
            adjust,
            negative,
            bar(negative, half, true),
            bar(positive, half, false),
            positive,
            width = name_width,
        );
    }

    let names: Vec<String> = critical
        .parameters
        .iter()
        .map(|(name, direction)| side_name(name, *direction))
        .collect();
    let _ = writeln!(
        out,
        "Critical margin: {:>4.1} % [{}]",
        critical.deviation * 100.0,
        names.join(", ")
    );

    out
}

fn side_name(name: &str, direction: Direction) -> String {
    format!("{}{}", name, direction.suffix())
}

fn bar(percentage: f64, size: usize, left: bool) -> String {
    let filled = ((percentage / 100.0 * size as f64) as usize).min(size);
    let hashes = "#".repeat(filled);
    let blanks = " ".repeat(size - filled);
    if left {
        blanks + &hashes
    } else {
        hashes + &blanks
    }
}

/// `Yield: <success> / <total> = <pct> %`
pub fn format_yield(tally: &YieldTally) -> Result<String> {
    Ok(format!(
        "Yield: {} / {} = {:.1} %",
        tally.num_success(),
        tally.num_total(),
        tally.percentage()? * 100.0
    ))
}

/// Final optimization point and search statistics.
pub fn format_optimization(outcome: &OptimizeOutcome) -> String {
    let mut out = String::new();
    let name_width = outcome.point.keys().map(String::len).max().unwrap_or(0);

    let _ = writeln!(out, "Optimized parameters:");
    for (name, value) in &outcome.point {
        let _ = writeln!(out, "  {:<width$} = {:e}", name, value, width = name_width);
    }
    let _ = writeln!(out, "Score: {:.3}", outcome.score);
    let _ = writeln!(
        out,
        "Iterations: {} ({})",
        outcome.iterations,
        if outcome.converged {
            "converged"
        } else {
            "not converged"
        }
    );
    let _ = writeln!(
        out,
        "Guesses: {}, failure points: {}",
        outcome.guesses, outcome.failure_points
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use circopt_analysis::{Margin, ParameterSet};

    fn result(margins: &[(&str, f64, f64)]) -> MarginResult {
        margins
            .iter()
            .map(|(name, negative, positive)| {
                (
                    name.to_string(),
                    Margin {
                        negative: *negative,
                        positive: *positive,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(50.0, 10, true), "     #####");
        assert_eq!(bar(50.0, 10, false), "#####     ");
        assert_eq!(bar(0.0, 4, false), "    ");
        assert_eq!(bar(250.0, 4, false), "####");
        assert_eq!(bar(-5.0, 4, true), "    ");
    }

    #[test]
    fn test_margin_lines() {
        let result = result(&[("R1", 0.75, 1.5), ("L10", 0.1, 1.9)]);
        // 15 + 3 leaves 42 columns, 21 per side
        let text = format_margins(&result, &MarginConfig::default(), 60);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        // 25 % fills int(0.25 * 21) = 5 and 50 % fills 10
        let left = format!("{}{}", " ".repeat(16), "#".repeat(5));
        let right = format!("{}{}", "#".repeat(10), " ".repeat(11));
        assert_eq!(lines[0], format!("R1 : 25.0 [{}|{}] 50.0", left, right));

        // 90 % fills int(18.9) = 18
        let left = format!("   {}", "#".repeat(18));
        let right = format!("{}   ", "#".repeat(18));
        assert_eq!(lines[1], format!("L10: 90.0 [{}|{}] 90.0", left, right));

        assert_eq!(lines[2], "Critical margin: 25.0 % [R1-]");
    }

    #[test]
    fn test_odd_width_is_padded_for_symmetric_range() {
        let result = result(&[("R1", 0.5, 1.5)]);
        // 15 + 2 leaves 43, reduced to 42
        let text = format_margins(&result, &MarginConfig::default(), 60);
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("R1:  50.0 ["));
        assert_eq!(first.len(), 2 + 3 + 4 + 2 + 42 + 1 + 2 + 4);
    }

    #[test]
    fn test_critical_ties() {
        let result = result(&[("R1", 0.8, 1.2), ("R2", 0.5, 1.2)]);
        let text = format_margins(&result, &MarginConfig::default(), 80);
        assert!(text.ends_with("Critical margin: 20.0 % [R1-, R1+, R2+]\n"));
    }

    #[test]
    fn test_empty_margins() {
        let text = format_margins(&MarginResult::default(), &MarginConfig::default(), 80);
        assert!(text.is_empty());
    }

    #[test]
    fn test_yield_line() {
        let mut tally = YieldTally::new();
        for i in 0..997 {
            tally.add_event(i % 3 != 0);
        }
        assert_eq!(format_yield(&tally).unwrap(), "Yield: 664 / 997 = 66.6 %");
        assert!(format_yield(&YieldTally::new()).is_err());
    }

    #[test]
    fn test_optimization_summary() {
        let mut point = ParameterSet::new();
        point.insert("R1".to_string(), 100.0);
        point.insert("Lbias".to_string(), 2.5e-12);
        let outcome = OptimizeOutcome {
            point,
            score: 12.3456,
            iterations: 4,
            converged: true,
            guesses: 4,
            failure_points: 16,
        };

        let text = format_optimization(&outcome);
        assert!(text.contains("  R1    = 1e2\n"));
        assert!(text.contains("  Lbias = 2.5e-12\n"));
        assert!(text.contains("Score: 12.346\n"));
        assert!(text.contains("Iterations: 4 (converged)\n"));
        assert!(text.contains("Guesses: 4, failure points: 16\n"));
    }
}
