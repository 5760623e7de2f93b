//! Display and output formatting utilities

use crate::config::OutputFormat;
use crate::polycube::rule::PATCH_LABELS;
use crate::polycube::Rule;
use crate::search::{Budget, SearchReport};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Format rules and search reports for display
pub struct SolutionFormatter;

impl SolutionFormatter {
    /// One row per cube type, one column per patch; inert patches show as `·`
    pub fn format_rule(rule: &Rule) -> String {
        let mut output = String::new();
        let _ = write!(output, "{:>6}", "");
        for label in PATCH_LABELS {
            let _ = write!(output, "{:>7}", label);
        }
        output.push('\n');

        for (i, cube) in rule.cube_types.iter().enumerate() {
            let _ = write!(output, "{:>6}", format!("#{}", i));
            for patch in &cube.patches {
                let cell = if patch.is_inert() {
                    "·".to_string()
                } else {
                    format!("{}:{}", patch.color, patch.orientation)
                };
                let _ = write!(output, "{:>7}", cell);
            }
            output.push('\n');
        }
        output
    }

    /// Status of every budget: cube types down, colors across
    pub fn format_outcome_grid(report: &SearchReport) -> String {
        let mut output = String::new();
        if report.budgets.is_empty() {
            return output;
        }

        let symbols: HashMap<Budget, char> = report
            .budgets
            .iter()
            .map(|r| (r.budget, r.outcome.symbol()))
            .collect();
        let types = report.budgets.iter().map(|r| r.budget.cube_types);
        let colors = report.budgets.iter().map(|r| r.budget.colors);
        let (min_t, max_t) = (types.clone().min().unwrap_or(1), types.max().unwrap_or(1));
        let (min_c, max_c) = (colors.clone().min().unwrap_or(1), colors.max().unwrap_or(1));

        output.push_str("types\\colors");
        for c in min_c..=max_c {
            let _ = write!(output, "{:>3}", c);
        }
        output.push('\n');
        for t in min_t..=max_t {
            let _ = write!(output, "{:>12}", t);
            for c in min_c..=max_c {
                let symbol = symbols.get(&Budget::new(t, c)).copied().unwrap_or('·');
                let _ = write!(output, "{:>3}", symbol);
            }
            output.push('\n');
        }
        output.push_str("✓ solved  × unsatisfiable  ? all candidates rejected  ⌛ timeout  ! error  - skipped\n");
        output
    }

    /// Full text report
    pub fn format_report(report: &SearchReport) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "Topology: {} positions, {} bindings ({}D, torsion {})",
            report.positions,
            report.bindings,
            report.dimensions,
            if report.torsion { "on" } else { "off" }
        );
        let _ = writeln!(output, "Search time: {:.3}s", report.elapsed_seconds);

        let tally: Vec<String> = report
            .tally()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(symbol, n)| format!("{} {}", symbol, n))
            .collect();
        let _ = writeln!(output, "Budgets: {}", tally.join(", "));
        output.push('\n');

        match report.best {
            Some(ref found) => {
                let _ = writeln!(
                    output,
                    "Rule: {} cube type(s), {} color(s){}",
                    found.budget.cube_types,
                    found.budget.colors,
                    if found.proven_minimal {
                        ", minimal"
                    } else {
                        ", not proven minimal"
                    }
                );
                let _ = writeln!(output, "  dec: {}", found.rule.to_dec());
                if let Ok(hex) = found.rule.to_hex() {
                    let _ = writeln!(output, "  hex: {}", hex);
                }
                output.push('\n');
                output.push_str(&Self::format_rule(&found.rule));
            }
            None => output.push_str("No rule found\n"),
        }

        output.push('\n');
        output.push_str(&Self::format_outcome_grid(report));
        output
    }

    /// Save a report in the given format and return the file written
    pub fn save_report<P: AsRef<Path>>(
        report: &SearchReport,
        output_dir: P,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

        let path = match format {
            OutputFormat::Text => {
                let path = output_dir.join("report.txt");
                std::fs::write(&path, Self::format_report(report))?;
                path
            }
            OutputFormat::Json => {
                let path = output_dir.join("report.json");
                report.save_to_file(&path)?;
                path
            }
            OutputFormat::Hex => {
                let path = output_dir.join("rule.hex");
                let content = match report.rule() {
                    Some(rule) => format!("{}\n", rule.to_hex()?),
                    None => String::new(),
                };
                std::fs::write(&path, content)?;
                path
            }
        };

        Ok(path)
    }
}

/// Color output utilities
pub struct ColorOutput;

impl ColorOutput {
    /// Format text with color (if terminal supports it)
    pub fn colored(text: &str, color: Color) -> String {
        if Self::supports_color() {
            format!("\x1b[{}m{}\x1b[0m", color.code(), text)
        } else {
            text.to_string()
        }
    }

    /// Check if terminal supports color
    fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err()
            && (std::env::var("TERM").unwrap_or_default() != "dumb")
    }

    pub fn success(text: &str) -> String {
        Self::colored(text, Color::Green)
    }

    pub fn error(text: &str) -> String {
        Self::colored(text, Color::Red)
    }

    pub fn warning(text: &str) -> String {
        Self::colored(text, Color::Yellow)
    }

    pub fn info(text: &str) -> String {
        Self::colored(text, Color::Blue)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    fn code(self) -> u8 {
        match self {
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{BudgetOutcome, BudgetReport, FoundRule};
    use tempfile::tempdir;

    fn report(solved: bool) -> SearchReport {
        let rule = Rule::parse_dec("|1:0||||_-1:0|||||").unwrap();
        let mut budgets = vec![
            BudgetReport::new(Budget::new(1, 1), BudgetOutcome::Unsatisfiable),
            BudgetReport::new(Budget::new(2, 1), BudgetOutcome::Timeout),
        ];
        let best = solved.then(|| {
            budgets[1].outcome = BudgetOutcome::Solved { rule: rule.clone() };
            FoundRule {
                budget: Budget::new(2, 1),
                rule,
                proven_minimal: true,
            }
        });
        SearchReport {
            dimensions: 3,
            torsion: true,
            positions: 2,
            bindings: 1,
            best,
            budgets,
            elapsed_seconds: 0.25,
        }
    }

    #[test]
    fn test_rule_table() {
        let rule = Rule::parse_dec("|1:2||||").unwrap();
        let table = SolutionFormatter::format_rule(&rule);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-x") && lines[0].contains("+z"));
        assert!(lines[1].contains("#0"));
        assert!(lines[1].contains("1:2"));
        assert_eq!(lines[1].matches('·').count(), 5);
    }

    #[test]
    fn test_outcome_grid() {
        let grid = SolutionFormatter::format_outcome_grid(&report(false));
        let lines: Vec<&str> = grid.lines().collect();
        assert!(lines[1].trim_start().starts_with('1') && lines[1].contains('×'));
        assert!(lines[2].trim_start().starts_with('2') && lines[2].contains('⌛'));
    }

    #[test]
    fn test_report_text() {
        let text = SolutionFormatter::format_report(&report(true));
        assert!(text.contains("2 positions, 1 bindings"));
        assert!(text.contains("minimal"));
        assert!(text.contains("dec: "));

        let text = SolutionFormatter::format_report(&report(false));
        assert!(text.contains("No rule found"));
    }

    #[test]
    fn test_save_report_formats() {
        let dir = tempdir().unwrap();
        let r = report(true);

        let path = SolutionFormatter::save_report(&r, dir.path(), OutputFormat::Hex).unwrap();
        let hex = std::fs::read_to_string(path).unwrap();
        assert_eq!(hex.trim(), r.rule().unwrap().to_hex().unwrap());

        let path = SolutionFormatter::save_report(&r, dir.path(), OutputFormat::Json).unwrap();
        assert_eq!(SearchReport::load_from_file(path).unwrap(), r);

        let path = SolutionFormatter::save_report(&r, dir.path(), OutputFormat::Text).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("Rule:"));
    }

    #[test]
    fn test_color_output() {
        let colored = ColorOutput::colored("test", Color::Red);
        assert!(colored.contains("test"));
        assert!(ColorOutput::success("OK").contains("OK"));
    }
}
