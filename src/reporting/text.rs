use crate::reporting::reporter::{Entry, Reporter};
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

// ==============================
// BOX CONFIGURATION
// ==============================

const BOX_WIDTH: usize = 70;
const INNER_WIDTH: usize = BOX_WIDTH - 2;

fn top_border() -> String {
    format!("╔{}╗", "═".repeat(INNER_WIDTH))
}

fn middle_border() -> String {
    format!("╠{}╣", "═".repeat(INNER_WIDTH))
}

fn bottom_border() -> String {
    format!("╚{}╝", "═".repeat(INNER_WIDTH))
}

fn box_line(content: &str) -> String {
    let padded = format!(" {} ", content);
    let padding = INNER_WIDTH.saturating_sub(UnicodeWidthStr::width(padded.as_str()));
    format!("║{}{}║", padded, " ".repeat(padding))
}

fn box_line_centered(content: &str) -> String {
    let padded = format!(" {} ", content);
    let width = UnicodeWidthStr::width(padded.as_str());
    if width >= INNER_WIDTH {
        return box_line(content);
    }
    let left = (INNER_WIDTH - width) / 2;
    let right = INNER_WIDTH - width - left;
    format!("║{}{}{}║", " ".repeat(left), padded, " ".repeat(right))
}

// ==============================
// MAIN REPORT RENDERER
// ==============================

pub fn render(reporter: &Reporter) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", top_border());
    let _ = writeln!(out, "{}", box_line_centered("BLINDSPOT RESULTS"));
    let _ = writeln!(out, "{}", middle_border());
    let _ = writeln!(out, "{}", box_line(&format!("Target  : {}", reporter.target())));
    let _ = writeln!(out, "{}", box_line(&format!("Dialect : {}", reporter.dialect())));
    let _ = writeln!(out, "{}", bottom_border());

    if reporter.entries().is_empty() {
        let _ = writeln!(out, "\nNothing recovered.");
        return out;
    }

    for entry in reporter.entries() {
        let _ = writeln!(out);
        match entry {
            Entry::Value { label, value } => {
                let _ = writeln!(out, "[+] {}: '{}'", label, value);
            }
            Entry::Listing {
                label,
                items,
                failures,
            } => {
                let _ = writeln!(out, "[+] {} ({}):", label, items.len());
                for item in items {
                    let _ = writeln!(out, "    {}", item);
                }
                write_failures(&mut out, failures);
            }
            Entry::Dump { dump, failures } => {
                let _ = writeln!(
                    out,
                    "[+] {}.{} ({} rows):",
                    dump.schema,
                    dump.table,
                    dump.rows.len()
                );
                out.push_str(&dump.to_table());
                write_failures(&mut out, failures);
            }
            Entry::Spray {
                candidates,
                outcome,
            } => match &outcome.hit {
                Some(hit) => {
                    let _ = writeln!(
                        out,
                        "[+] Spray hit: '{}' (candidate #{} of {}, {} probes)",
                        hit.candidate.value, hit.index, candidates, outcome.probes_issued
                    );
                    if let Some(correlated) = &hit.candidate.correlated {
                        let _ = writeln!(out, "    correlated: {}", correlated);
                    }
                }
                None => {
                    let _ = writeln!(
                        out,
                        "[-] Spray: no hit among {} candidates ({} probes)",
                        candidates, outcome.probes_issued
                    );
                }
            },
        }
    }
    out
}

fn write_failures(out: &mut String, failures: &[String]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "[!] {} item(s) not recovered:", failures.len());
    for failure in failures {
        let _ = writeln!(out, "    {}", failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_lines_are_aligned() {
        assert_eq!(box_line("x").chars().count(), BOX_WIDTH);
        assert_eq!(box_line_centered("BLINDSPOT RESULTS").chars().count(), BOX_WIDTH);
    }

    #[test]
    fn test_render_value_and_failures() {
        let mut reporter = Reporter::new("http://t/", "PostgreSQL");
        reporter.add_value("version()", "PostgreSQL 16.2".into());
        reporter.add_listing(
            "columns of users",
            blindspot::Enumeration {
                items: vec!["id".into()],
                failures: vec![blindspot::sqli::ItemFailure {
                    index: 1,
                    item: "users.column[1]".into(),
                    error: blindspot::BlindError::exhausted("char 3"),
                }],
            },
        );
        let text = render(&reporter);
        assert!(text.contains("[+] version(): 'PostgreSQL 16.2'"));
        assert!(text.contains("[+] columns of users (1):"));
        assert!(text.contains("[!] 1 item(s) not recovered:"));
        assert!(text.contains("users.column[1] (#1)"));
    }
}
