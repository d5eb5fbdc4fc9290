//! Formatted terminal output for runs, result files and template listings.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::data::SimTruth;
use crate::domain::{CandidateTable, TemplateKey, TemplateScan, ZBestRow, zwarn};
use crate::templates::Template;

/// Ranked candidates of every target.
pub fn format_candidates(tables: &[CandidateTable]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:>12} {:>4} {:<16} {:>10} {:>10} {:>14} {:>12} {:<}",
            "targetid", "znum", "type", "z", "zerr", "chi2", "deltachi2", "zwarn"
        ),
    );
    push_rule(&mut out, &[12, 4, 16, 10, 10, 14, 12, 5]);

    for table in tables {
        for row in &table.rows {
            push_line(
                &mut out,
                format!(
                    "{:>12} {:>4} {:<16} {:>10.6} {:>10.6} {:>14.3} {:>12.3} {:<}",
                    row.targetid,
                    row.znum,
                    truncate(&row.fulltype(), 16),
                    row.z,
                    row.zerr,
                    row.chi2,
                    row.deltachi2,
                    fmt_zwarn(row.zwarn),
                ),
            );
        }
    }
    out
}

/// One line per target: best redshift and warnings.
pub fn format_zbest(rows: &[ZBestRow]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!("{:>12} {:>10} {:>10} {:<}", "TARGETID", "Z", "ZERR", "ZWARN"),
    );
    push_rule(&mut out, &[12, 10, 10, 5]);
    for row in rows {
        push_line(
            &mut out,
            format!(
                "{:>12} {:>10.6} {:>10.6} {:<}",
                row.targetid,
                row.z,
                row.zerr,
                fmt_zwarn(row.zwarn)
            ),
        );
    }
    out
}

/// Per-template scan summary for one target.
pub fn format_target_scans(targetid: i64, scans: &BTreeMap<TemplateKey, TemplateScan>) -> String {
    let mut out = format!("Target {targetid}:\n");
    push_line(
        &mut out,
        format!(
            "{:<16} {:>6} {:>18} {:>10} {:>14} {:>10} {:<}",
            "type", "nz", "z range", "zbest", "minchi2", "zerr", "zwarn"
        ),
    );
    push_rule(&mut out, &[16, 6, 18, 10, 14, 10, 5]);
    for (key, scan) in scans {
        let range = match (scan.redshifts.first(), scan.redshifts.last()) {
            (Some(lo), Some(hi)) => format!("[{lo:.4}, {hi:.4}]"),
            _ => "-".to_string(),
        };
        let best = match &scan.best {
            Some(b) => format!(
                "{:>10.6} {:>14.3} {:>10.6} {:<}",
                b.z,
                b.chi2,
                b.zerr,
                fmt_zwarn(b.zwarn)
            ),
            None => format!("{:>10} {:>14} {:>10} {:<}", "-", "-", "-", "-"),
        };
        push_line(
            &mut out,
            format!(
                "{:<16} {:>6} {:>18} {best}",
                truncate(&key.fulltype(), 16),
                scan.redshifts.len(),
                range
            ),
        );
    }
    out
}

/// Loaded templates with their wavelength coverage and scan grids.
pub fn format_templates(templates: &[(PathBuf, Template)]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<16} {:>6} {:>6} {:>22} {:>6} {:>18} {:<}",
            "type", "nbasis", "nwave", "wave range [A]", "nz", "z range", "file"
        ),
    );
    push_rule(&mut out, &[16, 6, 6, 22, 6, 18, 4]);
    for (path, t) in templates {
        let wave = t.wave();
        let z = t.redshifts();
        push_line(
            &mut out,
            format!(
                "{:<16} {:>6} {:>6} {:>22} {:>6} {:>18} {}",
                truncate(&t.fulltype(), 16),
                t.nbasis(),
                t.nwave(),
                format!("[{:.1}, {:.1}]", wave[0], wave[wave.len() - 1]),
                z.len(),
                format!("[{:.4}, {:.4}]", z[0], z[z.len() - 1]),
                path.display()
            ),
        );
    }
    out
}

/// Simulation inputs, for comparing against a later `run`.
pub fn format_truth(truth: &[SimTruth]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!("{:>12} {:<16} {:>10} {:<}", "targetid", "type", "z", "coeff"),
    );
    push_rule(&mut out, &[12, 16, 10, 5]);
    for t in truth {
        push_line(
            &mut out,
            format!(
                "{:>12} {:<16} {:>10.6} {}",
                t.targetid,
                truncate(&t.template.fulltype(), 16),
                t.z,
                fmt_vec(&t.coeff)
            ),
        );
    }
    out
}

/// `0` or the `|`-joined names of the set bits.
pub fn fmt_zwarn(mask: u32) -> String {
    if mask == 0 {
        return "0".to_string();
    }
    zwarn::names(mask).join("|")
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn push_rule(out: &mut String, widths: &[usize]) {
    let parts: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(out, parts.join(" "));
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
