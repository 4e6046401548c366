// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Line diff in the style of `ndiff`
//!
//! Every line is prefixed with `  ` (unchanged), `- ` (removed) or `+ `
//! (added). A removed line that was replaced by a similar one is followed
//! by a `? ` line marking the characters that differ.

/// Replaced lines at least this similar get hint lines
const SIMILARITY_CUTOFF: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    Equal(&'a str),
    Delete(&'a str),
    Insert(&'a str),
}

/// Diff two texts line by line
pub fn line_diff(before: &str, after: &str) -> String {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    let mut out: Vec<String> = Vec::new();
    let ops = diff_ops(&old, &new, MAX_LCS_CELLS);

    let mut i = 0;
    while i < ops.len() {
        match ops[i] {
            Op::Equal(line) => {
                out.push(format!("  {}", line));
                i += 1;
            }
            _ => {
                let mut deleted = Vec::new();
                let mut inserted = Vec::new();
                while i < ops.len() {
                    match ops[i] {
                        Op::Delete(line) => deleted.push(line),
                        Op::Insert(line) => inserted.push(line),
                        Op::Equal(_) => break,
                    }
                    i += 1;
                }
                emit_block(&deleted, &inserted, &mut out);
            }
        }
    }

    out.join("\n")
}

fn emit_block(deleted: &[&str], inserted: &[&str], out: &mut Vec<String>) {
    for index in 0..deleted.len().max(inserted.len()) {
        match (deleted.get(index), inserted.get(index)) {
            (Some(old), Some(new)) if similarity(old, new) >= SIMILARITY_CUTOFF => {
                let (old_hint, new_hint) = hints(old, new);
                out.push(format!("- {}", old));
                if let Some(hint) = old_hint {
                    out.push(format!("? {}", hint));
                }
                out.push(format!("+ {}", new));
                if let Some(hint) = new_hint {
                    out.push(format!("? {}", hint));
                }
            }
            (old, new) => {
                if let Some(old) = old {
                    out.push(format!("- {}", old));
                }
                if let Some(new) = new {
                    out.push(format!("+ {}", new));
                }
            }
        }
    }
}

/// Largest LCS table built before falling back to a plain replace block
const MAX_LCS_CELLS: usize = 4_000_000;

/// Longest common subsequence of lines, as edit operations
fn diff_ops<'a>(old: &[&'a str], new: &[&'a str], max_cells: usize) -> Vec<Op<'a>> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_middle = &old[prefix..old.len() - suffix];
    let new_middle = &new[prefix..new.len() - suffix];

    let mut ops = Vec::with_capacity(old.len() + new.len());
    ops.extend(old[..prefix].iter().map(|line| Op::Equal(line)));

    let cells = (old_middle.len() + 1).saturating_mul(new_middle.len() + 1);
    if cells > max_cells {
        tracing::debug!(
            "Diff of {} against {} lines is too large to align, showing a replacement",
            old_middle.len(),
            new_middle.len()
        );
        ops.extend(old_middle.iter().map(|line| Op::Delete(line)));
        ops.extend(new_middle.iter().map(|line| Op::Insert(line)));
    } else {
        lcs_ops(old_middle, new_middle, &mut ops);
    }

    ops.extend(old[old.len() - suffix..].iter().map(|line| Op::Equal(line)));
    ops
}

fn lcs_ops<'a>(old: &[&'a str], new: &[&'a str], ops: &mut Vec<Op<'a>>) {
    let n = old.len();
    let m = new.len();

    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(Op::Equal(old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Delete(old[i]));
            i += 1;
        } else {
            ops.push(Op::Insert(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|line| Op::Delete(line)));
    ops.extend(new[j..].iter().map(|line| Op::Insert(line)));
}

fn common_affixes(old: &[char], new: &[char]) -> (usize, usize) {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    (prefix, suffix)
}

fn similarity(old: &str, new: &str) -> f64 {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();
    let total = old.len() + new.len();
    if total == 0 {
        return 1.0;
    }
    let (prefix, suffix) = common_affixes(&old, &new);
    2.0 * (prefix + suffix) as f64 / total as f64
}

/// Marker lines under the differing middle of two similar lines
fn hints(old: &str, new: &str) -> (Option<String>, Option<String>) {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let (prefix, suffix) = common_affixes(&old_chars, &new_chars);

    let old_middle = old_chars.len() - prefix - suffix;
    let new_middle = new_chars.len() - prefix - suffix;

    let marker = |middle: usize, other_middle: usize, alone: char| -> Option<String> {
        if middle == 0 {
            return None;
        }
        let symbol = if other_middle == 0 { alone } else { '^' };
        let mut line = " ".repeat(prefix);
        line.extend(std::iter::repeat(symbol).take(middle));
        Some(line)
    };

    (
        marker(old_middle, new_middle, '-'),
        marker(new_middle, old_middle, '+'),
    )
}
