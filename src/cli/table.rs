//! Plain-text rendering of a classification result.
//!
//! One row per matched pair, followed by the id lists of the unmatched and empty
//! buckets. Identical rows print uncoloured, merely similar rows in magenta.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use clap::ValueEnum;
use colored::Colorize;
use itertools::Itertools;

use crate::application::ClassificationResult;
use crate::domain::{Change, EntityId, Project};

pub const HEADERS: [&str; 12] = [
    "Type",
    "id 1",
    "title 1",
    "=title?",
    "=affine?",
    "=root?",
    "N similar nodes",
    "N diff",
    "N diff tags",
    "id 2",
    "title 2",
    "Identical?",
];

/// Table column to sort matched rows by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortColumn {
    #[value(name = "type")]
    Kind,
    #[default]
    Id1,
    Title1,
    SameTitle,
    SameAffine,
    SameRoot,
    Similar,
    Diff,
    DiffTags,
    Id2,
    Title2,
    Identical,
}

/// A matched pair with the titles resolved from both projects.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    pub change: &'a Change,
    pub title1: &'a str,
    pub title2: &'a str,
}

impl Row<'_> {
    fn cells(&self) -> [String; 12] {
        let c = self.change;
        [
            c.kind.type_name().to_string(),
            c.left.0.to_string(),
            self.title1.to_string(),
            yes_no(!c.title),
            yes_no(!c.transform),
            yes_no(!c.root),
            c.common_nodes.to_string(),
            c.diff.to_string(),
            c.different_tags.len().to_string(),
            c.right.0.to_string(),
            self.title2.to_string(),
            yes_no(c.identical()),
        ]
    }

    fn cmp_by(&self, other: &Self, column: SortColumn) -> Ordering {
        let (a, b) = (self.change, other.change);
        match column {
            SortColumn::Kind => a.kind.cmp(&b.kind),
            SortColumn::Id1 => a.left.cmp(&b.left),
            SortColumn::Title1 => self.title1.cmp(other.title1),
            SortColumn::SameTitle => b.title.cmp(&a.title),
            SortColumn::SameAffine => b.transform.cmp(&a.transform),
            SortColumn::SameRoot => b.root.cmp(&a.root),
            SortColumn::Similar => a.common_nodes.cmp(&b.common_nodes),
            SortColumn::Diff => a.diff.cmp(&b.diff),
            SortColumn::DiffTags => a.different_tags.len().cmp(&b.different_tags.len()),
            SortColumn::Id2 => a.right.cmp(&b.right),
            SortColumn::Title2 => self.title2.cmp(other.title2),
            SortColumn::Identical => a.identical().cmp(&b.identical()),
        }
    }
}

fn yes_no(b: bool) -> String {
    String::from(if b { "yes" } else { "no" })
}

fn titles(project: &Project) -> HashMap<EntityId, &str> {
    project
        .entities
        .iter()
        .map(|e| (e.id, e.title.as_str()))
        .collect()
}

/// Rows for every change in `result`, in left id order.
pub fn build_rows<'a>(result: &'a ClassificationResult, p1: &'a Project, p2: &'a Project) -> Vec<Row<'a>> {
    let (t1, t2) = (titles(p1), titles(p2));
    result
        .rows()
        .into_iter()
        .map(|change| Row {
            change,
            title1: t1.get(&change.left).copied().unwrap_or_default(),
            title2: t2.get(&change.right).copied().unwrap_or_default(),
        })
        .collect()
}

/// Stable sort; ties keep left id order.
pub fn sort_rows(rows: &mut [Row<'_>], column: SortColumn, descending: bool) {
    rows.sort_by(|a, b| {
        let ord = a.cmp_by(b, column);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Render rows as an aligned text table; `show_tags` adds the per-node tag diffs.
pub fn render(rows: &[Row<'_>], show_tags: bool) -> String {
    let cells: Vec<[String; 12]> = rows.iter().map(Row::cells).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |items: &[String]| {
        items
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    out.push(line(&header).bold().to_string());
    out.push(widths.iter().map(|w| "-".repeat(*w)).join("-+-"));

    for (row, cells) in rows.iter().zip(&cells) {
        let text = line(cells);
        if row.change.identical() {
            out.push(text);
        } else {
            out.push(text.magenta().to_string());
        }
        if show_tags {
            for td in &row.change.different_tags {
                out.push(format!("    {td}"));
            }
        }
    }
    out.join("\n")
}

/// Render one id bucket: a header followed by `#id "title"` lines.
pub fn render_ids(label: &str, ids: &BTreeSet<EntityId>, project: &Project) -> String {
    let t = titles(project);
    let mut out = vec![format!("{} ({})", label, ids.len()).cyan().bold().to_string()];
    out.extend(
        ids.iter()
            .map(|id| format!("  {} \"{}\"", id, t.get(id).copied().unwrap_or_default())),
    );
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{compare, CompareOptions, EntityKind};
    use crate::util::testing::chain_entity;

    fn fixture() -> (Project, Project, ClassificationResult) {
        let a1 = chain_entity(1, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]);
        let a2 = chain_entity(2, EntityKind::Treeline, &[(5.0, 5.0), (6.0, 5.0), (7.0, 5.0)]);
        let b1 = chain_entity(10, EntityKind::Treeline, &[(0.0, 0.0), (1.0, 0.0)]);
        let b2 = chain_entity(20, EntityKind::Treeline, &[(5.0, 5.0)]);
        let opts = CompareOptions::default();

        let mut result = ClassificationResult::default();
        result.matched.insert(a1.id, vec![compare(&a1, &b1, &opts).unwrap()]);
        result.matched.insert(a2.id, vec![compare(&a2, &b2, &opts).unwrap()]);

        (Project::new("A", vec![a1, a2]), Project::new("B", vec![b1, b2]), result)
    }

    #[test]
    fn given_result_when_building_rows_then_titles_resolved() {
        let (p1, p2, result) = fixture();
        let rows = build_rows(&result, &p1, &p2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title1, "Treeline 1");
        assert_eq!(rows[1].title2, "Treeline 20");
    }

    #[test]
    fn given_rows_when_sorting_by_diff_descending_then_largest_first() {
        let (p1, p2, result) = fixture();
        let mut rows = build_rows(&result, &p1, &p2);
        sort_rows(&mut rows, SortColumn::Diff, true);
        assert_eq!(rows[0].change.left, EntityId(2));
        sort_rows(&mut rows, SortColumn::Id1, false);
        assert_eq!(rows[0].change.left, EntityId(1));
    }

    #[test]
    fn given_rows_when_rendering_without_color_then_all_headers_and_rows_present() {
        colored::control::set_override(false);
        let (p1, p2, result) = fixture();
        let rows = build_rows(&result, &p1, &p2);
        let text = render(&rows, false);
        for h in HEADERS {
            assert!(text.contains(h), "missing header {h}");
        }
        assert_eq!(text.lines().count(), 4);
    }
}
