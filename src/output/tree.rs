//! Parent/child view of a run
//!
//! Page results only point at their parent by ID. The tree is rebuilt from
//! those back-references; a page whose parent was never stored is shown as
//! a root.

use crate::storage::{PageRecord, PageResult};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

/// Pages of one run arranged by discovery
#[derive(Debug, Default)]
pub struct PageTree {
    pages: Vec<PageResult>,
    roots: Vec<usize>,
    children: HashMap<usize, Vec<usize>>,
}

impl PageTree {
    /// Builds the forest from stored pages, keeping storage order among siblings
    pub fn build(records: Vec<PageRecord>) -> Self {
        let pages: Vec<PageResult> = records.into_iter().map(|record| record.page).collect();
        let index_of: HashMap<&str, usize> = pages
            .iter()
            .enumerate()
            .map(|(index, page)| (page.page_id.as_str(), index))
            .collect();

        let mut roots = Vec::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        for (index, page) in pages.iter().enumerate() {
            match page
                .parent_page_id
                .as_deref()
                .and_then(|parent| index_of.get(parent))
            {
                Some(&parent) if parent != index => children.entry(parent).or_default().push(index),
                _ => roots.push(index),
            }
        }

        Self {
            pages,
            roots,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &PageResult> {
        self.roots.iter().map(|&index| &self.pages[index])
    }

    /// Direct children of the page with `page_id`
    pub fn children_of(&self, page_id: &str) -> Vec<&PageResult> {
        self.pages
            .iter()
            .position(|page| page.page_id == page_id)
            .and_then(|index| self.children.get(&index))
            .map(|kids| kids.iter().map(|&kid| &self.pages[kid]).collect())
            .unwrap_or_default()
    }

    /// Indented text rendering, one page per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut visited = HashSet::new();
        for &root in &self.roots {
            self.render_node(root, 0, &mut visited, &mut out);
        }
        out
    }

    fn render_node(&self, index: usize, level: usize, visited: &mut HashSet<usize>, out: &mut String) {
        if !visited.insert(index) {
            return;
        }

        let page = &self.pages[index];
        let marker = if page.is_success() { "+" } else { "x" };
        let _ = write!(out, "{}{} [{}] {}", "  ".repeat(level), marker, page.status_code, page.url);
        if let Some(title) = &page.title {
            let _ = write!(out, " \"{}\"", title);
        }
        out.push('\n');

        if let Some(kids) = self.children.get(&index) {
            for &kid in kids {
                self.render_node(kid, level + 1, visited, out);
            }
        }
    }
}

/// Prints the tree to stdout
pub fn print_page_tree(run_id: &str, tree: &PageTree) {
    println!("=== Page Tree for {} ({} pages) ===\n", run_id, tree.len());
    if tree.is_empty() {
        println!("No pages stored for this run");
    } else {
        print!("{}", tree.render());
    }
}
