use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use rustvault_core::{FileNode, KindFilter, UnknownVariant};
use serde::{Deserialize, Serialize};

/// Ordering applied to a folder listing.
/// 資料夾清單的排序方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    DateModified,
    Day,
    Month,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Name,
        SortKey::Size,
        SortKey::DateModified,
        SortKey::Day,
        SortKey::Month,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::DateModified => "date-modified",
            SortKey::Day => "day",
            SortKey::Month => "month",
        }
    }

    /// Compares two nodes under this key; ties fall back to ascending name.
    pub fn compare(self, a: &FileNode, b: &FileNode) -> Ordering {
        let primary = match self {
            SortKey::Name => Ordering::Equal,
            SortKey::Size => b.total_bytes().cmp(&a.total_bytes()),
            SortKey::DateModified => b.last_modified.cmp(&a.last_modified),
            SortKey::Day => day_of(b).cmp(&day_of(a)),
            SortKey::Month => month_of(b).cmp(&month_of(a)),
        };
        primary.then_with(|| compare_names(&a.name, &b.name))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "date-modified" | "date" | "modified" => Ok(SortKey::DateModified),
            "day" => Ok(SortKey::Day),
            "month" => Ok(SortKey::Month),
            _ => Err(UnknownVariant(value.to_string())),
        }
    }
}

fn day_of(node: &FileNode) -> (i32, u32) {
    (node.last_modified.year(), node.last_modified.ordinal())
}

fn month_of(node: &FileNode) -> (i32, u32) {
    (node.last_modified.year(), node.last_modified.month())
}

/// Case-insensitive first, exact comparison second.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Filters then sorts a set of sibling nodes.
/// 先篩選再排序同層節點。
pub fn arrange<I>(nodes: I, filter: KindFilter, sort: SortKey) -> Vec<FileNode>
where
    I: IntoIterator<Item = FileNode>,
{
    let mut listed: Vec<FileNode> = nodes
        .into_iter()
        .filter(|node| filter.matches(node.kind))
        .collect();
    listed.sort_by(|a, b| sort.compare(a, b));
    listed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rustvault_core::{FileKind, FileSize};

    fn node(name: &str, kind: FileKind, bytes: u64, (y, m, d, h): (i32, u32, u32, u32)) -> FileNode {
        let mut node = if kind == FileKind::Folder {
            FileNode::folder(name)
        } else {
            FileNode::file(name, kind, FileSize::from_bytes(bytes), None)
        };
        node.last_modified = Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap();
        node
    }

    fn names(nodes: &[FileNode]) -> Vec<&str> {
        nodes.iter().map(|node| node.name.as_str()).collect()
    }

    #[test]
    fn name_sort_is_case_insensitive() {
        let listed = arrange(
            vec![
                node("beta.txt", FileKind::Document, 1, (2024, 1, 1, 0)),
                node("Alpha.txt", FileKind::Document, 1, (2024, 1, 1, 0)),
                node("alpha.txt", FileKind::Document, 1, (2024, 1, 1, 0)),
            ],
            KindFilter::All,
            SortKey::Name,
        );
        assert_eq!(names(&listed), vec!["Alpha.txt", "alpha.txt", "beta.txt"]);
    }

    #[test]
    fn size_sort_counts_folder_subtrees() {
        let mut folder = node("bundle", FileKind::Folder, 0, (2024, 1, 1, 0));
        folder
            .children
            .push(node("big.zip", FileKind::Archive, 5000, (2024, 1, 1, 0)));
        let listed = arrange(
            vec![
                node("small.png", FileKind::Image, 10, (2024, 1, 1, 0)),
                folder,
                node("mid.pdf", FileKind::Pdf, 300, (2024, 1, 1, 0)),
            ],
            KindFilter::All,
            SortKey::Size,
        );
        assert_eq!(names(&listed), vec!["bundle", "mid.pdf", "small.png"]);
    }

    #[test]
    fn day_sort_breaks_ties_by_name() {
        let listed = arrange(
            vec![
                node("b.txt", FileKind::Document, 1, (2024, 3, 2, 9)),
                node("a.txt", FileKind::Document, 1, (2024, 3, 2, 18)),
                node("c.txt", FileKind::Document, 1, (2024, 3, 5, 1)),
            ],
            KindFilter::All,
            SortKey::Day,
        );
        assert_eq!(names(&listed), vec!["c.txt", "a.txt", "b.txt"]);

        let by_time = arrange(listed, KindFilter::All, SortKey::DateModified);
        assert_eq!(names(&by_time), vec!["c.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn month_sort_groups_calendar_months() {
        let listed = arrange(
            vec![
                node("z.txt", FileKind::Document, 1, (2024, 3, 1, 0)),
                node("y.txt", FileKind::Document, 1, (2024, 3, 30, 0)),
                node("x.txt", FileKind::Document, 1, (2024, 2, 28, 0)),
            ],
            KindFilter::All,
            SortKey::Month,
        );
        assert_eq!(names(&listed), vec!["y.txt", "z.txt", "x.txt"]);
    }

    #[test]
    fn filter_keeps_matching_kinds() {
        let listed = arrange(
            vec![
                node("clip.mp4", FileKind::Video, 1, (2024, 1, 1, 0)),
                node("docs", FileKind::Folder, 0, (2024, 1, 1, 0)),
                node("sheet.xlsx", FileKind::Spreadsheet, 1, (2024, 1, 1, 0)),
            ],
            KindFilter::Document,
            SortKey::Name,
        );
        assert_eq!(names(&listed), vec!["sheet.xlsx"]);
    }

    #[test]
    fn sort_key_parses_labels() {
        assert_eq!("Date Modified".parse::<SortKey>().unwrap(), SortKey::DateModified);
        assert_eq!("month".parse::<SortKey>().unwrap(), SortKey::Month);
        assert!("colour".parse::<SortKey>().is_err());
    }
}
