// ==========================================
// CRM 卡片导入服务 - 列引用解析
// ==========================================
// 列引用 → 列位置，按以下顺序匹配:
// 1. 列标签完全一致
// 2. 去除首尾空白后忽略大小写一致
// 3. 0 起始的列序号
// ==========================================

use crate::domain::import::CsvRow;

#[derive(Debug, Clone)]
pub struct ColumnIndex {
    labels: Vec<String>,
    width: usize,
}

impl ColumnIndex {
    /// # 参数
    /// - labels: 列标签
    /// - width: 最大列数（不小于标签数）
    pub fn new(labels: Vec<String>, width: usize) -> Self {
        let width = width.max(labels.len());
        Self { labels, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// 表头中的非空标签
    pub fn header_label(&self, idx: usize) -> Option<&str> {
        self.labels
            .get(idx)
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
    }

    /// 解析列引用
    ///
    /// # 返回
    /// - Some(idx): 列位置
    /// - None: 无法匹配任何列
    pub fn resolve(&self, reference: &str) -> Option<usize> {
        if let Some(idx) = self.labels.iter().position(|l| l == reference) {
            return Some(idx);
        }

        let wanted = reference.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        if let Some(idx) = self
            .labels
            .iter()
            .position(|l| l.trim().to_lowercase() == wanted)
        {
            return Some(idx);
        }

        wanted
            .parse::<usize>()
            .ok()
            .filter(|idx| *idx < self.width)
    }

    /// 列标签（越界时返回列序号）
    pub fn label(&self, idx: usize) -> String {
        self.labels
            .get(idx)
            .cloned()
            .unwrap_or_else(|| idx.to_string())
    }

    /// 读取单元格（去除首尾空白，空值视为缺失）
    pub fn cell<'a>(&self, row: &'a CsvRow, idx: usize) -> Option<&'a str> {
        row.cells
            .get(idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ColumnIndex {
        ColumnIndex::new(
            vec![
                "Title".to_string(),
                " Amount ".to_string(),
                "3".to_string(),
                "Status".to_string(),
            ],
            5,
        )
    }

    #[test]
    fn test_resolve_exact_then_case_insensitive() {
        let idx = index();
        assert_eq!(idx.resolve("Title"), Some(0));
        assert_eq!(idx.resolve("title"), Some(0));
        assert_eq!(idx.resolve("amount"), Some(1));
        assert_eq!(idx.resolve(" STATUS "), Some(3));
    }

    #[test]
    fn test_label_match_wins_over_index() {
        // 标签 "3" 位于第 2 列
        assert_eq!(index().resolve("3"), Some(2));
    }

    #[test]
    fn test_resolve_by_index_and_out_of_range() {
        let idx = index();
        assert_eq!(idx.resolve("1"), Some(1));
        // 表头之外的列仍可按序号引用
        assert_eq!(idx.resolve("4"), Some(4));
        assert_eq!(idx.resolve("9"), None);
        assert_eq!(idx.resolve("missing"), None);
        assert_eq!(idx.resolve("  "), None);
    }

    #[test]
    fn test_cell_trims_and_treats_blank_as_missing() {
        let idx = index();
        let row = CsvRow {
            row_number: 1,
            cells: vec!["  Deal ".to_string(), "   ".to_string()],
        };
        assert_eq!(idx.cell(&row, 0), Some("Deal"));
        assert_eq!(idx.cell(&row, 1), None);
        assert_eq!(idx.cell(&row, 5), None);
    }

    #[test]
    fn test_labels_for_columns_beyond_header() {
        let idx = index();
        assert_eq!(idx.label(4), "4");
        assert_eq!(idx.header_label(1), Some("Amount"));
        assert_eq!(idx.header_label(4), None);
    }
}
