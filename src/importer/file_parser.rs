// ==========================================
// CRM 卡片导入服务 - CSV 解析器实现
// ==========================================
// 输入: 已解码的 CSV 文本
// 输出: CsvTable (列标签 + 按列位置排列的数据行)
// 规则:
// - skip_header_row = true: 首个非空行仅作为列标签
// - skip_header_row = false: 列标签为 0 起始的列序号
// - 数据行可比表头宽，宽度取最大列数
// - 完全空白的行在编号前丢弃
// - 分隔符自动识别（',' / ';' / '\t'）
// ==========================================

use crate::domain::import::{CsvRow, CsvTable};
use crate::importer::card_importer_trait::FileParser;
use crate::importer::error::ImportResult;
use csv::{ReaderBuilder, Trim};

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 根据首个非空行识别分隔符（忽略引号内的字符）
    pub fn detect_delimiter(text: &str) -> u8 {
        let Some(first_line) = text.lines().find(|l| !l.trim().is_empty()) else {
            return b',';
        };

        let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
        let mut in_quotes = false;
        for b in first_line.bytes() {
            if b == b'"' {
                in_quotes = !in_quotes;
                continue;
            }
            if in_quotes {
                continue;
            }
            if let Some(pos) = CANDIDATE_DELIMITERS.iter().position(|d| *d == b) {
                counts[pos] += 1;
            }
        }

        // 计数相同时保持 ',' 优先
        let mut best = 0;
        for (idx, count) in counts.iter().enumerate() {
            if *count > counts[best] {
                best = idx;
            }
        }
        CANDIDATE_DELIMITERS[best]
    }
}

impl FileParser for CsvParser {
    fn parse(&self, text: &str, skip_header_row: bool) -> ImportResult<CsvTable> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .trim(Trim::All)
            .delimiter(Self::detect_delimiter(text))
            .from_reader(text.as_bytes());

        let mut records: Vec<Vec<String>> = Vec::new();
        for result in reader.records() {
            let record = result?;
            let cells: Vec<String> = record.iter().map(|v| v.to_string()).collect();

            // 跳过完全空白的行
            if cells.iter().all(|v| v.is_empty()) {
                continue;
            }
            records.push(cells);
        }

        let mut records = records.into_iter();
        let header: Option<Vec<String>> = if skip_header_row {
            records.next()
        } else {
            None
        };

        let rows: Vec<CsvRow> = records
            .enumerate()
            .map(|(idx, cells)| CsvRow {
                row_number: idx + 1,
                cells,
            })
            .collect();

        let data_width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
        let (labels, width) = match header {
            Some(labels) => {
                let width = data_width.max(labels.len());
                (labels, width)
            }
            None => ((0..data_width).map(|idx| idx.to_string()).collect(), data_width),
        };

        Ok(CsvTable {
            labels,
            width,
            rows,
        })
    }
}
