// ==========================================
// CRM 卡片导入服务 - 上传内容解码器
// ==========================================
// 输入: base64 字符串 或 data URL (data:text/csv;base64,....)
// 输出: CSV 文本（UTF-8，去 BOM；非 UTF-8 时按 Windows-1252 回退）
// 红线: 超过大小上限的内容在解码前/解码后均拒绝，不进入行处理
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

// 允许缺省/多余 padding，前端 FileReader 与手工拼接两种来源都能解
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const UTF8_BOM: &str = "\u{feff}";

pub struct PayloadDecoder {
    max_bytes: usize,
}

impl PayloadDecoder {
    /// # 参数
    /// - max_bytes: 解码后内容大小上限
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// 解码上传内容为 CSV 文本
    ///
    /// # 返回
    /// - Ok(String): CSV 文本
    /// - Err(PayloadTooLarge): 超过上限
    /// - Err(PayloadDecodeError): 非法 base64 / 非 base64 data URL / 空内容
    pub fn decode(&self, encoded: &str) -> ImportResult<String> {
        let body = Self::strip_data_url(encoded.trim())?;

        // base64 中可能夹带换行（邮件风格折行）
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.is_empty() {
            return Err(ImportError::PayloadDecodeError("上传内容为空".to_string()));
        }

        // 解码前按编码长度估算，避免为超大内容分配内存
        let estimated = Self::estimated_decoded_len(&compact);
        if estimated > self.max_bytes {
            return Err(ImportError::PayloadTooLarge {
                actual: estimated,
                limit: self.max_bytes,
            });
        }

        let bytes = STANDARD_LENIENT
            .decode(compact.as_bytes())
            .or_else(|_| URL_SAFE_LENIENT.decode(compact.as_bytes()))?;

        if bytes.len() > self.max_bytes {
            return Err(ImportError::PayloadTooLarge {
                actual: bytes.len(),
                limit: self.max_bytes,
            });
        }

        Ok(Self::bytes_to_text(bytes))
    }

    /// 去掉 data URL 前缀，返回 base64 部分
    fn strip_data_url(input: &str) -> ImportResult<&str> {
        if !input.starts_with("data:") {
            return Ok(input);
        }

        let (meta, body) = input.split_once(',').ok_or_else(|| {
            ImportError::PayloadDecodeError("data URL 缺少 ',' 分隔符".to_string())
        })?;

        if !meta.to_ascii_lowercase().ends_with(";base64") {
            return Err(ImportError::PayloadDecodeError(
                "仅支持 base64 编码的 data URL".to_string(),
            ));
        }
        Ok(body)
    }

    fn estimated_decoded_len(compact: &str) -> usize {
        let padding = compact.chars().rev().take_while(|c| *c == '=').count();
        ((compact.len() / 4) * 3 + (compact.len() % 4).saturating_sub(1))
            .saturating_sub(padding.min(2))
    }

    fn bytes_to_text(bytes: Vec<u8>) -> String {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(err.as_bytes());
                decoded.into_owned()
            }
        };
        match text.strip_prefix(UTF8_BOM) {
            Some(stripped) => stripped.to_string(),
            None => text,
        }
    }
}
