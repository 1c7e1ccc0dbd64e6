//! 券码生成器
//!
//! 从字符集中独立均匀地抽取字符，可选分段与前缀。
//! 生成器不做去重，唯一性由存储层的唯一约束保证。

use rand::Rng;
use voucher_shared::config::CodeConfig;

use crate::error::{Result, VoucherError};

/// 券码生成器
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    length: usize,
    alphabet: Vec<char>,
    segment_length: usize,
    separator: String,
}

impl CodeGenerator {
    /// 根据配置构建生成器，配置非法时返回校验错误
    pub fn new(config: &CodeConfig) -> Result<Self> {
        if config.length == 0 {
            return Err(VoucherError::Validation("券码长度必须大于 0".to_string()));
        }
        if config.segment_length == 0 {
            return Err(VoucherError::Validation("分段长度必须大于 0".to_string()));
        }

        let mut alphabet: Vec<char> = config.alphabet.chars().collect();
        alphabet.sort_unstable();
        alphabet.dedup();
        if alphabet.is_empty() {
            return Err(VoucherError::Validation("券码字符集不能为空".to_string()));
        }

        Ok(Self {
            length: config.length,
            alphabet,
            segment_length: config.segment_length,
            separator: config.segment_separator.clone(),
        })
    }

    /// 使用线程本地随机源生成券码
    pub fn generate(&self, prefix: &str, segmented: bool) -> String {
        self.generate_with(&mut rand::rng(), prefix, segmented)
    }

    /// 使用调用方提供的随机源生成券码
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        prefix: &str,
        segmented: bool,
    ) -> String {
        let body: Vec<char> = (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect();

        let mut code = String::with_capacity(prefix.len() + self.length * 2);
        code.push_str(prefix);

        if segmented {
            for (i, chunk) in body.chunks(self.segment_length).enumerate() {
                if i > 0 {
                    code.push_str(&self.separator);
                }
                code.extend(chunk);
            }
        } else {
            code.extend(body);
        }

        code
    }
}
