use regex::Regex;
use thiserror::Error;

use crate::template::value::{FieldType, FieldValue};

/// 占位符语法：`{name}`，非贪婪，取首个 `}` 结束。
const PLACEHOLDER_PATTERN: &str = r"\{(.*?)\}";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid template {template:?}: {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// 单个候选串的匹配失败原因。NoMatch 是高频正常路径；Conversion 需要在日志里可区分。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MatchError {
    #[error("no match")]
    NoMatch,
    #[error("conversion failed for field '{field}': {raw:?}")]
    Conversion { field: String, raw: String },
    #[error("field type arity mismatch: template has {expected} placeholders, got {got} types")]
    ArityMismatch { expected: usize, got: usize },
}

/// 字段类型规格：单一类型作用于全部占位符，或按位置一一对应。
#[derive(Clone, Debug)]
pub enum FieldTypes {
    Uniform(FieldType),
    PerField(Vec<FieldType>),
}

impl FieldTypes {
    fn type_at(&self, i: usize) -> Option<FieldType> {
        match self {
            FieldTypes::Uniform(t) => Some(*t),
            FieldTypes::PerField(v) => v.get(i).copied(),
        }
    }
}

/// 编译后的占位符模板：字面段按正则转义，占位符编译为非贪婪捕获组。
/// 仅锚定串首（前缀匹配语义），尾部多余字符不影响匹配。
pub struct CompiledTemplate {
    template: String,
    field_names: Vec<String>,
    regex: Regex,
}

impl CompiledTemplate {
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let placeholder = Regex::new(PLACEHOLDER_PATTERN).map_err(|source| {
            TemplateError::InvalidTemplate {
                template: template.to_string(),
                source,
            }
        })?;

        let mut field_names = Vec::new();
        let mut pattern = String::from("^");
        let mut last = 0usize;
        for caps in placeholder.captures_iter(template) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            pattern.push_str(&regex::escape(&template[last..whole.0]));
            pattern.push_str("(.+?)");
            field_names.push(caps[1].to_string());
            last = whole.1;
        }
        pattern.push_str(&regex::escape(&template[last..]));

        let regex = Regex::new(&pattern).map_err(|source| TemplateError::InvalidTemplate {
            template: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: template.to_string(),
            field_names,
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// 占位符名，按首次出现顺序。
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// 反向匹配：结构匹配 + 逐字段类型转换。任一字段转换失败则整体失败，
    /// 绝不返回部分字段集。
    pub fn matches(
        &self,
        candidate: &str,
        types: &FieldTypes,
    ) -> Result<Vec<(String, FieldValue)>, MatchError> {
        if let FieldTypes::PerField(v) = types {
            if v.len() != self.field_names.len() {
                return Err(MatchError::ArityMismatch {
                    expected: self.field_names.len(),
                    got: v.len(),
                });
            }
        }

        let caps = self.regex.captures(candidate).ok_or(MatchError::NoMatch)?;

        let mut fields = Vec::with_capacity(self.field_names.len());
        for (i, name) in self.field_names.iter().enumerate() {
            let raw = caps
                .get(i + 1)
                .map(|m| m.as_str())
                .ok_or(MatchError::NoMatch)?;
            let ty = match types.type_at(i) {
                Some(t) => t,
                None => {
                    return Err(MatchError::ArityMismatch {
                        expected: self.field_names.len(),
                        got: i,
                    })
                }
            };
            let value = ty.convert(raw).ok_or_else(|| MatchError::Conversion {
                field: name.clone(),
                raw: raw.to_string(),
            })?;
            fields.push((name.clone(), value));
        }
        Ok(fields)
    }
}
