use std::collections::BTreeSet;

use thiserror::Error;

use crate::template::{CompiledTemplate, FieldValue, MatchError};
use crate::template::matcher::FieldTypes;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("inconsistent placeholder sets across templates: {details}")]
    InconsistentPlaceholders { details: String },
    #[error("sort key '{0}' does not name a template placeholder")]
    UnknownSortKey(String),
}

/// 命中某一列模板的文件：文件名 + 按占位符顺序解码出的字段。
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub name: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl FileEntry {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// 行首的字段摘要：每字段一行 `name:value`，按占位符顺序。
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .map(|(n, v)| format!("{}:{}", n, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 一代网格索引：列头（模板串，按配置顺序）+ 各列独立过滤/排序后的命中列表。
/// 构建完成后不可变；读者通过 refresher 的原子指针拿到完整一代。
pub struct GridIndex {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<FileEntry>>,
}

/// 一次 lookup 的结果：首列字段摘要 + 每列该行位置的文件名。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowView {
    pub summary: String,
    pub images: Vec<String>,
}

impl GridIndex {
    pub fn empty() -> Self {
        Self {
            headers: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// 可完整取出的行数：最短列的长度。
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// 按位置对齐取一行。任一列越界即 None，绝不 panic。
    pub fn lookup(&self, row_id: usize) -> Option<RowView> {
        let first = self.columns.first()?.get(row_id)?;
        let mut images = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            images.push(column.get(row_id)?.name.clone());
        }
        Some(RowView {
            summary: first.summary(),
            images,
        })
    }
}

/// 配置期校验：所有列模板的占位符名集合必须两两相同，
/// 且 sort key（如给出）必须是共享占位符之一。启动失败，绝不默默容忍。
pub fn validate_templates(
    templates: &[CompiledTemplate],
    sort_key: Option<&str>,
) -> Result<(), IndexError> {
    let sets: Vec<BTreeSet<&str>> = templates
        .iter()
        .map(|t| t.field_names().iter().map(String::as_str).collect())
        .collect();

    if let Some(first) = sets.first() {
        for (i, set) in sets.iter().enumerate().skip(1) {
            if set != first {
                return Err(IndexError::InconsistentPlaceholders {
                    details: format!(
                        "{:?} has {{{}}}, {:?} has {{{}}}",
                        templates[0].template(),
                        first.iter().cloned().collect::<Vec<_>>().join(", "),
                        templates[i].template(),
                        set.iter().cloned().collect::<Vec<_>>().join(", "),
                    ),
                });
            }
        }

        if let Some(key) = sort_key {
            if !first.contains(key) {
                return Err(IndexError::UnknownSortKey(key.to_string()));
            }
        }
    }
    Ok(())
}

/// 纯函数：(文件列表, 列模板, 排序键) -> 一代索引。
///
/// 每列独立匹配全部文件；NoMatch / Conversion 都只是把该文件排除出该列，
/// 不向上冒错（Conversion 在 debug 日志里可区分）。给定 sort key 时各列
/// 按该字段降序稳定排序，否则保留目录列举顺序。
pub fn build(
    file_names: &[String],
    templates: &[CompiledTemplate],
    types: &FieldTypes,
    sort_key: Option<&str>,
) -> GridIndex {
    let mut columns = Vec::with_capacity(templates.len());

    for template in templates {
        let mut entries: Vec<FileEntry> = Vec::new();
        for name in file_names {
            match template.matches(name, types) {
                Ok(fields) => entries.push(FileEntry {
                    name: name.clone(),
                    fields,
                }),
                Err(MatchError::NoMatch) => {}
                Err(err) => {
                    // Conversion / ArityMismatch：结构命中但字段不可用，排除并留痕
                    tracing::debug!(
                        "excluding {:?} from column {:?}: {}",
                        name,
                        template.template(),
                        err
                    );
                }
            }
        }

        if let Some(key) = sort_key {
            // 降序 + 稳定：相等键保持输入相对顺序
            entries.sort_by(|a, b| b.field(key).cmp(&a.field(key)));
        }

        columns.push(entries);
    }

    let lengths: Vec<usize> = columns.iter().map(Vec::len).collect();
    if lengths.windows(2).any(|w| w[0] != w[1]) {
        // 位置对齐成行依赖各列等长；不等长保持兼容但必须暴露出来
        tracing::warn!(
            "column lengths diverge after filtering: {:?} (rows truncated to {})",
            lengths,
            lengths.iter().min().copied().unwrap_or(0)
        );
    }

    GridIndex {
        headers: templates.iter().map(|t| t.template().to_string()).collect(),
        columns,
    }
}
