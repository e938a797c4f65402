use std::cmp::Ordering;
use std::fmt;

/// 字段目标类型：闭集，新增类型时同步扩展 convert / FieldValue。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// 把捕获的原始子串转换为目标类型；失败返回 None（由调用方包装为 Conversion 错误）。
    pub fn convert(self, raw: &str) -> Option<FieldValue> {
        match self {
            FieldType::Int => raw.parse::<i64>().ok().map(FieldValue::Int),
            FieldType::Str => Some(FieldValue::Str(raw.to_string())),
        }
    }
}

/// 从文件名解码出的字段值。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        // 同一字段在一致的模板配置下类型恒定；跨类型分支只为全序兜底。
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Str(a), FieldValue::Str(b)) => a.cmp(b),
            (FieldValue::Int(_), FieldValue::Str(_)) => Ordering::Less,
            (FieldValue::Str(_), FieldValue::Int(_)) => Ordering::Greater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_conversion_accepts_signed_decimal() {
        assert_eq!(FieldType::Int.convert("42"), Some(FieldValue::Int(42)));
        assert_eq!(FieldType::Int.convert("-7"), Some(FieldValue::Int(-7)));
        assert_eq!(FieldType::Int.convert("bad"), None);
        assert_eq!(FieldType::Int.convert(""), None);
    }

    #[test]
    fn str_conversion_is_identity() {
        assert_eq!(
            FieldType::Str.convert("0012"),
            Some(FieldValue::Str("0012".to_string()))
        );
    }

    #[test]
    fn display_renders_bare_value() {
        assert_eq!(FieldValue::Int(3).to_string(), "3");
        assert_eq!(FieldValue::Str("a".into()).to_string(), "a");
    }
}
