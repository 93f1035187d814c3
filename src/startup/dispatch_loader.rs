use std::{collections::HashMap, fs, path::Path};

use crate::{
    error::AppError,
    features::scorecard::dispatch::{DispatchTable, RevisionRange},
};

/// 从声明式 JSON 文件加载机种分发表
///
/// 文件格式（model 家族 → datecode 区间列表）：
/// `{ "PIX": [ { "min": 2016071300, "max": 2018012300, "handler": "museca1_5" } ] }`
///
/// 区间重叠在这里直接判定为配置错误并中止启动，而不是留到请求期
/// 依赖“先到先得”的偶然顺序。
pub fn load_dispatch_table(path: &Path) -> Result<DispatchTable, AppError> {
    if !path.exists() {
        return Err(AppError::Internal(format!(
            "分发表文件不存在: {:?}",
            path
        )));
    }

    let raw =
        fs::read_to_string(path).map_err(|e| AppError::Internal(format!("读取分发表失败: {e}")))?;

    let families: HashMap<String, Vec<RevisionRange>> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(format!("解析分发表 JSON 失败: {e}")))?;

    let table = DispatchTable::from_families(families)?;
    tracing::info!("分发表加载完成，共 {} 个机种家族", table.family_count());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::load_dispatch_table;
    use std::io::Write;

    #[test]
    fn loads_table_from_json() {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(
            br#"{ "PIX": [ { "min": 100, "max": 200, "handler": "museca1_5" } ] }"#,
        )
        .expect("write");

        let table = load_dispatch_table(f.path()).expect("load");
        assert_eq!(table.family_count(), 1);
        assert_eq!(table.handler_name("PIX", 150), Some("museca1_5"));
    }

    #[test]
    fn overlapping_ranges_fail_at_load() {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(
            br#"{ "PIX": [
                { "min": 100, "max": 200, "handler": "a" },
                { "min": 150, "max": 300, "handler": "b" }
            ] }"#,
        )
        .expect("write");

        assert!(load_dispatch_table(f.path()).is_err());
    }
}
