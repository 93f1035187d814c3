use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;

use crate::error::AppError;

use super::envelope::SubmissionEnvelope;

/// 单个 handler 的渲染产物
///
/// `record` 是提取出的字段记录（JSON 形式，随响应日志输出）；`misses`
/// 列出按省略/回退策略跳过的素材键，调用方以计数形式上报给客户端。
#[derive(Debug)]
pub struct RenderOutput {
    pub png: Vec<u8>,
    pub record: serde_json::Value,
    pub misses: Vec<String>,
}

/// 机种 handler 的统一能力接口：提取字段并渲染 scorecard
///
/// 实现集合封闭且在启动期注册完毕，请求期只做表查找，不存在按名称的
/// 动态装载。渲染是 CPU 密集操作，由调用方放入阻塞线程池执行。
pub trait GameHandler: Send + Sync {
    /// 注册名（分发表 handler 字段引用的名字）
    fn name(&self) -> &'static str;

    /// 从提交文档生成 scorecard 图像
    fn generate(&self, envelope: &SubmissionEnvelope) -> Result<RenderOutput, AppError>;
}

/// datecode 闭区间 → handler 名
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionRange {
    pub min: u32,
    pub max: u32,
    pub handler: String,
}

impl RevisionRange {
    pub fn contains(&self, datecode: u32) -> bool {
        self.min <= datecode && datecode <= self.max
    }
}

/// 机种家族 → datecode 区间列表的只读分发表
///
/// 构建时即拒绝非法区间与同家族内的区间重叠，请求期查找因此无需
/// 处理"多个区间同时命中"的歧义。
#[derive(Debug, Default)]
pub struct DispatchTable {
    families: HashMap<String, Vec<RevisionRange>>,
}

impl DispatchTable {
    pub fn from_families(
        families: HashMap<String, Vec<RevisionRange>>,
    ) -> Result<Self, AppError> {
        for (family, ranges) in &families {
            for r in ranges {
                if r.min > r.max {
                    return Err(AppError::Internal(format!(
                        "分发表 {family} 区间非法: min {} > max {}",
                        r.min, r.max
                    )));
                }
            }
            for (i, a) in ranges.iter().enumerate() {
                for b in ranges.iter().skip(i + 1) {
                    if a.min <= b.max && b.min <= a.max {
                        return Err(AppError::Internal(format!(
                            "分发表 {family} 存在重叠区间: [{}, {}] 与 [{}, {}]",
                            a.min, a.max, b.min, b.max
                        )));
                    }
                }
            }
        }
        Ok(Self { families })
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// 按 (家族, datecode) 查 handler 名；闭区间匹配，查不到返回 None
    pub fn handler_name(&self, family: &str, datecode: u32) -> Option<&str> {
        self.families
            .get(family)?
            .iter()
            .find(|r| r.contains(datecode))
            .map(|r| r.handler.as_str())
    }

    fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.families
            .values()
            .flat_map(|ranges| ranges.iter().map(|r| r.handler.as_str()))
    }
}

/// 分发表与已注册 handler 实现的组合
pub struct HandlerRegistry {
    table: DispatchTable,
    handlers: HashMap<&'static str, Arc<dyn GameHandler>>,
}

impl HandlerRegistry {
    /// 组装注册表；分发表引用了未注册的 handler 名时直接失败，
    /// 避免把配置缺陷留到第一个命中请求才暴露。
    pub fn new(
        table: DispatchTable,
        implementations: Vec<Arc<dyn GameHandler>>,
    ) -> Result<Self, AppError> {
        let mut handlers = HashMap::new();
        for h in implementations {
            let name = h.name();
            if handlers.insert(name, h).is_some() {
                return Err(AppError::Internal(format!("handler 重复注册: {name}")));
            }
        }

        for name in table.handler_names() {
            if !handlers.contains_key(name) {
                return Err(AppError::Internal(format!(
                    "分发表引用了未注册的 handler: {name}"
                )));
            }
        }

        Ok(Self { table, handlers })
    }

    /// 请求期路由：线性扫描家族区间列表，闭区间首个命中生效
    pub fn resolve(
        &self,
        family: &str,
        datecode: u32,
    ) -> Result<Arc<dyn GameHandler>, AppError> {
        let name = self.table.handler_name(family, datecode).ok_or_else(|| {
            AppError::UnsupportedTarget(format!("model {family} datecode {datecode}"))
        })?;
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("handler 未注册: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchTable, GameHandler, HandlerRegistry, RenderOutput, RevisionRange};
    use crate::error::AppError;
    use crate::features::scorecard::envelope::SubmissionEnvelope;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn table(ranges: Vec<RevisionRange>) -> DispatchTable {
        let mut families = HashMap::new();
        families.insert("PIX".to_string(), ranges);
        DispatchTable::from_families(families).expect("valid table")
    }

    fn range(min: u32, max: u32, handler: &str) -> RevisionRange {
        RevisionRange {
            min,
            max,
            handler: handler.to_string(),
        }
    }

    struct NoopHandler;

    impl GameHandler for NoopHandler {
        fn name(&self) -> &'static str {
            "museca1_5"
        }

        fn generate(&self, _: &SubmissionEnvelope) -> Result<RenderOutput, AppError> {
            Ok(RenderOutput {
                png: Vec::new(),
                record: serde_json::Value::Null,
                misses: Vec::new(),
            })
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let t = table(vec![range(100, 200, "museca1_5")]);
        assert_eq!(t.handler_name("PIX", 100), Some("museca1_5"));
        assert_eq!(t.handler_name("PIX", 200), Some("museca1_5"));
        assert_eq!(t.handler_name("PIX", 99), None);
        assert_eq!(t.handler_name("PIX", 201), None);
    }

    #[test]
    fn unknown_family_is_not_routed() {
        let t = table(vec![range(100, 200, "museca1_5")]);
        assert_eq!(t.handler_name("KFC", 150), None);
    }

    #[test]
    fn disjoint_ranges_route_independently() {
        let t = table(vec![
            range(100, 200, "museca1_5"),
            range(201, 300, "museca2"),
        ]);
        assert_eq!(t.handler_name("PIX", 150), Some("museca1_5"));
        assert_eq!(t.handler_name("PIX", 201), Some("museca2"));
        assert_eq!(t.handler_name("PIX", 301), None);
    }

    #[test]
    fn overlapping_ranges_are_rejected_at_build() {
        let mut families = HashMap::new();
        families.insert(
            "PIX".to_string(),
            vec![range(100, 200, "a"), range(200, 300, "b")],
        );
        assert!(DispatchTable::from_families(families).is_err());
    }

    #[test]
    fn inverted_range_is_rejected_at_build() {
        let mut families = HashMap::new();
        families.insert("PIX".to_string(), vec![range(300, 200, "a")]);
        assert!(DispatchTable::from_families(families).is_err());
    }

    #[test]
    fn registry_rejects_unregistered_handler_names() {
        let t = table(vec![range(100, 200, "museca1_5"), range(300, 400, "ghost")]);
        let result = HandlerRegistry::new(t, vec![Arc::new(NoopHandler)]);
        assert!(result.is_err());
    }

    #[test]
    fn registry_resolves_to_unsupported_outside_ranges() {
        let t = table(vec![range(100, 200, "museca1_5")]);
        let registry = HandlerRegistry::new(t, vec![Arc::new(NoopHandler)]).expect("registry");

        assert!(registry.resolve("PIX", 150).is_ok());
        assert!(matches!(
            registry.resolve("PIX", 500),
            Err(AppError::UnsupportedTarget(_))
        ));
        assert!(matches!(
            registry.resolve("KFC", 150),
            Err(AppError::UnsupportedTarget(_))
        ));
    }
}
