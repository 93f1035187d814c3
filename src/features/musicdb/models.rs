use std::{collections::HashMap, sync::Arc};

/// 谱面难度档位（封闭集合）
///
/// 档位编码来自提交数据的 `music_type` 字段；封面文件名使用 `code + 1`，
/// 难度图标使用 `code` 本身。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Novice,
    Advanced,
    Exhaust,
}

impl Tier {
    /// 解析档位编码。编码集合封闭，未知编码返回 None（属于配置缺陷，
    /// 由调用方升级为硬错误，绝不静默回落到默认档位）。
    pub fn from_code(code: &str) -> Option<Tier> {
        match code.trim() {
            "0" => Some(Tier::Novice),
            "1" => Some(Tier::Advanced),
            "2" => Some(Tier::Exhaust),
            _ => None,
        }
    }

    /// 档位数字编码（难度图标 `difficulty_{}.png` 的键）
    pub fn code(&self) -> u8 {
        match self {
            Tier::Novice => 0,
            Tier::Advanced => 1,
            Tier::Exhaust => 2,
        }
    }

    /// 封面文件名中的档位序号（`jk_01_{id:04}_{n}_b.png` 的 n）
    pub fn jacket_index(&self) -> u8 {
        self.code() + 1
    }

    /// music db 中对应的难度元素名
    pub fn element_name(&self) -> &'static str {
        match self {
            Tier::Novice => "novice",
            Tier::Advanced => "advanced",
            Tier::Exhaust => "exhaust",
        }
    }
}

/// 三档难度数值（difnum，保留原始十进制文本）
#[derive(Debug, Clone, Default)]
pub struct TierLevels {
    pub novice: Option<String>,
    pub advanced: Option<String>,
    pub exhaust: Option<String>,
}

impl TierLevels {
    pub fn get(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Novice => self.novice.as_deref(),
            Tier::Advanced => self.advanced.as_deref(),
            Tier::Exhaust => self.exhaust.as_deref(),
        }
    }
}

/// 单曲元数据（来源：music db XML）
#[derive(Debug, Clone)]
pub struct MusicEntry {
    /// 乐曲数字 ID（与封面等资源对应）
    pub id: u32,
    /// 曲名（未经字符修复的原始文本）
    pub title: String,
    /// 作者
    pub artist: String,
    /// 三档难度数值
    pub levels: TierLevels,
}

/// 乐曲目录内存索引（启动期构建，此后只读）
#[derive(Debug, Default)]
pub struct MusicCatalog {
    by_id: HashMap<u32, Arc<MusicEntry>>,
}

impl MusicCatalog {
    pub fn insert(&mut self, entry: MusicEntry) {
        self.by_id.insert(entry.id, Arc::new(entry));
    }

    /// 按乐曲 ID 查询；查不到由调用方按 CatalogMiss 处理
    pub fn entry(&self, id: u32) -> Option<&Arc<MusicEntry>> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
