pub mod assets;
pub mod extractor;
pub mod renderer;
pub mod repair;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AppError;
use crate::features::musicdb::models::{MusicCatalog, Tier};

use super::dispatch::{GameHandler, RenderOutput};
use super::envelope::SubmissionEnvelope;

pub use assets::AssetStore;

/// 渲染环境参数（启动期由配置显式构造）
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub fonts_dir: PathBuf,
    pub optimize_speed: bool,
}

/// MUSECA 1+1/2 的 scorecard handler
///
/// 持有只读的乐曲目录与素材库；每个请求独立提取、独立渲染，
/// 彼此之间不共享可变状态。
pub struct MusecaHandler {
    catalog: Arc<MusicCatalog>,
    assets: Arc<AssetStore>,
    settings: RenderSettings,
}

impl MusecaHandler {
    pub fn new(
        catalog: Arc<MusicCatalog>,
        assets: Arc<AssetStore>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            catalog,
            assets,
            settings,
        }
    }
}

impl GameHandler for MusecaHandler {
    fn name(&self) -> &'static str {
        "museca1_5"
    }

    fn generate(&self, envelope: &SubmissionEnvelope) -> Result<RenderOutput, AppError> {
        let doc = roxmltree::Document::parse(envelope.body())
            .map_err(|e| AppError::MalformedInput(format!("XML 解析失败: {e}")))?;
        let record = extractor::extract_record(&doc)?;

        // 档位集合封闭（0/1/2）；越界编码属于配置/数据缺陷而非可回退情形
        let tier = Tier::from_code(&record.tier_code).ok_or_else(|| {
            AppError::Internal(format!("未知难度档位编码: {}", record.tier_code))
        })?;

        let entry = self
            .catalog
            .entry(record.music_id)
            .ok_or_else(|| AppError::CatalogMiss(format!("music {}", record.music_id)))?;
        let difficulty = entry.levels.get(tier).ok_or_else(|| {
            AppError::CatalogMiss(format!(
                "music {} 无 {} 档位谱面",
                record.music_id,
                tier.element_name()
            ))
        })?;

        let composed =
            renderer::compose_card_svg(&record, entry, tier, difficulty, &self.assets)?;
        let png = renderer::rasterize_to_png(
            &composed.svg,
            &self.settings.fonts_dir,
            self.settings.optimize_speed,
        )?;

        let record_json = serde_json::to_value(&record)
            .map_err(|e| AppError::Internal(format!("记录序列化失败: {e}")))?;

        Ok(RenderOutput {
            png,
            record: record_json,
            misses: composed.misses,
        })
    }
}
