use crate::config::AppConfig;
use crate::error::AppError;
use std::fs;

/// 执行启动检查
///
/// 1. 校验素材目录存在（背景等必需素材缺失时拒绝启动）
/// 2. 创建图片落盘目录
/// 3. 检查字体目录（仅告警，不阻断启动）
/// 4. 预热全局字体库，降低首个渲染请求的长尾延迟
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    ensure_assets_folder(config)?;
    ensure_cards_folder(config)?;
    ensure_font_resources(config);

    let fonts_dir = config.fonts_path();
    let t_prewarm = std::time::Instant::now();
    if let Err(e) = tokio::task::spawn_blocking(move || {
        crate::features::scorecard::museca::renderer::global_font_db(&fonts_dir);
    })
    .await
    {
        tracing::warn!("字体库预热任务失败: {}", e);
    } else {
        tracing::info!("字体库预热完成: {}ms", t_prewarm.elapsed().as_millis());
    }

    tracing::info!("✅ 启动检查完成");
    Ok(())
}

/// 素材目录是必需项：背景 bg.png 缺失时整条渲染管线无法工作
fn ensure_assets_folder(config: &AppConfig) -> Result<(), AppError> {
    let assets_path = config.assets_path();

    if !assets_path.exists() {
        return Err(AppError::Internal(format!(
            "素材目录不存在: {:?}，请先部署 scorecard 素材包",
            assets_path
        )));
    }

    let bg = assets_path.join("misc").join("bg.png");
    if !bg.exists() {
        tracing::warn!("⚠️ 未找到背景素材 {:?}，渲染请求将全部失败", bg);
    } else {
        tracing::info!("✅ 素材目录检查通过: {:?}", assets_path);
    }

    Ok(())
}

fn ensure_cards_folder(config: &AppConfig) -> Result<(), AppError> {
    let cards_path = config.cards_path();

    if !cards_path.exists() {
        tracing::warn!("📁 未找到图片落盘目录，正在创建: {:?}", cards_path);
        fs::create_dir_all(&cards_path)
            .map_err(|e| AppError::Internal(format!("创建图片落盘目录失败: {e}")))?;
        tracing::info!("✅ 图片落盘目录创建成功");
    } else {
        tracing::info!("✅ 图片落盘目录已存在");
    }

    Ok(())
}

fn ensure_font_resources(config: &AppConfig) {
    let fonts_path = config.fonts_path();
    if !fonts_path.exists() {
        tracing::warn!(
            "⚠️ 字体目录不存在: {:?}，文字层将无法渲染（图形层不受影响）",
            fonts_path
        );
    }
}
