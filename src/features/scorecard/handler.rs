use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
    routing::post,
};

use crate::{error::AppError, state::AppState};

use super::envelope::SubmissionEnvelope;

/// 生成图片的公开访问前缀（由 `src/main.rs` 提供静态目录服务）。
const CARDS_PUBLIC_BASE_URL: &str = "/cards";

#[utoipa::path(
    post,
    path = "/scorecard",
    summary = "生成游玩结果 scorecard",
    description = "接收 e-amusement 结果提交 XML（call/game_3），按 model 标识的 datecode \
        路由到对应机种 handler，渲染固定版式的 scorecard PNG 并落盘。响应体为 PNG 字节；\
        `x-image-id` 为本次分配的图片标识，`x-render-misses` 为按省略/回退策略跳过的素材数。",
    request_body(content = String, content_type = "application/xml"),
    responses(
        (status = 200, description = "渲染成功，返回 PNG 字节"),
        (status = 400, description = "请求数据不合法", body = crate::error::ProblemDetails),
        (status = 404, description = "乐曲不在 music db 中", body = crate::error::ProblemDetails),
        (status = 406, description = "机种或版本不受支持", body = crate::error::ProblemDetails),
    ),
    tag = "Scorecard"
)]
pub async fn submit_scorecard(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let t0 = Instant::now();

    let envelope = SubmissionEnvelope::parse(&body)?;
    let handler = state
        .registry
        .resolve(&envelope.model.family, envelope.datecode)?;
    tracing::info!(
        "生成 {} scorecard (model={})",
        handler.name(),
        envelope.model
    );

    // 栅格化是 CPU 密集操作：信号量限流 + 阻塞线程池，避免拖垮 runtime
    let _permit = state
        .render_semaphore
        .acquire()
        .await
        .map_err(|e| AppError::Internal(format!("渲染信号量已关闭: {e}")))?;
    let output = tokio::task::spawn_blocking(move || handler.generate(&envelope))
        .await
        .map_err(|e| AppError::Internal(format!("渲染任务异常退出: {e}")))??;

    let image_id = state.allocator.allocate();
    state.allocator.persist(&image_id, &output.png).await?;

    tracing::info!(
        "scorecard {} 完成: {} bytes, 素材缺失 {} 项, 耗时 {:?}",
        image_id,
        output.png.len(),
        output.misses.len(),
        t0.elapsed()
    );
    tracing::debug!("提取记录: {}", output.record);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{image_id}.png\""))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&image_id) {
        headers.insert("x-image-id", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{CARDS_PUBLIC_BASE_URL}/{image_id}.png"))
    {
        headers.insert("x-card-url", value);
    }
    headers.insert(
        "x-render-misses",
        HeaderValue::from(output.misses.len() as u64),
    );

    Ok((headers, output.png))
}

pub fn create_scorecard_router() -> Router<AppState> {
    Router::new().route("/scorecard", post(submit_scorecard))
}
