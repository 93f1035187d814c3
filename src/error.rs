use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
///
/// 错误分类与调用方约定：
/// - `MalformedInput`：请求体解析失败 / 标识格式非法 / 必需字段缺失，不触发渲染
/// - `UnsupportedTarget`：机种未知或 datecode 不在任何区间内，不触发渲染
/// - `CatalogMiss`：乐曲不在 music db 中，丢弃半成品，不输出图片
/// - `Render`：SVG 组装或栅格化失败
/// - `Internal`：其余内部错误（配置缺陷、IO 等）
///
/// 注意：单个素材缺失（AssetMiss）不属于请求错误——由渲染管线按回退/省略
/// 策略就地恢复，仅记录日志并在成功响应中以计数形式上报。
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 请求数据不合法
    #[error("请求数据不合法: {0}")]
    MalformedInput(String),

    /// 机种或版本不受支持
    #[error("机种或版本不受支持: {0}")]
    UnsupportedTarget(String),

    /// 乐曲不在 music db 中
    #[error("乐曲不在 music db 中: {0}")]
    CatalogMiss(String),

    /// 图像渲染错误
    #[error("图像渲染错误: {0}")]
    Render(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 所有 API 错误返回结构化 JSON（content-type = application/problem+json），
/// 便于调用方按 `code` 字段稳定分支处理。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Not Acceptable")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 406)]
    pub status: u16,

    /// 人类可读的详细信息（尽量稳定，不建议依赖解析）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "UNSUPPORTED_TARGET")]
    pub code: String,

    /// 可选：请求追踪 ID。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            // 与上游 eamuse 代理的历史行为保持一致：不支持的 model 返回 406
            AppError::UnsupportedTarget(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::CatalogMiss(_) => StatusCode::NOT_FOUND,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::MalformedInput(_) => "MALFORMED_INPUT",
            AppError::UnsupportedTarget(_) => "UNSUPPORTED_TARGET",
            AppError::CatalogMiss(_) => "NOT_IN_CATALOG",
            AppError::Render(_) => "RENDER_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::NOT_ACCEPTABLE => "Not Acceptable",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O 错误: {err}"))
    }
}
