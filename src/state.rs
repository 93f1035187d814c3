use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::features::musicdb::models::MusicCatalog;
use crate::features::scorecard::allocator::ImageAllocator;
use crate::features::scorecard::dispatch::HandlerRegistry;

/// 聚合的应用共享状态
///
/// music db 与分发表在启动期构建完成后只读，可被任意数量的请求并发访问；
/// 图片标识分配器内部自带同步原语。
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<MusicCatalog>,
    pub registry: Arc<HandlerRegistry>,
    pub allocator: Arc<ImageAllocator>,
    /// 控制并发渲染的信号量（限制 CPU 密集型任务数量）
    pub render_semaphore: Arc<Semaphore>,
}
