use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::error::AppError;

/// 图片标识分配器
///
/// 旧实现靠扫描落盘目录取"最大编号 + 1"，并发请求会算出同一个号。
/// 这里改为进程随机前缀 + 原子自增序号：分配本身无锁且在任意并发下
/// 不重复；跨进程重启由前缀隔离，因此也无需回读共享存储。
/// 落盘目录的保留/清理策略由外部（cron 等）负责。
pub struct ImageAllocator {
    run_prefix: String,
    seq: AtomicU64,
    dir: PathBuf,
}

impl ImageAllocator {
    pub fn new(dir: PathBuf) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self {
            run_prefix: uuid[..8].to_string(),
            seq: AtomicU64::new(0),
            dir,
        }
    }

    /// 分配一个此前未使用过的图片标识（不含扩展名）
    pub fn allocate(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{:06}", self.run_prefix, n)
    }

    /// 将编码完成的 PNG 落盘；只有编码成功的完整图片才会到达这里，
    /// 其他请求不会观察到半成品。
    pub async fn persist(&self, image_id: &str, png: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.dir.join(format!("{image_id}.png"));
        tokio::fs::write(&path, png)
            .await
            .map_err(|e| AppError::Internal(format!("图片落盘失败 {:?}: {e}", path)))?;
        tracing::info!("已保存 scorecard: {:?} ({} bytes)", path, png.len());
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
