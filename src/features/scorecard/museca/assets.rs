use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use lru::LruCache;

/// 可嵌入 SVG 的素材引用：href + 原始像素尺寸
///
/// usvg 对缺省宽高的 `<image>` 不按固有尺寸兜底，因此解析素材时
/// 顺带从 PNG 头部取出尺寸，布局时显式写入。
#[derive(Debug, Clone)]
pub struct Sprite {
    pub href: String,
    pub width: u32,
    pub height: u32,
}

const HREF_CACHE_SIZE: usize = 256;
// 小图编码为 data URI 并缓存，大图直接引用文件路径，避免内存膨胀
const EMBED_MAX_BYTES: usize = 256 * 1024;

/// 素材库：按键式相对路径解析 PNG 素材
///
/// 启动期显式构造、只读共享；单个素材缺失不是错误，由调用方执行
/// 省略或回退策略。
pub struct AssetStore {
    root: PathBuf,
    sprite_cache: Mutex<LruCache<PathBuf, Sprite>>,
}

impl AssetStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            sprite_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(HREF_CACHE_SIZE).unwrap(),
            )),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析相对键；文件不存在返回 None
    pub fn resolve(&self, key: &str) -> Option<PathBuf> {
        let path = self.root.join(key);
        path.is_file().then_some(path)
    }

    /// 按键取素材引用；文件缺失或非合法 PNG 返回 None
    pub fn sprite(&self, key: &str) -> Option<Sprite> {
        let path = self.resolve(key)?;

        if let Ok(mut cache) = self.sprite_cache.lock()
            && let Some(sprite) = cache.get(&path)
        {
            return Some(sprite.clone());
        }

        let data = std::fs::read(&path).ok()?;
        let (width, height) = probe_png_size(&data)?;

        let href = if data.len() <= EMBED_MAX_BYTES {
            format!("data:image/png;base64,{}", base64_engine.encode(&data))
        } else {
            path.canonicalize().ok()?.to_string_lossy().into_owned()
        };

        let sprite = Sprite {
            href,
            width,
            height,
        };
        if let Ok(mut cache) = self.sprite_cache.lock() {
            cache.put(path, sprite.clone());
        }
        Some(sprite)
    }

    /// 有序回退链：依次尝试候选键，返回首个命中的 (层级序号, 素材)。
    /// 全部落空返回 None——链路耗尽与否由调用方决定如何上报。
    pub fn sprite_chain(&self, candidates: &[String]) -> Option<(usize, Sprite)> {
        candidates
            .iter()
            .enumerate()
            .find_map(|(i, key)| self.sprite(key).map(|s| (i, s)))
    }
}

/// 从 PNG 字节流头部读取像素尺寸（只解码 IHDR，不解像素）
fn probe_png_size(data: &[u8]) -> Option<(u32, u32)> {
    let decoder = png::Decoder::new(data);
    let reader = decoder.read_info().ok()?;
    let info = reader.info();
    Some((info.width, info.height))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::AssetStore;
    use std::path::Path;

    /// 测试用：向指定路径写出一张纯色 PNG
    pub(crate) fn write_test_png(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        let file = std::fs::File::create(path).expect("create png");
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("png header");
        writer
            .write_image_data(&vec![0x80u8; (width * height * 4) as usize])
            .expect("png data");
    }

    #[test]
    fn sprite_reports_intrinsic_size_and_data_uri() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_test_png(&dir.path().join("misc/bg.png"), 12, 34);

        let store = AssetStore::new(dir.path().to_path_buf());
        let sprite = store.sprite("misc/bg.png").expect("sprite");
        assert_eq!((sprite.width, sprite.height), (12, 34));
        assert!(sprite.href.starts_with("data:image/png;base64,"));

        assert!(store.sprite("misc/nope.png").is_none());
    }

    #[test]
    fn sprite_chain_returns_first_hit_with_its_level() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_test_png(&dir.path().join("jackets/base.png"), 4, 4);

        let store = AssetStore::new(dir.path().to_path_buf());
        let candidates = vec![
            "jackets/specific.png".to_string(),
            "jackets/base.png".to_string(),
            "jackets/default.png".to_string(),
        ];

        let (level, _) = store.sprite_chain(&candidates).expect("hit");
        assert_eq!(level, 1);

        assert!(store.sprite_chain(&["nope.png".to_string()]).is_none());
    }
}
