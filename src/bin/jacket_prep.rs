//! 封面素材批处理工具：把原始尺寸的封面 PNG 统一缩放成 scorecard
//! 使用的 223x223 缩略图。一次性离线工具，不参与请求处理路径。
//!
//! 用法：`jacket_prep <源目录> <输出目录>`

use std::path::{Path, PathBuf};

use image::imageops::FilterType;

const JACKET_SIZE: u32 = 223;

fn resize_one(src: &Path, out_dir: &Path) -> Result<PathBuf, String> {
    let file_name = src
        .file_name()
        .ok_or_else(|| format!("无法取得文件名: {}", src.display()))?;

    let img = image::open(src).map_err(|e| format!("打开 {} 失败: {e}", src.display()))?;
    let resized = img
        .resize_exact(JACKET_SIZE, JACKET_SIZE, FilterType::Lanczos3)
        .to_rgba8();

    let out_path = out_dir.join(file_name);
    resized
        .save(&out_path)
        .map_err(|e| format!("保存 {} 失败: {e}", out_path.display()))?;
    Ok(out_path)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let [_, src_dir, out_dir] = args.as_slice() else {
        eprintln!("用法: jacket_prep <源目录> <输出目录>");
        std::process::exit(2);
    };
    let src_dir = PathBuf::from(src_dir);
    let out_dir = PathBuf::from(out_dir);

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("创建输出目录失败: {e}");
        std::process::exit(1);
    }

    let entries = match std::fs::read_dir(&src_dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("读取源目录失败: {e}");
            std::process::exit(1);
        }
    };

    let mut done = 0usize;
    let mut failed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        match resize_one(&path, &out_dir) {
            Ok(out) => {
                println!("{} -> {}", path.display(), out.display());
                done += 1;
            }
            Err(e) => {
                eprintln!("{e}");
                failed += 1;
            }
        }
    }

    println!("完成: {done} 张，失败: {failed} 张");
    if failed > 0 {
        std::process::exit(1);
    }
}
