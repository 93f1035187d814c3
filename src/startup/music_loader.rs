use std::{fs, path::Path};

use crate::{
    error::AppError,
    features::musicdb::models::{MusicCatalog, MusicEntry, Tier, TierLevels},
    features::scorecard::envelope::sanitize_xml_declaration,
};

/// 从 music db XML 构建内存目录
///
/// 文档结构（与实机数据一致）：
/// `<mdb><music id="42"><info><title_name/><artist_name/></info>
/// <difficulty><novice><difnum/></novice>…</difficulty></music>…</mdb>`
///
/// 文件要求 UTF-8 编码（历史数据为 shift_jisx0213，需离线转换一次）；
/// 若 XML 声明残留旧编码名，解析前会剥离声明。
pub fn load_music_catalog(path: &Path) -> Result<MusicCatalog, AppError> {
    if !path.exists() {
        return Err(AppError::Internal(format!(
            "music db 文件不存在: {:?}",
            path
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Internal(format!("读取 music db 失败: {e}")))?;
    let xml = sanitize_xml_declaration(&raw);

    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| AppError::Internal(format!("解析 music db XML 失败: {e}")))?;

    let mut catalog = MusicCatalog::default();

    for music in doc
        .descendants()
        .filter(|n| n.has_tag_name("music") && n.is_element())
    {
        let Some(id_attr) = music.attribute("id") else {
            tracing::warn!("music db 条目缺少 id 属性，已跳过");
            continue;
        };
        let Ok(id) = id_attr.trim().parse::<u32>() else {
            tracing::warn!("music db 条目 id 非数字: {}，已跳过", id_attr);
            continue;
        };

        let info = music.children().find(|n| n.has_tag_name("info"));
        let title = info.and_then(|n| child_text(&n, "title_name"));
        let artist = info.and_then(|n| child_text(&n, "artist_name"));
        let (Some(title), Some(artist)) = (title, artist) else {
            tracing::warn!("music db 条目 {} 缺少曲名或作者，已跳过", id);
            continue;
        };

        let difficulty = music.children().find(|n| n.has_tag_name("difficulty"));
        let difnum_of = |tier: Tier| -> Option<String> {
            difficulty
                .and_then(|d| {
                    d.children()
                        .find(|n| n.has_tag_name(tier.element_name()))
                })
                .and_then(|n| child_text(&n, "difnum"))
        };

        catalog.insert(MusicEntry {
            id,
            title,
            artist,
            levels: TierLevels {
                novice: difnum_of(Tier::Novice),
                advanced: difnum_of(Tier::Advanced),
                exhaust: difnum_of(Tier::Exhaust),
            },
        });
    }

    if catalog.is_empty() {
        return Err(AppError::Internal(format!(
            "music db 未包含任何乐曲条目: {:?}",
            path
        )));
    }

    tracing::info!("music db 加载完成，共 {} 首乐曲", catalog.len());
    Ok(catalog)
}

fn child_text(node: &roxmltree::Node, name: &str) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::load_music_catalog;
    use crate::features::musicdb::models::Tier;
    use std::io::Write;

    const SAMPLE_MDB: &str = r#"<?xml version="1.0" encoding="shift_jisx0213"?>
<mdb>
  <music id="42">
    <info>
      <title_name>Amazing Mirage</title_name>
      <artist_name>seiya-murai</artist_name>
    </info>
    <difficulty>
      <novice><difnum>3</difnum></novice>
      <advanced><difnum>8</difnum></advanced>
      <exhaust><difnum>12</difnum></exhaust>
    </difficulty>
  </music>
  <music id="227">
    <info>
      <title_name>newer track</title_name>
      <artist_name>somebody</artist_name>
    </info>
    <difficulty>
      <novice><difnum>2</difnum></novice>
    </difficulty>
  </music>
</mdb>
"#;

    #[test]
    fn loads_entries_and_difficulty_levels() {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(SAMPLE_MDB.as_bytes()).expect("write");

        let catalog = load_music_catalog(f.path()).expect("load");
        assert_eq!(catalog.len(), 2);

        let entry = catalog.entry(42).expect("entry 42");
        assert_eq!(entry.title, "Amazing Mirage");
        assert_eq!(entry.artist, "seiya-murai");
        assert_eq!(entry.levels.get(Tier::Advanced), Some("8"));
        assert_eq!(entry.levels.get(Tier::Exhaust), Some("12"));

        // 缺失档位不报错，留给渲染期按 CatalogMiss 处理
        let newer = catalog.entry(227).expect("entry 227");
        assert_eq!(newer.levels.get(Tier::Exhaust), None);
    }

    #[test]
    fn empty_mdb_is_a_startup_error() {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(b"<mdb></mdb>").expect("write");
        assert!(load_music_catalog(f.path()).is_err());
    }
}
