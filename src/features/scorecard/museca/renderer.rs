use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};
use unicode_width::UnicodeWidthChar;

use crate::error::AppError;
use crate::features::musicdb::models::{MusicEntry, Tier};

use super::assets::{AssetStore, Sprite};
use super::extractor::PlayRecord;
use super::repair::repair_broken_chars;

/// 画布尺寸（与背景素材 misc/bg.png 一致）
pub const CANVAS_WIDTH: u32 = 720;
pub const CANVAS_HEIGHT: u32 = 960;

// 右对齐文本的右缘与标题/作者区的宽度预算
const RIGHT_EDGE: f64 = 694.0;
const TEXT_BUDGET: f64 = 247.0;

// 字体家族（assets/font 下的字体文件须提供这些 family）
const FONT_MUSECA: &str = "MUSECA";
const FONT_GOTHIC: &str = "MS Gothic";
const FONT_DATETIME: &str = "DFGothic W2";

// 超过该乐曲 ID 的内容属于 1+1/2 追加曲，封面带角标
const NEW_CONTENT_THRESHOLD: u32 = 226;

// GRAFICA 三个槽位的纵坐标（艺术图 / 奖章）
const GRAFICA_ART_Y: [i32; 3] = [134, 402, 668];
const GRAFICA_MEDAL_Y: [i32; 3] = [320, 588, 854];

/// 组装完成的 scorecard SVG 文档与素材缺失清单
#[derive(Debug)]
pub struct ComposedCard {
    pub svg: String,
    pub misses: Vec<String>,
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::Render(format!("SVG formatting error: {e}"))
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// 估算文本渲染宽度：全角字符宽度约等于字号，半角字符约为 0.55 倍。
/// 右对齐与压缩判定都必须先过这一步。
fn estimate_text_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .map(|ch| match UnicodeWidthChar::width(ch).unwrap_or(1) {
            2 => font_size,
            _ => font_size * 0.55,
        })
        .sum()
}

/// 右对齐文本的适配策略：
/// 1. 按主字号估宽，落在预算内则直接使用；
/// 2. 超预算且给了备选字号，降号再估；
/// 3. 仍超预算则保持备选字号并用 textLength 把整行水平压缩到预算宽度。
fn fit_right_aligned(
    text: &str,
    primary_size: f64,
    secondary_size: Option<f64>,
) -> (f64, Option<f64>) {
    if estimate_text_width(text, primary_size) <= TEXT_BUDGET {
        return (primary_size, None);
    }
    let size = secondary_size.unwrap_or(primary_size);
    if estimate_text_width(text, size) <= TEXT_BUDGET {
        (size, None)
    } else {
        (size, Some(TEXT_BUDGET))
    }
}

// 位图布局坐标给的是文本框上缘，SVG 以基线定位，按字号近似换算
fn baseline(top: f64, size: f64) -> f64 {
    top + size * 0.8
}

struct TextSpec<'a> {
    x: f64,
    top: f64,
    size: f64,
    family: &'a str,
    fill: &'a str,
    anchor: &'a str,
    text_length: Option<f64>,
}

fn push_text(svg: &mut String, spec: &TextSpec, content: &str) -> Result<(), AppError> {
    let y = baseline(spec.top, spec.size);
    let escaped = escape_xml(content);
    match spec.text_length {
        Some(len) => writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-family="{}" font-size="{}" fill="{}" text-anchor="{}" textLength="{len:.1}" lengthAdjust="spacingAndGlyphs">{escaped}</text>"#,
            spec.x, y, spec.family, spec.size, spec.fill, spec.anchor,
        ),
        None => writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-family="{}" font-size="{}" fill="{}" text-anchor="{}">{escaped}</text>"#,
            spec.x, y, spec.family, spec.size, spec.fill, spec.anchor,
        ),
    }
    .map_err(fmt_err)
}

fn push_sprite(svg: &mut String, sprite: &Sprite, x: i32, y: i32) -> Result<(), AppError> {
    writeln!(
        svg,
        r#"<image x="{x}" y="{y}" width="{}" height="{}" href="{}"/>"#,
        sprite.width, sprite.height, sprite.href
    )
    .map_err(fmt_err)
}

/// 可省略素材层：命中则绘制，缺失则记入清单并继续
fn push_asset(
    svg: &mut String,
    misses: &mut Vec<String>,
    assets: &AssetStore,
    key: &str,
    x: i32,
    y: i32,
) -> Result<bool, AppError> {
    match assets.sprite(key) {
        Some(sprite) => {
            push_sprite(svg, &sprite, x, y)?;
            Ok(true)
        }
        None => {
            tracing::warn!("素材缺失，已省略: {}", key);
            misses.push(key.to_string());
            Ok(false)
        }
    }
}

/// 评级指针横坐标查表（编码集合封闭；最高评级 8 与 7 共用位置但素材不同）
fn grade_pointer_x(grade: &str) -> Option<i32> {
    match grade {
        "0" => Some(485),
        "1" => Some(512),
        "2" => Some(538),
        "3" => Some(564),
        "4" => Some(591),
        "5" => Some(617),
        "6" => Some(643),
        "7" => Some(669),
        "8" => Some(669),
        _ => None,
    }
}

/// 按固定层序组装 scorecard SVG
///
/// 层序是对外契约的一部分：后绘制的层在重叠处遮挡先绘制的层
/// （徽章盖在封面上、文字盖在背景上），调整顺序会改变可见输出。
pub fn compose_card_svg(
    record: &PlayRecord,
    entry: &MusicEntry,
    tier: Tier,
    difficulty: &str,
    assets: &AssetStore,
) -> Result<ComposedCard, AppError> {
    let mut svg = String::with_capacity(16 * 1024);
    let mut misses = Vec::new();

    // 背景是唯一的必需素材：缺了它整张卡无从谈起
    let bg = assets.sprite("misc/bg.png").ok_or_else(|| {
        AppError::Render("背景素材 misc/bg.png 缺失，无法渲染".to_string())
    })?;

    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{CANVAS_WIDTH}" height="{CANVAS_HEIGHT}" viewBox="0 0 {CANVAS_WIDTH} {CANVAS_HEIGHT}">"#
    )
    .map_err(fmt_err)?;
    writeln!(
        svg,
        r#"<image x="0" y="0" width="{CANVAS_WIDTH}" height="{CANVAS_HEIGHT}" href="{}"/>"#,
        bg.href
    )
    .map_err(fmt_err)?;

    // ----- 玩家名 -----
    push_text(
        &mut svg,
        &TextSpec {
            x: 161.0,
            top: 45.0,
            size: 50.0,
            family: FONT_MUSECA,
            fill: "#000000",
            anchor: "start",
            text_length: None,
        },
        &record.player_name,
    )?;

    // ----- 时间（进程观测时间，非提交数据）-----
    let now = Utc::now().format("%Y/%m/%d - %I:%M%p UTC").to_string();
    push_text(
        &mut svg,
        &TextSpec {
            x: 161.0,
            top: 100.0,
            size: 15.0,
            family: FONT_DATETIME,
            fill: "#858585",
            anchor: "start",
            text_length: None,
        },
        &now,
    )?;

    // ----- 馆长等级 -----
    push_asset(
        &mut svg,
        &mut misses,
        assets,
        &format!("rank/rank_{}.png", record.options.curator_rank),
        69,
        26,
    )?;

    // ----- 封面（三级回退链）-----
    let jacket_candidates = [
        format!(
            "jackets/jk_01_{:04}_{}_b.png",
            record.music_id,
            tier.jacket_index()
        ),
        format!("jackets/jk_01_{:04}_1_b.png", record.music_id),
        "jackets/jk_01_0000_0_b.png".to_string(),
    ];
    match assets.sprite_chain(&jacket_candidates) {
        Some((level, sprite)) => {
            // 落到兜底封面仍产出图片，但按素材缺失上报
            if level == 2 {
                tracing::warn!("乐曲 {} 无专属封面，使用兜底封面", record.music_id);
                misses.push(jacket_candidates[0].clone());
            }
            push_sprite(&mut svg, &sprite, 471, 124)?;
            // 新曲角标只随实际命中的封面绘制
            if record.music_id > NEW_CONTENT_THRESHOLD {
                push_asset(&mut svg, &mut misses, assets, "misc/mplus.png", 425, 127)?;
            }
        }
        None => {
            tracing::warn!(
                "封面回退链全部落空，乐曲 {} 将以无封面渲染",
                record.music_id
            );
            misses.push(jacket_candidates[0].clone());
        }
    }

    // ----- 标题 -----
    let title = repair_broken_chars(&entry.title);
    let (title_size, title_length) = fit_right_aligned(&title, 15.0, Some(14.0));
    push_text(
        &mut svg,
        &TextSpec {
            x: RIGHT_EDGE,
            top: 359.0,
            size: title_size,
            family: FONT_GOTHIC,
            fill: "#1E1E1E",
            anchor: "end",
            text_length: title_length,
        },
        &title,
    )?;

    // ----- 作者 -----
    let artist = repair_broken_chars(&entry.artist);
    let (artist_size, artist_length) = fit_right_aligned(&artist, 13.0, None);
    push_text(
        &mut svg,
        &TextSpec {
            x: RIGHT_EDGE,
            top: 382.0,
            size: artist_size,
            family: FONT_GOTHIC,
            fill: "#787878",
            anchor: "end",
            text_length: artist_length,
        },
        &artist,
    )?;

    // ----- 得分与明细 -----
    let score_text = record.score.to_string();
    // 同一文本错位一像素画两遍，模拟粗体
    for x in [RIGHT_EDGE, RIGHT_EDGE - 1.0] {
        push_text(
            &mut svg,
            &TextSpec {
                x,
                top: 431.0,
                size: 37.0,
                family: FONT_MUSECA,
                fill: "#000000",
                anchor: "end",
                text_length: None,
            },
            &score_text,
        )?;
    }
    let counters = [
        (&record.critical, 496.0),
        (&record.near, 525.0),
        (&record.error, 554.0),
        (&record.max_chain, 583.0),
    ];
    for (value, top) in counters {
        push_text(
            &mut svg,
            &TextSpec {
                x: RIGHT_EDGE,
                top,
                size: 22.0,
                family: FONT_MUSECA,
                fill: "#000000",
                anchor: "end",
                text_length: None,
            },
            value,
        )?;
    }

    // ----- 难度数值与档位图标 -----
    push_asset(
        &mut svg,
        &mut misses,
        assets,
        &format!("numbers/lv_{difficulty}.png"),
        609,
        41,
    )?;
    push_asset(
        &mut svg,
        &mut misses,
        assets,
        &format!("misc/difficulty_{}.png", tier.code()),
        542,
        89,
    )?;

    // ----- 评级徽章与指针 -----
    push_asset(
        &mut svg,
        &mut misses,
        assets,
        &format!("grade/grade_{}.png", record.score_grade),
        467,
        682,
    )?;
    match grade_pointer_x(&record.score_grade) {
        Some(x) => {
            let pointer = if record.score_grade == "8" {
                "misc/grade_index_2.png"
            } else {
                "misc/grade_index_0.png"
            };
            push_asset(&mut svg, &mut misses, assets, pointer, x, 650)?;
        }
        None => {
            tracing::warn!("未知评级编码 {}，跳过指针", record.score_grade);
            misses.push(format!("grade pointer ({})", record.score_grade));
        }
    }

    // ----- 曲目序号横幅 -----
    push_asset(
        &mut svg,
        &mut misses,
        assets,
        &format!("misc/track_{}.png", record.track_no),
        0,
        221,
    )?;

    // ----- GRAFICA 槽位 -----
    for (i, slot) in record.options.grafica.iter().enumerate() {
        if !slot.is_equipped() {
            continue;
        }
        push_asset(
            &mut svg,
            &mut misses,
            assets,
            &format!("grafica/{}.png", slot.selector),
            126,
            GRAFICA_ART_Y[i],
        )?;
        push_asset(
            &mut svg,
            &mut misses,
            assets,
            &format!("medel/medel_{}.png", slot.medal),
            186,
            GRAFICA_MEDAL_Y[i],
        )?;
        push_asset(
            &mut svg,
            &mut misses,
            assets,
            &format!("misc/frame_{}.png", i + 1),
            126,
            GRAFICA_ART_Y[i],
        )?;
    }

    // ----- CONNECT ALL -----
    if record.clear_type == "4" {
        push_asset(&mut svg, &mut misses, assets, "misc/ca_icon_big.png", 475, 501)?;
    }

    // ----- 分差（仅当客户端提供了旧成绩）-----
    if let Some(old_score) = record.old_score {
        let diff = record.score - old_score;
        if diff > 0 {
            push_asset(
                &mut svg,
                &mut misses,
                assets,
                "misc/new_record_text.png",
                493,
                471,
            )?;
            let text = format!("+{diff}");
            // 5 遍描边式强调：阴影、灰底、三遍白字
            let passes: [(f64, f64, &str); 5] = [
                (RIGHT_EDGE - 1.0, 19.0, "#545454"),
                (RIGHT_EDGE, 18.0, "#545454"),
                (RIGHT_EDGE - 1.0, 18.0, "#FFFFFF"),
                (RIGHT_EDGE - 2.0, 18.0, "#FFFFFF"),
                (RIGHT_EDGE - 2.0, 18.0, "#FFFFFF"),
            ];
            for (x, size, fill) in passes {
                push_text(
                    &mut svg,
                    &TextSpec {
                        x,
                        top: 467.0,
                        size,
                        family: FONT_MUSECA,
                        fill,
                        anchor: "end",
                        text_length: None,
                    },
                    &text,
                )?;
            }
        } else {
            // 持平也走未刷新分支，分差显示 0
            push_asset(
                &mut svg,
                &mut misses,
                assets,
                "misc/minus_record_bg.png",
                493,
                470,
            )?;
            push_text(
                &mut svg,
                &TextSpec {
                    x: RIGHT_EDGE - 2.0,
                    top: 471.0,
                    size: 15.0,
                    family: FONT_MUSECA,
                    fill: "#000000",
                    anchor: "end",
                    text_length: None,
                },
                &diff.to_string(),
            )?;
        }
    }

    // ----- 配置选项角标（相互独立，均可缺省）-----
    let placement_key = match record.options.object_placement.as_str() {
        "1" => Some("misc/option_mirror.png"),
        "2" => Some("misc/option_random.png"),
        "3" => Some("misc/option_sran.png"),
        _ => None,
    };
    if let Some(key) = placement_key {
        push_asset(&mut svg, &mut misses, assets, key, 472, 411)?;
    }
    if matches!(record.options.curve.as_str(), "1" | "2") {
        push_asset(
            &mut svg,
            &mut misses,
            assets,
            &format!("misc/option_curve_{}.png", record.options.curve),
            537,
            411,
        )?;
    }

    svg.push_str("</svg>\n");
    Ok(ComposedCard { svg, misses })
}

// 全局字体数据库单例
static GLOBAL_FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

/// 全局字体数据库：首次调用时从字体目录载入，此后进程内复用
pub fn global_font_db(fonts_dir: &Path) -> Arc<fontdb::Database> {
    let dir = fonts_dir.to_path_buf();
    GLOBAL_FONT_DB
        .get_or_init(move || {
            let mut font_db = fontdb::Database::new();
            font_db.load_system_fonts();

            if dir.exists()
                && let Ok(entries) = fs::read_dir(&dir)
            {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_font = path.is_file()
                        && matches!(
                            path.extension().and_then(|e| e.to_str()),
                            Some("ttf") | Some("otf") | Some("ttc")
                        );
                    if is_font
                        && let Err(e) = font_db.load_font_file(&path)
                    {
                        tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
                    }
                }
            }

            Arc::new(font_db)
        })
        .clone()
}

/// 将组装好的 SVG 栅格化并编码为 PNG
pub fn rasterize_to_png(
    svg_data: &str,
    fonts_dir: &Path,
    optimize_speed: bool,
) -> Result<Vec<u8>, AppError> {
    let t0 = std::time::Instant::now();

    let font_db = global_font_db(fonts_dir);

    let opts = UsvgOptions {
        fontdb: font_db,
        font_family: FONT_GOTHIC.to_string(),
        font_size: 15.0,
        shape_rendering: if optimize_speed {
            usvg::ShapeRendering::OptimizeSpeed
        } else {
            usvg::ShapeRendering::GeometricPrecision
        },
        text_rendering: if optimize_speed {
            usvg::TextRendering::OptimizeSpeed
        } else {
            usvg::TextRendering::OptimizeLegibility
        },
        image_rendering: if optimize_speed {
            usvg::ImageRendering::OptimizeSpeed
        } else {
            usvg::ImageRendering::OptimizeQuality
        },
        ..Default::default()
    };

    let tree = usvg::Tree::from_data(svg_data.as_bytes(), &opts)
        .map_err(|e| AppError::Render(format!("Failed to parse SVG: {e}")))?;
    let t_parse = t0.elapsed();

    let pixmap_size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(pixmap_size.width(), pixmap_size.height())
        .ok_or_else(|| AppError::Render("Failed to create pixmap".to_string()))?;

    render(&tree, Transform::default(), &mut pixmap.as_mut());
    let t_raster = t0.elapsed();

    // 使用 png crate 进行快速编码
    let mut out = Vec::with_capacity((pixmap_size.width() * pixmap_size.height()) as usize);
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap_size.width(), pixmap_size.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if optimize_speed {
            encoder.set_compression(png::Compression::Fast);
            encoder.set_filter(png::FilterType::NoFilter);
        } else {
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::Paeth);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::Render(format!("PNG write_header error: {e}")))?;
        writer
            .write_image_data(pixmap.data())
            .map_err(|e| AppError::Render(format!("PNG write_image_data error: {e}")))?;
        writer
            .finish()
            .map_err(|e| AppError::Render(format!("PNG finish error: {e}")))?;
    }
    let t_encode = t0.elapsed();

    tracing::debug!(
        "PNG渲染内部分段: 解析={:?}, 栅格化={:?}, 编码={:?}",
        t_parse,
        t_raster - t_parse,
        t_encode - t_raster,
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{
        CANVAS_HEIGHT, CANVAS_WIDTH, compose_card_svg, estimate_text_width, fit_right_aligned,
        rasterize_to_png,
    };
    use crate::features::musicdb::models::{MusicEntry, Tier, TierLevels};
    use crate::features::scorecard::museca::assets::{AssetStore, tests::write_test_png};
    use crate::features::scorecard::museca::extractor::{self, tests::sample_save_m};

    fn record(music_id: u32, old_score: Option<i64>) -> extractor::PlayRecord {
        let xml = sample_save_m(music_id, old_score);
        let doc = roxmltree::Document::parse(&xml).expect("xml");
        extractor::extract_record(&doc).expect("record")
    }

    fn entry(title: &str, artist: &str) -> MusicEntry {
        MusicEntry {
            id: 42,
            title: title.to_string(),
            artist: artist.to_string(),
            levels: TierLevels {
                novice: Some("3".into()),
                advanced: Some("8".into()),
                exhaust: Some("12".into()),
            },
        }
    }

    fn store_with_bg() -> (tempfile::TempDir, AssetStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        write_test_png(&dir.path().join("misc/bg.png"), 4, 4);
        let store = AssetStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn width_estimate_counts_full_width_chars_double() {
        let cjk = estimate_text_width("曲曲", 10.0);
        let ascii = estimate_text_width("aa", 10.0);
        assert!(cjk > ascii);
        assert_eq!(cjk, 20.0);
    }

    #[test]
    fn title_fit_policy_steps_down_then_compresses() {
        let fits: String = "曲".repeat(16); // 16 * 15 = 240 <= 247
        assert_eq!(fit_right_aligned(&fits, 15.0, Some(14.0)), (15.0, None));

        let needs_smaller: String = "曲".repeat(17); // 255 > 247, 17 * 14 = 238 <= 247
        assert_eq!(
            fit_right_aligned(&needs_smaller, 15.0, Some(14.0)),
            (14.0, None)
        );

        let needs_squash: String = "曲".repeat(18); // 252 > 247 还是超，压缩到预算宽度
        assert_eq!(
            fit_right_aligned(&needs_squash, 15.0, Some(14.0)),
            (14.0, Some(247.0))
        );
    }

    #[test]
    fn oversize_title_is_compressed_to_exact_budget() {
        let (_dir, store) = store_with_bg();
        let long_title: String = "曲".repeat(18);
        let card = compose_card_svg(
            &record(42, None),
            &entry(&long_title, "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");
        assert!(card.svg.contains(r#"textLength="247.0""#));
    }

    #[test]
    fn improvement_delta_renders_new_record_banner_and_signed_text() {
        let (_dir, store) = store_with_bg();
        let card = compose_card_svg(
            &record(42, Some(887654)), // score 987654 → +100000
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(card.svg.contains(">+100000</text>"));
        // 空素材库：横幅素材按缺失上报而非失败
        assert!(
            card.misses
                .iter()
                .any(|m| m == "misc/new_record_text.png")
        );
        assert!(!card.misses.iter().any(|m| m == "misc/minus_record_bg.png"));
    }

    #[test]
    fn non_improvement_delta_takes_the_minus_path() {
        let (_dir, store) = store_with_bg();
        let card = compose_card_svg(
            &record(42, Some(987754)), // score 987654 → -100
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(card.svg.contains(">-100</text>"));
        assert!(card.misses.iter().any(|m| m == "misc/minus_record_bg.png"));
        assert!(
            !card
                .misses
                .iter()
                .any(|m| m == "misc/new_record_text.png")
        );
    }

    #[test]
    fn equal_scores_take_the_minus_path_with_zero_delta() {
        let (_dir, store) = store_with_bg();
        let card = compose_card_svg(
            &record(42, Some(987654)),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(card.svg.contains(">0</text>"));
        assert!(card.misses.iter().any(|m| m == "misc/minus_record_bg.png"));
    }

    #[test]
    fn absent_old_score_disables_the_delta_block() {
        let (_dir, store) = store_with_bg();
        let card = compose_card_svg(
            &record(42, None),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(!card.misses.iter().any(|m| m.contains("record")));
    }

    #[test]
    fn jacket_falls_back_to_base_tier_without_reporting_a_miss() {
        let (dir, store) = store_with_bg();
        // 只有档位 1 的基础封面，档位 2（advanced）专属封面缺失
        write_test_png(&dir.path().join("jackets/jk_01_0042_1_b.png"), 4, 4);

        let card = compose_card_svg(
            &record(42, None),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(!card.misses.iter().any(|m| m.contains("jk_01_")));
    }

    #[test]
    fn jacket_default_fallback_is_reported_but_still_renders() {
        let (dir, store) = store_with_bg();
        write_test_png(&dir.path().join("jackets/jk_01_0000_0_b.png"), 4, 4);

        let card = compose_card_svg(
            &record(42, None),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(card.misses.iter().any(|m| m.contains("jk_01_0042_2_b")));
    }

    #[test]
    fn exhausted_jacket_chain_is_nonfatal_and_reported() {
        let (_dir, store) = store_with_bg();
        let card = compose_card_svg(
            &record(42, None),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        assert!(card.misses.iter().any(|m| m.contains("jk_01_0042_2_b")));
        assert!(card.svg.ends_with("</svg>\n"));
    }

    #[test]
    fn newer_content_gets_the_overlay_with_whichever_jacket_resolved() {
        let (dir, store) = store_with_bg();
        write_test_png(&dir.path().join("jackets/jk_01_0300_1_b.png"), 4, 4);
        write_test_png(&dir.path().join("misc/mplus.png"), 4, 4);

        let card = compose_card_svg(
            &record(300, None),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        // 角标素材存在且曲目 ID 过阈值：不应出现在缺失清单里
        assert!(!card.misses.iter().any(|m| m == "misc/mplus.png"));
    }

    #[test]
    fn missing_background_aborts_the_render() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AssetStore::new(dir.path().to_path_buf());
        assert!(
            compose_card_svg(
                &record(42, None),
                &entry("title", "artist"),
                Tier::Advanced,
                "8",
                &store,
            )
            .is_err()
        );
    }

    #[test]
    fn rasterized_card_matches_the_fixed_canvas() {
        let (dir, store) = store_with_bg();
        let card = compose_card_svg(
            &record(42, None),
            &entry("title", "artist"),
            Tier::Advanced,
            "8",
            &store,
        )
        .expect("compose");

        let png_bytes =
            rasterize_to_png(&card.svg, &dir.path().join("font"), true).expect("rasterize");

        let decoder = png::Decoder::new(png_bytes.as_slice());
        let reader = decoder.read_info().expect("png info");
        assert_eq!(reader.info().width, CANVAS_WIDTH);
        assert_eq!(reader.info().height, CANVAS_HEIGHT);
    }
}
