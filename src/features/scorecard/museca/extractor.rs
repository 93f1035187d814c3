use serde::Serialize;

use crate::error::AppError;

/// 单次游玩的扁平字段记录
///
/// 每个请求新建一份，渲染完成即丢弃。数值字段在提取期完成解析校验，
/// 渲染期不再面对非法文本。
#[derive(Debug, Clone, Serialize)]
pub struct PlayRecord {
    pub music_id: u32,
    /// 难度档位编码（`music_type` 原文，封闭集合 0/1/2）
    pub tier_code: String,
    pub score: i64,
    /// 可选：上一次的最高分（客户端在响应里附加 old_score 元素时才有）
    pub old_score: Option<i64>,
    pub clear_type: String,
    pub score_grade: String,
    pub max_chain: String,
    pub critical: String,
    pub near: String,
    pub error: String,
    pub player_name: String,
    pub track_no: String,
    pub options: PlayOptions,
    /// 可选：ミッション进行信息（etc 字段带 mission 标记时出现，仅提取不渲染）
    pub mission: Option<MissionInfo>,
}

/// 一个 GRAFICA 槽位：选择编号 + 奖章编码
#[derive(Debug, Clone, Serialize)]
pub struct GraficaSlot {
    pub selector: String,
    pub medal: String,
}

impl GraficaSlot {
    /// 选择编号为 0 表示槽位未装备，不渲染
    pub fn is_equipped(&self) -> bool {
        self.selector != "0"
    }
}

/// 从 `etc` 复合字段解出的选项/标志字段
#[derive(Debug, Clone, Serialize)]
pub struct PlayOptions {
    pub grafica: [GraficaSlot; 3],
    pub curator_rank: u32,
    pub curve: String,
    pub object_placement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionInfo {
    pub grafica: String,
    pub level: String,
    pub percentage: String,
}

/// `etc` 复合字段的分隔符集合（与实机数据格式一致：
/// 冒号、逗号、连字符、右尖括号、字面 G、小括号）
fn is_etc_delimiter(c: char) -> bool {
    matches!(c, ':' | ',' | '-' | '>' | 'G' | '(' | ')')
}

// etc 分隔后的固定下标
const ETC_GRAFICA: [usize; 3] = [1, 2, 3];
const ETC_MEDALS: [usize; 3] = [7, 10, 13];
const ETC_CURATOR_RANK: usize = 19;
const ETC_CURVE: usize = 23;
const ETC_OBJECT_PLACEMENT: usize = 25;
const ETC_MISSION: [usize; 3] = [28, 29, 30];

fn malformed(detail: impl Into<String>) -> AppError {
    AppError::MalformedInput(detail.into())
}

fn child_text<'a>(node: &roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
}

fn required_text<'a>(
    node: &roxmltree::Node<'a, '_>,
    path: &str,
    name: &str,
) -> Result<&'a str, AppError> {
    child_text(node, name).ok_or_else(|| malformed(format!("缺少必需字段 {path}/{name}")))
}

/// 从 save_m 提交文档提取游玩记录
///
/// 所有必需字段按固定路径读取，任何缺失都视为请求不合法；`old_score`
/// 与 mission 信息允许缺失，只会关闭对应的渲染分支。
pub fn extract_record(doc: &roxmltree::Document) -> Result<PlayRecord, AppError> {
    let root = doc.root_element();
    let game = root
        .children()
        .find(|n| n.has_tag_name("game_3"))
        .ok_or_else(|| malformed("缺少 game_3 节点"))?;

    let music_id_text = required_text(&game, "game_3", "music_id")?;
    let music_id = music_id_text
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("music_id 非数字: {music_id_text}")))?;

    let score_text = required_text(&game, "game_3", "score")?;
    let score = score_text
        .trim()
        .parse::<i64>()
        .map_err(|_| malformed(format!("score 非数字: {score_text}")))?;

    // 客户端附加了 old_score 才渲染分差；存在但非数字按不合法处理
    let old_score = child_text(&game, "old_score")
        .map(|s| {
            s.trim()
                .parse::<i64>()
                .map_err(|_| malformed(format!("old_score 非数字: {s}")))
        })
        .transpose()?;

    let eaappli = game
        .children()
        .find(|n| n.has_tag_name("eaappli"))
        .ok_or_else(|| malformed("缺少 game_3/eaappli 节点"))?;

    let etc = required_text(&game, "game_3", "etc")?;
    let options = parse_etc_options(etc)?;
    let mission = parse_etc_mission(etc)?;

    Ok(PlayRecord {
        music_id,
        tier_code: required_text(&game, "game_3", "music_type")?.trim().to_string(),
        score,
        old_score,
        clear_type: required_text(&game, "game_3", "clear_type")?.trim().to_string(),
        score_grade: required_text(&game, "game_3", "score_grade")?.trim().to_string(),
        max_chain: required_text(&game, "game_3", "max_chain")?.trim().to_string(),
        critical: required_text(&game, "game_3", "critical")?.trim().to_string(),
        near: required_text(&game, "game_3", "near")?.trim().to_string(),
        error: required_text(&game, "game_3", "error")?.trim().to_string(),
        player_name: required_text(&eaappli, "game_3/eaappli", "player_name")?.to_string(),
        track_no: required_text(&eaappli, "game_3/eaappli", "track_no")?.trim().to_string(),
        options,
        mission,
    })
}

/// 定位切分 etc 字段并按固定偏移取出选项字段
///
/// 切分结果对相同输入是确定的；token 数不足以覆盖最大偏移时整个
/// 请求按不合法处理。
fn parse_etc_options(etc: &str) -> Result<PlayOptions, AppError> {
    let tokens: Vec<&str> = etc.split(is_etc_delimiter).collect();
    if tokens.len() <= ETC_OBJECT_PLACEMENT {
        return Err(malformed(format!(
            "etc 字段 token 不足: 需要至少 {} 个，实际 {} 个",
            ETC_OBJECT_PLACEMENT + 1,
            tokens.len()
        )));
    }

    let curator_raw = tokens[ETC_CURATOR_RANK];
    let curator_rank = curator_raw
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("etc 字段 curator rank 非数字: {curator_raw}")))?;

    let slot = |i: usize| GraficaSlot {
        selector: tokens[ETC_GRAFICA[i]].to_string(),
        medal: tokens[ETC_MEDALS[i]].to_string(),
    };

    Ok(PlayOptions {
        grafica: [slot(0), slot(1), slot(2)],
        curator_rank,
        curve: tokens[ETC_CURVE].to_string(),
        object_placement: tokens[ETC_OBJECT_PLACEMENT].to_string(),
    })
}

/// etc 带有 mission 标记 token 时，按固定偏移取出进行信息
fn parse_etc_mission(etc: &str) -> Result<Option<MissionInfo>, AppError> {
    let tokens: Vec<&str> = etc.split(is_etc_delimiter).collect();
    if !tokens.iter().any(|t| *t == "mission") {
        return Ok(None);
    }
    if tokens.len() <= ETC_MISSION[2] {
        return Err(malformed(
            "etc 字段带 mission 标记但 token 不足".to_string(),
        ));
    }
    Ok(Some(MissionInfo {
        grafica: tokens[ETC_MISSION[0]].to_string(),
        level: tokens[ETC_MISSION[1]].to_string(),
        percentage: tokens[ETC_MISSION[2]].to_string(),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{PlayRecord, extract_record, parse_etc_options};

    /// 构造一个 token 以冒号连接的 etc 字段（下标与偏移一一对应）
    pub(crate) fn etc_from_tokens(tokens: &[&str]) -> String {
        tokens.join(":")
    }

    pub(crate) fn sample_etc() -> String {
        let mut tokens = vec!["0"; 26];
        tokens[1] = "101"; // grafica_1
        tokens[2] = "0"; // grafica_2 未装备
        tokens[3] = "103"; // grafica_3
        tokens[7] = "2"; // grafica_1 medal
        tokens[10] = "0";
        tokens[13] = "5"; // grafica_3 medal
        tokens[19] = "7"; // curator rank
        tokens[23] = "1"; // curve
        tokens[25] = "2"; // object placement
        etc_from_tokens(&tokens)
    }

    pub(crate) fn sample_save_m(music_id: u32, old_score: Option<i64>) -> String {
        let old = old_score
            .map(|s| format!("<old_score>{s}</old_score>"))
            .unwrap_or_default();
        format!(
            r#"<call model="PIX:J:B:A:2016121200">
  <game_3>
    <music_id>{music_id}</music_id>
    <music_type>1</music_type>
    <score>987654</score>
    <clear_type>2</clear_type>
    <score_grade>5</score_grade>
    <max_chain>321</max_chain>
    <critical>456</critical>
    <near>12</near>
    <error>3</error>
    <etc>{etc}</etc>
    {old}
    <eaappli>
      <player_name>MUSECA PLAYER</player_name>
      <track_no>2</track_no>
    </eaappli>
  </game_3>
</call>"#,
            etc = sample_etc()
        )
    }

    fn extract(xml: &str) -> Result<PlayRecord, crate::error::AppError> {
        let doc = roxmltree::Document::parse(xml).expect("valid xml");
        extract_record(&doc)
    }

    #[test]
    fn extracts_all_required_fields() {
        let record = extract(&sample_save_m(42, None)).expect("extract");
        assert_eq!(record.music_id, 42);
        assert_eq!(record.tier_code, "1");
        assert_eq!(record.score, 987654);
        assert_eq!(record.old_score, None);
        assert_eq!(record.player_name, "MUSECA PLAYER");
        assert_eq!(record.track_no, "2");
        assert_eq!(record.options.curator_rank, 7);
        assert_eq!(record.options.curve, "1");
        assert_eq!(record.options.object_placement, "2");
        assert!(record.options.grafica[0].is_equipped());
        assert!(!record.options.grafica[1].is_equipped());
        assert_eq!(record.options.grafica[2].selector, "103");
        assert_eq!(record.options.grafica[2].medal, "5");
        assert!(record.mission.is_none());
    }

    #[test]
    fn optional_old_score_is_parsed_when_present() {
        let record = extract(&sample_save_m(42, Some(900000))).expect("extract");
        assert_eq!(record.old_score, Some(900000));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let xml = sample_save_m(42, None).replace("<score>987654</score>", "");
        assert!(extract(&xml).is_err());
    }

    #[test]
    fn etc_splitting_is_deterministic_across_delimiters() {
        // 混合分隔符：冒号、逗号、连字符、尖括号、G、括号彼此等价
        let with_colons = parse_etc_options(&sample_etc()).expect("colons");
        let mixed = sample_etc()
            .replacen(':', ",", 3)
            .replacen(':', "-", 2)
            .replacen(':', ">", 1)
            .replacen(':', "G", 1)
            .replacen(':', "(", 1)
            .replacen(':', ")", 1);
        let with_mixed = parse_etc_options(&mixed).expect("mixed");

        assert_eq!(with_colons.curator_rank, with_mixed.curator_rank);
        assert_eq!(with_colons.curve, with_mixed.curve);
        assert_eq!(
            with_colons.object_placement,
            with_mixed.object_placement
        );
    }

    #[test]
    fn short_etc_field_is_malformed() {
        let xml = sample_save_m(42, None).replace(&sample_etc(), "a:b:c");
        assert!(extract(&xml).is_err());
    }

    #[test]
    fn mission_tokens_are_extracted_when_marked() {
        let mut tokens: Vec<String> = sample_etc().split(':').map(str::to_string).collect();
        tokens.push("mission".to_string()); // index 26
        tokens.push("x".to_string()); // 27
        tokens.push("9".to_string()); // 28 mission grafica
        tokens.push("3".to_string()); // 29 mission level
        tokens.push("80".to_string()); // 30 mission percentage
        let etc = tokens.join(":");

        let xml = sample_save_m(42, None).replace(&sample_etc(), &etc);
        let record = extract(&xml).expect("extract");
        let mission = record.mission.expect("mission info");
        assert_eq!(mission.grafica, "9");
        assert_eq!(mission.level, "3");
        assert_eq!(mission.percentage, "80");
    }
}
