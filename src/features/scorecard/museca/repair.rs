use std::borrow::Cow;

/// 厂商遗留乱码的固定替换表
///
/// 一批非 ASCII 字符（带音标的拉丁字母、符号）在上游曲库文本里被映射
/// 到了错误的码位。映射一对一且封闭；替换结果不含任何触发码位，因此
/// 重复应用是幂等的。
const REPLACEMENTS: &[(char, char)] = &[
    ('\u{203E}', '~'),
    ('\u{301C}', '～'),
    ('\u{49FA}', 'ê'),
    ('\u{5F5C}', 'ū'),
    ('\u{66E6}', 'à'),
    ('\u{66E9}', 'è'),
    ('\u{8E94}', '🐾'),
    ('\u{9A2B}', 'á'),
    ('\u{9A69}', 'Ø'),
    ('\u{9A6B}', 'ā'),
    ('\u{9A6A}', 'ō'),
    ('\u{9AAD}', 'ü'),
    ('\u{9B2F}', 'ī'),
    ('\u{9EF7}', 'ē'),
    ('\u{9F63}', 'Ú'),
    ('\u{9F67}', 'Ä'),
    ('\u{973B}', '♠'),
    ('\u{9F6A}', '♣'),
    ('\u{9448}', '♦'),
    ('\u{9F72}', '♥'),
    ('\u{9F76}', '♡'),
    ('\u{9F77}', 'é'),
    ('\u{8E59}', 'ℱ'),
    ('\u{96CB}', 'Ǜ'),
    ('\u{9B44}', '♃'),
    ('\u{9B25}', 'Ã'),
    ('\u{9B06}', 'Ý'),
    ('\u{968D}', 'Ü'),
    ('\u{9B2E}', '¡'),
    ('\u{99B9}', '©'),
    ('\u{99BF}', '♠'),
];

fn repair_char(c: char) -> Option<char> {
    REPLACEMENTS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// 修复外部来源展示文本中的乱码字符
///
/// 必须在测宽/渲染之前应用：修复后的字符与原乱码字符宽度不同。
pub fn repair_broken_chars(input: &str) -> Cow<'_, str> {
    if !input.chars().any(|c| repair_char(c).is_some()) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(
        input
            .chars()
            .map(|c| repair_char(c).unwrap_or(c))
            .collect(),
    )
}
