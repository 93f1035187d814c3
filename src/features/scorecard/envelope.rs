use std::fmt;

use crate::error::AppError;

/// `call` 根元素 `model` 属性的五段标识
///
/// 形如 `PIX:J:B:A:2016121200`：机种家族、目的地、规格、修订、datecode。
/// 段数固定为 5，任何偏差都视为请求不合法。
#[derive(Debug, Clone)]
pub struct ModelId {
    raw: String,
    pub family: String,
    pub dest: String,
    pub spec: String,
    pub revision: String,
    pub ext: String,
}

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let parts: Vec<&str> = raw.split(':').collect();
        let [family, dest, spec, revision, ext] = parts.as_slice() else {
            return Err(AppError::MalformedInput(format!(
                "model 标识应为 5 段冒号分隔，实际为 {} 段: {raw}",
                parts.len()
            )));
        };
        if family.is_empty() {
            return Err(AppError::MalformedInput(format!(
                "model 标识机种段为空: {raw}"
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            family: (*family).to_string(),
            dest: (*dest).to_string(),
            spec: (*spec).to_string(),
            revision: (*revision).to_string(),
            ext: (*ext).to_string(),
        })
    }

    /// 第 5 段解析为整数 datecode（分发路由的版本判据）
    pub fn datecode(&self) -> Result<u32, AppError> {
        self.ext.trim().parse::<u32>().map_err(|_| {
            AppError::MalformedInput(format!("model 标识 datecode 段非数字: {}", self.ext))
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 解析完成的提交信封
///
/// 只校验结构性约束（根元素、标识格式）；业务字段留给各 handler 的
/// 字段提取器按自家 schema 读取，因此原始文档文本随信封一起传递。
#[derive(Debug, Clone)]
pub struct SubmissionEnvelope {
    body: String,
    pub model: ModelId,
    pub datecode: u32,
}

impl SubmissionEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, AppError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| AppError::MalformedInput("请求体不是合法的 UTF-8 文本".to_string()))?;
        let xml = sanitize_xml_declaration(text);

        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| AppError::MalformedInput(format!("XML 解析失败: {e}")))?;

        let root = doc.root_element();
        if root.tag_name().name() != "call" {
            return Err(AppError::MalformedInput(format!(
                "根元素应为 call，实际为 {}",
                root.tag_name().name()
            )));
        }

        let model_attr = root
            .attribute("model")
            .ok_or_else(|| AppError::MalformedInput("call 元素缺少 model 属性".to_string()))?;
        let model = ModelId::parse(model_attr)?;
        let datecode = model.datecode()?;

        Ok(Self {
            body: xml.to_string(),
            model,
            datecode,
        })
    }

    /// 信封对应的文档文本（已剥离异编码声明，可直接再次解析）
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// 剥离声明异编码的 XML 声明
///
/// 上游客户端在声明里标注 shift_jisx0213，而经代理转发到本服务的字节
/// 已经是 UTF-8；roxmltree 只接受 UTF-8，遇到异编码声明时把声明本身
/// 去掉再解析。UTF-8 声明与无声明文档原样返回。
pub fn sanitize_xml_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<?xml")
        && let Some(end) = rest.find("?>")
    {
        let decl = rest[..end].to_ascii_lowercase();
        if let Some(pos) = decl.find("encoding") {
            let tail = &decl[pos..];
            if !tail.contains("utf-8") && !tail.contains("utf8") {
                return rest[end + 2..].trim_start();
            }
        }
    }
    xml
}
