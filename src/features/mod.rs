/// 健康检查
pub mod health;
/// 乐曲元数据目录
pub mod musicdb;
/// scorecard 生成（分发、提取、渲染、落盘）
pub mod scorecard;
