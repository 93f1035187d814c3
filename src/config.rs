use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 资源配置
///
/// 约定的素材目录布局（相对 `base_path`）：
/// `misc/`、`jackets/`、`rank/`、`numbers/`、`grade/`、`grafica/`、`medel/`、`font/`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// 素材基础路径（背景、徽章、封面等 PNG 素材）
    pub base_path: String,
    /// 字体子目录名（ttf/otf/ttc 均会载入全局字体库）
    pub fonts_folder: String,
    /// music db 文件（UTF-8 编码的乐曲元数据 XML）
    pub music_db_file: String,
    /// 机种分发表文件（model → datecode 区间 → handler）
    pub dispatch_file: String,
    /// 生成图片的落盘目录（由静态文件服务对外暴露）
    pub cards_path: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式
    pub format: String,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRenderConfig {
    /// 并行渲染上限（0 = 按 CPU 核数）
    #[serde(default)]
    pub max_parallel: u32,
    /// 栅格化偏向速度而非质量
    #[serde(default)]
    pub optimize_speed: bool,
}

impl Default for ImageRenderConfig {
    fn default() -> Self {
        Self {
            max_parallel: 0,
            optimize_speed: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub resources: ResourcesConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    /// 图片渲染配置
    #[serde(default)]
    pub image: ImageRenderConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            // 加载配置文件
            .add_source(File::with_name(config_path.to_str().unwrap()))
            // 支持环境变量覆盖，例如：APP_API_PREFIX
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;

        Ok(config)
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取素材文件夹路径
    pub fn assets_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.base_path)
    }

    /// 获取字体文件夹完整路径
    pub fn fonts_path(&self) -> PathBuf {
        self.assets_path().join(&self.resources.fonts_folder)
    }

    /// 获取 music db 文件路径
    pub fn music_db_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.music_db_file)
    }

    /// 获取机种分发表文件路径
    pub fn dispatch_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.dispatch_file)
    }

    /// 获取生成图片落盘目录
    pub fn cards_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.cards_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            resources: ResourcesConfig {
                base_path: "./assets".to_string(),
                fonts_folder: "font".to_string(),
                music_db_file: "./assets/music-info-b.xml".to_string(),
                dispatch_file: "./games.json".to_string(),
                cards_path: "./static".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
            api: ApiConfig {
                prefix: "/api/v1".to_string(),
            },
            image: ImageRenderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn default_config_paths_are_consistent() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server_addr(), "0.0.0.0:5000");
        assert!(cfg.fonts_path().starts_with(cfg.assets_path()));
        assert!(cfg.api.prefix.starts_with('/'));
    }
}
