use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use database::mongodb::MongoConfig;
use domain_suppression::models::{MailTemplate, SesConfig};

pub use core_config::Environment;

/// Relay configuration, composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub mongodb: MongoConfig,
    pub ses: SesConfig,
    pub template: MailTemplate,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;
        let mongodb = MongoConfig::from_env()?;
        let ses = SesConfig::from_env()?;
        let template = MailTemplate::from_env()?;

        Ok(Self {
            app: app_info!(),
            environment,
            server,
            mongodb,
            ses,
            template,
        })
    }
}
