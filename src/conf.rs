/*
    Copyright 2024 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Parsing of application configuration.

use clap::Parser;

/// Package name reported by Cargo at build time.
const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
/// Package version reported by Cargo at build time.
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/**
Application configuration root.

The application name defaults to the Rust package name, but can be overridden
with the environment variable `APP_NAME`. It feeds the log level/style
environment variable prefix (`{APPLICATION_NAME}_LOG_LEVEL`,
`{APPLICATION_NAME}_LOG_STYLE`), not any configuration file.
*/
#[derive(Debug, Parser)]
#[command(name = CARGO_PKG_NAME, version = CARGO_PKG_VERSION)]
pub struct AppConfig {
    /// Path to a kubeconfig file. When omitted, the in-cluster service
    /// account config is used.
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Compute and log every route change without calling the DNS provider.
    #[arg(long)]
    pub dry_run: bool,

    /// Raise the default log level to `debug` and use human-friendly
    /// terminal styling, as during local development.
    #[arg(long)]
    pub is_dev: bool,

    /// Lower case application name. Not a CLI flag; resolved from `APP_NAME`.
    #[arg(skip = Self::read_app_name_lowercase())]
    app_name: String,
}

impl AppConfig {
    /**
       The application name defaults to the Rust package name, but can be
       overridden with the environment variable `APP_NAME`.
    */
    pub fn read_app_name_lowercase() -> String {
        std::env::var("APP_NAME")
            .map_err(|e| {
                log::debug!(
                    "Environment variable APP_NAME: {e:?} -> Default app name '{}' will be used.",
                    CARGO_PKG_NAME.to_owned()
                );
            })
            .ok()
            .map(|value| value.to_lowercase())
            .unwrap_or(CARGO_PKG_NAME.to_owned())
    }

    /// Lower case application name.
    pub fn app_name_lowercase(&self) -> &str {
        &self.app_name
    }

    /// SemVer application version derived from the Rust package version.
    pub fn app_version(&self) -> &'static str {
        CARGO_PKG_VERSION
    }

    /// Parse configuration from the process's command-line arguments.
    pub fn new() -> Self {
        Self::parse()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
