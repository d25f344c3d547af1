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

#![warn(missing_docs)]

//! # Cluster DNS reconciler.
//!
//! Watches `Ingress`, `Node` and ingress-controller `Service` objects on a
//! Kubernetes cluster and keeps a DNS provider's hosted zone records in
//! sync with what it sees.
//!

pub mod cluster_view;
pub mod conf;
pub mod dns;
pub mod error;
pub mod model;
mod watch;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use crate::cluster_view::ClusterView;
use crate::conf::AppConfig;
use crate::dns::provider::{DnsProviderClient, Route53Client};
use crate::dns::Synchronizer;
use crate::error::BootstrapError;
use crate::watch::WatchMultiplexer;

/// Application entry point.
fn main() -> ExitCode {
    let app_config = AppConfig::new();
    if let Err(e) = init_logger(&app_config) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run_async(app_config))
}

/// Initialize the logging system and apply filters.
fn init_logger(app_config: &AppConfig) -> Result<(), log::SetLoggerError> {
    let env_prefix = AppConfig::read_app_name_lowercase().to_uppercase();
    let default_level = if app_config.is_dev {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder()
        .filter_level(default_level)
        // Customize logging for dependencies
        .filter(Some("rustls::client"), log::LevelFilter::Info)
        .filter(Some("rustls::common_state"), log::LevelFilter::Info)
        .filter(Some("hyper_util::client"), log::LevelFilter::Info)
        .filter(Some("kube_client::client"), log::LevelFilter::Info)
        .filter(Some("aws_smithy_runtime"), log::LevelFilter::Info)
        .filter(Some("tower::buffer::worker"), log::LevelFilter::Info)
        .write_style(if app_config.is_dev {
            env_logger::fmt::WriteStyle::Always
        } else {
            env_logger::fmt::WriteStyle::Auto
        })
        .target(env_logger::fmt::Target::Stdout)
        .is_test(false)
        .parse_env(
            env_logger::Env::new()
                .filter(env_prefix.to_owned() + "_LOG_LEVEL")
                .write_style(env_prefix.to_owned() + "_LOG_STYLE"),
        )
        .try_init()
}

/// Async code entry point.
async fn run_async(app_config: AppConfig) -> ExitCode {
    log::info!(
        "{} {} starting (dry_run={}, is_dev={})",
        app_config.app_name_lowercase(),
        app_config.app_version(),
        app_config.dry_run,
        app_config.is_dev,
    );

    let client = match build_kube_client(&app_config).await {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to build Kubernetes client: {e}");
            return ExitCode::FAILURE;
        }
    };
    match client.apiserver_version().await {
        Ok(info) => log::info!("Kubernetes API version: {info:?}"),
        Err(e) => {
            log::error!("Failed to access Kubernetes API. Is this container deployed? {e:?}");
            return ExitCode::FAILURE;
        }
    }

    let provider: Arc<dyn DnsProviderClient> = Arc::new(Route53Client::from_env().await);
    let synchronizer = Synchronizer::new(provider, app_config.dry_run);
    let view = ClusterView::new();
    let multiplexer = WatchMultiplexer::new(client, view, synchronizer);

    tokio::select! {
        _ = multiplexer.run() => {
            log::error!("watch multiplexer terminated");
        },
        _ = block_until_signaled() => {
            log::info!("shutdown signal received");
        },
    };
    ExitCode::SUCCESS
}

/// Build the Kubernetes client from `--kubeconfig`, or the in-cluster
/// service account config when no path was given.
async fn build_kube_client(app_config: &AppConfig) -> Result<kube::Client, BootstrapError> {
    let kubeconfig_path = app_config.kubeconfig.as_deref().filter(|p| !p.is_empty());
    let config = match kubeconfig_path {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path).map_err(|source| {
                BootstrapError::KubeconfigFile {
                    path: path.to_string(),
                    source,
                }
            })?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                .await
                .map_err(BootstrapError::KubeConfig)?
        }
        None => kube::Config::infer()
            .await
            .map_err(BootstrapError::KubeConfigInfer)?,
    };
    kube::Client::try_from(config).map_err(BootstrapError::KubeClient)
}

/// Block until SIGTERM or SIGINT is received.
async fn block_until_signaled() {
    let mut sigint = signal(SignalKind::interrupt()).unwrap();
    let mut sigterm = signal(SignalKind::terminate()).unwrap();
    tokio::select! {
        _ = sigterm.recv() => {
            log::debug!("SIGTERM received.")
        },
        _ = sigint.recv() => {
            log::debug!("SIGINT received.")
        },
    };
}
